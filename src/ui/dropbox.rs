use iced::widget::{button, column, container, text, text_input};
use iced::{Element, Length};

use crate::Message;

/// Dropbox connect/disconnect card
pub fn view(connected: bool, token_input: &str) -> Element<'_, Message> {
    let body = if connected {
        column![
            text("Connected to Dropbox. Images will be synced to the PhotoAnnotations folder.")
                .size(14),
            button("Disconnect from Dropbox")
                .on_press(Message::Disconnect)
                .padding(10)
                .width(Length::Fill),
        ]
    } else {
        column![
            text("Enter your Dropbox access token to enable syncing of processed images.")
                .size(14),
            text_input("Enter your Dropbox access token", token_input)
                .on_input(Message::TokenChanged)
                .secure(true)
                .padding(8),
            button("Connect to Dropbox")
                .on_press_maybe((!token_input.trim().is_empty()).then_some(Message::Connect))
                .padding(10)
                .width(Length::Fill),
        ]
    };

    container(column![text("Dropbox Integration").size(24), body.spacing(8)].spacing(12))
        .padding(16)
        .width(Length::Fill)
        .into()
}
