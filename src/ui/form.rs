use iced::widget::{button, column, container, row, text, text_input};
use iced::{Element, Length};

use crate::state::metadata::Metadata;
use crate::Message;

/// "Project Metadata" card
///
/// "Process Image" only fires once every field is filled and no render is running.
pub fn view(metadata: &Metadata, rendering: bool) -> Element<'_, Message> {
    let ready = metadata.is_complete() && !rendering;

    let fields = column![
        text("PM Number").size(14),
        text_input("Enter PM number", &metadata.project_number)
            .on_input(Message::ProjectNumberChanged)
            .padding(8),
        text("Name").size(14),
        text_input("Enter your name", &metadata.author)
            .on_input(Message::AuthorChanged)
            .padding(8),
        text("Date & Time").size(14),
        row![
            text_input("YYYY-MM-DDTHH:MM", &metadata.timestamp)
                .on_input(Message::TimestampChanged)
                .padding(8),
            button("Now").on_press(Message::StampNow).padding(8),
        ]
        .spacing(8),
        text("Location").size(14),
        text_input("Enter location", &metadata.location)
            .on_input(Message::LocationChanged)
            .padding(8),
    ]
    .spacing(6);

    let process = button(if rendering { "Processing..." } else { "Process Image" })
        .on_press_maybe(ready.then_some(Message::Process))
        .padding(10)
        .width(Length::Fill);

    container(column![text("Project Metadata").size(24), fields, process].spacing(12))
        .padding(16)
        .width(Length::Fill)
        .into()
}
