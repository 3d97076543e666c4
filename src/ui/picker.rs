use iced::widget::image::Handle;
use iced::widget::{button, column, container, image, row, text};
use iced::{ContentFit, Element, Length};

use crate::state::data::SourceImage;
use crate::Message;

/// "Select Image" card: a drop target until a photo is chosen, then a preview with a clear button
pub fn view<'a>(source: Option<&'a SourceImage>, preview: Option<&'a Handle>) -> Element<'a, Message> {
    let body: Element<'a, Message> = match (source, preview) {
        (Some(source), Some(preview)) => column![
            image(preview.clone())
                .height(Length::Fixed(256.0))
                .content_fit(ContentFit::Cover),
            row![
                text(format!("{} ({})", source.name(), source.mime_type())).size(14),
                button("Clear").on_press(Message::ClearImage).padding(6),
            ]
            .spacing(12),
        ]
        .spacing(8)
        .into(),
        _ => column![
            text("Upload Image").size(20),
            text("Drop an image on the window, or choose a file").size(14),
            button("Choose File").on_press(Message::PickImage).padding(10),
        ]
        .spacing(10)
        .into(),
    };

    container(column![text("Select Image").size(24), body].spacing(12))
        .padding(16)
        .width(Length::Fill)
        .into()
}
