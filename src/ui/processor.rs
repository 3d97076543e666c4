use iced::widget::image::Handle;
use iced::widget::{button, column, container, image, row, text};
use iced::{ContentFit, Element, Length};

use crate::Message;

/// Right-hand card: the processed photo with download and sync actions,
/// or a placeholder until "Process Image" has been pressed
pub fn view(
    enabled: bool,
    preview: Option<&Handle>,
    rendering: bool,
    uploading: bool,
) -> Element<'_, Message> {
    if !enabled {
        return container(
            column![
                text("Ready to Process").size(24),
                text("Select an image and fill in the metadata to see the processed result").size(14),
            ]
            .spacing(8),
        )
        .padding(40)
        .width(Length::Fill)
        .into();
    }

    let picture: Element<'_, Message> = match preview {
        Some(handle) => image(handle.clone())
            .height(Length::Fixed(400.0))
            .content_fit(ContentFit::Contain)
            .into(),
        None if rendering => text("Rendering overlay...").into(),
        None => text("No output").into(),
    };

    let has_output = preview.is_some();
    let actions = row![
        button("Download")
            .on_press_maybe(has_output.then_some(Message::Download))
            .padding(10)
            .width(Length::Fill),
        button(if uploading { "Syncing..." } else { "Sync to Dropbox" })
            .on_press_maybe((has_output && !uploading).then_some(Message::SyncToDropbox))
            .padding(10)
            .width(Length::Fill),
    ]
    .spacing(12);

    container(column![text("Processed Image").size(24), picture, actions].spacing(12))
        .padding(16)
        .width(Length::Fill)
        .into()
}
