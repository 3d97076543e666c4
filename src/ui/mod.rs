/// View helpers for the desktop app
///
/// Each panel is a plain function from state to `Element`; all state lives in
/// `PhotoAnnotator` in main.rs.

pub mod dropbox;
pub mod form;
pub mod picker;
pub mod processor;

use iced::widget::text;
use iced::{Color, Element};

use crate::error::{FailureKind, Notice};
use crate::Message;

/// Transient notice shown under the header
#[derive(Debug, Clone)]
pub enum Toast {
    Success(String),
    Failure(Notice),
}

impl Toast {
    pub fn failure(notice: impl Into<Notice>) -> Self {
        Toast::Failure(notice.into())
    }
}

pub fn toast(toast: &Toast) -> Element<'_, Message> {
    match toast {
        Toast::Success(message) => text(message.as_str())
            .color(Color::from_rgb(0.45, 0.85, 0.55))
            .into(),
        Toast::Failure(notice) => {
            // missing input is a nudge, not an error
            let color = match notice.kind {
                FailureKind::Validation => Color::from_rgb(0.95, 0.75, 0.35),
                _ => Color::from_rgb(0.95, 0.45, 0.45),
            };
            text(notice.message.as_str()).color(color).into()
        }
    }
}
