/// Project metadata burned into each photo
///
/// The four fields are typed in by the user and only live for the current
/// session. Nothing here is persisted.

use std::sync::OnceLock;

use chrono::{DateTime, Local, Locale, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// `Date:` line for en-US, e.g. `1/15/2024, 2:30:00 PM`
const US_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// `Date:` line for every other locale: its own date and time representations
const LOCALE_FORMAT: &str = "%x, %X";

/// Input shapes accepted for the timestamp field, tried in order
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Characters that never end up in an exported file name
const FILENAME_RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// The metadata attached to a photo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Project (PM) number, e.g. "PM-2024-118"
    pub project_number: String,

    /// Name of the person taking the photo
    pub author: String,

    /// Capture time as entered by the user
    /// - usually `YYYY-MM-DDTHH:MM` from the form or the "Now" button
    /// - rendered through [`display_timestamp`] on the banner
    pub timestamp: String,

    /// Free-form site or location description
    pub location: String,
}

impl Metadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// True only when none of the four fields is empty
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the fields that are still empty, in form order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("PM number", &self.project_number),
            ("name", &self.author),
            ("date & time", &self.timestamp),
            ("location", &self.location),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(label, _)| label)
        .collect()
    }

    /// Fill the timestamp with the current local time (the form's "Now" button)
    pub fn stamp_now(&mut self) {
        self.timestamp = now_timestamp();
    }

    /// The timestamp as it appears on the banner
    pub fn display_timestamp(&self) -> String {
        display_timestamp(&self.timestamp)
    }

    /// Default file name for an export made right now
    pub fn export_filename(&self) -> String {
        self.export_filename_at(Utc::now().timestamp_millis())
    }

    /// File name pattern `{project number}_{author}_{epoch millis}.jpg`
    pub fn export_filename_at(&self, epoch_millis: i64) -> String {
        format!(
            "{}_{}_{}.jpg",
            sanitize_component(&self.project_number),
            sanitize_component(&self.author),
            epoch_millis
        )
    }
}

/// Current local time in the `datetime-local` shape the form uses
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M").to_string()
}

/// Render a user-entered timestamp for the banner in the system locale
pub fn display_timestamp(raw: &str) -> String {
    display_timestamp_in(raw, system_locale())
}

/// Render a user-entered timestamp for the banner in `locale`
///
/// Known shapes are reformatted as date plus time (`1/15/2024, 2:30:00 PM`
/// in en-US, `15.01.2024, 14:30:00` in de-DE). Empty input stays empty and
/// anything unparseable is shown exactly as typed.
pub fn display_timestamp_in(raw: &str, locale: Locale) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match parse_timestamp(trimmed) {
        Some(naive) => format_in(naive, locale),
        None => raw.to_string(),
    }
}

/// Wall-clock time for a timestamp; zoned values are moved to local time
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Some(zoned.with_timezone(&Local).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn format_in(naive: NaiveDateTime, locale: Locale) -> String {
    // only the wall-clock fields are printed, the zone is never shown
    let moment = Utc.from_utc_datetime(&naive);
    match locale {
        Locale::en_US => moment.format(US_FORMAT).to_string(),
        _ => moment.format_localized(LOCALE_FORMAT, locale).to_string(),
    }
}

/// The user's locale, read once. Falls back to en-US when it is unknown.
pub fn system_locale() -> Locale {
    static LOCALE: OnceLock<Locale> = OnceLock::new();
    *LOCALE.get_or_init(|| {
        let detected = sys_locale::get_locale();
        let locale = detected
            .as_deref()
            .and_then(parse_locale)
            .unwrap_or(Locale::en_US);
        tracing::debug!(?detected, ?locale, "banner date locale");
        locale
    })
}

/// Map a BCP 47 or POSIX locale name (`de-DE`, `fr_FR.UTF-8`) to a [`Locale`]
pub fn parse_locale(tag: &str) -> Option<Locale> {
    let base = tag.split(|c: char| c == '.' || c == '@').next()?.replace('-', "_");
    Locale::try_from(base.as_str()).ok()
}

fn sanitize_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if FILENAME_RESERVED.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect()
}
