use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use iced::widget::image::Handle;
use iced::widget::{column, container, row, scrollable, text};
use iced::{event, window, Element, Event, Length, Subscription, Task, Theme};
use rfd::FileDialog;

mod cli;
mod config;
mod error;
mod logging;
mod overlay;
mod state;
mod sync;
mod ui;

use cli::Cli;
use config::AppConfig;
use error::{AppError, Notice, ValidationError};
use overlay::Annotator;
use state::credentials::{Credential, CredentialStore};
use state::data::{AnnotatedImage, SourceImage, SUPPORTED_EXTENSIONS};
use state::metadata::Metadata;
use state::session::Session;
use sync::{UploadClient, UploadedFile};
use ui::Toast;

/// Main application state
struct PhotoAnnotator {
    /// Selected photo, metadata and the latest render
    session: Session,
    /// Shared renderer (holds the parsed banner font)
    annotator: Arc<Annotator>,
    /// Where the Dropbox token lives between runs
    credentials: CredentialStore,
    uploader: UploadClient,
    /// Contents of the masked token field
    token_input: String,
    connected: bool,
    /// Set by "Process Image"; after that every input change re-renders
    processing: bool,
    /// Generation of the render currently running, if any
    in_flight: Option<u64>,
    uploading: bool,
    source_preview: Option<Handle>,
    output_preview: Option<Handle>,
    toast: Option<Toast>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked "Choose File"
    PickImage,
    /// A file was dropped on the window
    ImageDropped(PathBuf),
    /// Background read of the chosen file finished
    ImageLoaded(Result<SourceImage, Notice>),
    ClearImage,
    ProjectNumberChanged(String),
    AuthorChanged(String),
    TimestampChanged(String),
    LocationChanged(String),
    /// "Now" button next to the timestamp
    StampNow,
    Process,
    /// Background render finished for the given session generation
    Annotated(u64, Result<AnnotatedImage, String>),
    Download,
    Saved(Result<PathBuf, Notice>),
    SyncToDropbox,
    Uploaded(Result<UploadedFile, Notice>),
    TokenChanged(String),
    Connect,
    Disconnect,
}

impl PhotoAnnotator {
    fn new(
        config: AppConfig,
        credentials: CredentialStore,
        annotator: Arc<Annotator>,
    ) -> (Self, Task<Message>) {
        let connected = credentials.is_present();
        let uploader = UploadClient::new(config.upload.endpoint, config.upload.folder);
        tracing::info!(
            connected,
            endpoint = uploader.endpoint(),
            quality = annotator.quality(),
            "Photo Annotator started"
        );

        (
            PhotoAnnotator {
                session: Session::new(),
                annotator,
                credentials,
                uploader,
                token_input: String::new(),
                connected,
                processing: false,
                in_flight: None,
                uploading: false,
                source_preview: None,
                output_preview: None,
                toast: None,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PickImage => {
                let file = FileDialog::new()
                    .set_title("Select Image")
                    .add_filter("Images", &SUPPORTED_EXTENSIONS[..])
                    .pick_file();

                match file {
                    Some(path) => Task::perform(load_image(path), Message::ImageLoaded),
                    None => Task::none(),
                }
            }
            Message::ImageDropped(path) => Task::perform(load_image(path), Message::ImageLoaded),
            Message::ImageLoaded(Ok(source)) => {
                self.source_preview = Some(Handle::from_bytes(source.bytes().to_vec()));
                self.session.select_image(source);
                self.processing = false;
                self.output_preview = None;
                Task::none()
            }
            Message::ImageLoaded(Err(notice)) => {
                self.toast = Some(Toast::Failure(notice));
                Task::none()
            }
            Message::ClearImage => {
                self.session.clear_image();
                self.processing = false;
                self.source_preview = None;
                self.output_preview = None;
                Task::none()
            }
            Message::ProjectNumberChanged(value) => self.edit_metadata(|m| m.project_number = value),
            Message::AuthorChanged(value) => self.edit_metadata(|m| m.author = value),
            Message::TimestampChanged(value) => self.edit_metadata(|m| m.timestamp = value),
            Message::LocationChanged(value) => self.edit_metadata(|m| m.location = value),
            Message::StampNow => self.edit_metadata(Metadata::stamp_now),
            Message::Process => match self.session.validate() {
                Ok(()) => {
                    self.processing = true;
                    self.toast = Some(Toast::Success("Processing image with overlay...".into()));
                    self.render()
                }
                Err(e) => {
                    self.toast = Some(Toast::failure(AppError::from(e)));
                    Task::none()
                }
            },
            Message::Annotated(generation, result) => {
                if self.in_flight == Some(generation) {
                    self.in_flight = None;
                }
                if generation != self.session.generation() {
                    // inputs changed while this one was rendering
                    return Task::none();
                }

                match result {
                    Ok(annotated) => {
                        self.output_preview = Some(Handle::from_bytes(annotated.bytes.clone()));
                        self.session.accept(generation, annotated);
                    }
                    Err(e) => {
                        // no output and no notice; see DESIGN.md on decode failures
                        tracing::warn!(error = %e, "annotation failed, no output produced");
                    }
                }
                Task::none()
            }
            Message::Download => {
                let Some(annotated) = self.session.annotated() else {
                    return Task::none();
                };

                let target = FileDialog::new()
                    .set_title("Save Annotated Image")
                    .set_file_name(self.session.metadata().export_filename())
                    .add_filter("JPEG", &["jpg"])
                    .save_file();

                match target {
                    Some(path) => Task::perform(save_image(path, annotated.bytes.clone()), Message::Saved),
                    None => Task::none(),
                }
            }
            Message::Saved(Ok(path)) => {
                self.toast = Some(Toast::Success(format!("Saved {}", path.display())));
                Task::none()
            }
            Message::Saved(Err(notice)) => {
                self.toast = Some(Toast::Failure(notice));
                Task::none()
            }
            Message::SyncToDropbox => self.sync(),
            Message::Uploaded(result) => {
                self.uploading = false;
                self.toast = Some(match result {
                    Ok(file) => Toast::Success(format!("Image synced to Dropbox: {}", file.name)),
                    Err(notice) => Toast::Failure(notice),
                });
                Task::none()
            }
            Message::TokenChanged(value) => {
                self.token_input = value;
                Task::none()
            }
            Message::Connect => {
                match self.credentials.save(&self.token_input) {
                    Ok(()) => {
                        self.connected = true;
                        self.token_input.clear();
                        self.toast = Some(Toast::Success("Connected to Dropbox successfully!".into()));
                    }
                    Err(e) => self.toast = Some(Toast::failure(AppError::from(e))),
                }
                Task::none()
            }
            Message::Disconnect => {
                match self.credentials.clear() {
                    Ok(()) => {
                        self.connected = false;
                        self.token_input.clear();
                        self.toast = Some(Toast::Success("Disconnected from Dropbox".into()));
                    }
                    Err(e) => self.toast = Some(Toast::failure(AppError::from(e))),
                }
                Task::none()
            }
        }
    }

    /// Apply a metadata edit; re-render if the output is already showing
    fn edit_metadata(&mut self, edit: impl FnOnce(&mut Metadata)) -> Task<Message> {
        let mut metadata = self.session.metadata().clone();
        edit(&mut metadata);

        if self.session.set_metadata(metadata) && self.processing {
            self.output_preview = None;
            return self.render();
        }
        Task::none()
    }

    /// A render for the current or an older generation hasn't come back yet
    fn rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a background render of the current inputs
    fn render(&mut self) -> Task<Message> {
        let Some(request) = self.session.request() else {
            return Task::none();
        };

        let generation = request.generation;
        self.in_flight = Some(generation);
        Task::perform(
            self.annotator
                .clone()
                .annotate_async(request.source, request.metadata),
            move |result| Message::Annotated(generation, result.map_err(|e| e.to_string())),
        )
    }

    fn sync(&mut self) -> Task<Message> {
        let Some(annotated) = self.session.annotated() else {
            return Task::none();
        };

        let credential = match self.credentials.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                self.toast = Some(Toast::failure(AppError::from(ValidationError::NotConnected)));
                return Task::none();
            }
            Err(e) => {
                self.toast = Some(Toast::failure(AppError::from(e)));
                return Task::none();
            }
        };

        self.uploading = true;
        self.toast = Some(Toast::Success("Syncing to Dropbox...".into()));
        Task::perform(
            upload(
                self.uploader.clone(),
                annotated.bytes.clone(),
                self.session.metadata().export_filename(),
                credential,
            ),
            Message::Uploaded,
        )
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let header = column![
            text("Photo Annotator").size(40),
            text("Add metadata overlays and sync to Dropbox").size(16),
        ]
        .spacing(4);

        let left = column![
            ui::picker::view(self.session.source(), self.source_preview.as_ref()),
            ui::form::view(self.session.metadata(), self.rendering()),
        ]
        .spacing(16)
        .width(Length::FillPortion(1));

        let right = column![
            ui::processor::view(
                self.processing,
                self.output_preview.as_ref(),
                self.rendering(),
                self.uploading,
            ),
            ui::dropbox::view(self.connected, &self.token_input),
        ]
        .spacing(16)
        .width(Length::FillPortion(1));

        let mut content = column![header].spacing(20).padding(32);
        if let Some(toast) = &self.toast {
            content = content.push(ui::toast(toast));
        }
        content = content.push(row![left, right].spacing(24));

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Accept files dropped anywhere on the window
    fn subscription(&self) -> Subscription<Message> {
        event::listen_with(|event, _status, _window| match event {
            Event::Window(window::Event::FileDropped(path)) => Some(Message::ImageDropped(path)),
            _ => None,
        })
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

async fn load_image(path: PathBuf) -> Result<SourceImage, Notice> {
    SourceImage::load(&path).await.map_err(Notice::from)
}

async fn save_image(path: PathBuf, bytes: Vec<u8>) -> Result<PathBuf, Notice> {
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Notice::from(AppError::from(e)))?;
    tracing::info!(path = %path.display(), "saved annotated image");
    Ok(path)
}

async fn upload(
    client: UploadClient,
    bytes: Vec<u8>,
    filename: String,
    credential: Credential,
) -> Result<UploadedFile, Notice> {
    client
        .upload(bytes, &filename, &credential)
        .await
        .map_err(|e| Notice::from(AppError::from(e)))
}

fn run_gui(config: AppConfig, credentials: CredentialStore) -> Result<(), AppError> {
    let annotator = Arc::new(Annotator::new(config.export.jpeg_quality)?);

    iced::application("Photo Annotator", PhotoAnnotator::update, PhotoAnnotator::view)
        .subscription(PhotoAnnotator::subscription)
        .theme(PhotoAnnotator::theme)
        .centered()
        .run_with(move || PhotoAnnotator::new(config, credentials, annotator))?;

    Ok(())
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load(&config_path)?;
    if let Some(endpoint) = cli.endpoint {
        config.upload.endpoint = endpoint;
    }

    let credentials = CredentialStore::open_default()?;

    match cli.command {
        Some(command) => cli::run(command, &config, &credentials),
        None => run_gui(config, credentials),
    }
}

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = ?e.kind(), "{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use overlay::annotator::DEFAULT_JPEG_QUALITY;
    use std::io::Cursor;
    use std::path::Path;

    fn photo(name: &str) -> SourceImage {
        let img = RgbaImage::from_pixel(160, 140, Rgba([70, 90, 110, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        SourceImage::from_bytes(buf, name).unwrap()
    }

    fn app(dir: &Path) -> PhotoAnnotator {
        let annotator = Arc::new(Annotator::new(DEFAULT_JPEG_QUALITY).unwrap());
        let store = CredentialStore::open(dir.join("credentials.json"));
        PhotoAnnotator::new(AppConfig::default(), store, annotator).0
    }

    fn fill_form(app: &mut PhotoAnnotator) {
        let _ = app.update(Message::ProjectNumberChanged("PM-7".into()));
        let _ = app.update(Message::AuthorChanged("Dana".into()));
        let _ = app.update(Message::TimestampChanged("2024-01-15T14:30".into()));
        let _ = app.update(Message::LocationChanged("Dock 4".into()));
    }

    /// What the background task would hand back for the current inputs
    fn render_now(app: &PhotoAnnotator) -> AnnotatedImage {
        let request = app.session.request().unwrap();
        app.annotator.annotate(&request.source, &request.metadata).unwrap()
    }

    #[test]
    fn test_new_image_mid_render_unlocks_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let _ = app.update(Message::ImageLoaded(Ok(photo("first.png"))));
        fill_form(&mut app);
        let _ = app.update(Message::Process);
        assert!(app.rendering());

        let started = app.session.generation();
        let late = render_now(&app);

        let _ = app.update(Message::ImageLoaded(Ok(photo("second.png"))));
        let _ = app.update(Message::Annotated(started, Ok(late)));

        assert!(!app.rendering());
        assert!(app.session.annotated().is_none());
        assert!(app.output_preview.is_none());
        assert!(app.session.metadata().is_complete());
        assert!(app.session.validate().is_ok());
    }

    #[test]
    fn test_clear_mid_render_unlocks_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let _ = app.update(Message::ImageLoaded(Ok(photo("site.png"))));
        fill_form(&mut app);
        let _ = app.update(Message::Process);
        let started = app.session.generation();

        let _ = app.update(Message::ClearImage);
        let _ = app.update(Message::Annotated(started, Err("decode failed".into())));

        assert!(!app.rendering());
        assert!(app.session.source().is_none());
    }

    #[test]
    fn test_edit_mid_render_waits_for_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let _ = app.update(Message::ImageLoaded(Ok(photo("site.png"))));
        fill_form(&mut app);
        let _ = app.update(Message::Process);
        let first = app.session.generation();
        let first_result = render_now(&app);

        // processing is on, so the edit starts a second render
        let _ = app.update(Message::LocationChanged("Gate 2".into()));
        let second = app.session.generation();
        assert_ne!(first, second);
        let second_result = render_now(&app);

        let _ = app.update(Message::Annotated(first, Ok(first_result)));
        assert!(app.rendering());
        assert!(app.session.annotated().is_none());

        let _ = app.update(Message::Annotated(second, Ok(second_result)));
        assert!(!app.rendering());
        assert!(app.output_preview.is_some());
        assert_eq!(
            app.session.annotated().unwrap().banner.location.text,
            "Location: Gate 2"
        );
    }

    #[test]
    fn test_sync_without_credential_shows_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        let _ = app.update(Message::ImageLoaded(Ok(photo("site.png"))));
        fill_form(&mut app);
        let _ = app.update(Message::Process);
        let generation = app.session.generation();
        let result = render_now(&app);
        let _ = app.update(Message::Annotated(generation, Ok(result)));

        let _ = app.update(Message::SyncToDropbox);
        assert!(!app.uploading);
        match &app.toast {
            Some(Toast::Failure(notice)) => {
                assert_eq!(notice.kind, error::FailureKind::Validation);
                assert_eq!(notice.message, "Please connect to Dropbox first");
            }
            other => panic!("unexpected toast {other:?}"),
        }
    }
}
