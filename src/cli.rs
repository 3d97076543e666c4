//! Headless command line: the same annotate/upload flow as the GUI, for scripts.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::{AppError, ValidationError};
use crate::overlay::Annotator;
use crate::state::credentials::{Credential, CredentialStore};
use crate::state::data::SourceImage;
use crate::state::metadata::{now_timestamp, Metadata};
use crate::state::session::Session;
use crate::sync::UploadClient;

#[derive(Parser, Debug)]
#[command(
    name = "photo-annotator",
    version,
    about = "Burn project metadata into photos and sync them to Dropbox",
    long_about = "Run without a subcommand to open the desktop app."
)]
pub struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(long, global = true, env = "PHOTO_ANNOTATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the upload endpoint URL
    #[arg(long, global = true, env = "PHOTO_ANNOTATOR_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Burn metadata into a photo and save (or upload) the result
    Annotate(AnnotateArgs),
    /// Store a Dropbox access token for later uploads
    Connect {
        /// Dropbox access token
        token: String,
    },
    /// Forget the stored Dropbox token
    Disconnect,
    /// Show connection and config state
    Status,
}

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// JPEG, PNG or WebP photo
    pub image: PathBuf,

    /// Project (PM) number
    #[arg(long = "pm")]
    pub project_number: String,

    /// Your name
    #[arg(long)]
    pub name: String,

    /// Capture time, e.g. 2024-01-15T14:30 (defaults to now)
    #[arg(long)]
    pub date: Option<String>,

    /// Site or location
    #[arg(long)]
    pub location: String,

    /// Output file (defaults to {pm}_{name}_{millis}.jpg)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Also upload the result to Dropbox
    #[arg(long)]
    pub upload: bool,

    /// Token to upload with instead of the stored one
    #[arg(long, env = "PHOTO_ANNOTATOR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl AnnotateArgs {
    fn metadata(&self) -> Metadata {
        Metadata {
            project_number: self.project_number.clone(),
            author: self.name.clone(),
            timestamp: self.date.clone().unwrap_or_else(now_timestamp),
            location: self.location.clone(),
        }
    }
}

/// Run one subcommand to completion on a single-threaded runtime
pub fn run(command: Command, config: &AppConfig, store: &CredentialStore) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(command, config, store))
}

async fn execute(command: Command, config: &AppConfig, store: &CredentialStore) -> Result<(), AppError> {
    match command {
        Command::Annotate(args) => annotate(args, config, store).await,
        Command::Connect { token } => {
            store.save(&token)?;
            println!("Connected to Dropbox. Token stored at {}", store.path().display());
            Ok(())
        }
        Command::Disconnect => {
            store.clear()?;
            println!("Disconnected from Dropbox");
            Ok(())
        }
        Command::Status => {
            let connected = store.load()?.is_some();
            println!("Dropbox: {}", if connected { "connected" } else { "not connected" });
            println!("Credential file: {}", store.path().display());
            let client = UploadClient::new(config.upload.endpoint.clone(), config.upload.folder.clone());
            println!("Upload endpoint: {}", client.endpoint());
            println!("Remote folder: {}", config.upload.folder);
            Ok(())
        }
    }
}

async fn annotate(args: AnnotateArgs, config: &AppConfig, store: &CredentialStore) -> Result<(), AppError> {
    // resolve the credential up front so a missing token fails before rendering
    let credential = if args.upload {
        Some(match &args.token {
            Some(token) => Credential::new(token.as_str())?,
            None => store.load()?.ok_or(ValidationError::NotConnected)?,
        })
    } else {
        None
    };

    let annotator = Annotator::new(config.export.jpeg_quality)?;
    let mut session = Session::new();
    session.select_image(SourceImage::load(&args.image).await?);
    session.set_metadata(args.metadata());
    session.validate()?;

    let filename = session.metadata().export_filename();
    let annotated = session.recompute(&annotator)?;

    let out = match args.out {
        Some(path) => path,
        None => config
            .export
            .output_dir
            .clone()
            .unwrap_or_default()
            .join(&filename),
    };

    tokio::fs::write(&out, &annotated.bytes).await?;
    println!(
        "Saved {} ({}x{}, {} bytes, JPEG quality {})",
        out.display(),
        annotated.width,
        annotated.height,
        annotated.bytes.len(),
        annotator.quality()
    );

    if let Some(credential) = credential {
        let client = UploadClient::new(config.upload.endpoint.clone(), config.upload.folder.clone());
        let uploaded = client
            .upload(annotated.bytes.clone(), &filename, &credential)
            .await?;
        println!("Image synced to Dropbox: {}", uploaded.name);
    }

    Ok(())
}
