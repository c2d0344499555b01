use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, Log, Metadata, Record};

use tubecast::auth::paths::{account_dir, auth_root};
use tubecast::config::{CLIENT_SECRETS_FILE, DEFAULT_CATEGORY_ID, DEFAULT_VIDEO_MIMETYPE};
use tubecast::media::guess_image_mimetype;
use tubecast::{AuthPaths, ChunkSize, UploadConfig, Uploader, UploaderSettings, Visibility};

/// tubecast: upload videos to YouTube with resumable transfers and scheduled publishing.
#[derive(Parser)]
#[command(name = "tubecast", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct AccountArgs {
    /// Account name; auth files live under $TUBECAST_HOME/<account>
    #[arg(short, long)]
    account: Option<String>,

    /// Explicit directory holding client_secrets.json and token.json
    #[arg(long)]
    auth_dir: Option<PathBuf>,
}

impl AccountArgs {
    fn dir(&self) -> PathBuf {
        match (&self.auth_dir, &self.account) {
            (Some(dir), _) => dir.clone(),
            (None, Some(account)) => account_dir(account),
            (None, None) => auth_root(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the auth directory and explain where to put client_secrets.json
    Init {
        #[command(flatten)]
        account: AccountArgs,
    },

    /// Upload a video
    Upload {
        #[command(flatten)]
        account: AccountArgs,

        /// Video file to upload
        #[arg(short, long)]
        video: PathBuf,

        /// Video MIME type
        #[arg(long, default_value = DEFAULT_VIDEO_MIMETYPE)]
        mimetype: String,

        /// Video title
        #[arg(short, long)]
        title: String,

        /// Video description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Category id
        #[arg(long, default_value = DEFAULT_CATEGORY_ID)]
        category: String,

        /// Declare the video as made for kids
        #[arg(long)]
        made_for_kids: bool,

        /// public, private or unlisted
        #[arg(long, default_value = "private")]
        privacy: String,

        /// Scheduled publish time with UTC offset, e.g. 2025-10-20T02:30:00+09:00
        #[arg(long)]
        publish_at: Option<String>,

        /// Thumbnail image
        #[arg(long)]
        thumbnail: Option<PathBuf>,

        /// Thumbnail MIME type (guessed from .jpg/.jpeg/.png when omitted)
        #[arg(long)]
        thumbnail_mimetype: Option<String>,

        /// Bytes per chunk; 0 or -1 sends the whole file at once
        #[arg(long, allow_hyphen_values = true)]
        chunk_size: Option<ChunkSize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Clears the progress bar around every log line so the two never interleave.
struct BarLogger {
    inner: env_logger::Logger,
    bar: ProgressBar,
}

impl Log for BarLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.inner.matches(record) {
            self.bar.suspend(|| self.inner.log(record));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn init_logging(bar: &ProgressBar) -> Result<()> {
    let inner =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let level = inner.filter();
    log::set_boxed_logger(Box::new(BarLogger {
        inner,
        bar: bar.clone(),
    }))
    .map_err(|e| anyhow!("cannot install logger: {e}"))?;
    log::set_max_level(level);
    Ok(())
}

fn main() -> Result<()> {
    // Hidden until an upload starts
    let progress = ProgressBar::hidden();
    init_logging(&progress)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { account } => init(&account.dir())?,

        Commands::Upload {
            account,
            video,
            mimetype,
            title,
            description,
            tags,
            category,
            made_for_kids,
            privacy,
            publish_at,
            thumbnail,
            thumbnail_mimetype,
            chunk_size,
            timeout,
        } => {
            let mut builder = UploadConfig::builder(title)
                .video_file(video, Some(mimetype.as_str()))
                .description(description)
                .tags(tags)
                .category_id(category)
                .made_for_kids(made_for_kids)
                .visibility(privacy.parse::<Visibility>()?);
            if let Some(at) = publish_at {
                builder = builder.publish_at_str(at);
            }
            if let Some(path) = thumbnail {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("cannot read thumbnail {}", path.display()))?;
                builder = builder.thumbnail_bytes(bytes);
                let mimetype = thumbnail_mimetype
                    .or_else(|| guess_image_mimetype(&path).map(str::to_string));
                if let Some(mimetype) = mimetype {
                    builder = builder.thumbnail_mimetype(mimetype);
                }
            }
            let config = builder.build()?;

            let settings = UploaderSettings {
                chunk_size: chunk_size.unwrap_or_default(),
                timeout: timeout.map(Duration::from_secs),
                ..Default::default()
            };

            let paths = AuthPaths::resolve(account.dir())?;
            let mut uploader = Uploader::for_youtube(paths, settings);
            uploader.connect()?;

            progress.set_length(100);
            progress.set_draw_target(ProgressDrawTarget::stderr());
            progress.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% ({eta})")?
                    .progress_chars("##-"),
            );
            let mut report = |fraction: f64| progress.set_position((fraction * 100.0) as u64);

            let result = uploader.upload(&config, Some(&mut report), None);
            progress.finish_and_clear();
            let result = result?;

            info!("video id: {}", result.id);
            println!("{}", result.watch_url());
        }
    }

    Ok(())
}

fn init(dir: &std::path::Path) -> Result<()> {
    let secrets = dir.join(CLIENT_SECRETS_FILE);
    if secrets.is_file() {
        println!("Client secrets already in place: {}", secrets.display());
        return Ok(());
    }
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    println!("Created auth directory: {}", dir.display());
    println!("Download the OAuth client secrets for your project from the Google API console");
    println!("and save them as: {}", secrets.display());
    println!("Then run the upload command again.");
    Ok(())
}
