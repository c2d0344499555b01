//! Connection state and the upload session: metadata, resumable transfer,
//! progress reporting, and the best-effort thumbnail follow-up.

pub mod metadata;

use log::{error, info, warn};
use serde_json::Value;

use crate::api::{ChunkStatus, ServiceConnector, VideoService, YoutubeConnector};
use crate::auth::{AuthPaths, Credential, CredentialManager, LoopbackFlow, OAuthRefresher};
use crate::config::{ChunkSize, UploaderSettings};
use crate::error::UploaderError;
use crate::media::Media;
use crate::models::{UploadConfig, UploadResult};
use metadata::VideoMetadata;

enum Connection {
    Unconnected,
    Connected {
        credential: Credential,
        service: Box<dyn VideoService>,
    },
}

/// Uploads videos on behalf of one account.
///
/// Call [`connect`](Uploader::connect) once, then [`upload`](Uploader::upload)
/// as often as needed. Uploads are not coordinated with each other; callers
/// sharing an `Uploader` across threads must serialize them.
pub struct Uploader {
    credentials: CredentialManager,
    connector: Box<dyn ServiceConnector>,
    settings: UploaderSettings,
    connection: Connection,
}

impl Uploader {
    pub fn new(
        credentials: CredentialManager,
        connector: Box<dyn ServiceConnector>,
        settings: UploaderSettings,
    ) -> Self {
        Self {
            credentials,
            connector,
            settings,
            connection: Connection::Unconnected,
        }
    }

    /// Wire up the browser flow, token refresh and the YouTube API client.
    pub fn for_youtube(paths: AuthPaths, settings: UploaderSettings) -> Self {
        let flow = LoopbackFlow::new(settings.redirect_port);
        let credentials = CredentialManager::new(paths, Box::new(flow), Box::new(OAuthRefresher));
        let connector = YoutubeConnector::new(settings.clone());
        Self::new(credentials, Box::new(connector), settings)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected { .. })
    }

    /// Obtain a credential and build the service handle. Once connected,
    /// further calls return immediately without touching disk or network.
    pub fn connect(&mut self) -> Result<&Credential, UploaderError> {
        if let Connection::Unconnected = self.connection {
            let credential = self.credentials.acquire()?;
            let service = self
                .connector
                .connect(&credential)
                .map_err(|e| UploaderError::auth_with("service construction failed", e))?;
            info!("connected to the YouTube API");
            self.connection = Connection::Connected {
                credential,
                service,
            };
        }
        match &self.connection {
            Connection::Connected { credential, .. } => Ok(credential),
            Connection::Unconnected => Err(UploaderError::auth("not connected")),
        }
    }

    /// Upload one video and, if configured, its thumbnail.
    ///
    /// `progress` receives fractions in `[0.0, 1.0]`; without it progress is
    /// logged as a whole percentage. `chunk_size` overrides the configured one.
    /// A thumbnail failure never fails the upload.
    pub fn upload(
        &self,
        config: &UploadConfig,
        mut progress: Option<&mut dyn FnMut(f64)>,
        chunk_size: Option<ChunkSize>,
    ) -> Result<UploadResult, UploaderError> {
        let service = match &self.connection {
            Connection::Connected { service, .. } => service.as_ref(),
            Connection::Unconnected => return Err(UploaderError::auth("not connected")),
        };

        // The file may have vanished since the config was built
        config.video().ensure_available()?;

        let chunk_size = chunk_size.unwrap_or(self.settings.chunk_size);
        info!(
            "uploading '{}' from {} (chunk size: {chunk_size})",
            config.title(),
            config.video().describe()
        );
        let meta = VideoMetadata::from_config(config)
            .map_err(|e| UploaderError::upload_with("cannot build video metadata", e))?;

        let mut session = service
            .create_upload_session(&meta.parts, &meta.body, config.video(), chunk_size)
            .map_err(|e| UploaderError::upload_with("cannot open upload session", e))?;

        let response = loop {
            let status = session
                .next_chunk()
                .map_err(|e| UploaderError::upload_with("chunk transfer failed", e))?;
            match status {
                ChunkStatus::Progress(fraction) => {
                    let fraction = fraction.clamp(0.0, 1.0);
                    match progress.as_deref_mut() {
                        Some(callback) => callback(fraction),
                        None => info!("upload progress: {}%", (fraction * 100.0) as u32),
                    }
                }
                ChunkStatus::Complete(response) => break response,
            }
        };

        let result = into_result(response)?;
        info!("upload complete: {}", result.watch_url());

        attach_thumbnail(service, &result.id, config.thumbnail());
        Ok(result)
    }
}

fn into_result(response: Value) -> Result<UploadResult, UploaderError> {
    let id = response
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    match id {
        Some(id) => Ok(UploadResult { id, response }),
        None => {
            error!("upload finished but the response carries no video id: {response}");
            Err(UploaderError::upload("response missing identifier"))
        }
    }
}

/// Best effort: every failure is logged and swallowed.
fn attach_thumbnail(service: &dyn VideoService, video_id: &str, thumbnail: Option<&Media>) {
    let Some(image) = thumbnail else {
        return;
    };
    match service.set_thumbnail(video_id, image) {
        Ok(()) => info!("thumbnail set for {video_id}"),
        Err(e) if e.is_permission_denied() => error!(
            "thumbnail for {video_id} was refused ({e}). The channel most likely has not \
             completed phone verification, which custom thumbnails require. The video itself \
             was uploaded."
        ),
        Err(e) => warn!("could not set thumbnail for {video_id}: {e}. The video itself was uploaded."),
    }
}
