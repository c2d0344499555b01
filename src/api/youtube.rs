use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{
    HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE,
};
use reqwest::redirect::Policy;
use serde::Deserialize;

use super::{ChunkStatus, ResumableUpload, ServiceConnector, ServiceError, VideoService};
use crate::auth::Credential;
use crate::config::{ChunkSize, UploaderSettings, CHUNK_GRANULARITY};
use crate::media::Media;

const RESUME_INCOMPLETE: u16 = 308;

/// YouTube Data API v3 over blocking HTTP, bearer token attached to every request.
pub struct YoutubeApi {
    client: Client,
    upload_base: String,
}

impl YoutubeApi {
    pub fn new(credential: &Credential, settings: &UploaderSettings) -> Result<Self> {
        if credential.token.is_empty() {
            bail!("credential has no access token");
        }
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", credential.token))
            .context("access token is not a valid header value")?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        // 308 means "resume incomplete" here, never a redirect to follow
        let client = Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            upload_base: settings.upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// Start a resumable session and return its session URI.
    fn initiate(&self, request: RequestBuilder, media: &Media) -> Result<String, ServiceError> {
        let total = media.len()?;
        let res = request
            .header("X-Upload-Content-Type", media.mimetype())
            .header("X-Upload-Content-Length", total.to_string())
            .send()?;
        let res = check(res)?;
        res.headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Protocol("no upload session URI in response".to_string()))
    }

    fn open_session<'a>(
        &'a self,
        session_uri: String,
        media: &'a Media,
        chunk_size: ChunkSize,
    ) -> Result<ResumableSession<'a>, ServiceError> {
        Ok(ResumableSession {
            client: &self.client,
            session_uri,
            total: media.len()?,
            media,
            offset: 0,
            chunk_size: align_chunk_size(chunk_size),
        })
    }
}

impl VideoService for YoutubeApi {
    fn create_upload_session<'a>(
        &'a self,
        parts: &str,
        body: &serde_json::Value,
        media: &'a Media,
        chunk_size: ChunkSize,
    ) -> Result<Box<dyn ResumableUpload + 'a>, ServiceError> {
        let request = self
            .client
            .post(format!("{}/videos", self.upload_base))
            .query(&[("uploadType", "resumable"), ("part", parts)])
            .json(body);
        let session_uri = self.initiate(request, media)?;
        debug!("upload session opened: {session_uri}");
        Ok(Box::new(self.open_session(session_uri, media, chunk_size)?))
    }

    fn set_thumbnail(&self, video_id: &str, image: &Media) -> Result<(), ServiceError> {
        let request = self
            .client
            .post(format!("{}/thumbnails/set", self.upload_base))
            .query(&[("videoId", video_id), ("uploadType", "resumable")])
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .body("{}");
        let session_uri = self.initiate(request, image)?;
        let mut session = self.open_session(session_uri, image, ChunkSize::Whole)?;
        loop {
            if let ChunkStatus::Complete(_) = session.next_chunk()? {
                return Ok(());
            }
        }
    }
}

/// Non-final chunks must be a multiple of the server's granularity.
fn align_chunk_size(chunk_size: ChunkSize) -> ChunkSize {
    match chunk_size {
        ChunkSize::Bytes(n) if n > CHUNK_GRANULARITY => {
            ChunkSize::Bytes(n - n % CHUNK_GRANULARITY)
        }
        ChunkSize::Bytes(n) if n < CHUNK_GRANULARITY => ChunkSize::Bytes(CHUNK_GRANULARITY),
        other => other,
    }
}

struct ResumableSession<'a> {
    client: &'a Client,
    session_uri: String,
    media: &'a Media,
    total: u64,
    offset: u64,
    chunk_size: ChunkSize,
}

impl ResumableUpload for ResumableSession<'_> {
    fn next_chunk(&mut self) -> Result<ChunkStatus, ServiceError> {
        let len = self.chunk_size.next_len(self.total - self.offset);
        let chunk = self.media.chunk(self.offset, len)?;
        let sent = chunk.len();
        let content_range = if sent == 0 {
            format!("bytes */{}", self.total)
        } else {
            format!("bytes {}-{}/{}", self.offset, self.offset + sent - 1, self.total)
        };

        debug!("sending {content_range}");
        let res = self
            .client
            .put(&self.session_uri)
            .header(CONTENT_TYPE, self.media.mimetype())
            .header(CONTENT_RANGE, content_range)
            .body(Body::sized(chunk, sent))
            .send()?;

        if res.status().as_u16() == RESUME_INCOMPLETE {
            let acknowledged = res
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_end)
                .map_or(0, |end| end + 1);
            if sent > 0 && acknowledged <= self.offset {
                return Err(ServiceError::Protocol(format!(
                    "server acknowledged no new bytes past offset {}",
                    self.offset
                )));
            }
            self.offset = acknowledged.min(self.total);
            return Ok(ChunkStatus::Progress(fraction(self.offset, self.total)));
        }

        let res = check(res)?;
        let text = res.text()?;
        Ok(ChunkStatus::Complete(serde_json::from_str(&text)?))
    }
}

/// `bytes=0-1048575` → `1048575`
fn parse_range_end(range: &str) -> Option<u64> {
    let (_, end) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse().ok()
}

fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0)
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-2xx response into [`ServiceError::Http`], preferring the
/// API's own error message over the raw body.
fn check(res: Response) -> Result<Response, ServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error.message)
        .unwrap_or(text);
    Err(ServiceError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Connects to the real API with the settings it was built with.
pub struct YoutubeConnector {
    settings: UploaderSettings,
}

impl YoutubeConnector {
    pub fn new(settings: UploaderSettings) -> Self {
        Self { settings }
    }
}

impl ServiceConnector for YoutubeConnector {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn VideoService>> {
        Ok(Box::new(YoutubeApi::new(credential, &self.settings)?))
    }
}
