#![forbid(unsafe_code)]

//! Audio retrieval through the cobalt conversion API.
//!
//! Two-step exchange: a JSON POST asks the conversion endpoint for a direct
//! audio URL, then the bytes at that URL are streamed straight to disk. The
//! conversion call carries an overall request timeout; the byte transfer
//! only gets connect/read timeouts because a full-file cap would break
//! large downloads.

use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("conversion request failed: {0}")]
    Transport(#[from] ureq::Error),
    #[error("conversion API returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("downloaded file is empty")]
    EmptyFile,
    #[error("writing audio to disk failed: {0}")]
    Io(#[from] io::Error),
}

/// Seam between the orchestrator and the network so retry logic can be
/// tested with stub fetchers.
pub trait AudioFetcher {
    /// Downloads the audio track for `video_id` into `dest`, returning the
    /// byte size written. Implementations must not leave a file behind on
    /// success paths only; partial files on failure are cleaned up by the
    /// caller.
    fn fetch(&self, video_id: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Reply shape of the conversion endpoint. Everything defaulted; the API is
/// third-party and we only presence-check what we use.
#[derive(Debug, Deserialize)]
struct ConversionReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    url: Option<String>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

pub struct CobaltFetcher {
    agent: ureq::Agent,
    api_base: String,
}

impl CobaltFetcher {
    /// `api_base` is either the direct conversion endpoint or its
    /// CORS-proxy-wrapped form; the exchange is identical for both.
    pub fn new(api_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(REQUEST_TIMEOUT)
            .timeout_read(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            api_base: api_base.into(),
        }
    }

    fn resolve_audio_url(&self, video_id: &str) -> Result<String, FetchError> {
        let response = self
            .agent
            .post(&format!("{}/", self.api_base.trim_end_matches('/')))
            .timeout(REQUEST_TIMEOUT)
            .set("Accept", "application/json")
            .send_json(json!({
                "url": watch_url(video_id),
                "audioFormat": "mp3",
                "downloadMode": "audio",
            }))?;

        let reply: ConversionReply = response
            .into_json()
            .map_err(|err| FetchError::InvalidResponse(format!("unparseable body: {err}")))?;

        let ConversionReply { status, url } = reply;
        match (status.as_str(), url) {
            ("redirect" | "tunnel", Some(url)) if !url.is_empty() => Ok(url),
            (status, _) => Err(FetchError::InvalidResponse(format!(
                "status {status:?} without usable url"
            ))),
        }
    }

    fn transfer(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.agent.get(url).call()?;
        let mut reader = response.into_reader();
        let mut file = File::create(dest)?;
        io::copy(&mut reader, &mut file)?;
        file.sync_all()?;

        // Re-check on disk rather than trusting the copy count.
        let size = dest.metadata()?.len();
        if size == 0 {
            return Err(FetchError::EmptyFile);
        }
        Ok(size)
    }
}

impl AudioFetcher for CobaltFetcher {
    fn fetch(&self, video_id: &str, dest: &Path) -> Result<u64, FetchError> {
        let audio_url = self.resolve_audio_url(video_id)?;
        self.transfer(&audio_url, dest)
    }
}
