#![forbid(unsafe_code)]

//! Channel listing client. One request, first page only; the listing API
//! does not paginate for the channel sizes this tool mirrors.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ListError {
    #[error("listing request failed: {0}")]
    Transport(#[from] ureq::Error),
    #[error("listing response was not the expected JSON: {0}")]
    Malformed(#[from] std::io::Error),
    #[error("channel returned no videos")]
    Empty,
}

/// One entry from the listing endpoint. Only the fields we need; the API
/// sends more but nothing else is load-bearing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct ListingReply {
    #[serde(default)]
    videos: Vec<Video>,
}

pub struct ChannelLister {
    agent: ureq::Agent,
    api_base: String,
}

impl ChannelLister {
    pub fn new(api_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            api_base: api_base.into(),
        }
    }

    /// Fetches the video descriptors for a channel. An empty result is an
    /// error because a mirrored channel always has at least one upload; an
    /// empty reply means the listing backend is broken.
    pub fn list(&self, channel_id: &str) -> Result<Vec<Video>, ListError> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), channel_id);
        let response = self.agent.get(&url).call()?;
        let reply: ListingReply = response.into_json()?;
        if reply.videos.is_empty() {
            return Err(ListError::Empty);
        }
        Ok(reply.videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response per accepted connection, in order.
    fn spawn_server(responses: Vec<String>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            for response in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let mut content_length = 0usize;
                let mut line = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    let header = line.trim().to_ascii_lowercase();
                    if header.is_empty() {
                        break;
                    }
                    if let Some(value) = header.strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
                if content_length > 0 {
                    let mut body = vec![0u8; content_length];
                    reader.read_exact(&mut body).ok();
                }
                let mut stream = reader.into_inner();
                stream.write_all(response.as_bytes()).ok();
            }
        });
        (format!("http://{addr}"), handle)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn list_parses_videos() {
        let body = r#"{"videos":[{"id":"abc","title":"T1"},{"id":"def","title":"T2"}]}"#;
        let (base, handle) = spawn_server(vec![http_response("200 OK", body)]);
        let lister = ChannelLister::new(base);
        let videos = lister.list("chan").unwrap();
        handle.join().unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "abc");
        assert_eq!(videos[0].title, "T1");
    }

    #[test]
    fn list_tolerates_missing_title() {
        let body = r#"{"videos":[{"id":"abc"}]}"#;
        let (base, handle) = spawn_server(vec![http_response("200 OK", body)]);
        let videos = ChannelLister::new(base).list("chan").unwrap();
        handle.join().unwrap();
        assert_eq!(videos[0].title, "");
    }

    #[test]
    fn list_empty_reply_is_an_error() {
        let body = r#"{"videos":[]}"#;
        let (base, handle) = spawn_server(vec![http_response("200 OK", body)]);
        let err = ChannelLister::new(base).list("chan").unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ListError::Empty));
    }

    #[test]
    fn list_http_error_is_transport() {
        let (base, handle) = spawn_server(vec![http_response("500 Internal Server Error", "{}")]);
        let err = ChannelLister::new(base).list("chan").unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ListError::Transport(_)));
    }

    #[test]
    fn list_garbage_body_is_malformed() {
        let (base, handle) = spawn_server(vec![http_response("200 OK", "not json")]);
        let err = ChannelLister::new(base).list("chan").unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ListError::Malformed(_)));
    }
}
