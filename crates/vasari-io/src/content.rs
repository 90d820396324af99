//! Off-thread content fetching from http(s) peers or local directories.

use crate::error::{IoError, Result};
use crate::{drain_ready, wait_all_pending, Completion};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Where a piece of content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Remote(String),
    Local(PathBuf),
}

impl ContentSource {
    /// Join `relative` onto a peer base. Bases with an http(s) scheme are
    /// remote, anything else is a directory on disk.
    pub fn resolve(base: &str, relative: &str) -> Self {
        let lower = base.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ContentSource::Remote(format!("{}/{}", base.trim_end_matches('/'), relative))
        } else {
            ContentSource::Local(PathBuf::from(base).join(relative))
        }
    }
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentSource::Remote(url) => f.write_str(url),
            ContentSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Result emitted once a fetch completes.
#[derive(Debug)]
pub struct ContentResult {
    pub request_id: u64,
    pub source: ContentSource,
    pub body: Result<Vec<u8>>,
}

struct PendingFetch {
    request_id: u64,
    source: ContentSource,
    receiver: Receiver<Result<Vec<u8>>>,
    join: Option<JoinHandle<()>>,
}

impl Completion for PendingFetch {
    type Value = Vec<u8>;
    type Output = ContentResult;

    fn receiver(&self) -> &Receiver<Result<Vec<u8>>> {
        &self.receiver
    }

    fn take_join(&mut self) -> Option<JoinHandle<()>> {
        self.join.take()
    }

    fn finish(self, body: Result<Vec<u8>>) -> ContentResult {
        ContentResult {
            request_id: self.request_id,
            source: self.source,
            body,
        }
    }
}

/// Manages non-blocking content fetches using a worker thread per request.
pub struct ContentService {
    pending: Vec<PendingFetch>,
    default_timeout: Duration,
}

impl Default for ContentService {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentService {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            default_timeout: Duration::from_secs(15),
        }
    }

    /// Set the timeout used for remote requests.
    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    /// Cancel a request by id: drop the pending entry so any eventual result is ignored.
    pub fn cancel(&mut self, request_id: u64) {
        self.pending.retain(|p| p.request_id != request_id);
    }

    pub fn request(&mut self, request_id: u64, source: ContentSource) {
        let (tx, rx) = mpsc::channel();
        let target = source.clone();
        let timeout = self.default_timeout;
        let join = thread::spawn(move || {
            let _ = tx.send(fetch(&target, timeout));
        });
        self.pending.push(PendingFetch {
            request_id,
            source,
            receiver: rx,
            join: Some(join),
        });
    }

    /// Poll for fetch completions, returning all results that are ready.
    pub fn poll(&mut self) -> Vec<ContentResult> {
        drain_ready(&mut self.pending)
    }

    /// Block until every outstanding fetch finishes or `timeout` elapses.
    pub fn wait_all(&mut self, timeout: Duration) -> Vec<ContentResult> {
        wait_all_pending(&mut self.pending, timeout)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Fetch content synchronously.
pub fn fetch(source: &ContentSource, timeout: Duration) -> Result<Vec<u8>> {
    match source {
        ContentSource::Local(path) => std::fs::read(path).map_err(|e| IoError::Read {
            path: path.clone(),
            source: e,
        }),
        ContentSource::Remote(url) => fetch_remote(url, timeout),
    }
}

fn fetch_remote(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let request_error = |err: reqwest::Error| IoError::Request {
        url: url.to_string(),
        reason: err.to_string(),
    };
    let parsed = reqwest::Url::parse(url).map_err(|err| IoError::Request {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(IoError::UnsupportedScheme(url.to_string()));
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent("Vasari/0.1")
        .timeout(timeout)
        .build()
        .map_err(request_error)?;
    let response = client.get(parsed).send().map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(IoError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.bytes().map_err(request_error)?.to_vec())
}
