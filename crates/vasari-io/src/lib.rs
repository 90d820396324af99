//! IO services for loading content and decoding images off the event loop.
//!
//! Every service spawns a worker thread per request and hands results back
//! through an `mpsc` channel. Callers drive completion with `poll()`, so the
//! runtime thread never blocks.

mod content;
mod decode;
mod error;
mod media;

pub use content::{fetch, ContentResult, ContentService, ContentSource};
pub use decode::{decode_source, DecodeResult, DecodedImage, ImageDecodeService};
pub use error::{IoError, Result, SniffError};
pub use media::{decode_data_uri, is_data_uri, sniff, to_data_uri, DataUri, MediaKind};

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A request in flight on a worker thread.
trait Completion {
    type Value;
    type Output;

    fn receiver(&self) -> &Receiver<Result<Self::Value>>;
    fn take_join(&mut self) -> Option<JoinHandle<()>>;
    fn finish(self, value: Result<Self::Value>) -> Self::Output;
}

/// Collect finished requests, keeping the rest pending.
fn drain_ready<P: Completion>(pending: &mut Vec<P>) -> Vec<P::Output> {
    let mut ready = Vec::new();
    let mut still = Vec::new();
    for mut request in pending.drain(..) {
        match request.receiver().try_recv() {
            Ok(value) => {
                if let Some(join) = request.take_join() {
                    let _ = join.join();
                }
                ready.push(request.finish(value));
            }
            Err(TryRecvError::Empty) => still.push(request),
            Err(TryRecvError::Disconnected) => {
                if let Some(join) = request.take_join() {
                    let _ = join.join();
                }
                ready.push(request.finish(Err(IoError::Disconnected)));
            }
        }
    }
    *pending = still;
    ready
}

/// Poll until nothing is pending or `timeout` elapses.
fn wait_all_pending<P: Completion>(pending: &mut Vec<P>, timeout: Duration) -> Vec<P::Output> {
    let deadline = Instant::now() + timeout;
    let mut done = drain_ready(pending);
    while !pending.is_empty() && Instant::now() < deadline {
        std::thread::sleep(WAIT_POLL_INTERVAL);
        done.extend(drain_ready(pending));
    }
    done
}
