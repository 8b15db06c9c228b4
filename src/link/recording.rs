use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::VehicleLink;
use crate::error::{Error, Result};

/// In-memory link for dry runs: every line is recorded and answered with
/// `ok`, optionally after a fixed latency.
#[derive(Debug, Default)]
pub struct RecordingLink {
    sent: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    latency: Duration,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each send takes `latency` before it replies.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Lines starting with `prefix` are recorded but answered with an error.
    pub fn fail_matching(&self, prefix: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prefix.into());
    }

    /// Every line sent so far, in send order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Highest number of sends that were awaiting a reply at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl VehicleLink for RecordingLink {
    async fn send(&self, line: &str) -> Result<String> {
        if self.is_closed() {
            return Err(Error::LinkClosed);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        debug!(command = %line, "dry-run send");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fails = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()));
        if fails {
            Err(Error::Rejected {
                command: line.to_string(),
                reply: "error".to_string(),
            })
        } else {
            Ok("ok".to_string())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
