#![allow(dead_code)]
//! Shared test doubles: a scripted CT log and a capturing output.

use async_trait::async_trait;
use heimdall::core::{LogClient, LogDescriptor, RawLeaf};
use heimdall::network::NetworkError;
use heimdall::outputs::Output;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory CT log that records every API call it serves.
pub struct MockLog {
    tree_size: AtomicU64,
    sth_fails: AtomicBool,
    fetch_fails: AtomicBool,
    entries: Mutex<Vec<RawLeaf>>,
    /// Server-side cap on entries per response; models short reads.
    max_batch: usize,
    sth_calls: AtomicU64,
    fetches: Mutex<Vec<(u64, u64)>>,
}

impl MockLog {
    /// A log holding `tree_size` dummy leaves, serving at most `max_batch`
    /// entries per response.
    pub fn new(tree_size: u64, max_batch: usize) -> Arc<Self> {
        let entries = (0..tree_size).map(|k| vec![k as u8; 4]).collect();
        Arc::new(Self {
            tree_size: AtomicU64::new(tree_size),
            sth_fails: AtomicBool::new(false),
            fetch_fails: AtomicBool::new(false),
            entries: Mutex::new(entries),
            max_batch,
            sth_calls: AtomicU64::new(0),
            fetches: Mutex::new(Vec::new()),
        })
    }

    /// Makes every subsequent `raw_entries` call fail (or succeed again).
    pub fn set_fetch_failure(&self, failing: bool) {
        self.fetch_fails.store(failing, Ordering::SeqCst);
    }

    /// A log whose STH endpoint always errors.
    pub fn failing_sth() -> Arc<Self> {
        let log = Self::new(0, 1);
        log.sth_fails.store(true, Ordering::SeqCst);
        log
    }

    pub fn sth_calls(&self) -> u64 {
        self.sth_calls.load(Ordering::SeqCst)
    }

    /// Every `(start, end)` window requested so far, in order.
    pub fn fetches(&self) -> Vec<(u64, u64)> {
        self.fetches.lock().unwrap().clone()
    }
}

/// Builds a descriptor whose client is the given mock.
pub fn mock_descriptor(log: &Arc<MockLog>, name: &str) -> LogDescriptor {
    LogDescriptor {
        id: format!("mock-{name}"),
        name: name.to_string(),
        uri: format!("https://{}.invalid/", name.replace(' ', "-").to_lowercase()),
        client: log.clone(),
    }
}

#[async_trait]
impl LogClient for MockLog {
    async fn tree_size(&self) -> Result<u64, NetworkError> {
        self.sth_calls.fetch_add(1, Ordering::SeqCst);
        if self.sth_fails.load(Ordering::SeqCst) {
            return Err(NetworkError::Decode("mock STH failure".to_string()));
        }
        Ok(self.tree_size.load(Ordering::SeqCst))
    }

    async fn raw_entries(&self, start: u64, end: u64) -> Result<Vec<RawLeaf>, NetworkError> {
        self.fetches.lock().unwrap().push((start, end));
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(NetworkError::Decode("mock fetch failure".to_string()));
        }
        let log = self.entries.lock().unwrap();
        let end = end.min(log.len() as u64);
        if start >= end {
            return Ok(Vec::new());
        }
        let capped = ((start as usize) + self.max_batch).min(end as usize);
        Ok(log[start as usize..capped].to_vec())
    }
}

/// Captures pipeline output lines for inspection.
#[derive(Default)]
pub struct CaptureOutput {
    lines: Mutex<Vec<String>>,
}

impl CaptureOutput {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl Output for CaptureOutput {
    async fn write_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// Lets spawned tasks run up to their next suspension point without
/// advancing the paused clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
