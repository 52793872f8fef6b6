//! Per-log poller
//!
//! One poller task per CT log. Each poller owns a cursor `[start, end)`
//! into its log, advances it at the operator's rate budget, and hands raw
//! entry batches to the shared worker channel. Fetch errors cost at most
//! the current tick; only cancellation or a closed channel ends the loop.

use crate::core::{EntryBatch, LogDescriptor};
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Operator-substring rate budget. First match wins; order matters.
const RATE_TABLE: &[(&str, Duration)] = &[
    ("Google", Duration::from_millis(1)),
    ("Sectigo", Duration::from_secs(4)),
    ("Let's Encrypt", Duration::from_secs(1)),
    ("DigiCert", Duration::from_secs(1)),
    ("TrustAsia", Duration::from_secs(1)),
    ("Cloudflare", Duration::from_secs(1)),
];

const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Google front-ends cap a single response at 32 entries and short-read
/// silently; those logs are drained in sub-fetches within one tick.
const GOOGLE_PAGE: u64 = 32;

const STH_INIT_ATTEMPTS: u32 = 3;
const STH_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Lag above which the debug diagnostic fires after a tree-size refresh.
const BEHIND_THRESHOLD: u64 = 25;

/// Poller knobs shared by every log.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    /// Emit "falling behind" diagnostics.
    pub debug: bool,
    /// How far behind the tip the cursor starts.
    pub backfill: u64,
}

/// Resolves the tick interval for a log by operator substring.
pub fn tick_interval(name: &str) -> Duration {
    for &(needle, tick) in RATE_TABLE {
        if name.contains(needle) {
            return tick;
        }
    }
    DEFAULT_TICK
}

/// Polls one log until cancellation. Produces `EntryBatch` values on `tx`;
/// exits silently if the log never yields an initial tree size.
pub async fn poll_log(
    log: LogDescriptor,
    tx: mpsc::Sender<EntryBatch>,
    mut shutdown: watch::Receiver<()>,
    settings: PollerSettings,
) {
    let tick = tick_interval(&log.name);
    let is_google = log.name.contains("Google");

    let mut end: u64 = 0;
    let mut primed = false;
    for attempt in 1..=STH_INIT_ATTEMPTS {
        match log.client.tree_size().await {
            Ok(size) => {
                end = size;
                primed = true;
                break;
            }
            Err(e) => {
                debug!(
                    "attempt {}: failed to get STH for {}: {}",
                    attempt, log.uri, e
                );
                metrics::counter!("heimdall_fetch_errors").increment(1);
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    _ = tokio::time::sleep(STH_RETRY_DELAY) => {}
                }
            }
        }
    }
    if !primed {
        debug!(
            "giving up on {} after {} STH attempts",
            log.name, STH_INIT_ATTEMPTS
        );
        return;
    }

    let mut start = end.saturating_sub(settings.backfill);

    let mut ticker = interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }

        if start >= end {
            match log.client.tree_size().await {
                Ok(size) => end = size,
                Err(e) => {
                    debug!("failed to update STH for {}: {}", log.name, e);
                    metrics::counter!("heimdall_fetch_errors").increment(1);
                    continue;
                }
            }
            if settings.debug && end.saturating_sub(start) > BEHIND_THRESHOLD {
                warn!("{} is behind by {} entries", log.name, end - start);
            }
            continue;
        }

        if is_google {
            while start < end {
                let page_end = (start + GOOGLE_PAGE).min(end);
                let entries = match log.client.raw_entries(start, page_end).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!("error fetching entries for {}: {}", log.name, e);
                        metrics::counter!("heimdall_fetch_errors").increment(1);
                        break;
                    }
                };
                if entries.is_empty() {
                    break;
                }
                let fetched = entries.len() as u64;
                if !push_batch(&tx, EntryBatch { entries, base_index: start }, &mut shutdown).await
                {
                    return;
                }
                start += fetched;
            }
            continue;
        }

        let entries = match log.client.raw_entries(start, end).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("error fetching entries for {}: {}", log.name, e);
                metrics::counter!("heimdall_fetch_errors").increment(1);
                continue;
            }
        };
        if !entries.is_empty() {
            let fetched = entries.len() as u64;
            if !push_batch(&tx, EntryBatch { entries, base_index: start }, &mut shutdown).await {
                return;
            }
            start += fetched;
        }
    }
}

/// Blocking send raced against cancellation. Returns `false` when the
/// poller should exit (cancelled, or the worker side is gone).
async fn push_batch(
    tx: &mpsc::Sender<EntryBatch>,
    batch: EntryBatch,
    shutdown: &mut watch::Receiver<()>,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.changed() => false,
        result = tx.send(batch) => result.is_ok(),
    }
}
