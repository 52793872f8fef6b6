//! Root-file watcher
//!
//! Observes the root-domain file, reloads the filter set on change, and
//! pulses the supervisor's capacity-1 restart channel. Extra pulses
//! coalesce by being dropped. Rename and remove events re-arm the watch on
//! the original path so atomic-rename editors keep working.

use crate::roots::RootSet;
use anyhow::{Context, Result};
use log::{error, info, warn};
use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Starts watching `path`. The returned task runs until the shutdown
/// signal fires; the filesystem watch lives inside it.
pub fn spawn(
    path: PathBuf,
    roots: Arc<RootSet>,
    restart_tx: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<()>,
) -> Result<JoinHandle<()>> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(
        move |event: std::result::Result<notify::Event, notify::Error>| {
            let _ = event_tx.send(event);
        },
    )
    .context("failed to initialize watcher")?;
    watcher
        .watch(&path, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", path.display()))?;

    let handle = tokio::spawn(async move {
        // Keeps the watcher alive for the lifetime of the task.
        let mut watcher = watcher;
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("watcher error: {}", e);
                    continue;
                }
            };

            // Atomic-rename editors unlink the watched inode; re-arm on the
            // path and treat the replacement as a change.
            let rearmed = matches!(
                event.kind,
                EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
            );
            if rearmed {
                let _ = watcher.unwatch(&path);
                if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                    warn!("failed to re-arm watch on {}: {}", path.display(), e);
                }
            }

            let changed = match event.kind {
                EventKind::Create(_) => true,
                EventKind::Modify(ModifyKind::Metadata(_)) => false,
                EventKind::Modify(_) => true,
                _ => rearmed,
            };
            if !changed {
                continue;
            }

            match roots.load(&path) {
                Ok(count) => info!("[*] Reloaded {} root domains", count),
                Err(e) => {
                    error!("error reloading root domains: {}", e);
                    continue;
                }
            }
            let _ = restart_tx.try_send(());
        }
    });
    Ok(handle)
}
