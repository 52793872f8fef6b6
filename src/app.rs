//! The main application logic, decoupled from the entry point.
//!
//! Owns the epoch loop: each epoch gets a fresh task channel and a fresh
//! cancellation signal, so a restart discards anything the previous epoch
//! had queued. The seen set, root set, log directory, notifier, and watcher
//! live on the process and survive restarts.

use crate::{
    config::Config,
    core::{EntryBatch, LogDescriptor},
    notification::Notifier,
    outputs::{Output, StdoutOutput},
    pipeline::Pipeline,
    poller::{self, PollerSettings},
    roots::RootSet,
    seen::SeenSet,
    sources, watcher, worker,
};
use anyhow::{Context, Result};
use futures::future::join_all;
use log::{error, info};
use std::fs;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Runs the monitor until the external shutdown signal fires or every task
/// finishes on its own. The overrides exist for tests.
pub async fn run(
    config: Config,
    mut shutdown_rx: watch::Receiver<()>,
    descriptors_override: Option<Vec<LogDescriptor>>,
    output_override: Option<Arc<dyn Output>>,
) -> Result<()> {
    config.validate()?;

    let roots = Arc::new(RootSet::new());
    if let Some(path) = &config.roots.file {
        let count = roots
            .load(path)
            .with_context(|| format!("failed to load root domains from {}", path.display()))?;
        info!("[*] Loaded {} root domains", count);
    }

    let seen = Arc::new(SeenSet::new());
    if let Some(dir) = &config.output.dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        let hydrated = seen
            .hydrate(dir)
            .context("failed to hydrate existing results")?;
        if hydrated > 0 {
            info!("[*] Hydrated {} existing domains from {}", hydrated, dir.display());
        }
    }

    let descriptors = match descriptors_override {
        Some(descriptors) => descriptors,
        None => sources::fetch_log_list(&config.polling.log_list_url)
            .await
            .context("failed to populate CT logs")?,
    };
    anyhow::ensure!(!descriptors.is_empty(), "the CT log list is empty");
    info!("[*] Initializing {} CT logs", descriptors.len());

    let notifier = config
        .notify
        .discord_webhook
        .clone()
        .map(|url| Arc::new(Notifier::new(url)));
    if notifier.is_some() {
        info!("[+] Discord notifications enabled");
    }

    let output: Arc<dyn Output> = output_override.unwrap_or_else(|| Arc::new(StdoutOutput));

    // The sender stays alive here so an unused restart channel never reads
    // as closed.
    let (restart_tx, mut restart_rx) = mpsc::channel::<()>(1);
    let mut watcher_task = None;
    if config.roots.watch {
        if let Some(path) = config.roots.file.clone() {
            watcher_task = Some(watcher::spawn(
                path,
                roots.clone(),
                restart_tx.clone(),
                shutdown_rx.clone(),
            )?);
        }
    }

    loop {
        let pipeline = Arc::new(Pipeline::new(
            roots.clone(),
            seen.clone(),
            config.json,
            config.output.dir.clone(),
            output.clone(),
            notifier.clone(),
        ));
        let (epoch_tx, epoch_rx) = watch::channel(());
        let handles = start_epoch(&config, &descriptors, pipeline, epoch_rx);
        let mut epoch_done = join_all(handles);

        let outcome = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => EpochOutcome::Shutdown,
            Some(_) = restart_rx.recv() => EpochOutcome::Restart,
            _ = &mut epoch_done => EpochOutcome::Completed,
        };

        match outcome {
            EpochOutcome::Shutdown => {
                info!("[*] Shutting down...");
                let _ = epoch_tx.send(());
                epoch_done.await;
                break;
            }
            EpochOutcome::Restart => {
                info!("[*] Root domain file updated. Restarting scan...");
                let _ = epoch_tx.send(());
                epoch_done.await;
                if let Some(path) = &config.roots.file {
                    if let Err(e) = roots.load(path) {
                        error!("error reloading root domains: {}", e);
                    }
                }
            }
            EpochOutcome::Completed => break,
        }
    }

    if let Some(task) = watcher_task {
        task.abort();
        let _ = task.await;
    }
    info!("[*] All tasks shut down");
    Ok(())
}

enum EpochOutcome {
    Shutdown,
    Restart,
    Completed,
}

/// Spawns one epoch's worth of workers and pollers over a fresh bounded
/// channel. The channel's only senders are the pollers, so once they exit
/// the workers drain whatever is left of the current epoch and stop.
fn start_epoch(
    config: &Config,
    descriptors: &[LogDescriptor],
    pipeline: Arc<Pipeline>,
    epoch_rx: watch::Receiver<()>,
) -> Vec<JoinHandle<()>> {
    let capacity = (descriptors.len() * config.polling.queue_per_log).max(1);
    let (tx, rx) = mpsc::channel::<EntryBatch>(capacity);

    let worker_count = config.polling.workers.unwrap_or(descriptors.len()).max(1);
    let mut handles = worker::spawn_workers(worker_count, rx, pipeline, epoch_rx.clone());

    let settings = PollerSettings {
        debug: config.debug,
        backfill: config.polling.backfill,
    };
    for descriptor in descriptors {
        handles.push(tokio::spawn(poller::poll_log(
            descriptor.clone(),
            tx.clone(),
            epoch_rx.clone(),
            settings,
        )));
    }
    handles
}
