//! Entry worker pool
//!
//! Workers drain the shared batch channel, decode each leaf, and feed the
//! asserted names through the emission pipeline. Decode failures are logged
//! and skipped; they never kill a worker.

use crate::core::EntryBatch;
use crate::parser;
use crate::pipeline::Pipeline;
use log::debug;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Spawns `count` workers sharing one receiver. Workers exit on
/// cancellation or when every producer has dropped its sender.
pub fn spawn_workers(
    count: usize,
    rx: mpsc::Receiver<EntryBatch>,
    pipeline: Arc<Pipeline>,
    shutdown: watch::Receiver<()>,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    (0..count)
        .map(|id| {
            let rx = rx.clone();
            let pipeline = pipeline.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(worker_loop(id, rx, pipeline, shutdown))
        })
        .collect()
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<EntryBatch>>>,
    pipeline: Arc<Pipeline>,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            batch = async { rx.lock().await.recv().await } => batch,
        };
        let batch = match received {
            Some(batch) => batch,
            None => break,
        };
        process_batch(id, &batch, &pipeline).await;
    }
    debug!("worker {} exiting", id);
}

/// Decodes every leaf in a batch and emits its names in leaf order, CN
/// before SANs.
pub async fn process_batch(worker: usize, batch: &EntryBatch, pipeline: &Pipeline) {
    for (k, leaf) in batch.entries.iter().enumerate() {
        let index = batch.base_index + k as u64 + 1;
        match parser::decode_leaf(leaf) {
            Ok(Some(payload)) => {
                metrics::counter!("heimdall_entries_decoded").increment(1);
                for name in payload.summary().asserted_names() {
                    pipeline.emit(name, &payload).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!("worker {}: failed to parse entry {}: {}", worker, index, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::Output;
    use crate::roots::RootSet;
    use crate::seen::SeenSet;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CaptureOutput {
        lines: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Output for CaptureOutput {
        async fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn bare_pipeline(output: Arc<CaptureOutput>) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            Arc::new(RootSet::new()),
            Arc::new(SeenSet::new()),
            false,
            None,
            output,
            None,
        ))
    }

    #[tokio::test]
    async fn garbage_leaves_are_skipped_without_panicking() {
        let output = Arc::new(CaptureOutput::default());
        let pipeline = bare_pipeline(output.clone());
        let batch = EntryBatch {
            entries: vec![vec![0xFF; 40], vec![], vec![0x00; 3]],
            base_index: 10,
        };
        process_batch(0, &batch, &pipeline).await;
        assert!(output.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn workers_drain_and_exit_when_producers_drop() {
        let output = Arc::new(CaptureOutput::default());
        let pipeline = bare_pipeline(output);
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        let handles = spawn_workers(2, rx, pipeline, shutdown_rx);
        tx.send(EntryBatch {
            entries: vec![vec![0u8; 4]],
            base_index: 0,
        })
        .await
        .unwrap();
        drop(tx);

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn workers_exit_on_cancellation() {
        let output = Arc::new(CaptureOutput::default());
        let pipeline = bare_pipeline(output);
        let (_tx, rx) = mpsc::channel::<EntryBatch>(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handles = spawn_workers(2, rx, pipeline, shutdown_rx);
        shutdown_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
