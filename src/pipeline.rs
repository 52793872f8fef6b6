//! Emission pipeline
//!
//! Root-filter, dedup, stdout emit, per-root persistence, webhook notify,
//! in that order. The dedup gate is global and process-lifetime; the filter
//! set may be swapped underneath us between emissions.

use crate::core::{CertPayload, CertificateInfo};
use crate::notification::Notifier;
use crate::outputs::Output;
use crate::roots::RootSet;
use crate::seen::SeenSet;
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct Pipeline {
    roots: Arc<RootSet>,
    seen: Arc<SeenSet>,
    json: bool,
    output_dir: Option<PathBuf>,
    output: Arc<dyn Output>,
    notifier: Option<Arc<Notifier>>,
    // Serializes appends across all per-root files.
    append_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        roots: Arc<RootSet>,
        seen: Arc<SeenSet>,
        json: bool,
        output_dir: Option<PathBuf>,
        output: Arc<dyn Output>,
        notifier: Option<Arc<Notifier>>,
    ) -> Self {
        Self {
            roots,
            seen,
            json,
            output_dir,
            output,
            notifier,
            append_lock: Mutex::new(()),
        }
    }

    /// Runs one name through filter, dedup, and the configured outputs.
    pub async fn emit(&self, display: &str, cert: &CertPayload) {
        let display = display.trim();
        if display.is_empty() {
            return;
        }
        let normalized = display.to_lowercase();

        let matched_root = match self.roots.matching_root(&normalized) {
            Some(root) => root,
            None => return,
        };

        if !self.seen.mark_seen(&normalized) {
            return;
        }
        metrics::counter!("heimdall_domains_emitted").increment(1);

        self.output.write_line(&self.render(display, cert)).await;

        if let Some(dir) = &self.output_dir {
            if !matched_root.is_empty() {
                if let Err(e) = self.persist(dir, &matched_root, display) {
                    debug!("error writing domain {}: {}", display, e);
                }
            }
        }

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let domain = display.to_string();
            tokio::spawn(async move {
                notifier.notify(&domain).await;
            });
        }
    }

    /// JSON mode only applies to fully issued certificates; precert TBS
    /// payloads fall back to the bare name.
    fn render(&self, display: &str, cert: &CertPayload) -> String {
        if self.json {
            if let CertPayload::Certificate(summary) = cert {
                if let Ok(json) = serde_json::to_string(&CertificateInfo::from(summary)) {
                    return json;
                }
            }
        }
        display.to_string()
    }

    fn persist(&self, dir: &Path, root: &str, display: &str) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.txt", root.replace(':', "_")));
        let _guard = self.append_lock.lock().unwrap();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "Hostname: {}", display)?;
        Ok(())
    }
}
