//! CT log directory
//!
//! Fetches the public all-logs list once at startup and turns it into log
//! descriptors with ready-to-use API clients. There is no re-discovery at
//! runtime; a failure here is fatal.

use crate::core::LogDescriptor;
use crate::network::HttpLogClient;
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Google's v3 all-logs list. Includes every known log regardless of state.
pub const DEFAULT_LOG_LIST_URL: &str =
    "https://www.gstatic.com/ct/log_list/v3/all_logs_list.json";

#[derive(Debug, Deserialize)]
struct LogList {
    operators: Vec<Operator>,
}

#[derive(Debug, Deserialize)]
struct Operator {
    name: String,
    #[serde(default)]
    logs: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    log_id: String,
    url: String,
    description: Option<String>,
}

/// Fetches and parses the log list, returning one descriptor per log.
pub async fn fetch_log_list(url: &str) -> Result<Vec<LogDescriptor>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to fetch CT log list from {url}"))?;
    anyhow::ensure!(
        response.status().is_success(),
        "CT log list request failed with status {}",
        response.status()
    );

    let list: LogList = response
        .json()
        .await
        .context("failed to parse CT log list")?;

    let descriptors = descriptors_from(list, &http);
    info!("[*] Loaded {} CT logs from the log list", descriptors.len());
    Ok(descriptors)
}

fn descriptors_from(list: LogList, http: &reqwest::Client) -> Vec<LogDescriptor> {
    let mut descriptors = Vec::new();
    for operator in list.operators {
        let Operator { name: operator_name, logs } = operator;
        for log in logs {
            if log.url.is_empty() {
                continue;
            }
            let description = log
                .description
                .unwrap_or_else(|| format!("{operator_name} CT log"));
            // Most descriptions already carry the operator name; the rate
            // table matches on substrings, so avoid doubling it.
            let name = if description.contains(&operator_name) {
                description
            } else {
                format!("{operator_name} {description}")
            };
            descriptors.push(LogDescriptor {
                id: log.log_id,
                name,
                client: Arc::new(HttpLogClient::new(http.clone(), log.url.clone())),
                uri: log.url,
            });
        }
    }
    descriptors
}
