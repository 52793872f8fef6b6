//! Core domain types and service traits for Heimdall
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::network::NetworkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Undecoded Merkle leaf bytes as returned by a log's `get-entries` endpoint.
pub type RawLeaf = Vec<u8>;

/// A contiguous run of raw leaves handed from a poller to the worker pool.
///
/// The absolute log index of the k-th leaf is `base_index + k + 1`, matching
/// the numbering used when reconstructing a raw log entry from a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBatch {
    pub entries: Vec<RawLeaf>,
    pub base_index: u64,
}

/// Client handle for a single CT log.
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Fetches the current Signed Tree Head and returns its tree size.
    async fn tree_size(&self) -> Result<u64, NetworkError>;

    /// Fetches the raw leaves for the half-open index range `[start, end)`,
    /// in log order. The server may return fewer leaves than requested.
    async fn raw_entries(&self, start: u64, end: u64) -> Result<Vec<RawLeaf>, NetworkError>;
}

/// One entry of the CT log directory, immutable after startup.
#[derive(Clone)]
pub struct LogDescriptor {
    /// Opaque log id from the log list (base64 of the key hash).
    pub id: String,
    /// Human-readable operator and log name, e.g. `Google 'Argon2025h1' log`.
    pub name: String,
    /// Base URI of the log's RFC 6962 API.
    pub uri: String,
    pub client: Arc<dyn LogClient>,
}

impl fmt::Debug for LogDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("uri", &self.uri)
            .finish()
    }
}

/// The certificate payload carried through the emission pipeline.
///
/// A leaf decodes either into a fully issued certificate or into the
/// to-be-signed body of a precertificate. JSON output is only defined for
/// the issued-certificate case; precert matches fall back to bare names.
#[derive(Debug, Clone, PartialEq)]
pub enum CertPayload {
    Certificate(CertSummary),
    Precert(CertSummary),
}

impl CertPayload {
    pub fn summary(&self) -> &CertSummary {
        match self {
            CertPayload::Certificate(summary) | CertPayload::Precert(summary) => summary,
        }
    }
}

/// Owned subject data extracted from a certificate or precert TBS at decode
/// time. No borrowed DER escapes the decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertSummary {
    pub common_name: Option<String>,
    pub dns_names: Vec<String>,
    pub organization: Vec<String>,
    pub organizational_unit: Vec<String>,
    /// Permitted DNS subtrees from the name-constraints extension.
    pub permitted_dns_domains: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl CertSummary {
    /// The domain names this certificate asserts, in emission order: the
    /// common name first (when non-empty), then every DNS SAN in
    /// certificate order.
    pub fn asserted_names(&self) -> impl Iterator<Item = &str> {
        self.common_name
            .as_deref()
            .filter(|cn| !cn.is_empty())
            .into_iter()
            .chain(self.dns_names.iter().map(String::as_str))
    }
}

/// The per-match JSONL object emitted in `-j` mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CertificateInfo {
    #[serde(rename = "originip")]
    pub origin_ip: String,
    #[serde(rename = "org")]
    pub organization: Vec<String>,
    #[serde(rename = "orgunit")]
    pub organizational_unit: Vec<String>,
    #[serde(rename = "commonName")]
    pub common_name: String,
    pub san: Vec<String>,
    pub domains: Vec<String>,
    pub emails: Vec<String>,
    pub ips: Vec<IpAddr>,
}

impl From<&CertSummary> for CertificateInfo {
    fn from(summary: &CertSummary) -> Self {
        Self {
            origin_ip: String::new(),
            organization: summary.organization.clone(),
            organizational_unit: summary.organizational_unit.clone(),
            common_name: summary.common_name.clone().unwrap_or_default(),
            san: summary.dns_names.clone(),
            domains: summary.permitted_dns_domains.clone(),
            emails: summary.email_addresses.clone(),
            ips: summary.ip_addresses.clone(),
        }
    }
}
