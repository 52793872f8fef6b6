//! Merkle leaf decoding
//!
//! Parses RFC 6962 `MerkleTreeLeaf` structures and extracts the subject
//! material of the embedded certificate or precertificate. Decode failures
//! are per-entry: a worker logs and skips them, they never propagate.

use crate::core::{CertPayload, CertSummary};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use x509_parser::prelude::*;

// MerkleTreeLeaf layout: version (1), leaf type (1), timestamp (8),
// entry type (2), then the type-specific payload.
const HEADER_LEN: usize = 12;
// Precert entries carry the issuer key hash before the TBS body.
const ISSUER_KEY_HASH_LEN: usize = 32;

const ENTRY_TYPE_X509: u16 = 0;
const ENTRY_TYPE_PRECERT: u16 = 1;

#[derive(Debug, Error)]
pub enum LeafError {
    #[error("leaf input too short ({0} bytes)")]
    Truncated(usize),
    #[error("unsupported leaf version {0}")]
    Version(u8),
    #[error("unsupported merkle leaf type {0}")]
    LeafType(u8),
    #[error("certificate length {len} exceeds leaf size {size}")]
    Length { len: usize, size: usize },
    #[error("x509 parse error: {0}")]
    X509(String),
}

/// Decodes one raw leaf. Returns `Ok(None)` for entry types this monitor
/// does not watch.
pub fn decode_leaf(leaf: &[u8]) -> Result<Option<CertPayload>, LeafError> {
    if leaf.len() < HEADER_LEN + 3 {
        return Err(LeafError::Truncated(leaf.len()));
    }
    if leaf[0] != 0 {
        return Err(LeafError::Version(leaf[0]));
    }
    if leaf[1] != 0 {
        return Err(LeafError::LeafType(leaf[1]));
    }

    let entry_type = u16::from_be_bytes([leaf[10], leaf[11]]);
    match entry_type {
        ENTRY_TYPE_X509 => {
            let der = read_length_prefixed(leaf, HEADER_LEN)?;
            let (_, cert) = X509Certificate::from_der(der)
                .map_err(|e| LeafError::X509(e.to_string()))?;
            Ok(Some(CertPayload::Certificate(summarize(
                &cert.tbs_certificate,
            ))))
        }
        ENTRY_TYPE_PRECERT => {
            let der = read_length_prefixed(leaf, HEADER_LEN + ISSUER_KEY_HASH_LEN)?;
            let (_, tbs) =
                TbsCertificate::from_der(der).map_err(|e| LeafError::X509(e.to_string()))?;
            Ok(Some(CertPayload::Precert(summarize(&tbs))))
        }
        _ => Ok(None),
    }
}

/// Reads the 24-bit big-endian length at `offset` and returns the DER slice
/// that follows it.
fn read_length_prefixed(leaf: &[u8], offset: usize) -> Result<&[u8], LeafError> {
    if leaf.len() < offset + 3 {
        return Err(LeafError::Truncated(leaf.len()));
    }
    let len = u32::from_be_bytes([0, leaf[offset], leaf[offset + 1], leaf[offset + 2]]) as usize;
    let start = offset + 3;
    let end = start + len;
    if end > leaf.len() {
        return Err(LeafError::Length {
            len,
            size: leaf.len(),
        });
    }
    Ok(&leaf[start..end])
}

fn summarize(tbs: &TbsCertificate<'_>) -> CertSummary {
    let common_name = tbs
        .subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    let organization = tbs
        .subject
        .iter_organization()
        .filter_map(|o| o.as_str().ok())
        .map(str::to_string)
        .collect();
    let organizational_unit = tbs
        .subject
        .iter_organizational_unit()
        .filter_map(|ou| ou.as_str().ok())
        .map(str::to_string)
        .collect();

    let mut dns_names = Vec::new();
    let mut email_addresses = Vec::new();
    let mut ip_addresses = Vec::new();
    let mut permitted_dns_domains = Vec::new();

    for extension in tbs.extensions() {
        match extension.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                for general_name in &san.general_names {
                    match general_name {
                        GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                        GeneralName::RFC822Name(email) => email_addresses.push(email.to_string()),
                        GeneralName::IPAddress(bytes) => {
                            if let Some(ip) = ip_from_bytes(bytes) {
                                ip_addresses.push(ip);
                            }
                        }
                        _ => {}
                    }
                }
            }
            ParsedExtension::NameConstraints(constraints) => {
                if let Some(permitted) = &constraints.permitted_subtrees {
                    for subtree in permitted {
                        if let GeneralName::DNSName(dns) = &subtree.base {
                            permitted_dns_domains.push(dns.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    CertSummary {
        common_name,
        dns_names,
        organization,
        organizational_unit,
        permitted_dns_domains,
        email_addresses,
        ip_addresses,
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
