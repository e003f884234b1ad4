//! Deterministic, content-derived id helpers
//!
//! Every id the core generates is a `<prefix>:<sha256(text)[0:16]>` hex string.
//! Callers choose the canonicalization (lowercase for names, raw text for
//! literal rule/edge content) and pass it in already applied.

use sha2::{Digest, Sha256};

fn hash16(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

/// `proc:<hash>` — procedure id, canonicalized on the lowercased name
pub fn procedure_id(name: &str) -> String {
    format!("proc:{}", hash16(&name.to_lowercase()))
}

/// `source:section:<hash>` — source doc id, canonicalized on the raw source name
pub fn source_doc_id(source_name: &str) -> String {
    format!("source:section:{}", hash16(source_name))
}

/// `entity:<hash>` — entity id, canonicalized on the raw entity name
pub fn entity_id(name: &str) -> String {
    format!("entity:{}", hash16(name))
}

/// `concept:<hash>` — concept id, canonicalized on the raw category string
pub fn concept_id(category: &str) -> String {
    format!("concept:{}", hash16(category))
}

/// `rule:<hash>` — rule id, canonicalized on the raw matched rule text
pub fn rule_id(rule_text: &str) -> String {
    format!("rule:{}", hash16(rule_text))
}

/// `edge:<hash>` — edge id, deterministic in `(source, etype, target)`
pub fn edge_id(source: &str, etype: &str, target: &str) -> String {
    let content = format!("{}:{}:{}", source, etype, target);
    format!("edge:{}", hash16(&content))
}
