//! Pipeline identity for discovered manifests.
//!
//! Identities must be reproducible across runs: the same parent and the same
//! discovered name always map to the same id, so downstream actions (pull
//! requests) are updated instead of duplicated.

use std::io::Write;

use autobump_shared::GroupBy;
use sha2::{Digest, Sha256};
use tracing::error;

/// Separator between the parent id and the discovered name in hashed input.
const ID_SEPARATOR: &str = "/";

/// Compute the pipeline id of a manifest discovered by `parent_id`.
///
/// `All` reuses the parent's id so every discovered manifest lands in a single
/// logical pipeline. `Individual` derives a per-manifest id from the parent id
/// and the manifest name only; volatile fields such as version filters are
/// deliberately left out.
pub fn child_pipeline_id(groupby: GroupBy, parent_id: &str, manifest_name: &str) -> String {
    match groupby {
        GroupBy::All => parent_id.to_string(),
        GroupBy::Individual => {
            hex_digest(&format!("{parent_id}{ID_SEPARATOR}{manifest_name}"))
        }
    }
}

/// Hex-encoded SHA-256 of `input`.
///
/// A failed digest write is logged and yields the digest of whatever was
/// written.
pub fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    if let Err(e) = hasher.write_all(input.as_bytes()) {
        error!(error = %e, "failed to hash pipeline identity");
    }
    format!("{:x}", hasher.finalize())
}
