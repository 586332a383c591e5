use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::types::Target;

/// Parse a JSON target list.
///
/// The document is an array of objects with `name`, `type` and, by kind,
/// `url` (http), `host` + `port` (tcp) or `host` (dns), plus an optional
/// `timeout_ms`. Only `name` is required: an unknown or missing `type` and
/// missing or out-of-range endpoint fields load fine and are reported by the
/// probe as per-target errors.
pub fn parse_targets_str(s: &str) -> Result<Vec<Target>> {
    serde_json::from_str(s).context("parse targets file")
}

/// Load a target list from a file path. Errors if the file cannot be read or parsed.
pub fn load_targets_from_path(path: impl AsRef<Path>) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read targets file: {}", path.as_ref().display()))?;
    parse_targets_str(&content)
        .with_context(|| format!("invalid targets file: {}", path.as_ref().display()))
}
