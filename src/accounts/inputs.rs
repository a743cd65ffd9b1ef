//! Readers for the key, proxy and secondary-secret input files

use crate::error::{Result, TapfleetError};
use std::path::Path;
use tracing::warn;

/// Non-empty trimmed lines of a text file
pub async fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        TapfleetError::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(parse_lines(&content))
}

/// Like [`read_lines`], but a missing file reads as empty
pub async fn read_optional_lines(path: &Path) -> Result<Vec<String>> {
    match tokio::fs::metadata(path).await {
        Ok(_) => read_lines(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "File not found, using an empty list");
            Ok(Vec::new())
        }
        Err(e) => Err(TapfleetError::Io(e)),
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Secondary secrets as a JSON array of byte arrays.
///
/// A missing, empty or malformed file yields an empty list; the workflow's
/// secret policy decides whether that is fatal.
pub async fn read_secondary_secrets(path: &Path) -> Vec<Vec<u8>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Secondary secrets unavailable, using an empty list");
            return Vec::new();
        }
    };
    parse_secondary_secrets(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Secondary secrets are not valid JSON, using an empty list");
        Vec::new()
    })
}

fn parse_secondary_secrets(content: &str) -> std::result::Result<Vec<Vec<u8>>, serde_json::Error> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}
