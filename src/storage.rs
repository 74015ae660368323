//! Output directory writes with client-derived filenames

use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};

/// Handle on the configured output directory
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Store for a directory that must already exist
    pub fn existing(dir: Option<PathBuf>) -> Result<Self> {
        match dir {
            Some(dir) if dir.is_dir() => Ok(Self { dir }),
            _ => Err(AppError::Unconfigured("Output directory".to_string())),
        }
    }

    /// Store for a configured directory, created on demand
    pub async fn create(dir: Option<PathBuf>) -> Result<Self> {
        let dir = dir.ok_or_else(|| AppError::Unconfigured("Output directory".to_string()))?;
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            debug!(path = ?dir, "Created output directory");
        }
        Ok(Self { dir })
    }

    /// Write `data` under the sanitized basename of `filename`
    pub async fn write(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(sanitize_filename(filename)?);
        fs::write(&path, data).await?;
        debug!(path = ?path, size = data.len(), "Saved file");
        Ok(path)
    }

    /// Write `value` as pretty-printed JSON under the sanitized basename of `filename`
    pub async fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write(filename, &data).await
    }
}

/// Reduce a client-provided filename to a bare basename
///
/// Both `/` and `\` count as separators regardless of platform.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(AppError::InvalidRequest(format!(
            "Invalid filename: {:?}",
            filename
        )));
    }

    Ok(base.to_string())
}
