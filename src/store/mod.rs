//! Recordings store
//!
//! Lists and deletes saved recordings in the output directory, and names new
//! ones `{AppName}_Call_{timestamp}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File extensions the store recognizes as recordings
const RECORDING_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Recording not found: {0}")]
    NotFound(String),

    #[error("Invalid recording name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A saved recording on disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Filename stem for a new recording.
///
/// ISO-8601 timestamp with ':' and '.' folded to '-' so the name is valid on
/// every filesystem: `WhatsApp_Call_2026-08-30T12-00-00-000Z`.
pub fn output_stem(app_name: &str) -> String {
    let stamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}_Call_{}", app_name.replace(' ', ""), stamp)
}

/// Access to the recordings directory
#[derive(Debug, Clone)]
pub struct RecordingsStore {
    dir: PathBuf,
}

impl RecordingsStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List recordings, newest first by modification time.
    pub fn list(&self) -> Result<Vec<RecordingArtifact>, StoreError> {
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_recording(&path) {
                continue;
            }
            let meta = entry.metadata()?;
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            items.push(RecordingArtifact {
                name,
                size_bytes: meta.len(),
                modified_at: meta.modified().map(DateTime::<Utc>::from)?,
                path,
            });
        }
        items.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(items)
    }

    /// Delete a recording by file name. The name must be a bare file name
    /// inside the recordings directory.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        std::fs::remove_file(&path)?;
        tracing::info!(name = %name, "Deleted recording");
        Ok(())
    }
}

fn is_recording(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RECORDING_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
}
