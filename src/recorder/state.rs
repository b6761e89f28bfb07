//! Recording lifecycle state and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of the recording lifecycle.
///
/// Transitions are linear: `Idle → Scheduled → Acquiring → Recording →
/// Stopping → Saving → Idle`, with early exits back to `Idle` when a call
/// ends before capture commits or when acquisition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingPhase {
    #[default]
    Idle,
    Scheduled,
    Acquiring,
    Recording,
    Stopping,
    Saving,
}

impl RecordingPhase {
    /// True while a session holds the recording lock.
    pub fn is_active(&self) -> bool {
        !matches!(self, RecordingPhase::Idle)
    }
}

/// Metadata for one recording attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub window_title: String,
    pub participant: Option<String>,
}

impl SessionInfo {
    pub fn new(window_title: String, participant: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            window_title,
            participant,
        }
    }
}

/// Lifecycle notifications emitted by the controller
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecorderEvent {
    /// A call was confirmed and a delayed start is pending
    Scheduled { session: SessionInfo, delay_ms: u64 },
    /// Capture committed and media is flowing
    Started { session: SessionInfo },
    /// Capture ended and the save pipeline began
    Stopped { session: SessionInfo },
    /// The recording reached disk
    Saved {
        session: SessionInfo,
        path: String,
        size_bytes: u64,
        fell_back: bool,
    },
    /// The attempt ended without a saved file
    Failed { session: SessionInfo, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Call window not found: {0}")]
    WindowNotFound(String),

    #[error("No audio source could be captured")]
    NoAudioSource,

    #[error("Capture produced no video track")]
    NoVideoTrack,

    #[error("Capture produced no data")]
    NoDataCaptured,

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;
