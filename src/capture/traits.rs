//! Capture trait definitions
//!
//! Platform-agnostic seams for the pieces the host OS supplies: window
//! enumeration and (elsewhere in this module tree) audio/video streams.

use crate::detector::WindowSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window-enumeration failures
#[derive(Error, Debug, Clone)]
pub enum EnumerateError {
    #[error("window enumeration is not supported on this platform")]
    Unsupported,

    #[error("platform error: {0}")]
    Platform(String),
}

/// Lists visible top-level windows with their titles.
///
/// Implemented by the platform layer; mocked in tests. Failures are expected
/// (missing permissions, no display server) and are degraded to "app not
/// found" by the detector rather than propagated.
#[async_trait]
pub trait WindowEnumerator: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<WindowSnapshot>, EnumerateError>;
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Device name as reported by the audio host
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

/// The platform's window enumerator
///
/// Dispatches to Win32 or CGWindowList; on other platforms every call
/// returns [`EnumerateError::Unsupported`] and detection reports "not found".
#[derive(Debug, Default, Clone)]
pub struct SystemWindowEnumerator;

#[async_trait]
impl WindowEnumerator for SystemWindowEnumerator {
    async fn enumerate(&self) -> Result<Vec<WindowSnapshot>, EnumerateError> {
        #[cfg(target_os = "windows")]
        {
            tokio::task::spawn_blocking(crate::capture::windows::list_windows)
                .await
                .map_err(|e| EnumerateError::Platform(e.to_string()))?
        }

        #[cfg(target_os = "macos")]
        {
            tokio::task::spawn_blocking(crate::capture::macos::list_windows)
                .await
                .map_err(|e| EnumerateError::Platform(e.to_string()))?
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Err(EnumerateError::Unsupported)
        }
    }
}
