//! Application settings
//!
//! Every tunable of the detection/recording pipeline lives here, with serde
//! defaults so a missing or partial settings file always yields a working
//! configuration. Settings persist as JSON under the platform config dir.

use crate::transcode::TranscodePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// All user-facing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Name of the application whose calls are recorded
    pub target_app: String,

    /// Polling tick interval for window-title monitoring (milliseconds)
    pub poll_interval_ms: u64,

    /// Consecutive in-call detections required before declaring a call
    pub start_threshold: u32,

    /// Consecutive no-call detections required before declaring call end
    pub stop_threshold: u32,

    /// Delay between stable call detection and recording start (milliseconds)
    ///
    /// Absorbs brief detection flicker before committing capture resources.
    pub record_delay_ms: u64,

    /// How long a monitoring-stop request may block on an in-flight save
    /// (milliseconds)
    pub save_wait_timeout_ms: u64,

    /// Minimum size for a captured or converted file to be considered valid
    pub min_valid_file_bytes: u64,

    /// Start recording automatically when a call is detected
    pub auto_record: bool,

    /// Abort the session when the microphone cannot be opened
    ///
    /// When false (the default), recording proceeds with system audio only.
    pub require_microphone: bool,

    /// Gain applied to system audio when mixing
    ///
    /// System audio carries the remote participant, so it is emphasized.
    pub system_audio_gain: f32,

    /// Gain applied to microphone audio when mixing
    pub microphone_gain: f32,

    /// What to do when conversion to the final container fails
    pub transcode_policy: TranscodePolicy,

    /// Override for the recordings directory (platform default when None)
    pub recordings_dir: Option<PathBuf>,

    /// Ordered video codec preference for the capture encoder
    pub video_codec_preference: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_app: "WhatsApp".to_string(),
            poll_interval_ms: 1000,
            start_threshold: 3,
            stop_threshold: 2,
            record_delay_ms: 2500,
            save_wait_timeout_ms: 15_000,
            min_valid_file_bytes: 1000,
            auto_record: true,
            require_microphone: false,
            system_audio_gain: 2.0,
            microphone_gain: 1.5,
            transcode_policy: TranscodePolicy::default(),
            recordings_dir: None,
            video_codec_preference: default_codec_preference(),
        }
    }
}

fn default_codec_preference() -> Vec<String> {
    ["libx264", "libvpx-vp9", "libvpx", "mpeg4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Settings {
    /// Path of the persisted settings file
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("callwatch").join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        if let Some(path) = Self::settings_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match serde_json::from_str(&contents) {
                        Ok(settings) => {
                            tracing::info!("Loaded settings from {:?}", path);
                            return settings;
                        }
                        Err(e) => {
                            tracing::error!("Failed to parse settings: {}", e);
                        }
                    },
                    Err(e) => {
                        tracing::error!("Failed to read settings: {}", e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Persist settings to disk
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::settings_path().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine settings path",
            )
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Directory where finished recordings are stored
    pub fn recordings_dir(&self) -> PathBuf {
        if let Some(dir) = &self.recordings_dir {
            return dir.clone();
        }
        dirs::video_dir()
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("callwatch")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.record_delay_ms)
    }

    pub fn save_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.save_wait_timeout_ms)
    }
}
