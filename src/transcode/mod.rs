//! Transcode service
//!
//! Converts the intermediate capture blob into the final MP4 on disk. When
//! conversion is impossible the policy decides between failing the save and
//! keeping the intermediate file as the deliverable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// What to do when MP4 conversion cannot run or fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TranscodePolicy {
    /// Fail the save with an error
    Strict,
    /// Keep the intermediate container as the saved recording
    #[default]
    FallbackToIntermediate,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Intermediate file too small to be valid ({size} bytes, need {min})")]
    CorruptIntermediate { size: u64, min: u64 },

    #[error("ffmpeg binary not found on PATH")]
    ToolMissing,

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Converted output below valid size")]
    OutputTooSmall,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A recording that reached disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// True when the intermediate container was kept instead of MP4
    pub fell_back: bool,
}

#[async_trait]
pub trait Transcode: Send + Sync {
    /// Persist the intermediate blob and produce the final recording file
    /// named `{target_stem}.{ext}` in the output directory.
    async fn transcode(
        &self,
        intermediate: Vec<u8>,
        target_stem: &str,
    ) -> Result<TranscodeOutcome, TranscodeError>;
}

/// ffmpeg-backed transcoder
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    pub output_dir: PathBuf,
    pub min_valid_bytes: u64,
    pub policy: TranscodePolicy,
    /// Binary name resolved through PATH; overridable for tests
    pub ffmpeg_binary: String,
}

impl FfmpegTranscoder {
    pub fn new(output_dir: PathBuf, min_valid_bytes: u64, policy: TranscodePolicy) -> Self {
        Self {
            output_dir,
            min_valid_bytes,
            policy,
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }

    fn convert(&self, intermediate: &Path, target: &Path) -> Result<(), TranscodeError> {
        let output = Command::new(&self.ffmpeg_binary)
            .args([
                "-y",
                "-hide_banner",
                "-i",
                &intermediate.to_string_lossy(),
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-movflags",
                "+faststart",
                "-pix_fmt",
                "yuv420p",
                &target.to_string_lossy(),
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| TranscodeError::Conversion(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join("; ");
            return Err(TranscodeError::Conversion(tail));
        }
        Ok(())
    }

    fn run(&self, intermediate: Vec<u8>, target_stem: &str) -> Result<TranscodeOutcome, TranscodeError> {
        let size = intermediate.len() as u64;
        if size < self.min_valid_bytes {
            return Err(TranscodeError::CorruptIntermediate {
                size,
                min: self.min_valid_bytes,
            });
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let intermediate_path = self.output_dir.join(format!("{}_temp.webm", target_stem));
        std::fs::write(&intermediate_path, &intermediate)?;

        let keep_intermediate = |reason: &dyn std::fmt::Display,
                                 err: TranscodeError|
         -> Result<TranscodeOutcome, TranscodeError> {
            match self.policy {
                TranscodePolicy::Strict => {
                    let _ = std::fs::remove_file(&intermediate_path);
                    Err(err)
                }
                TranscodePolicy::FallbackToIntermediate => {
                    tracing::warn!("Keeping intermediate file: {}", reason);
                    let final_path = self.output_dir.join(format!("{}.webm", target_stem));
                    std::fs::rename(&intermediate_path, &final_path)?;
                    Ok(TranscodeOutcome {
                        size_bytes: std::fs::metadata(&final_path)?.len(),
                        path: final_path,
                        fell_back: true,
                    })
                }
            }
        };

        if which::which(&self.ffmpeg_binary).is_err() {
            return keep_intermediate(&"ffmpeg not found", TranscodeError::ToolMissing);
        }

        let target = self.output_dir.join(format!("{}.mp4", target_stem));
        tracing::info!(target = %target.display(), "Transcoding recording to MP4");

        if let Err(e) = self.convert(&intermediate_path, &target) {
            let _ = std::fs::remove_file(&target);
            let msg = e.to_string();
            return keep_intermediate(&msg, e);
        }

        let out_size = std::fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        if out_size < self.min_valid_bytes {
            let _ = std::fs::remove_file(&target);
            return keep_intermediate(&"converted output too small", TranscodeError::OutputTooSmall);
        }

        std::fs::remove_file(&intermediate_path)?;
        tracing::info!(size_bytes = out_size, "Transcode complete");
        Ok(TranscodeOutcome {
            path: target,
            size_bytes: out_size,
            fell_back: false,
        })
    }
}

#[async_trait]
impl Transcode for FfmpegTranscoder {
    async fn transcode(
        &self,
        intermediate: Vec<u8>,
        target_stem: &str,
    ) -> Result<TranscodeOutcome, TranscodeError> {
        let this = self.clone();
        let stem = target_stem.to_string();
        tokio::task::spawn_blocking(move || this.run(intermediate, &stem))
            .await
            .map_err(|e| TranscodeError::Conversion(format!("transcode task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcoder(dir: &Path, policy: TranscodePolicy) -> FfmpegTranscoder {
        FfmpegTranscoder {
            output_dir: dir.to_path_buf(),
            min_valid_bytes: 1000,
            policy,
            // Bogus binary so tests never reach a real ffmpeg
            ffmpeg_binary: "callwatch-test-missing-ffmpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn rejects_undersized_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcoder(dir.path(), TranscodePolicy::FallbackToIntermediate);
        let err = t.transcode(vec![0u8; 100], "Tiny_Call").await.unwrap_err();
        assert!(matches!(
            err,
            TranscodeError::CorruptIntermediate { size: 100, min: 1000 }
        ));
        // Nothing should have been written
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_binary_falls_back_to_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcoder(dir.path(), TranscodePolicy::FallbackToIntermediate);
        let outcome = t
            .transcode(vec![1u8; 2000], "WhatsApp_Call_2026-01-01_10-00-00")
            .await
            .unwrap();
        assert!(outcome.fell_back);
        assert_eq!(outcome.size_bytes, 2000);
        assert!(outcome.path.ends_with("WhatsApp_Call_2026-01-01_10-00-00.webm"));
        assert!(outcome.path.exists());
        // No _temp leftover
        assert!(!dir
            .path()
            .join("WhatsApp_Call_2026-01-01_10-00-00_temp.webm")
            .exists());
    }

    #[tokio::test]
    async fn missing_binary_fails_under_strict_policy() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcoder(dir.path(), TranscodePolicy::Strict);
        let err = t
            .transcode(vec![1u8; 2000], "Strict_Call")
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::ToolMissing));
        // Strict cleans up the staged intermediate
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
