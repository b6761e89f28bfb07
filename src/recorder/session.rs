//! Capture/encode session
//!
//! Owns the live screen grab and audio channels for one recording attempt,
//! and turns their output into a single intermediate media blob on stop.

use crate::capture::audio::{spawn_capture, AudioCaptureHandle, AudioSourceKind};
use crate::capture::screen::{pick_video_codec, ScreenCaptureChannel};
use crate::recorder::mixer::{mix_tracks, AudioTrack};
use crate::recorder::{RecordingError, RecordingResult};
use async_trait::async_trait;
use std::process::{Command, Stdio};
use tokio::sync::mpsc::UnboundedSender;

/// Intermediate media produced by a finished session
#[derive(Debug)]
pub struct RawMedia {
    /// Muxed matroska bytes (or video-only when the mux fell through)
    pub bytes: Vec<u8>,
    /// True when audio could not be muxed and the blob is video-only
    pub video_only: bool,
}

/// Capture parameters resolved from settings at schedule time
#[derive(Debug, Clone)]
pub struct CaptureSessionConfig {
    pub ffmpeg_binary: String,
    pub window_title: String,
    pub video_codec_preference: Vec<String>,
    pub system_audio_gain: f32,
    pub microphone_gain: f32,
    pub require_microphone: bool,
}

/// Live capture channels for one attempt
pub struct CaptureSession {
    config: CaptureSessionConfig,
    screen: ScreenCaptureChannel,
    system_audio: Option<AudioCaptureHandle>,
    microphone: Option<AudioCaptureHandle>,
}

impl CaptureSession {
    /// Open all capture channels.
    ///
    /// Audio comes up first so a video failure can release the devices
    /// immediately. System audio is best-effort, the microphone is
    /// best-effort unless `require_microphone` is set, but at least one
    /// audio source must be live or the attempt aborts.
    pub fn acquire(
        config: CaptureSessionConfig,
        error_tx: UnboundedSender<String>,
    ) -> RecordingResult<Self> {
        if config.window_title.trim().is_empty() {
            return Err(RecordingError::WindowNotFound(
                "no call window title available".to_string(),
            ));
        }

        let system_audio = match spawn_capture(AudioSourceKind::SystemLoopback) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("System audio unavailable: {}", e);
                None
            }
        };

        let microphone = match spawn_capture(AudioSourceKind::Microphone) {
            Ok(handle) => Some(handle),
            Err(e) if config.require_microphone => {
                tracing::error!("Microphone required but unavailable: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Microphone unavailable: {}", e);
                None
            }
        };

        if system_audio.is_none() && microphone.is_none() {
            return Err(RecordingError::NoAudioSource);
        }

        let codec = pick_video_codec(&config.ffmpeg_binary, &config.video_codec_preference);
        let screen = ScreenCaptureChannel::start(
            &config.ffmpeg_binary,
            &config.window_title,
            &codec,
            error_tx,
        )?;

        Ok(Self {
            config,
            screen,
            system_audio,
            microphone,
        })
    }

    /// Stop all channels and produce the intermediate blob.
    pub fn stop(mut self) -> RecordingResult<RawMedia> {
        let video = self.screen.stop()?;

        let system_track = drain_audio(self.system_audio.take(), "system");
        let mic_track = drain_audio(self.microphone.take(), "microphone");

        let mixed = mix_tracks(
            &system_track,
            &mic_track,
            self.config.system_audio_gain,
            self.config.microphone_gain,
        );

        let ffmpeg = self.config.ffmpeg_binary.clone();
        assemble_media(video, &mixed, |v, a| mux_audio_video(&ffmpeg, v, a))
    }
}

/// Decide what the session delivers from whatever survived the capture.
///
/// Video is mandatory; audio is best-effort at this point. An empty mix or a
/// failed mux degrades to a video-only blob rather than losing the call.
fn assemble_media<F>(video: Vec<u8>, mixed: &AudioTrack, mux: F) -> RecordingResult<RawMedia>
where
    F: FnOnce(&[u8], &AudioTrack) -> RecordingResult<Vec<u8>>,
{
    if video.is_empty() {
        return Err(RecordingError::NoVideoTrack);
    }

    if mixed.is_empty() {
        tracing::warn!("No audio captured, saving video-only recording");
        return Ok(RawMedia {
            bytes: video,
            video_only: true,
        });
    }

    match mux(&video, mixed) {
        Ok(bytes) => Ok(RawMedia {
            bytes,
            video_only: false,
        }),
        Err(e) => {
            tracing::error!("Audio mux failed, keeping video-only blob: {}", e);
            Ok(RawMedia {
                bytes: video,
                video_only: true,
            })
        }
    }
}

fn drain_audio(handle: Option<AudioCaptureHandle>, label: &str) -> AudioTrack {
    match handle {
        Some(mut h) => match h.stop() {
            Ok(track) => {
                tracing::debug!(source = label, frames = track.frames(), "Audio drained");
                track
            }
            Err(e) => {
                tracing::warn!("Failed to drain {} audio: {}", label, e);
                AudioTrack::empty()
            }
        },
        None => AudioTrack::empty(),
    }
}

/// Mux the video blob with the mixed audio track into one matroska blob.
fn mux_audio_video(
    ffmpeg_binary: &str,
    video: &[u8],
    audio: &AudioTrack,
) -> RecordingResult<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let video_path = dir.path().join("video.mkv");
    let audio_path = dir.path().join("audio.wav");
    let out_path = dir.path().join("muxed.mkv");

    std::fs::write(&video_path, video)?;
    write_wav(&audio_path, audio)?;

    let output = Command::new(ffmpeg_binary)
        .args([
            "-y",
            "-hide_banner",
            "-i",
            &video_path.to_string_lossy(),
            "-i",
            &audio_path.to_string_lossy(),
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-shortest",
            "-f",
            "matroska",
            &out_path.to_string_lossy(),
        ])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| RecordingError::Encoder(format!("failed to run ffmpeg mux: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join("; ");
        return Err(RecordingError::Encoder(format!("mux failed: {}", tail)));
    }

    Ok(std::fs::read(&out_path)?)
}

fn write_wav(path: &std::path::Path, track: &AudioTrack) -> RecordingResult<()> {
    let spec = hound::WavSpec {
        channels: track.channels,
        sample_rate: track.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| RecordingError::Encoder(format!("failed to create wav: {}", e)))?;
    for sample in &track.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| RecordingError::Encoder(format!("failed to write wav: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| RecordingError::Encoder(format!("failed to finalize wav: {}", e)))?;
    Ok(())
}

/// Seam between the controller and the live capture machinery
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn acquire(
        &self,
        config: CaptureSessionConfig,
        error_tx: UnboundedSender<String>,
    ) -> RecordingResult<Box<dyn ActiveCapture>>;
}

/// A running capture that can be finished into raw media
#[async_trait]
pub trait ActiveCapture: Send {
    async fn finish(self: Box<Self>) -> RecordingResult<RawMedia>;
}

/// Production backend wrapping [`CaptureSession`]
pub struct LiveCaptureBackend;

#[async_trait]
impl CaptureBackend for LiveCaptureBackend {
    async fn acquire(
        &self,
        config: CaptureSessionConfig,
        error_tx: UnboundedSender<String>,
    ) -> RecordingResult<Box<dyn ActiveCapture>> {
        let session = tokio::task::spawn_blocking(move || CaptureSession::acquire(config, error_tx))
            .await
            .map_err(|e| RecordingError::Encoder(format!("capture task failed: {}", e)))??;
        Ok(Box::new(LiveCapture {
            session: Some(session),
        }))
    }
}

struct LiveCapture {
    session: Option<CaptureSession>,
}

#[async_trait]
impl ActiveCapture for LiveCapture {
    async fn finish(mut self: Box<Self>) -> RecordingResult<RawMedia> {
        let session = self
            .session
            .take()
            .ok_or(RecordingError::NoDataCaptured)?;
        tokio::task::spawn_blocking(move || session.stop())
            .await
            .map_err(|e| RecordingError::Encoder(format!("stop task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_mix() -> AudioTrack {
        AudioTrack {
            samples: vec![0.1; 96],
            sample_rate: 48_000,
            channels: 2,
        }
    }

    #[test]
    fn empty_video_is_a_hard_failure() {
        let result = assemble_media(Vec::new(), &stereo_mix(), |_, _| Ok(vec![1]));
        assert!(matches!(result, Err(RecordingError::NoVideoTrack)));
    }

    #[test]
    fn empty_mix_keeps_the_video() {
        let media = assemble_media(vec![9u8; 1500], &AudioTrack::empty(), |_, _| {
            panic!("mux must not run without audio")
        })
        .unwrap();
        assert!(media.video_only);
        assert_eq!(media.bytes, vec![9u8; 1500]);
    }

    #[test]
    fn mux_failure_keeps_the_video() {
        let media = assemble_media(vec![9u8; 1500], &stereo_mix(), |_, _| {
            Err(RecordingError::Encoder("mux exploded".to_string()))
        })
        .unwrap();
        assert!(media.video_only);
        assert_eq!(media.bytes, vec![9u8; 1500]);
    }

    #[test]
    fn successful_mux_delivers_the_muxed_blob() {
        let media =
            assemble_media(vec![9u8; 1500], &stereo_mix(), |_, _| Ok(vec![7u8; 3000])).unwrap();
        assert!(!media.video_only);
        assert_eq!(media.bytes, vec![7u8; 3000]);
    }

    #[test]
    fn wav_staging_round_trips_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage.wav");
        let track = AudioTrack {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            sample_rate: 48_000,
            channels: 2,
        };
        write_wav(&path, &track).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(reader.len(), 4);
    }
}
