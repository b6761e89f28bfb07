//! Audio capture channels
//!
//! Microphone and system-loopback capture via cpal. Each capture runs on a
//! dedicated thread that owns the cpal stream (`Stream` is not `Send`), with
//! samples accumulated in a bounded ring buffer and handed back on stop.

use crate::capture::AudioDeviceInfo;
use crate::recorder::mixer::AudioTrack;
use crate::recorder::RecordingError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Maximum samples to buffer per source (30 minutes of 48kHz stereo).
///
/// Calls longer than this keep the most recent audio; the cap prevents
/// unbounded memory growth if a stop signal is lost.
const MAX_BUFFER_SAMPLES: usize = 48_000 * 2 * 60 * 30;

/// Device-name fragments that identify a system-output loopback source
const LOOPBACK_MARKERS: &[&str] = &["monitor", "loopback", "stereo mix", "blackhole", "soundflower"];

/// Which physical source a channel captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSourceKind {
    Microphone,
    SystemLoopback,
}

impl AudioSourceKind {
    fn label(self) -> &'static str {
        match self {
            AudioSourceKind::Microphone => "microphone",
            AudioSourceKind::SystemLoopback => "system loopback",
        }
    }
}

/// List available audio input devices
pub fn get_audio_input_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|d| d.name().ok())
            .map(|name| AudioDeviceInfo {
                is_default: name == default_name,
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio devices: {}", e);
            Vec::new()
        }
    }
}

fn resolve_device(kind: AudioSourceKind) -> Result<cpal::Device, RecordingError> {
    let host = cpal::default_host();
    match kind {
        AudioSourceKind::Microphone => host.default_input_device().ok_or_else(|| {
            RecordingError::AudioDevice("no default input device".to_string())
        }),
        AudioSourceKind::SystemLoopback => {
            let devices = host
                .input_devices()
                .map_err(|e| RecordingError::AudioDevice(e.to_string()))?;
            for device in devices {
                if let Ok(name) = device.name() {
                    let lower = name.to_lowercase();
                    if LOOPBACK_MARKERS.iter().any(|m| lower.contains(m)) {
                        tracing::debug!(device = %name, "Selected system loopback device");
                        return Ok(device);
                    }
                }
            }
            Err(RecordingError::AudioDevice(
                "no system loopback device found".to_string(),
            ))
        }
    }
}

/// Handle to a running audio capture thread
pub struct AudioCaptureHandle {
    kind: AudioSourceKind,
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<AudioTrack>>,
}

impl AudioCaptureHandle {
    /// Stop the stream and collect the captured track.
    pub fn stop(&mut self) -> Result<AudioTrack, RecordingError> {
        self.stop.store(true, Ordering::Release);
        let join = self
            .join
            .take()
            .ok_or_else(|| RecordingError::AudioDevice("capture already stopped".to_string()))?;
        join.join().map_err(|_| {
            RecordingError::AudioDevice(format!("{} capture thread panicked", self.kind.label()))
        })
    }
}

impl Drop for AudioCaptureHandle {
    fn drop(&mut self) {
        // Detach rather than join: the thread observes the flag, drops its
        // stream, and exits on its own. Dropping without stop() discards the
        // captured samples, which is exactly what abort paths want.
        self.stop.store(true, Ordering::Release);
    }
}

/// Start capturing from the given source on a dedicated thread.
///
/// Returns once the stream is confirmed running, so device and permission
/// failures surface here instead of silently producing an empty track.
pub fn spawn_capture(kind: AudioSourceKind) -> Result<AudioCaptureHandle, RecordingError> {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(u32, u16), RecordingError>>();

    let join = std::thread::Builder::new()
        .name(format!("audio-capture-{}", kind.label().replace(' ', "-")))
        .spawn(move || capture_thread(kind, thread_stop, ready_tx))
        .map_err(RecordingError::Io)?;

    let (sample_rate, channels) = ready_rx
        .recv_timeout(Duration::from_secs(5))
        .map_err(|_| {
            RecordingError::AudioDevice(format!("{} capture did not start", kind.label()))
        })??;

    tracing::info!(
        source = kind.label(),
        sample_rate,
        channels,
        "Audio capture started"
    );

    Ok(AudioCaptureHandle {
        kind,
        stop,
        join: Some(join),
    })
}

/// Map a stream-setup failure onto the error taxonomy.
///
/// Hosts report denied capture access as backend-specific message strings,
/// so permission problems are recognized by phrasing.
fn stream_error(context: &str, message: &str) -> RecordingError {
    let lower = message.to_lowercase();
    if lower.contains("permission")
        || lower.contains("denied")
        || lower.contains("not permitted")
        || lower.contains("unauthorized")
    {
        RecordingError::PermissionDenied(format!("{}: {}", context, message))
    } else {
        RecordingError::AudioDevice(format!("{}: {}", context, message))
    }
}

fn capture_thread(
    kind: AudioSourceKind,
    stop: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::Sender<Result<(u32, u16), RecordingError>>,
) -> AudioTrack {
    let samples: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));

    let (stream, sample_rate, channels) = match open_stream(kind, Arc::clone(&samples)) {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return AudioTrack::empty();
        }
    };

    let _ = ready_tx.send(Ok((sample_rate, channels)));

    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Drop the stream before draining so no callback writes after the drain.
    drop(stream);
    std::thread::sleep(Duration::from_millis(5));

    let collected: Vec<f32> = match samples.lock() {
        Ok(buf) => buf.iter().copied().collect(),
        Err(poisoned) => poisoned.into_inner().iter().copied().collect(),
    };

    tracing::debug!(
        source = kind.label(),
        sample_count = collected.len(),
        "Audio capture drained"
    );

    AudioTrack {
        samples: collected,
        sample_rate,
        channels,
    }
}

#[allow(clippy::type_complexity)]
fn open_stream(
    kind: AudioSourceKind,
    samples: Arc<Mutex<VecDeque<f32>>>,
) -> Result<(cpal::Stream, u32, u16), RecordingError> {
    let device = resolve_device(kind)?;
    let config = device
        .default_input_config()
        .map_err(|e| stream_error("failed to get config", &e.to_string()))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels();
    let stream_config: cpal::StreamConfig = config.into();

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut buf = match samples.lock() {
                    Ok(b) => b,
                    Err(poisoned) => poisoned.into_inner(),
                };
                buf.extend(data.iter().copied());
                while buf.len() > MAX_BUFFER_SAMPLES {
                    buf.pop_front();
                }
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| stream_error("failed to build stream", &e.to_string()))?;

    stream
        .play()
        .map_err(|e| stream_error("failed to start stream", &e.to_string()))?;

    Ok((stream, sample_rate, channels))
}
