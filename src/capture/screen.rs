//! Screen capture channel
//!
//! Drives an ffmpeg grab process that records the call window (or the full
//! display where window grabs are unavailable) and streams matroska chunks to
//! stdout. Chunks accumulate in memory until the channel is stopped.

use crate::recorder::RecordingError;
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Pick the first preferred codec that the local ffmpeg build provides.
///
/// Falls back to the last preference when probing fails, matching the
/// behavior of encoding with the most permissive option available.
pub fn pick_video_codec(ffmpeg_binary: &str, preferences: &[String]) -> String {
    let output = Command::new(ffmpeg_binary)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(out) => {
            let listing = String::from_utf8_lossy(&out.stdout);
            select_codec(&listing, preferences)
        }
        Err(e) => {
            tracing::warn!("Failed to probe ffmpeg encoders: {}", e);
            fallback_codec(preferences)
        }
    }
}

fn select_codec(encoder_listing: &str, preferences: &[String]) -> String {
    for pref in preferences {
        // Encoder lines look like " V....D libx264    H.264 / AVC ..."
        let found = encoder_listing
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(pref.as_str()));
        if found {
            tracing::debug!(codec = %pref, "Selected video codec");
            return pref.clone();
        }
    }
    fallback_codec(preferences)
}

fn fallback_codec(preferences: &[String]) -> String {
    preferences
        .last()
        .cloned()
        .unwrap_or_else(|| "mpeg4".to_string())
}

fn build_grab_args(window_title: &str, codec: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

    #[cfg(target_os = "windows")]
    {
        args.extend([
            "-f".into(),
            "gdigrab".into(),
            "-framerate".into(),
            "30".into(),
            "-i".into(),
            format!("title={}", window_title),
        ]);
    }

    #[cfg(target_os = "macos")]
    {
        // avfoundation has no per-window grab; capture the main display.
        let _ = window_title;
        args.extend([
            "-f".into(),
            "avfoundation".into(),
            "-framerate".into(),
            "30".into(),
            "-capture_cursor".into(),
            "1".into(),
            "-i".into(),
            "1:none".into(),
        ]);
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let _ = window_title;
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
        args.extend([
            "-f".into(),
            "x11grab".into(),
            "-framerate".into(),
            "30".into(),
            "-i".into(),
            display,
        ]);
    }

    args.extend([
        "-c:v".into(),
        codec.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-f".into(),
        "matroska".into(),
        "pipe:1".into(),
    ]);

    args
}

/// A running ffmpeg grab of the call window
pub struct ScreenCaptureChannel {
    child: Option<Child>,
    reader: Option<std::thread::JoinHandle<()>>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScreenCaptureChannel {
    /// Spawn the grab process and the stdout reader thread.
    pub fn start(
        ffmpeg_binary: &str,
        window_title: &str,
        codec: &str,
        error_tx: UnboundedSender<String>,
    ) -> Result<Self, RecordingError> {
        let args = build_grab_args(window_title, codec);
        tracing::info!(window = %window_title, codec = %codec, "Starting screen capture");
        tracing::debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(ffmpeg_binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    RecordingError::PermissionDenied(format!("cannot run ffmpeg: {}", e))
                }
                _ => RecordingError::Encoder(format!("failed to spawn ffmpeg: {}", e)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Encoder("ffmpeg stdout unavailable".to_string()))?;

        let chunks: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let reader_chunks = Arc::clone(&chunks);

        let reader = std::thread::Builder::new()
            .name("screen-capture-reader".to_string())
            .spawn(move || {
                let mut stdout = stdout;
                let mut buf = vec![0u8; 64 * 1024];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            let mut guard = match reader_chunks.lock() {
                                Ok(g) => g,
                                Err(poisoned) => poisoned.into_inner(),
                            };
                            guard.push(buf[..n].to_vec());
                        }
                        Err(e) => {
                            let _ = error_tx.send(format!("screen capture read error: {}", e));
                            break;
                        }
                    }
                }
            })
            .map_err(RecordingError::Io)?;

        Ok(Self {
            child: Some(child),
            reader: Some(reader),
            chunks,
        })
    }

    /// Stop the grab gracefully and return the concatenated matroska bytes.
    pub fn stop(&mut self) -> Result<Vec<u8>, RecordingError> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| RecordingError::Encoder("capture already stopped".to_string()))?;

        // Ask ffmpeg to finalize the container; fall back to kill if it
        // ignores the request.
        if let Some(stdin) = child.stdin.as_mut() {
            let _ = stdin.write_all(b"q");
        }
        drop(child.stdin.take());

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        tracing::warn!("ffmpeg did not exit after quit request, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    tracing::warn!("Failed to wait for ffmpeg: {}", e);
                    let _ = child.kill();
                    break;
                }
            }
        }

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        let guard = match self.chunks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let total: usize = guard.iter().map(|c| c.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in guard.iter() {
            bytes.extend_from_slice(chunk);
        }

        tracing::info!(bytes = bytes.len(), chunks = guard.len(), "Screen capture stopped");
        Ok(bytes)
    }
}

impl Drop for ScreenCaptureChannel {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!("Killing leftover capture process");
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
