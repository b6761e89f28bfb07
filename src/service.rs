//! Top-level service wiring
//!
//! Builds the monitor, controller, transcoder and store from settings and
//! exposes the operations callers drive: start/stop monitoring, status and
//! event subscriptions, and recordings management.

use crate::capture::SystemWindowEnumerator;
use crate::config::Settings;
use crate::detector::CallDetector;
use crate::monitor::{CallMonitor, MonitoringStatus};
use crate::recorder::controller::{self, ControllerConfig};
use crate::recorder::state::{RecorderEvent, RecordingPhase};
use crate::recorder::{LiveCaptureBackend, RecorderHandle};
use crate::store::{RecordingArtifact, RecordingsStore};
use crate::transcode::FfmpegTranscoder;
use crate::utils::AppResult;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// The assembled call recorder
pub struct CallRecorder {
    settings: Settings,
    monitor: Mutex<CallMonitor>,
    recorder: RecorderHandle,
    store: RecordingsStore,
}

impl CallRecorder {
    pub fn new(settings: Settings) -> AppResult<Self> {
        let recordings_dir = settings.recordings_dir();
        let store = RecordingsStore::open(recordings_dir.clone())?;

        let transcoder = FfmpegTranscoder::new(
            recordings_dir,
            settings.min_valid_file_bytes,
            settings.transcode_policy,
        );

        let recorder = controller::spawn(
            ControllerConfig::from_settings(&settings),
            Arc::new(LiveCaptureBackend),
            Arc::new(transcoder),
        );

        let monitor = CallMonitor::new(
            Arc::new(SystemWindowEnumerator),
            CallDetector::new(settings.target_app.clone()),
            settings.poll_interval(),
            settings.start_threshold,
            settings.stop_threshold,
            recorder.recording_flag(),
        );

        Ok(Self {
            settings,
            monitor: Mutex::new(monitor),
            recorder,
            store,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start (or restart) the monitoring loop.
    pub fn start_monitoring(&self) {
        let (tx, mut rx) = mpsc::channel::<MonitoringStatus>(16);
        self.monitor.lock().start(tx);

        let recorder = self.recorder.clone();
        tokio::spawn(async move {
            while let Some(status) = rx.recv().await {
                recorder.update(status).await;
            }
        });
    }

    /// Stop monitoring and wind down any in-flight recording.
    pub async fn stop_monitoring(&self) {
        self.monitor.lock().stop();
        self.recorder.stop_all().await;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().is_running()
    }

    pub fn phase(&self) -> RecordingPhase {
        self.recorder.phase()
    }

    /// True while any session holds the recording slot (any non-Idle phase).
    pub fn is_busy(&self) -> bool {
        self.recorder.phase().is_active()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<MonitoringStatus> {
        self.monitor.lock().subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RecorderEvent> {
        self.recorder.subscribe()
    }

    /// List audio input devices visible to the capture layer.
    pub fn audio_input_devices(&self) -> Vec<crate::capture::AudioDeviceInfo> {
        crate::capture::audio::get_audio_input_devices()
    }

    pub fn recordings(&self) -> AppResult<Vec<RecordingArtifact>> {
        Ok(self.store.list()?)
    }

    pub fn delete_recording(&self, name: &str) -> AppResult<()> {
        Ok(self.store.delete(name)?)
    }

    /// Full shutdown for process exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down call recorder");
        self.stop_monitoring().await;
    }
}
