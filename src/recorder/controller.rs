//! Recording lifecycle controller
//!
//! A single task owns the lifecycle state machine and serializes every
//! transition through its command queue, so call updates from the monitor,
//! timer expirations and capture completions can never race. A generation
//! counter stamps each attempt; events from a cancelled attempt carry a
//! stale stamp and are dropped on arrival.

use crate::monitor::MonitoringStatus;
use crate::recorder::session::{ActiveCapture, CaptureBackend, CaptureSessionConfig, RawMedia};
use crate::recorder::state::{RecorderEvent, RecordingPhase, RecordingResult, SessionInfo};
use crate::transcode::{Transcode, TranscodeOutcome};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Controller tuning derived from settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub app_name: String,
    pub auto_record: bool,
    pub record_delay: Duration,
    pub save_wait_timeout: Duration,
    pub capture: CaptureSessionConfig,
}

impl ControllerConfig {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            app_name: settings.target_app.clone(),
            auto_record: settings.auto_record,
            record_delay: settings.record_delay(),
            save_wait_timeout: settings.save_wait_timeout(),
            capture: CaptureSessionConfig {
                ffmpeg_binary: "ffmpeg".to_string(),
                window_title: String::new(),
                video_codec_preference: settings.video_codec_preference.clone(),
                system_audio_gain: settings.system_audio_gain,
                microphone_gain: settings.microphone_gain,
                require_microphone: settings.require_microphone,
            },
        }
    }
}

enum ControllerCommand {
    Status(MonitoringStatus),
    StopAll { ack: oneshot::Sender<()> },
}

enum InternalEvent {
    DelayElapsed {
        attempt: u64,
    },
    Acquired {
        attempt: u64,
        capture: Box<dyn ActiveCapture>,
    },
    AcquireFailed {
        attempt: u64,
        error: String,
    },
    CaptureStopped {
        result: RecordingResult<RawMedia>,
    },
    SaveFinished {
        result: Result<TranscodeOutcome, String>,
    },
    StopWaitExpired {
        attempt: u64,
    },
}

/// Handle for driving the controller task
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<ControllerCommand>,
    phase: Arc<RwLock<RecordingPhase>>,
    recording_flag: Arc<AtomicBool>,
    events: broadcast::Sender<RecorderEvent>,
}

impl RecorderHandle {
    /// Feed the latest debounced call status into the state machine.
    pub async fn update(&self, status: MonitoringStatus) {
        let _ = self.commands.send(ControllerCommand::Status(status)).await;
    }

    /// Stop any in-flight recording and wait until the save pipeline has
    /// drained (bounded by the controller's save-wait timeout).
    pub async fn stop_all(&self) {
        let (ack, done) = oneshot::channel();
        if self
            .commands
            .send(ControllerCommand::StopAll { ack })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        *self.phase.read()
    }

    /// Shared flag the monitor reads when composing status updates
    pub fn recording_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recording_flag)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }
}

/// Spawn the controller task and return its handle.
pub fn spawn(
    config: ControllerConfig,
    backend: Arc<dyn CaptureBackend>,
    transcoder: Arc<dyn Transcode>,
) -> RecorderHandle {
    let (commands_tx, commands_rx) = mpsc::channel(64);
    let (events_tx, _) = broadcast::channel(64);
    let phase = Arc::new(RwLock::new(RecordingPhase::Idle));
    let recording_flag = Arc::new(AtomicBool::new(false));

    let handle = RecorderHandle {
        commands: commands_tx,
        phase: Arc::clone(&phase),
        recording_flag: Arc::clone(&recording_flag),
        events: events_tx.clone(),
    };

    let controller = Controller {
        config,
        backend,
        transcoder,
        phase_mirror: phase,
        recording_flag,
        events: events_tx,
        phase: RecordingPhase::Idle,
        attempt: 0,
        call_active: false,
        capture: None,
        session: None,
        pending_stop_acks: Vec::new(),
    };

    tokio::spawn(controller.run(commands_rx));
    handle
}

struct Controller {
    config: ControllerConfig,
    backend: Arc<dyn CaptureBackend>,
    transcoder: Arc<dyn Transcode>,
    phase_mirror: Arc<RwLock<RecordingPhase>>,
    recording_flag: Arc<AtomicBool>,
    events: broadcast::Sender<RecorderEvent>,
    phase: RecordingPhase,
    /// Generation counter; bumping it invalidates in-flight timers and
    /// acquisitions from earlier attempts
    attempt: u64,
    call_active: bool,
    capture: Option<Box<dyn ActiveCapture>>,
    session: Option<SessionInfo>,
    pending_stop_acks: Vec<oneshot::Sender<()>>,
}

impl Controller {
    async fn run(mut self, mut commands: mpsc::Receiver<ControllerCommand>) {
        let (internal_tx, mut internal_rx) = mpsc::unbounded_channel();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<String>();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(ControllerCommand::Status(status)) => {
                        self.on_status(status, &internal_tx);
                    }
                    Some(ControllerCommand::StopAll { ack }) => {
                        self.on_stop_all(ack, &internal_tx);
                    }
                    None => break,
                },
                Some(event) = internal_rx.recv() => {
                    self.on_internal(event, &internal_tx, &error_tx);
                }
                Some(message) = error_rx.recv() => {
                    self.on_stream_error(message, &internal_tx);
                }
            }
        }

        tracing::debug!("Recording controller stopped");
    }

    fn set_phase(&mut self, phase: RecordingPhase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "Phase transition");
        }
        self.phase = phase;
        *self.phase_mirror.write() = phase;
        self.recording_flag
            .store(phase == RecordingPhase::Recording, Ordering::Release);
    }

    fn emit(&self, event: RecorderEvent) {
        let _ = self.events.send(event);
    }

    fn session(&self) -> SessionInfo {
        self.session
            .clone()
            .unwrap_or_else(|| SessionInfo::new(String::new(), None))
    }

    /// Return to Idle, releasing the session and flushing stop waiters.
    fn settle_idle(&mut self) {
        self.capture = None;
        self.session = None;
        self.set_phase(RecordingPhase::Idle);
        for ack in self.pending_stop_acks.drain(..) {
            let _ = ack.send(());
        }
    }

    fn on_status(
        &mut self,
        status: MonitoringStatus,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
    ) {
        self.call_active = status.in_call;

        match self.phase {
            RecordingPhase::Idle => {
                if status.in_call && self.config.auto_record {
                    self.schedule(status, internal_tx);
                }
            }
            RecordingPhase::Scheduled => {
                if !status.in_call {
                    tracing::info!("Call ended before delayed start, cancelling");
                    self.attempt += 1;
                    self.settle_idle();
                }
            }
            RecordingPhase::Acquiring => {
                // call_active already updated; a stale acquisition is
                // discarded when its Acquired event lands
            }
            RecordingPhase::Recording => {
                if !status.in_call {
                    self.begin_stop(internal_tx);
                }
            }
            RecordingPhase::Stopping | RecordingPhase::Saving => {}
        }
    }

    fn schedule(
        &mut self,
        status: MonitoringStatus,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
    ) {
        let window_title = status.window_name.unwrap_or_default();
        let session = SessionInfo::new(window_title.clone(), status.participant.clone());
        tracing::info!(
            window = %window_title,
            delay_ms = self.config.record_delay.as_millis() as u64,
            "Call confirmed, scheduling recording"
        );

        self.attempt += 1;
        self.session = Some(session.clone());
        self.set_phase(RecordingPhase::Scheduled);
        self.emit(RecorderEvent::Scheduled {
            session,
            delay_ms: self.config.record_delay.as_millis() as u64,
        });

        let attempt = self.attempt;
        let delay = self.config.record_delay;
        let tx = internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(InternalEvent::DelayElapsed { attempt });
        });
    }

    fn begin_acquire(
        &mut self,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
        error_tx: &mpsc::UnboundedSender<String>,
    ) {
        self.set_phase(RecordingPhase::Acquiring);

        let mut capture_config = self.config.capture.clone();
        capture_config.window_title = self
            .session
            .as_ref()
            .map(|s| s.window_title.clone())
            .unwrap_or_default();

        let attempt = self.attempt;
        let backend = Arc::clone(&self.backend);
        let tx = internal_tx.clone();
        let err_tx = error_tx.clone();
        tokio::spawn(async move {
            match backend.acquire(capture_config, err_tx).await {
                Ok(capture) => {
                    let _ = tx.send(InternalEvent::Acquired { attempt, capture });
                }
                Err(e) => {
                    let _ = tx.send(InternalEvent::AcquireFailed {
                        attempt,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn begin_stop(&mut self, internal_tx: &mpsc::UnboundedSender<InternalEvent>) {
        let Some(capture) = self.capture.take() else {
            self.settle_idle();
            return;
        };
        tracing::info!("Stopping recording");
        self.set_phase(RecordingPhase::Stopping);

        let tx = internal_tx.clone();
        tokio::spawn(async move {
            let result = capture.finish().await;
            let _ = tx.send(InternalEvent::CaptureStopped { result });
        });
    }

    /// Hand the blob to the transcoder and await its actual result. Long
    /// saves run to completion; only stop waiters are time-bounded, via
    /// `arm_stop_wait`.
    fn begin_save(&mut self, media: RawMedia, internal_tx: &mpsc::UnboundedSender<InternalEvent>) {
        self.set_phase(RecordingPhase::Saving);
        self.emit(RecorderEvent::Stopped {
            session: self.session(),
        });

        if media.video_only {
            tracing::warn!("Saving video-only recording");
        }

        let stem = crate::store::output_stem(&self.config.app_name);
        let transcoder = Arc::clone(&self.transcoder);
        let tx = internal_tx.clone();
        tokio::spawn(async move {
            let result = transcoder
                .transcode(media.bytes, &stem)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(InternalEvent::SaveFinished { result });
        });
    }

    /// Bound a pending stop request: if the save pipeline is still busy when
    /// the save-wait elapses, release the waiters and let the save finish in
    /// the background.
    fn arm_stop_wait(&self, internal_tx: &mpsc::UnboundedSender<InternalEvent>) {
        let save_wait = self.config.save_wait_timeout;
        let attempt = self.attempt;
        let tx = internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(save_wait).await;
            let _ = tx.send(InternalEvent::StopWaitExpired { attempt });
        });
    }

    fn on_internal(
        &mut self,
        event: InternalEvent,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
        error_tx: &mpsc::UnboundedSender<String>,
    ) {
        match event {
            InternalEvent::DelayElapsed { attempt } => {
                if attempt != self.attempt || self.phase != RecordingPhase::Scheduled {
                    return;
                }
                if !self.call_active {
                    self.settle_idle();
                    return;
                }
                self.begin_acquire(internal_tx, error_tx);
            }
            InternalEvent::Acquired { attempt, capture } => {
                if attempt != self.attempt || self.phase != RecordingPhase::Acquiring {
                    // A newer attempt superseded this one; release its devices.
                    tokio::spawn(async move {
                        let _ = capture.finish().await;
                    });
                    return;
                }
                if !self.call_active {
                    tracing::info!("Call ended during acquisition, discarding capture");
                    tokio::spawn(async move {
                        let _ = capture.finish().await;
                    });
                    self.settle_idle();
                    return;
                }
                tracing::info!("Recording started");
                self.capture = Some(capture);
                self.set_phase(RecordingPhase::Recording);
                self.emit(RecorderEvent::Started {
                    session: self.session(),
                });
            }
            InternalEvent::AcquireFailed { attempt, error } => {
                if attempt != self.attempt {
                    return;
                }
                tracing::error!("Failed to acquire capture: {}", error);
                self.emit(RecorderEvent::Failed {
                    session: self.session(),
                    reason: error,
                });
                self.settle_idle();
            }
            InternalEvent::CaptureStopped { result } => match result {
                Ok(media) => self.begin_save(media, internal_tx),
                Err(e) => {
                    // Arrives in Stopping normally, or in Recording when the
                    // capture stream died underneath us.
                    self.capture = None;
                    tracing::error!("Capture ended without usable media: {}", e);
                    self.emit(RecorderEvent::Failed {
                        session: self.session(),
                        reason: e.to_string(),
                    });
                    self.settle_idle();
                }
            },
            InternalEvent::SaveFinished { result } => {
                match result {
                    Ok(outcome) => {
                        tracing::info!(
                            path = %outcome.path.display(),
                            size_bytes = outcome.size_bytes,
                            fell_back = outcome.fell_back,
                            "Recording saved"
                        );
                        self.emit(RecorderEvent::Saved {
                            session: self.session(),
                            path: outcome.path.to_string_lossy().into_owned(),
                            size_bytes: outcome.size_bytes,
                            fell_back: outcome.fell_back,
                        });
                    }
                    Err(reason) => {
                        tracing::error!("Save failed: {}", reason);
                        self.emit(RecorderEvent::Failed {
                            session: self.session(),
                            reason,
                        });
                    }
                }
                self.settle_idle();
            }
            InternalEvent::StopWaitExpired { attempt } => {
                if attempt == self.attempt && !self.pending_stop_acks.is_empty() {
                    tracing::warn!(
                        "Save still running past the stop-wait bound, releasing stop waiters"
                    );
                    for ack in self.pending_stop_acks.drain(..) {
                        let _ = ack.send(());
                    }
                }
            }
        }
    }

    fn on_stream_error(
        &mut self,
        message: String,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
    ) {
        tracing::error!("Capture stream error: {}", message);
        if self.phase == RecordingPhase::Recording {
            self.begin_stop(internal_tx);
        }
    }

    fn on_stop_all(
        &mut self,
        ack: oneshot::Sender<()>,
        internal_tx: &mpsc::UnboundedSender<InternalEvent>,
    ) {
        self.call_active = false;
        match self.phase {
            RecordingPhase::Idle => {
                let _ = ack.send(());
            }
            RecordingPhase::Scheduled => {
                self.attempt += 1;
                self.pending_stop_acks.push(ack);
                self.settle_idle();
            }
            RecordingPhase::Acquiring => {
                // Resolved when the Acquired event lands and is discarded
                self.pending_stop_acks.push(ack);
                self.arm_stop_wait(internal_tx);
            }
            RecordingPhase::Recording => {
                self.pending_stop_acks.push(ack);
                self.begin_stop(internal_tx);
                self.arm_stop_wait(internal_tx);
            }
            RecordingPhase::Stopping | RecordingPhase::Saving => {
                self.pending_stop_acks.push(ack);
                self.arm_stop_wait(internal_tx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecordingError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn status(in_call: bool) -> MonitoringStatus {
        MonitoringStatus {
            app_running: true,
            in_call,
            is_recording: false,
            window_name: in_call.then(|| "WhatsApp Video call".to_string()),
            confidence: 5,
            reason: String::new(),
            call_state_changed: false,
            participant: None,
        }
    }

    fn test_config() -> ControllerConfig {
        ControllerConfig {
            app_name: "WhatsApp".to_string(),
            auto_record: true,
            record_delay: Duration::from_millis(20),
            save_wait_timeout: Duration::from_millis(200),
            capture: CaptureSessionConfig {
                ffmpeg_binary: "ffmpeg".to_string(),
                window_title: String::new(),
                video_codec_preference: vec!["libx264".to_string()],
                system_audio_gain: 2.0,
                microphone_gain: 1.5,
                require_microphone: false,
            },
        }
    }

    struct MockCapture;

    #[async_trait]
    impl ActiveCapture for MockCapture {
        async fn finish(self: Box<Self>) -> RecordingResult<RawMedia> {
            Ok(RawMedia {
                bytes: vec![7u8; 2000],
                video_only: false,
            })
        }
    }

    struct MockBackend {
        acquires: AtomicUsize,
        fail_with: Option<fn() -> RecordingError>,
    }

    impl MockBackend {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                acquires: AtomicUsize::new(0),
                fail_with: None,
            })
        }

        fn failing(f: fn() -> RecordingError) -> Arc<Self> {
            Arc::new(Self {
                acquires: AtomicUsize::new(0),
                fail_with: Some(f),
            })
        }
    }

    #[async_trait]
    impl CaptureBackend for MockBackend {
        async fn acquire(
            &self,
            _config: CaptureSessionConfig,
            _error_tx: mpsc::UnboundedSender<String>,
        ) -> RecordingResult<Box<dyn ActiveCapture>> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(f) => Err(f()),
                None => Ok(Box::new(MockCapture)),
            }
        }
    }

    struct MockTranscoder {
        delay: Duration,
    }

    impl MockTranscoder {
        fn instant() -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::ZERO,
            })
        }

        fn taking(delay: Duration) -> Arc<Self> {
            Arc::new(Self { delay })
        }
    }

    #[async_trait]
    impl Transcode for MockTranscoder {
        async fn transcode(
            &self,
            intermediate: Vec<u8>,
            target_stem: &str,
        ) -> Result<TranscodeOutcome, crate::transcode::TranscodeError> {
            tokio::time::sleep(self.delay).await;
            Ok(TranscodeOutcome {
                path: std::path::PathBuf::from(format!("{}.mp4", target_stem)),
                size_bytes: intermediate.len() as u64,
                fell_back: false,
            })
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<RecorderEvent>) -> RecorderEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn full_lifecycle_saves_recording() {
        let backend = MockBackend::ok();
        let handle = spawn(
            test_config(),
            backend.clone(),
            MockTranscoder::instant(),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Started { .. }
        ));
        assert_eq!(handle.phase(), RecordingPhase::Recording);
        assert!(handle.recording_flag().load(Ordering::Acquire));

        handle.update(status(false)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Stopped { .. }
        ));
        match next_event(&mut events).await {
            RecorderEvent::Saved { path, size_bytes, .. } => {
                assert!(path.contains("WhatsApp_Call_"));
                assert_eq!(size_bytes, 2000);
            }
            other => panic!("expected Saved, got {:?}", other),
        }
        assert_eq!(handle.phase(), RecordingPhase::Idle);
        assert!(!handle.recording_flag().load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn repeated_call_updates_schedule_once() {
        let backend = MockBackend::ok();
        let handle = spawn(
            test_config(),
            backend.clone(),
            MockTranscoder::instant(),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        handle.update(status(true)).await;
        handle.update(status(true)).await;

        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Started { .. }
        ));
        // One attempt only, despite three in-call updates
        assert_eq!(backend.acquires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn call_ending_during_delay_cancels_without_acquiring() {
        let backend = MockBackend::ok();
        let handle = spawn(
            test_config(),
            backend.clone(),
            MockTranscoder::instant(),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        handle.update(status(false)).await;

        // Wait out the delay; acquisition must never fire
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.acquires.load(Ordering::SeqCst), 0);
        assert_eq!(handle.phase(), RecordingPhase::Idle);

        // The slot is free for the next call
        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
    }

    #[tokio::test]
    async fn acquisition_failure_releases_the_session() {
        let backend = MockBackend::failing(|| RecordingError::NoAudioSource);
        let handle = spawn(
            test_config(),
            backend.clone(),
            MockTranscoder::instant(),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        match next_event(&mut events).await {
            RecorderEvent::Failed { reason, .. } => {
                assert!(reason.contains("audio"), "reason = {}", reason);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(handle.phase(), RecordingPhase::Idle);

        // End the old call, then a fresh call schedules again
        handle.update(status(false)).await;
        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.acquires.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("second acquire never fired");
    }

    #[tokio::test]
    async fn stop_all_during_save_is_bounded_by_the_wait_timeout() {
        let handle = spawn(
            test_config(),
            MockBackend::ok(),
            MockTranscoder::taking(Duration::from_secs(3600)),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Started { .. }
        ));

        handle.update(status(false)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Stopped { .. }
        ));

        // Save hangs; stop_all must still resolve once the wait expires,
        // while the save itself stays in flight and keeps the slot busy.
        let started = std::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(2), handle.stop_all())
            .await
            .expect("stop_all blocked past the save-wait bound");
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(handle.phase(), RecordingPhase::Saving);
        assert!(handle.phase().is_active());

        // The unfinished save still excludes new sessions
        handle.update(status(true)).await;
        handle.update(status(true)).await;
        let quiet = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(quiet.is_err(), "no events may fire while the save is in flight");
        assert_eq!(handle.phase(), RecordingPhase::Saving);
    }

    #[tokio::test]
    async fn slow_save_without_stop_request_still_saves() {
        // Transcode takes twice the save-wait; with no stop pending it must
        // be awaited to its real result, not abandoned.
        let handle = spawn(
            test_config(),
            MockBackend::ok(),
            MockTranscoder::taking(Duration::from_millis(400)),
        );
        let mut events = handle.subscribe();

        handle.update(status(true)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Scheduled { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Started { .. }
        ));

        handle.update(status(false)).await;
        assert!(matches!(
            next_event(&mut events).await,
            RecorderEvent::Stopped { .. }
        ));
        match next_event(&mut events).await {
            RecorderEvent::Saved { size_bytes, .. } => assert_eq!(size_bytes, 2000),
            other => panic!("expected Saved, got {:?}", other),
        }
        assert_eq!(handle.phase(), RecordingPhase::Idle);
        assert!(!handle.phase().is_active());
    }

    #[tokio::test]
    async fn stop_all_while_idle_returns_immediately() {
        let handle = spawn(
            test_config(),
            MockBackend::ok(),
            MockTranscoder::instant(),
        );
        tokio::time::timeout(Duration::from_millis(100), handle.stop_all())
            .await
            .expect("idle stop_all should not block");
    }
}
