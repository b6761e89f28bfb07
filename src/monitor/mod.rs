//! Monitoring loop
//!
//! Polls the window list on a fixed interval, runs detection and debouncing,
//! and publishes one status per tick. The debounced call state feeds the
//! recording controller; raw status snapshots go to broadcast subscribers.

pub mod debounce;

use crate::capture::WindowEnumerator;
use crate::detector::CallDetector;
use debounce::Debouncer;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// One tick's worth of monitoring state
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    #[serde(rename = "whatsappRunning")]
    pub app_running: bool,
    #[serde(rename = "inCall")]
    pub in_call: bool,
    #[serde(rename = "isRecording")]
    pub is_recording: bool,
    #[serde(rename = "windowName")]
    pub window_name: Option<String>,
    pub confidence: u8,
    pub reason: String,
    #[serde(rename = "callStateChanged")]
    pub call_state_changed: bool,
    pub participant: Option<String>,
}

/// Polls windows and drives call detection
pub struct CallMonitor {
    enumerator: Arc<dyn WindowEnumerator>,
    detector: CallDetector,
    poll_interval: Duration,
    start_threshold: u32,
    stop_threshold: u32,
    recording_flag: Arc<AtomicBool>,
    status_tx: broadcast::Sender<MonitoringStatus>,
    task: Option<JoinHandle<()>>,
}

impl CallMonitor {
    pub fn new(
        enumerator: Arc<dyn WindowEnumerator>,
        detector: CallDetector,
        poll_interval: Duration,
        start_threshold: u32,
        stop_threshold: u32,
        recording_flag: Arc<AtomicBool>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            enumerator,
            detector,
            poll_interval,
            start_threshold,
            stop_threshold,
            recording_flag,
            status_tx,
            task: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitoringStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Start polling. Restart is idempotent: a prior loop is replaced by a
    /// fresh one with reset debounce state, never run alongside it.
    pub fn start(&mut self, sink: mpsc::Sender<MonitoringStatus>) {
        self.stop();

        let enumerator = Arc::clone(&self.enumerator);
        let detector = self.detector.clone();
        let poll_interval = self.poll_interval;
        let recording_flag = Arc::clone(&self.recording_flag);
        let status_tx = self.status_tx.clone();
        let mut debouncer = Debouncer::new(self.start_threshold, self.stop_threshold);

        tracing::info!(
            poll_ms = poll_interval.as_millis() as u64,
            "Starting call monitoring"
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let windows = enumerator.enumerate().await;
                let detection = detector.detect_or_degrade(windows);

                let was_in_call = debouncer.stable_in_call();
                let in_call = debouncer.update(detection.in_call);
                let changed = in_call != was_in_call;

                if changed {
                    tracing::info!(in_call, window = ?detection.window_title, "Call state changed");
                }

                let status = MonitoringStatus {
                    app_running: detection.found,
                    in_call,
                    is_recording: recording_flag.load(Ordering::Acquire),
                    window_name: detection.window_title,
                    confidence: detection.confidence,
                    reason: detection.reason,
                    call_state_changed: changed,
                    participant: detection.participant,
                };

                let _ = status_tx.send(status.clone());
                if sink.send(status).await.is_err() {
                    tracing::debug!("Status sink closed, stopping monitor loop");
                    break;
                }
            }
        }));
    }

    /// Stop polling. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::info!("Stopping call monitoring");
            task.abort();
        }
    }
}

impl Drop for CallMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EnumerateError;
    use crate::detector::WindowSnapshot;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Replays a scripted sequence of window lists, then repeats the last.
    struct ScriptedEnumerator {
        frames: Mutex<Vec<Result<Vec<WindowSnapshot>, EnumerateError>>>,
        last: Mutex<Result<Vec<WindowSnapshot>, EnumerateError>>,
    }

    impl ScriptedEnumerator {
        fn new(frames: Vec<Result<Vec<WindowSnapshot>, EnumerateError>>) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(frames),
                last: Mutex::new(Ok(Vec::new())),
            })
        }
    }

    #[async_trait]
    impl WindowEnumerator for ScriptedEnumerator {
        async fn enumerate(&self) -> Result<Vec<WindowSnapshot>, EnumerateError> {
            let mut frames = self.frames.lock();
            if frames.is_empty() {
                self.last.lock().clone()
            } else {
                let frame = frames.remove(0);
                *self.last.lock() = frame.clone();
                frame
            }
        }
    }

    fn call_frame() -> Result<Vec<WindowSnapshot>, EnumerateError> {
        Ok(vec![WindowSnapshot::new(1, "WhatsApp Video call with Dana")])
    }

    fn idle_frame() -> Result<Vec<WindowSnapshot>, EnumerateError> {
        Ok(vec![WindowSnapshot::new(1, "WhatsApp")])
    }

    fn monitor(enumerator: Arc<dyn WindowEnumerator>) -> CallMonitor {
        CallMonitor::new(
            enumerator,
            CallDetector::new("WhatsApp"),
            Duration::from_millis(5),
            3,
            2,
            Arc::new(AtomicBool::new(false)),
        )
    }

    async fn recv(rx: &mut mpsc::Receiver<MonitoringStatus>) -> MonitoringStatus {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for status")
            .expect("status channel closed")
    }

    #[tokio::test]
    async fn confirms_call_after_start_threshold_ticks() {
        let enumerator = ScriptedEnumerator::new(vec![call_frame(), call_frame(), call_frame()]);
        let mut mon = monitor(enumerator);
        let (tx, mut rx) = mpsc::channel(16);
        mon.start(tx);

        let first = recv(&mut rx).await;
        assert!(first.app_running);
        assert!(!first.in_call);
        assert!(!first.call_state_changed);

        let second = recv(&mut rx).await;
        assert!(!second.in_call);

        let third = recv(&mut rx).await;
        assert!(third.in_call);
        assert!(third.call_state_changed);
        assert_eq!(third.window_name.as_deref(), Some("WhatsApp Video call with Dana"));
        assert_eq!(third.participant.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn ends_call_after_stop_threshold_ticks() {
        let enumerator = ScriptedEnumerator::new(vec![
            call_frame(),
            call_frame(),
            call_frame(),
            idle_frame(),
            idle_frame(),
        ]);
        let mut mon = monitor(enumerator);
        let (tx, mut rx) = mpsc::channel(16);
        mon.start(tx);

        let mut statuses = Vec::new();
        for _ in 0..5 {
            statuses.push(recv(&mut rx).await);
        }
        assert!(statuses[2].in_call);
        assert!(statuses[3].in_call, "one idle tick must not end the call");
        assert!(!statuses[4].in_call);
        assert!(statuses[4].call_state_changed);
    }

    #[tokio::test]
    async fn enumeration_failure_reads_as_no_call() {
        let enumerator =
            ScriptedEnumerator::new(vec![Err(EnumerateError::Platform("boom".to_string()))]);
        let mut mon = monitor(enumerator);
        let (tx, mut rx) = mpsc::channel(16);
        mon.start(tx);

        let status = recv(&mut rx).await;
        assert!(!status.app_running);
        assert!(!status.in_call);
        assert_eq!(status.confidence, 0);
    }

    #[tokio::test]
    async fn restart_replaces_the_running_loop() {
        let enumerator = ScriptedEnumerator::new(vec![call_frame(), call_frame()]);
        let mut mon = monitor(enumerator);

        let (tx1, mut rx1) = mpsc::channel(16);
        mon.start(tx1);
        let _ = recv(&mut rx1).await;
        let _ = recv(&mut rx1).await;
        assert!(mon.is_running());

        // Second start replaces the first loop; debounce counting restarts
        let (tx2, mut rx2) = mpsc::channel(16);
        mon.start(tx2);
        let status = recv(&mut rx2).await;
        assert!(!status.in_call, "fresh loop must re-count from zero");
        assert!(mon.is_running());

        // The first loop's sink closes once it is replaced; drain any
        // statuses buffered before the swap.
        let mut closed = false;
        for _ in 0..20 {
            match tokio::time::timeout(Duration::from_millis(200), rx1.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        assert!(closed, "replaced loop kept its sink open");
        mon.stop();
    }
}
