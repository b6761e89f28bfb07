//! Recording lifecycle: state machine, capture session and audio mixing

pub mod controller;
pub mod mixer;
pub mod session;
pub mod state;

pub use controller::{ControllerConfig, RecorderHandle};
pub use session::{CaptureBackend, CaptureSessionConfig, LiveCaptureBackend};
pub use state::{RecorderEvent, RecordingError, RecordingPhase, RecordingResult, SessionInfo};
