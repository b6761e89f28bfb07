//! callwatch: automatic call recorder for desktop messaging apps
//!
//! Watches window titles for an active call, confirms it through a debounce
//! window, and records screen plus mixed audio for the duration of the call.

pub mod capture;
pub mod config;
pub mod detector;
pub mod monitor;
pub mod recorder;
pub mod service;
pub mod store;
pub mod transcode;
pub mod utils;

pub use config::Settings;
pub use service::CallRecorder;
pub use utils::{AppError, AppResult};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber. Call once at startup.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("callwatch=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("callwatch v{} starting", env!("CARGO_PKG_VERSION"));
}
