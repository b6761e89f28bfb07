//! Call detection from window titles
//!
//! Window titles are the only available signal (there is no access to the
//! target app's internal call state), so detection is heuristic. The
//! strong-match-wins policy biases toward precision over recall: starting a
//! recording on a false call is far more disruptive than missing one tick.

pub mod rules;

use crate::capture::EnumerateError;
use serde::{Deserialize, Serialize};

/// One enumerated window at a polling instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    /// Platform window ID
    pub id: u32,

    /// Window title as reported by the platform
    pub title: String,
}

impl WindowSnapshot {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// The detector's per-tick verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Whether any target-app window is present
    pub found: bool,

    /// Whether a call appears active (raw, pre-debounce)
    pub in_call: bool,

    /// Title of the window that produced the verdict
    pub window_title: Option<String>,

    /// Confidence score, 0 (nothing found) to 5 (title evidence)
    pub confidence: u8,

    /// Human-readable explanation for logs and the status feed
    pub reason: String,

    /// Cosmetic participant label parsed from the title, when available
    pub participant: Option<String>,
}

impl DetectionResult {
    fn not_found(reason: impl Into<String>) -> Self {
        Self {
            found: false,
            in_call: false,
            window_title: None,
            confidence: 0,
            reason: reason.into(),
            participant: None,
        }
    }
}

/// Classifies enumerated windows into {no app, app idle, app in call}
#[derive(Debug, Clone)]
pub struct CallDetector {
    app_name: String,
    app_name_lower: String,
}

impl CallDetector {
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        let app_name_lower = app_name.to_lowercase();
        Self {
            app_name,
            app_name_lower,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Classify one tick's worth of windows.
    ///
    /// First strong match wins; no further candidates are examined after an
    /// in-call verdict.
    pub fn detect(&self, windows: &[WindowSnapshot]) -> DetectionResult {
        let candidates: Vec<&WindowSnapshot> = windows
            .iter()
            .filter(|w| rules::is_candidate(&w.title.to_lowercase(), &self.app_name_lower))
            .collect();

        if candidates.is_empty() {
            return DetectionResult::not_found("no candidate windows");
        }

        for window in &candidates {
            let title_lower = window.title.to_lowercase();
            if rules::is_excluded(&title_lower, &self.app_name_lower) {
                continue;
            }
            if let Some(indicator) = rules::strong_indicator(&title_lower) {
                return DetectionResult {
                    found: true,
                    in_call: true,
                    window_title: Some(window.title.clone()),
                    confidence: 5,
                    reason: format!("matched strong indicator \"{}\"", indicator),
                    participant: rules::participant_label(&window.title),
                };
            }
        }

        let first = candidates[0];
        DetectionResult {
            found: true,
            in_call: false,
            window_title: Some(first.title.clone()),
            confidence: 5,
            reason: "app window present, no call indicators".to_string(),
            participant: None,
        }
    }

    /// Classify, degrading enumeration failures to "not found".
    ///
    /// Errors never cross this boundary; the monitoring loop must keep
    /// ticking regardless of what the platform layer does.
    pub fn detect_or_degrade(
        &self,
        windows: Result<Vec<WindowSnapshot>, EnumerateError>,
    ) -> DetectionResult {
        match windows {
            Ok(windows) => self.detect(&windows),
            Err(e) => {
                tracing::debug!("Window enumeration failed: {}", e);
                DetectionResult::not_found(e.to_string())
            }
        }
    }
}
