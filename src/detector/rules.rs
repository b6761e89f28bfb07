//! Title classification rules
//!
//! All window-title heuristics live here as ordered data so the matching
//! policy can be reviewed and tested without touching the polling machinery.
//! Every comparison is done on lowercased titles.

/// Substrings that are high-confidence evidence of an active call.
///
/// First match wins; ordered roughly by how specific the phrasing is in
/// practice ("video call" titles are the common case on desktop).
pub const STRONG_CALL_INDICATORS: &[&str] = &[
    "video call",
    "voice call",
    "audio call",
    "ongoing call",
    "in call",
    "calling",
];

/// Substrings that disqualify a title even when a strong indicator matches.
///
/// These show up in history/notification windows after a call, not during one.
pub const FALSE_POSITIVE_MARKERS: &[&str] = &["call ended", "missed call", "call history"];

/// Titles belonging to this recorder itself, excluded to avoid self-detection.
pub const OWN_WINDOW_MARKERS: &[&str] = &["callwatch", "call recorder"];

/// Whether a title should be considered at all for the given app.
pub fn is_candidate(title_lower: &str, app_lower: &str) -> bool {
    if OWN_WINDOW_MARKERS.iter().any(|m| title_lower.contains(m)) {
        return false;
    }
    title_lower.contains(app_lower) || title_lower.contains("call")
}

/// First strong call indicator contained in the title, if any.
pub fn strong_indicator(title_lower: &str) -> Option<&'static str> {
    STRONG_CALL_INDICATORS
        .iter()
        .find(|p| title_lower.contains(**p))
        .copied()
}

/// Whether the title is disqualified from counting as an active call.
///
/// A bare app-name title ("WhatsApp") is the idle main window, never a call.
pub fn is_excluded(title_lower: &str, app_lower: &str) -> bool {
    if title_lower.trim() == app_lower {
        return true;
    }
    FALSE_POSITIVE_MARKERS.iter().any(|m| title_lower.contains(m))
}

/// Best-effort participant label from a call window title.
///
/// Cosmetic metadata only: titles like "WhatsApp - Video Call with Alice"
/// yield "Alice". Locale variations make this fragile, so a None here must
/// never influence detection or recording state.
pub fn participant_label(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    let idx = lower.find(" with ")?;
    let name = title[idx + " with ".len()..].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_requires_app_or_call() {
        assert!(is_candidate("whatsapp", "whatsapp"));
        assert!(is_candidate("video call with bob", "whatsapp"));
        assert!(!is_candidate("spotify - lo-fi beats", "whatsapp"));
    }

    #[test]
    fn own_windows_never_candidates() {
        assert!(!is_candidate("callwatch", "whatsapp"));
        assert!(!is_candidate("whatsapp call recorder", "whatsapp"));
    }

    #[test]
    fn strong_indicators_match_case_insensitively_prepared_input() {
        assert_eq!(
            strong_indicator("whatsapp - video call with alice"),
            Some("video call")
        );
        assert_eq!(strong_indicator("whatsapp - calling bob..."), Some("calling"));
        assert_eq!(strong_indicator("whatsapp - chats"), None);
    }

    #[test]
    fn exclusions_beat_indicators() {
        assert!(is_excluded("whatsapp - voice call ended", "whatsapp"));
        assert!(is_excluded("missed call from carol", "whatsapp"));
        assert!(is_excluded("whatsapp", "whatsapp"));
        assert!(!is_excluded("whatsapp - video call with alice", "whatsapp"));
    }

    #[test]
    fn participant_label_is_best_effort() {
        assert_eq!(
            participant_label("WhatsApp - Video Call with Alice"),
            Some("Alice".to_string())
        );
        assert_eq!(participant_label("WhatsApp - Voice Call"), None);
        assert_eq!(participant_label("WhatsApp - Video Call with "), None);
    }
}
