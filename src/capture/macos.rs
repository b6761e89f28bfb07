//! macOS window enumeration via CGWindowList
//!
//! Requires the screen-recording permission for window names to be populated;
//! without it CGWindowList returns entries with empty names, which degrade to
//! "app not found" upstream.

#![cfg(target_os = "macos")]

use crate::capture::EnumerateError;
use crate::detector::WindowSnapshot;
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};

/// List on-screen windows with non-empty names
pub fn list_windows() -> Result<Vec<WindowSnapshot>, EnumerateError> {
    let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
    let info = copy_window_info(options, kCGNullWindowID)
        .ok_or_else(|| EnumerateError::Platform("CGWindowListCopyWindowInfo failed".into()))?;

    let name_key = CFString::from_static_string("kCGWindowName");
    let number_key = CFString::from_static_string("kCGWindowNumber");

    let mut snapshots = Vec::new();
    for item in info.iter() {
        let dict: CFDictionary<CFString, CFType> =
            unsafe { CFDictionary::wrap_under_get_rule(*item as _) };

        let title = match dict.find(&name_key) {
            Some(value) => match value.downcast::<CFString>() {
                Some(s) => s.to_string(),
                None => continue,
            },
            None => continue,
        };
        if title.is_empty() {
            continue;
        }

        let id = dict
            .find(&number_key)
            .and_then(|v| v.downcast::<CFNumber>())
            .and_then(|n| n.to_i64())
            .unwrap_or(0) as u32;

        snapshots.push(WindowSnapshot { id, title });
    }

    Ok(snapshots)
}
