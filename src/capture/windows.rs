//! Windows window enumeration via Win32
//!
//! Titles come from `EnumWindows` + `GetWindowTextW`; invisible and untitled
//! windows are skipped.

#![cfg(target_os = "windows")]

use crate::capture::EnumerateError;
use crate::detector::WindowSnapshot;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
};

/// List visible top-level windows with non-empty titles
pub fn list_windows() -> Result<Vec<WindowSnapshot>, EnumerateError> {
    let mut snapshots: Vec<WindowSnapshot> = Vec::new();
    let out_ptr = &mut snapshots as *mut Vec<WindowSnapshot>;

    unsafe extern "system" fn enum_windows_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let out = unsafe { &mut *(lparam.0 as *mut Vec<WindowSnapshot>) };

        if unsafe { IsWindowVisible(hwnd) }.as_bool() {
            let len = unsafe { GetWindowTextLengthW(hwnd) };
            if len > 0 {
                let mut buf = vec![0u16; len as usize + 1];
                let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
                if copied > 0 {
                    let title = String::from_utf16_lossy(&buf[..copied as usize]);
                    out.push(WindowSnapshot {
                        id: hwnd.0 as usize as u32,
                        title,
                    });
                }
            }
        }

        BOOL::from(true)
    }

    unsafe { EnumWindows(Some(enum_windows_callback), LPARAM(out_ptr as isize)) }
        .map_err(|e| EnumerateError::Platform(e.to_string()))?;

    Ok(snapshots)
}
