//! Window enumeration and raw media capture

pub mod audio;
pub mod screen;
pub mod traits;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

pub use traits::{AudioDeviceInfo, EnumerateError, SystemWindowEnumerator, WindowEnumerator};
