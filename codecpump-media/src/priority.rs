//! Capture thread scheduling priority

use tracing::debug;
#[cfg(any(target_os = "linux", target_os = "android"))]
use tracing::warn;

/// Nice value used for the capture thread, matching urgent-audio priority
pub const URGENT_AUDIO_NICE: i32 = -16;

/// Raise the calling thread's scheduling priority.
///
/// Returns whether the priority was changed. Failure (usually missing
/// permission) is logged and otherwise ignored.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn elevate_current_thread() -> bool {
    // with PRIO_PROCESS and who = 0 Linux applies the nice value to the calling thread only
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, URGENT_AUDIO_NICE) };
    if result == 0 {
        debug!(nice = URGENT_AUDIO_NICE, "Capture thread priority elevated");
        true
    } else {
        warn!(
            error = %std::io::Error::last_os_error(),
            "Could not elevate capture thread priority"
        );
        false
    }
}

/// Raise the calling thread's scheduling priority.
///
/// Not supported on this platform; always returns `false`.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn elevate_current_thread() -> bool {
    debug!("Thread priority elevation unsupported on this platform");
    false
}
