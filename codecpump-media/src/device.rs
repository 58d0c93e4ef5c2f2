//! Audio device contracts
//!
//! Capture and playback talk to the platform through these traits. Opening
//! a device takes a buffer size; [`open_with_fallback`] implements the
//! "preferred size, then the device minimum" retry both sides use.

use crate::error::{MediaError, MediaResult};
use tracing::{debug, warn};

/// PCM 16-bit input device owned by a capture session
pub trait AudioInputDevice: Send {
    /// Begin delivering samples
    fn start_recording(&mut self) -> MediaResult<()>;

    /// Fill `buffer` with samples.
    ///
    /// Returns the number of bytes read; zero or a negative value signals end
    /// of data or a device error code.
    fn read(&mut self, buffer: &mut [u8]) -> isize;

    /// Stop delivering samples
    fn stop(&mut self) -> MediaResult<()>;

    /// Free the device
    fn release(&mut self) -> MediaResult<()>;
}

/// Opens [`AudioInputDevice`]s
pub trait AudioInputFactory: Send + Sync {
    /// Smallest buffer the device accepts for these parameters
    fn min_buffer_size(&self, sample_rate: u32, channel_count: u8) -> MediaResult<usize>;

    /// Open a device with a buffer of `buffer_bytes`
    fn open(
        &self,
        sample_rate: u32,
        channel_count: u8,
        buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioInputDevice>>;
}

/// PCM 16-bit output device owned by a playback sink
pub trait AudioOutputDevice: Send {
    /// Rate the device was opened with
    fn sample_rate(&self) -> u32;

    /// Channel count the device was opened with
    fn channel_count(&self) -> u8;

    /// Write `data`; returns the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> MediaResult<usize>;

    /// Start or resume output
    fn play(&mut self) -> MediaResult<()>;

    /// Pause output, keeping queued samples
    fn pause(&mut self) -> MediaResult<()>;

    /// Drop queued samples
    fn flush(&mut self) -> MediaResult<()>;

    /// Stop output
    fn stop(&mut self) -> MediaResult<()>;

    /// Free the device
    fn release(&mut self) -> MediaResult<()>;
}

/// Opens [`AudioOutputDevice`]s
pub trait AudioOutputFactory: Send + Sync {
    /// Smallest buffer the device accepts for these parameters
    fn min_buffer_size(&self, sample_rate: u32, channel_count: u8) -> MediaResult<usize>;

    /// Open a device with a buffer of `buffer_bytes`
    fn open(
        &self,
        sample_rate: u32,
        channel_count: u8,
        buffer_bytes: usize,
    ) -> MediaResult<Box<dyn AudioOutputDevice>>;
}

/// Open a device with `max(preferred, minimum)` bytes, retrying once with
/// exactly `minimum` if that is rejected.
///
/// Returns the device and the buffer size it was opened with.
pub fn open_with_fallback<D>(
    device: &str,
    preferred: usize,
    minimum: usize,
    mut open: impl FnMut(usize) -> MediaResult<D>,
) -> MediaResult<(D, usize)> {
    let size = preferred.max(minimum);
    match open(size) {
        Ok(opened) => Ok((opened, size)),
        Err(first) if size != minimum => {
            warn!(
                device,
                size,
                minimum,
                error = %first,
                "Device rejected buffer size, retrying with the minimum"
            );
            open(minimum).map(|opened| (opened, minimum)).map_err(|retry| {
                MediaError::DeviceUnavailable {
                    device: device.to_string(),
                    reason: retry.to_string(),
                }
            })
        }
        Err(first) => {
            debug!(device, size, error = %first, "Device rejected its minimum buffer size");
            Err(MediaError::DeviceUnavailable {
                device: device.to_string(),
                reason: first.to_string(),
            })
        }
    }
}
