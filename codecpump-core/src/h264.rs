//! H.264 Annex-B helpers
//!
//! Elementary-stream bytes arrive with NAL units delimited by start codes,
//! either 4-byte `00 00 00 01` or 3-byte `00 00 01`. The video decoder needs
//! the leading SPS and PPS units as CSD-0, then one NAL unit per submission.

use bytes::{Bytes, BytesMut};

/// Sequence parameter set
pub const NAL_TYPE_SPS: u8 = 7;
/// Picture parameter set
pub const NAL_TYPE_PPS: u8 = 8;
/// Instantaneous decoder refresh slice
pub const NAL_TYPE_IDR: u8 = 5;

/// Find the next start code at or after `from`; returns `(position, length)`
pub fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                return Some((i, 3));
            }
            if data[i + 2] == 0 && i + 4 <= data.len() && data[i + 3] == 1 {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

/// NAL unit type of a unit whose start code has been stripped
pub fn nal_unit_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|header| header & 0x1F)
}

/// Split an Annex-B buffer into `(offset, unit)` pairs, start codes stripped
pub fn nal_units(data: &[u8]) -> Vec<(usize, &[u8])> {
    let mut units = Vec::new();
    let Some((mut position, mut length)) = find_start_code(data, 0) else {
        return units;
    };
    loop {
        let body = position + length;
        match find_start_code(data, body) {
            Some((next, next_length)) => {
                units.push((position, &data[body..next]));
                position = next;
                length = next_length;
            }
            None => {
                units.push((position, &data[body..]));
                return units;
            }
        }
    }
}

/// Leading SPS and PPS units of a stream header, start codes included.
///
/// Returns `None` unless the buffer starts with parameter sets containing
/// at least one SPS and one PPS.
pub fn parameter_sets(header: &[u8]) -> Option<&[u8]> {
    let mut seen_sps = false;
    let mut seen_pps = false;
    let mut end = header.len();
    for (offset, unit) in nal_units(header) {
        match nal_unit_type(unit) {
            Some(NAL_TYPE_SPS) => seen_sps = true,
            Some(NAL_TYPE_PPS) => seen_pps = true,
            _ => {
                end = offset;
                break;
            }
        }
    }
    (seen_sps && seen_pps).then(|| &header[..end])
}

/// Reassembles complete NAL units from arbitrarily chunked stream bytes
#[derive(Debug, Default)]
pub struct AnnexBFramer {
    buffer: BytesMut,
}

impl AnnexBFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet returned
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete unit, start code included.
    ///
    /// A unit is complete once the following start code has arrived. Bytes
    /// before the first start code are discarded.
    pub fn next_unit(&mut self) -> Option<Bytes> {
        let (start, length) = find_start_code(&self.buffer, 0)?;
        if start > 0 {
            let _ = self.buffer.split_to(start);
        }
        let (next, _) = find_start_code(&self.buffer, length)?;
        Some(self.buffer.split_to(next).freeze())
    }

    /// Return the trailing unit at end of stream
    pub fn flush(&mut self) -> Option<Bytes> {
        let (start, length) = find_start_code(&self.buffer, 0)?;
        let unit = self.buffer.split_off(start);
        self.buffer.clear();
        (unit.len() > length).then(|| unit.freeze())
    }
}
