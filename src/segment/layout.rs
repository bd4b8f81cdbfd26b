//! Binary layout of the shared screen segment
//!
//! Reader processes are written independently, possibly in another
//! systems language, and parse the segment by following this layout
//! alone. There is no in-band versioning: compatibility depends on both
//! sides agreeing on these offsets exactly. All multi-byte fields are
//! native-endian u32; readers run on the same host as the writer.
//!
//! ```text
//! offset  size  field
//!      0     4  columns
//!      4     4  rows
//!      8     4  cursor row
//!     12     4  cursor column
//!     16   ...  rows x columns cell records (row-major), CELL_SIZE each
//! ```
//!
//! Cell record:
//!
//! ```text
//! offset  size  field
//!      0     4  glyph code point
//!      4     1  foreground red
//!      5     1  foreground green
//!      6     1  foreground blue
//!      7     1  background red
//!      8     1  background green
//!      9     1  background blue
//!     10     1  flags (bit 0 blink, bit 1 underline)
//!     11     1  reserved (zero)
//! ```

use crate::error::{MirrorError, Result};
use crate::segment::cell::CELL_SIZE;

pub const HEADER_SIZE: usize = 16;

pub const OFFSET_COLUMNS: usize = 0;
pub const OFFSET_ROWS: usize = 4;
pub const OFFSET_CURSOR_ROW: usize = 8;
pub const OFFSET_CURSOR_COLUMN: usize = 12;

/// Total byte size of a segment with the given geometry.
///
/// Rejects zero dimensions and geometries whose byte size overflows.
pub fn segment_size(columns: u32, rows: u32) -> Result<usize> {
    if columns == 0 || rows == 0 {
        return Err(MirrorError::Resource(format!(
            "segment geometry must be non-zero, got {}x{}",
            columns, rows
        )));
    }
    (columns as usize)
        .checked_mul(rows as usize)
        .and_then(|cells| cells.checked_mul(CELL_SIZE))
        .and_then(|body| body.checked_add(HEADER_SIZE))
        .ok_or_else(|| {
            MirrorError::Resource(format!("segment geometry {}x{} overflows", columns, rows))
        })
}

/// Reads one u32 header field.
pub fn get_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

/// Writes one u32 header field.
pub fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}
