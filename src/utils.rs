//! Utility helpers for safe range calculations.

use crate::errors::{MapError, Result};

/// Check that `len` bytes starting at `offset` lie inside a mapping of `total` bytes.
///
/// # Errors
///
/// Returns `MapError::OutOfBounds` when the range ends past `total` or would
/// overflow `u64`.
pub fn ensure_in_bounds(offset: u64, len: u64, total: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(MapError::OutOfBounds { offset, len, total }),
    }
}

/// Bounds-checked `start..end` indices into a mapping of `total` bytes.
///
/// # Errors
///
/// Returns `MapError::OutOfBounds` as for [`ensure_in_bounds`].
#[allow(clippy::cast_possible_truncation)]
pub fn slice_range(offset: u64, len: u64, total: u64) -> Result<(usize, usize)> {
    ensure_in_bounds(offset, len, total)?;
    // `total` is a live mapping's length, so both ends fit in usize
    Ok((offset as usize, (offset + len) as usize))
}
