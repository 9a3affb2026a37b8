//! Sizing policy: reconcile the requested length with the live file size.

/// Outcome of the sizing policy for one request.
///
/// The file is only ever grown: a request below the current size maps a
/// prefix and leaves the file alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePlan {
    /// Size of the backing store before the request.
    pub current: u64,
    /// Length of the mapping to establish.
    pub final_len: u64,
}

impl SizePlan {
    /// Decide the final length.
    #[must_use]
    pub fn new(current: u64, requested: Option<u64>) -> Self {
        let final_len = requested.unwrap_or(current);
        Self { current, final_len }
    }

    /// Whether the backing store must be grown (and zero-filled) before mapping.
    #[must_use]
    pub fn needs_extension(&self) -> bool {
        self.final_len > self.current
    }
}
