//! Flush policy configuration for mapped buffers.
//!
//! Writes through a shared mapping are visible to every other mapping of the
//! same file immediately; flushing only controls when they reach the disk.

/// Policy controlling when to flush dirty pages to the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Never flush implicitly; `flush()` must be called by the user.
    #[default]
    Never,
    /// Flush once, right before the mapping is released.
    OnRelease,
    /// Flush the written range after every `update_region` call.
    Always,
}
