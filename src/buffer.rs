//! The caller-visible buffer over a live mapping.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::errors::{MapError, Result};
use crate::flush::FlushPolicy;
use crate::lifetime::Mapping;
use crate::request::ElementKind;
use crate::utils::{ensure_in_bounds, slice_range};
use crate::view::{cast_slice, cast_slice_mut, Element, ElementView, TypedView};

/// Byte buffer aliasing a shared, writable memory mapping.
///
/// The buffer is the sole owner of its mapping. Dropping it (or calling
/// [`MappedBuffer::close`]) unmaps the memory and closes any handle the
/// platform kept open. Views borrow or take ownership of the buffer, so no
/// view can observe memory after release.
///
/// # Examples
///
/// ```no_run
/// let mut buf = mmap_view::map_len("counters.bin", 64_u64)?;
/// buf[0] = 1;
/// buf.update_region(8, &42u64.to_ne_bytes())?;
/// buf.flush()?;
/// # Ok::<(), mmap_view::MapError>(())
/// ```
pub struct MappedBuffer {
    mapping: Mapping,
}

impl fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("path", &self.path())
            .field("len", &self.len())
            .field("flush_policy", &self.mapping.policy())
            .finish()
    }
}

impl MappedBuffer {
    pub(crate) fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.bytes().len()
    }

    /// Whether the mapping is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path the buffer was mapped from.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.mapping.path().as_path()
    }

    /// Whether the buffer maps a `/dev/shm/<name>` segment.
    #[must_use]
    pub fn is_shared_memory(&self) -> bool {
        self.mapping.path().is_shared_memory()
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.mapping.bytes()
    }

    /// The mapped bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.mapping.bytes_mut()
    }

    /// Read bytes from the mapping into `buf` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::OutOfBounds` if range exceeds the mapping.
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let (start, end) = slice_range(offset, buf.len() as u64, self.len() as u64)?;
        buf.copy_from_slice(&self.as_slice()[start..end]);
        Ok(())
    }

    /// Copy `data` into the mapping at `offset`.
    ///
    /// With [`FlushPolicy::Always`] the written range is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns `MapError::OutOfBounds` if range exceeds the mapping.
    /// Returns `MapError::FlushFailed` if the policy flush fails.
    pub fn update_region(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let (start, end) = slice_range(offset, data.len() as u64, self.len() as u64)?;
        self.as_mut_slice()[start..end].copy_from_slice(data);
        if self.mapping.policy() == FlushPolicy::Always {
            self.flush_range(offset, data.len() as u64)?;
        }
        Ok(())
    }

    /// Flush dirty pages to the backing store.
    ///
    /// # Errors
    ///
    /// Returns `MapError::FlushFailed` if the flush fails.
    pub fn flush(&self) -> Result<()> {
        match self.mapping.region() {
            Some(region) => region
                .flush()
                .map_err(|e| MapError::FlushFailed(e.to_string())),
            None => Ok(()),
        }
    }

    /// Flush dirty pages in `[offset, offset + len)` to the backing store.
    ///
    /// # Errors
    ///
    /// Returns `MapError::OutOfBounds` if range exceeds the mapping.
    /// Returns `MapError::FlushFailed` if the flush fails.
    #[allow(clippy::cast_possible_truncation)]
    pub fn flush_range(&self, offset: u64, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        ensure_in_bounds(offset, len, self.len() as u64)?;
        match self.mapping.region() {
            Some(region) => region
                .flush_range(offset as usize, len as usize)
                .map_err(|e| MapError::FlushFailed(e.to_string())),
            None => Ok(()),
        }
    }

    /// Release the mapping now instead of on drop, surfacing any release-time flush error.
    ///
    /// # Errors
    ///
    /// Returns `MapError::FlushFailed` if a [`FlushPolicy::OnRelease`] flush fails;
    /// the mapping is released either way.
    pub fn close(mut self) -> Result<()> {
        self.mapping.release()
    }

    /// Borrow the bytes as whole elements of `T`; a trailing partial element is excluded.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if the mapping is not aligned for `T`.
    pub fn as_elements<T: Element>(&self) -> Result<&[T]> {
        cast_slice(self.as_slice())
    }

    /// Mutable counterpart of [`MappedBuffer::as_elements`].
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if the mapping is not aligned for `T`.
    pub fn as_elements_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        cast_slice_mut(self.as_mut_slice())
    }

    /// Turn the buffer into an owned typed view.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if the mapping is not aligned for `T`.
    pub fn into_view<T: Element>(self) -> Result<TypedView<T>> {
        TypedView::new(self)
    }

    /// Turn the buffer into a view of runtime-selected element kind.
    #[must_use]
    pub fn into_elements(self, kind: ElementKind) -> ElementView {
        ElementView::new(self, kind)
    }
}

impl Deref for MappedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for MappedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for MappedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for MappedBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}
