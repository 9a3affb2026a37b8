//! Mapping engine: the seam between the portable pipeline and the platform mapping call.

use std::fmt;
use std::io;

use memmap2::MmapMut;

use crate::backing::BackingStore;
use crate::errors::Result;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Engine used when no other is configured.
        pub type DefaultEngine = crate::sys::PosixEngine;
    } else {
        /// Engine used when no other is configured.
        pub type DefaultEngine = crate::sys::WindowsEngine;
    }
}

/// Establishes a shared, writable mapping of an open backing store.
///
/// Implementations map exactly `len` bytes starting at offset 0 and never
/// private/copy-on-write memory: writes must reach the backing store and
/// every other mapping of it. `len` is never zero; zero-length requests are
/// answered with [`Region::empty`] without consulting the engine.
pub trait MapEngine: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Map `len` bytes of `store`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Io` if the mapping call fails.
    fn map(&self, store: &BackingStore, len: usize) -> Result<Region>;
}

/// A live memory region returned by a [`MapEngine`].
///
/// Dropping the region unmaps it.
pub struct Region {
    inner: RegionInner,
}

enum RegionInner {
    Empty,
    Mmap(MmapMut),
    #[cfg(windows)]
    View(crate::sys::windows::SectionView),
}

impl Region {
    /// A zero-length region that owns no mapping.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: RegionInner::Empty,
        }
    }

    /// Wrap a shared memmap2 mapping.
    #[must_use]
    pub fn from_mmap(map: MmapMut) -> Self {
        Self {
            inner: RegionInner::Mmap(map),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_view(view: crate::sys::windows::SectionView) -> Self {
        Self {
            inner: RegionInner::View(view),
        }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the region is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            RegionInner::Empty => &[],
            RegionInner::Mmap(m) => &m[..],
            #[cfg(windows)]
            RegionInner::View(v) => v.as_slice(),
        }
    }

    /// The mapped bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.inner {
            RegionInner::Empty => &mut [],
            RegionInner::Mmap(m) => &mut m[..],
            #[cfg(windows)]
            RegionInner::View(v) => v.as_mut_slice(),
        }
    }

    /// Write dirty pages back to the backing store.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `msync` / `FlushViewOfFile`.
    pub fn flush(&self) -> io::Result<()> {
        match &self.inner {
            RegionInner::Empty => Ok(()),
            RegionInner::Mmap(m) => m.flush(),
            #[cfg(windows)]
            RegionInner::View(v) => v.flush(0, v.len()),
        }
    }

    /// Write dirty pages in `[offset, offset + len)` back to the backing store.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `msync` / `FlushViewOfFile`.
    pub fn flush_range(&self, offset: usize, len: usize) -> io::Result<()> {
        match &self.inner {
            RegionInner::Empty => Ok(()),
            RegionInner::Mmap(m) => m.flush_range(offset, len),
            #[cfg(windows)]
            RegionInner::View(v) => v.flush(offset, len),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            RegionInner::Empty => "empty",
            RegionInner::Mmap(_) => "mmap",
            #[cfg(windows)]
            RegionInner::View(_) => "section-view",
        };
        f.debug_struct("Region")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}
