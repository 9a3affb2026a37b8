//! POSIX shared memory and the `mmap(MAP_SHARED)` engine.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;

use memmap2::MmapOptions;

use crate::backing::BackingStore;
use crate::engine::{MapEngine, Region};
use crate::errors::{MapError, Result};

const SHM_MODE: libc::mode_t = 0o600;

fn shm_object_name(name: &str) -> io::Result<CString> {
    CString::new(format!("/{name}")).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Create-or-open the POSIX shared-memory object `/<name>` read-write.
pub(crate) fn shm_open(name: &str) -> io::Result<File> {
    let c_name = shm_object_name(name)?;
    // SAFETY: c_name is a valid NUL-terminated string for the duration of the call.
    // shm_open is variadic on Apple targets, so the mode is promoted to c_uint there.
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_CREAT | libc::O_RDWR,
            libc::c_uint::from(SHM_MODE),
        )
    };
    // SAFETY: as above.
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_CREAT | libc::O_RDWR, SHM_MODE) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly opened descriptor owned by nobody else.
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Remove the POSIX shared-memory object `/<name>`.
pub(crate) fn shm_unlink(name: &str) -> io::Result<()> {
    let c_name = shm_object_name(name)?;
    // SAFETY: c_name is a valid NUL-terminated string for the duration of the call.
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Shared, writable `mmap` of a file or shared-memory descriptor via memmap2.
///
/// The descriptor may be closed as soon as the mapping exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixEngine;

impl MapEngine for PosixEngine {
    fn name(&self) -> &'static str {
        "posix-mmap"
    }

    fn map(&self, store: &BackingStore, len: usize) -> Result<Region> {
        let path = store.path().as_path();
        let file = store.file().ok_or_else(|| {
            MapError::io(
                "mmap",
                path,
                io::Error::new(io::ErrorKind::Unsupported, "store has no file descriptor"),
            )
        })?;
        // SAFETY: the mapping is MAP_SHARED over a descriptor we opened read-write and
        // sized to at least `len`. Concurrent modification by other processes is the
        // documented contract of a shared mapping.
        let map = unsafe { MmapOptions::new().len(len).map_mut(file) }
            .map_err(|e| MapError::io("mmap", path, e))?;
        Ok(Region::from_mmap(map))
    }
}
