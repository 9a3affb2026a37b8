//! Windows file-mapping engine and named paging-file sections.

use std::ffi::{c_void, OsStr};
use std::mem::{size_of, MaybeUninit};
use std::os::windows::ffi::OsStrExt;
use std::{io, ptr, slice};

use memmap2::MmapOptions;

use crate::backing::BackingStore;
use crate::engine::{MapEngine, Region};
use crate::errors::{MapError, Result};

type Handle = *mut c_void;

const INVALID_HANDLE_VALUE: Handle = -1isize as Handle;
const PAGE_READWRITE: u32 = 0x04;
const FILE_MAP_ALL_ACCESS: u32 = 0x000F_001F;
const ERROR_FILE_NOT_FOUND: i32 = 2;

#[allow(non_snake_case)]
#[repr(C)]
struct MEMORY_BASIC_INFORMATION {
    BaseAddress: *mut c_void,
    AllocationBase: *mut c_void,
    AllocationProtect: u32,
    #[cfg(target_pointer_width = "64")]
    PartitionId: u16,
    RegionSize: usize,
    State: u32,
    Protect: u32,
    Type: u32,
}

extern "system" {
    fn CreateFileMappingW(
        hFile: Handle,
        lpFileMappingAttributes: *mut c_void,
        flProtect: u32,
        dwMaximumSizeHigh: u32,
        dwMaximumSizeLow: u32,
        lpName: *const u16,
    ) -> Handle;
    fn OpenFileMappingW(dwDesiredAccess: u32, bInheritHandle: i32, lpName: *const u16) -> Handle;
    fn MapViewOfFile(
        hFileMappingObject: Handle,
        dwDesiredAccess: u32,
        dwFileOffsetHigh: u32,
        dwFileOffsetLow: u32,
        dwNumberOfBytesToMap: usize,
    ) -> *mut c_void;
    fn UnmapViewOfFile(lpBaseAddress: *const c_void) -> i32;
    fn FlushViewOfFile(lpBaseAddress: *const c_void, dwNumberOfBytesToFlush: usize) -> i32;
    fn VirtualQuery(
        lpAddress: *const c_void,
        lpBuffer: *mut MEMORY_BASIC_INFORMATION,
        dwLength: usize,
    ) -> usize;
    fn CloseHandle(hObject: Handle) -> i32;
}

fn wide(name: &str) -> Vec<u16> {
    OsStr::new(name).encode_wide().chain(Some(0)).collect()
}

/// A named section backed by the paging file.
///
/// Sections cannot be resized after creation, so the first creator fixes the size.
#[derive(Debug)]
pub(crate) struct Section {
    handle: Handle,
    len: u64,
}

// SAFETY: a section handle is a process-wide kernel object reference, usable from any thread.
unsafe impl Send for Section {}
// SAFETY: as above; the handle is never mutated after construction.
unsafe impl Sync for Section {}

impl Section {
    /// Open the section `name`, or create it with `requested` bytes.
    ///
    /// Returns `Ok(None)` if the section does not exist and no size was requested.
    pub(crate) fn open_or_create(name: &str, requested: Option<u64>) -> io::Result<Option<Self>> {
        let wide_name = wide(name);
        // SAFETY: wide_name is NUL-terminated and outlives the call.
        let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wide_name.as_ptr()) };
        if !handle.is_null() {
            let mut section = Self { handle, len: 0 };
            section.len = section.query_len()?;
            return Ok(Some(section));
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(ERROR_FILE_NOT_FOUND) {
            return Err(err);
        }
        let Some(len) = requested else {
            return Ok(None);
        };
        // SAFETY: INVALID_HANDLE_VALUE requests a paging-file section; all pointers are valid.
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null_mut(),
                PAGE_READWRITE,
                (len >> 32) as u32,
                (len & 0xFFFF_FFFF) as u32,
                wide_name.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Some(Self { handle, len }))
    }

    /// Size of the section, rounded up to whole pages by the OS.
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    fn query_len(&self) -> io::Result<u64> {
        // zero maps the whole section
        let view = SectionView::map(self, 0)?;
        let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::zeroed();
        // SAFETY: view.ptr is the base of a live view; info is sized for the struct.
        let written = unsafe {
            VirtualQuery(
                view.ptr.cast::<c_void>(),
                info.as_mut_ptr(),
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: VirtualQuery filled the structure.
        let info = unsafe { info.assume_init() };
        Ok(info.RegionSize as u64)
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        // SAFETY: handle came from Create/OpenFileMappingW and is closed exactly once.
        unsafe {
            CloseHandle(self.handle);
        }
    }
}

/// A mapped view of a [`Section`].
pub(crate) struct SectionView {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the view is plain shared memory; access is governed by &/&mut on the owning Region.
unsafe impl Send for SectionView {}
// SAFETY: as above.
unsafe impl Sync for SectionView {}

impl SectionView {
    fn map(section: &Section, len: usize) -> io::Result<Self> {
        // SAFETY: section.handle is a live section handle.
        let ptr = unsafe { MapViewOfFile(section.handle, FILE_MAP_ALL_ACCESS, 0, 0, len) };
        if ptr.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr..ptr+len is a live view for the lifetime of self.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self gives exclusive access within this process.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    pub(crate) fn flush(&self, offset: usize, len: usize) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        // SAFETY: callers pass a range inside the view.
        let ok = unsafe { FlushViewOfFile(self.ptr.add(offset).cast::<c_void>(), len) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for SectionView {
    fn drop(&mut self) {
        // SAFETY: ptr is the base address returned by MapViewOfFile, unmapped exactly once.
        unsafe {
            UnmapViewOfFile(self.ptr.cast::<c_void>());
        }
    }
}

/// `CreateFileMapping` / `MapViewOfFile` engine.
///
/// Files go through memmap2, which keeps its own duplicate of the file handle.
/// Named sections are mapped directly and their handle stays with the mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsEngine;

impl MapEngine for WindowsEngine {
    fn name(&self) -> &'static str {
        "windows-file-mapping"
    }

    fn map(&self, store: &BackingStore, len: usize) -> Result<Region> {
        let path = store.path().as_path();
        if let Some(section) = store.section() {
            let view =
                SectionView::map(section, len).map_err(|e| MapError::io("MapViewOfFile", path, e))?;
            return Ok(Region::from_view(view));
        }
        let file = store.file().ok_or_else(|| {
            MapError::io(
                "MapViewOfFile",
                path,
                io::Error::new(io::ErrorKind::Unsupported, "store has no file handle"),
            )
        })?;
        // SAFETY: shared read-write view of a file opened read-write and sized to at least `len`.
        let map = unsafe { MmapOptions::new().len(len).map_mut(file) }
            .map_err(|e| MapError::io("MapViewOfFile", path, e))?;
        Ok(Region::from_mmap(map))
    }
}
