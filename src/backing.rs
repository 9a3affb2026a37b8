//! Backing store manager: open or create the file/segment and grow it to the planned size.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use log::{debug, warn};

use crate::errors::{MapError, Result};
use crate::path::ResolvedPath;
use crate::sizing::SizePlan;

/// An open file or shared-memory segment, sized for the mapping about to be made.
#[derive(Debug)]
pub struct BackingStore {
    path: ResolvedPath,
    plan: SizePlan,
    handle: StoreHandle,
}

#[derive(Debug)]
enum StoreHandle {
    File(File),
    #[cfg(windows)]
    Section(crate::sys::windows::Section),
    /// Named segment that does not exist and was not asked to be created with a size.
    #[cfg(windows)]
    Absent,
}

impl BackingStore {
    /// Open the store named by `path` and apply the sizing policy.
    ///
    /// Ordinary files must exist. Shared-memory segments are created on
    /// demand. When `requested` exceeds the current size the store is grown
    /// to exactly that size; it is never shrunk.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Io` if opening, querying or extending the store fails.
    /// On a failed extension the previous size is kept and no handle is leaked.
    pub fn open(path: &ResolvedPath, requested: Option<u64>) -> Result<Self> {
        match path {
            ResolvedPath::File(file_path) => {
                // No create: mapping never conjures ordinary files. No lock either,
                // other processes may map the same file concurrently.
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(file_path)
                    .map_err(|e| MapError::io("open", file_path, e))?;
                Self::from_file(path.clone(), file, requested)
            }
            ResolvedPath::SharedMemory { name, .. } => Self::open_shared(path, name, requested),
        }
    }

    #[cfg(unix)]
    fn open_shared(path: &ResolvedPath, name: &str, requested: Option<u64>) -> Result<Self> {
        let file = crate::sys::unix::shm_open(name)
            .map_err(|e| MapError::io("shm_open", path.as_path(), e))?;
        Self::from_file(path.clone(), file, requested)
    }

    #[cfg(windows)]
    fn open_shared(path: &ResolvedPath, name: &str, requested: Option<u64>) -> Result<Self> {
        use crate::sys::windows::Section;

        let section = Section::open_or_create(name, requested)
            .map_err(|e| MapError::io("CreateFileMapping", path.as_path(), e))?;
        let (plan, handle) = match section {
            Some(section) => (
                SizePlan::new(section.len(), requested),
                StoreHandle::Section(section),
            ),
            None => (SizePlan::new(0, None), StoreHandle::Absent),
        };
        if plan.needs_extension() {
            return Err(MapError::io(
                "extend",
                path.as_path(),
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!(
                        "shared memory section is {} bytes and cannot grow to {}",
                        plan.current, plan.final_len
                    ),
                ),
            ));
        }
        Ok(Self {
            path: path.clone(),
            plan,
            handle,
        })
    }

    fn from_file(path: ResolvedPath, file: File, requested: Option<u64>) -> Result<Self> {
        let current = file
            .metadata()
            .map_err(|e| MapError::io("stat", path.as_path(), e))?
            .len();
        let plan = SizePlan::new(current, requested);
        if plan.needs_extension() {
            extend(&file, plan, path.as_path())?;
        }
        Ok(Self {
            path,
            plan,
            handle: StoreHandle::File(file),
        })
    }

    /// Path this store was opened from.
    #[must_use]
    pub fn path(&self) -> &ResolvedPath {
        &self.path
    }

    /// Sizing decision applied to this store.
    #[must_use]
    pub fn plan(&self) -> SizePlan {
        self.plan
    }

    /// The open file (or POSIX shared-memory descriptor), if the store is file-backed.
    #[must_use]
    pub fn file(&self) -> Option<&File> {
        match &self.handle {
            StoreHandle::File(file) => Some(file),
            #[cfg(windows)]
            StoreHandle::Section(_) | StoreHandle::Absent => None,
        }
    }

    #[cfg(windows)]
    pub(crate) fn section(&self) -> Option<&crate::sys::windows::Section> {
        match &self.handle {
            StoreHandle::Section(section) => Some(section),
            StoreHandle::File(_) | StoreHandle::Absent => None,
        }
    }

    /// Keep the store only if the platform needs its handle while the mapping lives.
    ///
    /// POSIX mappings and memmap2 file views outlive their descriptor; a Windows
    /// named section handle is held until the view is released.
    pub(crate) fn retain_for_mapping(self) -> Option<Self> {
        match self.handle {
            StoreHandle::File(_) => None,
            #[cfg(windows)]
            StoreHandle::Section(_) => Some(self),
            #[cfg(windows)]
            StoreHandle::Absent => None,
        }
    }
}

/// Grow `file` to `plan.final_len`. The OS zero-fills the new tail.
///
/// The size is read again right before growing: another process may have
/// extended the store since it was planned, and a smaller `set_len` would cut
/// into that process's mapping.
fn extend(file: &File, plan: SizePlan, path: &Path) -> Result<()> {
    let live = live_len(file, path)?;
    if live >= plan.final_len {
        debug!(
            "{} already holds {live} bytes, no extension to {} needed",
            path.display(),
            plan.final_len
        );
        return Ok(());
    }
    debug!(
        "extending {} from {live} to {} bytes",
        path.display(),
        plan.final_len
    );
    if let Err(err) = file.set_len(plan.final_len) {
        roll_back(file, live, plan.final_len, path, &err);
        return Err(MapError::io("extend", path, err));
    }
    Ok(())
}

fn live_len(file: &File, path: &Path) -> Result<u64> {
    Ok(file
        .metadata()
        .map_err(|e| MapError::io("stat", path, e))?
        .len())
}

/// Undo a partial extension. Only a size strictly between `live` and
/// `target` is ours to undo; anything else is left alone.
fn roll_back(file: &File, live: u64, target: u64, path: &Path, err: &io::Error) {
    let now = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(stat) => {
            warn!(
                "extending {} to {target} bytes failed ({err}); size unknown: {stat}",
                path.display()
            );
            return;
        }
    };
    if now <= live || now >= target {
        warn!(
            "extending {} to {target} bytes failed ({err}); size left at {now}",
            path.display()
        );
        return;
    }
    match file.set_len(live) {
        Ok(()) => warn!(
            "extending {} to {target} bytes failed ({err}); restored {live} bytes",
            path.display()
        ),
        Err(restore) => warn!(
            "extending {} failed ({err}) and restoring {live} bytes failed too: {restore}",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = ResolvedPath::File(dir.path().join("absent.bin"));
        let err = BackingStore::open(&path, Some(16)).unwrap_err();
        assert!(err.is_not_found(), "{err}");
        assert!(!dir.path().join("absent.bin").exists());
    }

    #[test]
    fn grows_but_never_shrinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("store.bin");
        fs::write(&file_path, [7u8; 100]).expect("seed");
        let path = ResolvedPath::File(file_path.clone());

        let store = BackingStore::open(&path, Some(10)).expect("prefix");
        assert_eq!(store.plan(), SizePlan::new(100, Some(10)));
        drop(store);
        assert_eq!(fs::metadata(&file_path).expect("meta").len(), 100);

        let store = BackingStore::open(&path, Some(300)).expect("grow");
        assert!(store.plan().needs_extension());
        assert!(store.file().is_some());
        drop(store);
        let bytes = fs::read(&file_path).expect("read");
        assert_eq!(bytes.len(), 300);
        assert!(bytes[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn extension_skips_a_store_grown_since_planning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("raced.bin");
        fs::write(&file_path, [3u8; 10]).expect("seed");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&file_path)
            .expect("open");
        let plan = SizePlan::new(10, Some(50));

        // another writer grows the store past the plan before we extend
        file.set_len(200).expect("concurrent growth");
        extend(&file, plan, &file_path).expect("extend");
        assert_eq!(fs::metadata(&file_path).expect("meta").len(), 200);
    }

    #[test]
    fn rollback_leaves_foreign_sizes_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("rollback.bin");
        fs::write(&file_path, [0u8; 10]).expect("seed");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&file_path)
            .expect("open");
        let err = io::Error::from(io::ErrorKind::Other);

        file.set_len(80).expect("grown elsewhere");
        roll_back(&file, 10, 80, &file_path, &err);
        assert_eq!(fs::metadata(&file_path).expect("meta").len(), 80);

        file.set_len(30).expect("partial extension");
        roll_back(&file, 10, 80, &file_path, &err);
        assert_eq!(fs::metadata(&file_path).expect("meta").len(), 10);
    }

    #[test]
    fn file_handles_are_not_retained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("retain.bin");
        fs::write(&file_path, b"x").expect("seed");
        let store = BackingStore::open(&ResolvedPath::File(file_path), None).expect("open");
        assert!(store.retain_for_mapping().is_none());
    }
}
