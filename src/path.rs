//! Path resolution for mapping requests.
//!
//! Paths under [`SHM_PREFIX`] are used exactly as given. Everything else is
//! made absolute against the current working directory so that two callers
//! naming the same file from different directories map the same bytes.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::errors::{MapError, Result};

/// Mount prefix of the shared-memory namespace.
pub const SHM_PREFIX: &str = "/dev/shm/";

/// A path ready for the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A named shared-memory segment, `/dev/shm/<name>`.
    SharedMemory {
        /// Full path as given by the caller.
        path: PathBuf,
        /// Segment name without the prefix.
        name: String,
    },
    /// An ordinary file, absolute unless it was given under [`SHM_PREFIX`].
    File(PathBuf),
}

impl ResolvedPath {
    /// Resolve a caller path.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` for an empty path or one containing a NUL byte.
    /// Returns `MapError::Io` if the current directory cannot be determined.
    pub fn resolve(raw: &Path) -> Result<Self> {
        validate(raw.as_os_str())?;
        if let Some(rest) = raw.to_str().and_then(|s| s.strip_prefix(SHM_PREFIX)) {
            if !rest.is_empty() && !rest.contains('/') {
                return Ok(Self::SharedMemory {
                    path: raw.to_path_buf(),
                    name: rest.to_owned(),
                });
            }
            return Ok(Self::File(raw.to_path_buf()));
        }
        if raw.is_absolute() {
            return Ok(Self::File(normalize(raw)));
        }
        let cwd = std::env::current_dir().map_err(|e| MapError::io("getcwd", raw, e))?;
        Ok(Self::File(normalize(&cwd.join(raw))))
    }

    /// Path used for error messages and logging.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        match self {
            Self::SharedMemory { path, .. } => path,
            Self::File(path) => path,
        }
    }

    /// Whether this names a shared-memory segment.
    #[must_use]
    pub fn is_shared_memory(&self) -> bool {
        matches!(self, Self::SharedMemory { .. })
    }
}

fn validate(raw: &OsStr) -> Result<()> {
    if raw.is_empty() {
        return Err(MapError::invalid("path must not be empty"));
    }
    if raw.as_encoded_bytes().contains(&0) {
        return Err(MapError::invalid("path must not contain NUL bytes"));
    }
    Ok(())
}

/// Lexically normalize an absolute path: drop `.` and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // popping past the root is a no-op, like `cd /..`
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shm_names_pass_through() {
        let resolved = ResolvedPath::resolve(Path::new("/dev/shm/ring")).expect("resolve");
        assert_eq!(
            resolved,
            ResolvedPath::SharedMemory {
                path: PathBuf::from("/dev/shm/ring"),
                name: "ring".into(),
            }
        );
        assert!(resolved.is_shared_memory());
    }

    #[test]
    fn nested_shm_paths_are_files_left_unresolved() {
        let resolved = ResolvedPath::resolve(Path::new("/dev/shm/a/../b")).expect("resolve");
        assert_eq!(resolved, ResolvedPath::File(PathBuf::from("/dev/shm/a/../b")));
    }

    #[test]
    fn bare_prefix_is_not_a_segment() {
        let resolved = ResolvedPath::resolve(Path::new("/dev/shm/")).expect("resolve");
        assert!(!resolved.is_shared_memory());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let cwd = std::env::current_dir().expect("cwd");
        let resolved = ResolvedPath::resolve(Path::new("./data/../file.bin")).expect("resolve");
        assert_eq!(resolved, ResolvedPath::File(cwd.join("file.bin")));
        assert!(resolved.as_path().is_absolute());
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_are_normalized() {
        let resolved = ResolvedPath::resolve(Path::new("/tmp/./x/../y.bin")).expect("resolve");
        assert_eq!(resolved, ResolvedPath::File(PathBuf::from("/tmp/y.bin")));
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert!(ResolvedPath::resolve(Path::new("")).unwrap_err().is_invalid_argument());
        assert!(ResolvedPath::resolve(Path::new("a\0b"))
            .unwrap_err()
            .is_invalid_argument());
    }
}
