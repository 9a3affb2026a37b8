//! High-level API for mapping files and shared-memory segments.
//!
//! [`Mapper`] runs the whole pipeline: resolve, size, open or extend, map,
//! wrap, view. The free functions use a default `Mapper`.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::backing::BackingStore;
use crate::buffer::MappedBuffer;
use crate::engine::{DefaultEngine, MapEngine, Region};
use crate::errors::{MapError, Result};
use crate::flush::FlushPolicy;
use crate::lifetime::Mapping;
use crate::path::ResolvedPath;
use crate::request::{MapRequest, RequestedLength};
use crate::view::{Element, Mapped, TypedView};

/// Configured entry point for mapping requests.
///
/// Cloning is cheap; the engine is shared.
///
/// # Examples
///
/// ```no_run
/// use mmap_view::{FlushPolicy, MapRequest, Mapper};
///
/// let mapper = Mapper::builder().flush_policy(FlushPolicy::OnRelease).build();
/// let request = MapRequest::builder().path("/dev/shm/telemetry").len(4096_u64).build()?;
/// let mapped = mapper.map(&request)?;
/// assert_eq!(mapped.byte_len(), 4096);
/// # Ok::<(), mmap_view::MapError>(())
/// ```
#[derive(Clone)]
pub struct Mapper {
    engine: Arc<dyn MapEngine>,
    flush_policy: FlushPolicy,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("engine", &self.engine.name())
            .field("flush_policy", &self.flush_policy)
            .finish()
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Mapper {
    /// Mapper with the platform engine and [`FlushPolicy::Never`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a mapper.
    #[must_use]
    pub fn builder() -> MapperBuilder {
        MapperBuilder::default()
    }

    /// Flush policy applied to buffers from this mapper.
    #[must_use]
    pub fn flush_policy(&self) -> FlushPolicy {
        self.flush_policy
    }

    /// Map a request and apply its view.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Io` if the store cannot be opened, extended or mapped.
    pub fn map(&self, request: &MapRequest) -> Result<Mapped> {
        let buffer = self.map_buffer(request.path(), request.len())?;
        Ok(Mapped::adapt(buffer, request.view()))
    }

    /// Map `requested` bytes of `path` (the whole store for `None`).
    ///
    /// # Errors
    ///
    /// Returns `MapError::Io` if the store cannot be opened, extended or mapped,
    /// or if the length does not fit the address space.
    pub fn map_buffer(&self, path: &ResolvedPath, requested: Option<u64>) -> Result<MappedBuffer> {
        if let Some(len) = requested {
            to_address_len(len, path)?;
        }
        let store = BackingStore::open(path, requested)?;
        let plan = store.plan();
        let len = to_address_len(plan.final_len, path)?;
        let region = if len == 0 {
            // some platforms reject zero-length mappings outright
            Region::empty()
        } else {
            self.engine.map(&store, len)?
        };
        if region.len() != len {
            return Err(MapError::io(
                "mmap",
                path.as_path(),
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "engine {} mapped {} bytes, expected {len}",
                        self.engine.name(),
                        region.len()
                    ),
                ),
            ));
        }
        debug!(
            "mapped {} ({len} bytes{}) with {}",
            path.as_path().display(),
            if plan.needs_extension() { ", extended" } else { "" },
            self.engine.name()
        );
        let retained = store.retain_for_mapping();
        Ok(MappedBuffer::new(Mapping::new(
            region,
            retained,
            path.clone(),
            self.flush_policy,
        )))
    }
}

fn to_address_len(len: u64, path: &ResolvedPath) -> Result<usize> {
    usize::try_from(len)
        .ok()
        .filter(|&len| isize::try_from(len).is_ok())
        .ok_or_else(|| {
            MapError::io(
                "mmap",
                path.as_path(),
                io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("{len} bytes exceed the address space"),
                ),
            )
        })
}

/// Builder for [`Mapper`].
#[derive(Default)]
pub struct MapperBuilder {
    engine: Option<Arc<dyn MapEngine>>,
    flush_policy: FlushPolicy,
}

impl fmt::Debug for MapperBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperBuilder")
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .field("flush_policy", &self.flush_policy)
            .finish()
    }
}

impl MapperBuilder {
    /// Use a custom mapping engine instead of [`DefaultEngine`].
    #[must_use]
    pub fn engine(self, engine: impl MapEngine + 'static) -> Self {
        self.shared_engine(Arc::new(engine))
    }

    /// Use an engine shared with other mappers.
    #[must_use]
    pub fn shared_engine(mut self, engine: Arc<dyn MapEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Flush policy for produced buffers.
    #[must_use]
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Finish configuration.
    #[must_use]
    pub fn build(self) -> Mapper {
        Mapper {
            engine: self
                .engine
                .unwrap_or_else(|| Arc::new(DefaultEngine::default())),
            flush_policy: self.flush_policy,
        }
    }
}

fn request_for(path: &Path, len: RequestedLength) -> Result<MapRequest> {
    MapRequest::builder().path(path).len(len).build()
}

/// Map a whole file or `/dev/shm/<name>` segment.
///
/// # Errors
///
/// Returns `MapError::InvalidArgument` for an unusable path and `MapError::Io`
/// if opening or mapping fails (a missing ordinary file is `NotFound`).
pub fn map<P: AsRef<Path>>(path: P) -> Result<MappedBuffer> {
    map_len(path, RequestedLength::WHOLE_FILE)
}

/// Map `len` bytes, growing the store with zeros if it is shorter.
///
/// A zero, negative or otherwise unusable `len` maps the whole store.
///
/// # Errors
///
/// As for [`map`], plus `MapError::Io` if extension fails.
pub fn map_len<P: AsRef<Path>, L: Into<RequestedLength>>(path: P, len: L) -> Result<MappedBuffer> {
    let request = request_for(path.as_ref(), len.into())?;
    Mapper::default().map_buffer(request.path(), request.len())
}

/// Map `len` bytes and view them as `T`.
///
/// # Errors
///
/// As for [`map_len`], plus `MapError::InvalidArgument` if the mapping is not aligned for `T`.
pub fn map_view<T: Element, P: AsRef<Path>, L: Into<RequestedLength>>(
    path: P,
    len: L,
) -> Result<TypedView<T>> {
    map_len(path, len)?.into_view()
}

/// Map a prepared request with the default [`Mapper`].
///
/// # Errors
///
/// See [`Mapper::map`].
pub fn map_request(request: &MapRequest) -> Result<Mapped> {
    Mapper::default().map(request)
}

/// Delete the file or shared-memory segment behind `path`.
///
/// Existing mappings stay valid until dropped. Windows sections disappear with
/// their last handle, so for them this is a no-op.
///
/// # Errors
///
/// Returns `MapError::Io` if removal fails.
pub fn unlink<P: AsRef<Path>>(path: P) -> Result<()> {
    let resolved = ResolvedPath::resolve(path.as_ref())?;
    match &resolved {
        ResolvedPath::File(file) => {
            fs::remove_file(file).map_err(|e| MapError::io("remove", file, e))
        }
        ResolvedPath::SharedMemory { name, path } => unlink_shared(name, path),
    }
}

#[cfg(unix)]
fn unlink_shared(name: &str, path: &Path) -> Result<()> {
    crate::sys::unix::shm_unlink(name).map_err(|e| MapError::io("shm_unlink", path, e))
}

#[cfg(windows)]
fn unlink_shared(name: &str, _path: &Path) -> Result<()> {
    debug!("section {name} is released with its last handle");
    Ok(())
}

#[cfg(feature = "async")]
pub mod r#async {
    //! Async helper (Tokio) that keeps the blocking map sequence off the runtime threads.
    use std::io;

    use crate::errors::{MapError, Result};
    use crate::request::MapRequest;
    use crate::view::Mapped;

    use super::Mapper;

    /// Map a request on Tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// See [`Mapper::map`]; a panicked or cancelled blocking task surfaces as `MapError::Io`.
    pub async fn map_async(mapper: Mapper, request: MapRequest) -> Result<Mapped> {
        let path = request.path().as_path().to_path_buf();
        tokio::task::spawn_blocking(move || mapper.map(&request))
            .await
            .map_err(|e| MapError::io("spawn_blocking", path, io::Error::other(e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absurd_lengths_fail_before_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("huge.bin");
        fs::write(&file, b"abc").expect("seed");
        let path = ResolvedPath::File(file.clone());

        let err = Mapper::new().map_buffer(&path, Some(u64::MAX)).unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::OutOfMemory));
        assert_eq!(fs::metadata(&file).expect("meta").len(), 3);
    }

    #[test]
    fn debug_names_engine() {
        let text = format!("{:?}", Mapper::new());
        assert!(text.contains(DefaultEngine::default().name()), "{text}");
    }
}
