//! # mmap-view: files and shared memory as directly addressable buffers
//!
//! This crate maps a file, or a named segment under `/dev/shm/`, into memory
//! and hands it back as a byte buffer or a typed view, without a read/copy
//! cycle. Mappings are shared and writable: every process mapping the same
//! file or segment sees the same bytes.
//!
//! ## Features
//!
//! - **Sizing**: map the whole file, a prefix, or a larger length that grows the file with zeros
//! - **Shared memory**: `/dev/shm/<name>` segments are created on demand for zero-copy IPC
//! - **Exactly-once release**: the buffer owns its mapping and unmaps it when dropped
//! - **Typed views**: reinterpret the bytes as `u32`, `f64`, ... without copying
//! - **Cross-platform**: POSIX `mmap`/`shm_open` and the Windows file-mapping API
//!
//! ## Quick Start
//!
//! ```no_run
//! use mmap_view::{map, map_len, map_view};
//!
//! // Whole file
//! let whole = map("data.bin")?;
//!
//! // Grow (zero-filled) to 1 MiB and write through the mapping
//! let mut grown = map_len("data.bin", 1024 * 1024_u64)?;
//! grown[..5].copy_from_slice(b"hello");
//!
//! // Shared memory segment viewed as u32 words
//! let words = map_view::<u32, _, _>("/dev/shm/ring", 4096_u64)?;
//! # let _ = (whole, words);
//! # Ok::<(), mmap_view::MapError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error types for all mapping operations
//! - [`request`]: Request validation, length normalization, view kinds
//! - [`path`]: Shared-memory prefix handling and path resolution
//! - [`sizing`]: Final-length policy
//! - [`backing`]: Opening, creating and extending the backing store
//! - [`engine`]: The platform mapping seam
//! - [`buffer`]: The caller-visible `MappedBuffer`
//! - [`view`]: Typed and runtime-typed views
//! - [`manager`]: `Mapper` and convenience functions
//!
//! ## Feature Flags
//!
//! - `async`: Enables a Tokio helper that maps on the blocking pool

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod backing;
pub mod buffer;
pub mod engine;
pub mod errors;
pub mod flush;
mod lifetime;
pub mod manager;
pub mod path;
pub mod request;
pub mod sizing;
pub mod sys;
pub mod utils;
pub mod view;

pub use buffer::MappedBuffer;
pub use engine::{DefaultEngine, MapEngine, Region};
pub use errors::MapError;
pub use flush::FlushPolicy;
pub use manager::{map, map_len, map_request, map_view, unlink, Mapper, MapperBuilder};
#[cfg(feature = "async")]
pub use manager::r#async::map_async;
pub use path::{ResolvedPath, SHM_PREFIX};
pub use request::{ElementKind, MapRequest, MapRequestBuilder, RequestedLength, ViewKind};
pub use view::{Element, ElementView, Mapped, TypedView};
