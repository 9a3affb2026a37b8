//! Mapping requests: argument validation and normalization at the API boundary.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{MapError, Result};
use crate::path::ResolvedPath;

/// Largest integer an IEEE-754 double holds exactly (2^53 - 1).
pub const MAX_EXACT_LENGTH: u64 = (1 << 53) - 1;

/// A caller-requested mapping length after normalization.
///
/// Only positive whole numbers survive; zero, negative, fractional-below-one,
/// non-finite and inexact values all collapse to "map the whole file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestedLength(Option<u64>);

impl RequestedLength {
    /// Map the whole file.
    pub const WHOLE_FILE: Self = Self(None);

    /// The normalized length, `None` for whole-file mapping.
    #[must_use]
    pub fn get(self) -> Option<u64> {
        self.0
    }
}

impl From<u64> for RequestedLength {
    fn from(len: u64) -> Self {
        Self((len > 0).then_some(len))
    }
}

impl From<usize> for RequestedLength {
    fn from(len: usize) -> Self {
        Self::from(len as u64)
    }
}

impl From<i64> for RequestedLength {
    fn from(len: i64) -> Self {
        u64::try_from(len).map_or(Self::WHOLE_FILE, Self::from)
    }
}

impl From<f64> for RequestedLength {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(len: f64) -> Self {
        let len = len.trunc();
        if !len.is_finite() || len <= 0.0 || len > MAX_EXACT_LENGTH as f64 {
            return Self::WHOLE_FILE;
        }
        Self(Some(len as u64))
    }
}

impl<T: Into<RequestedLength>> From<Option<T>> for RequestedLength {
    fn from(len: Option<T>) -> Self {
        len.map_or(Self::WHOLE_FILE, Into::into)
    }
}

/// Element type of a typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `i16`
    I16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `u64`
    U64,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl ElementKind {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Tag used by [`FromStr`] and [`fmt::Display`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the mapped bytes are handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewKind {
    /// The byte buffer itself.
    #[default]
    Raw,
    /// A generic binary view spanning every byte.
    Bytes,
    /// A strided view of fixed-size elements; trailing bytes that do not fill an element are excluded.
    Typed(ElementKind),
}

impl FromStr for ViewKind {
    type Err = MapError;

    fn from_str(tag: &str) -> Result<Self> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "raw" | "buffer" => Self::Raw,
            "bytes" | "dataview" => Self::Bytes,
            "u8" => Self::Typed(ElementKind::U8),
            "i8" => Self::Typed(ElementKind::I8),
            "u16" => Self::Typed(ElementKind::U16),
            "i16" => Self::Typed(ElementKind::I16),
            "u32" => Self::Typed(ElementKind::U32),
            "i32" => Self::Typed(ElementKind::I32),
            "u64" => Self::Typed(ElementKind::U64),
            "i64" => Self::Typed(ElementKind::I64),
            "f32" => Self::Typed(ElementKind::F32),
            "f64" => Self::Typed(ElementKind::F64),
            _ => return Err(MapError::invalid(format!("unknown view kind `{tag}`"))),
        };
        Ok(kind)
    }
}

/// A validated mapping request.
///
/// # Examples
///
/// ```no_run
/// use mmap_view::{MapRequest, ViewKind};
///
/// let request = MapRequest::builder()
///     .path("samples.f32")
///     .len(4096_u64)
///     .view("f32".parse::<ViewKind>()?)
///     .build()?;
/// assert_eq!(request.len(), Some(4096));
/// # Ok::<(), mmap_view::MapError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    path: ResolvedPath,
    len: RequestedLength,
    view: ViewKind,
}

impl MapRequest {
    /// Start building a request.
    #[must_use]
    pub fn builder() -> MapRequestBuilder {
        MapRequestBuilder::default()
    }

    /// Resolved path to map.
    #[must_use]
    pub fn path(&self) -> &ResolvedPath {
        &self.path
    }

    /// Requested length, `None` for whole-file mapping.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        self.len.get()
    }

    /// Requested view.
    #[must_use]
    pub fn view(&self) -> ViewKind {
        self.view
    }
}

/// Builder for [`MapRequest`].
#[derive(Debug, Clone, Default)]
pub struct MapRequestBuilder {
    path: Option<OsString>,
    len: RequestedLength,
    view: ViewKind,
}

impl MapRequestBuilder {
    /// Path of the file or `/dev/shm/<name>` segment to map.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into().into_os_string());
        self
    }

    /// Requested length; see [`RequestedLength`] for how odd values are normalized.
    #[must_use]
    pub fn len(mut self, len: impl Into<RequestedLength>) -> Self {
        self.len = len.into();
        self
    }

    /// How to present the mapped bytes.
    #[must_use]
    pub fn view(mut self, view: ViewKind) -> Self {
        self.view = view;
        self
    }

    /// Validate the arguments and resolve the path.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if no usable path was supplied.
    pub fn build(self) -> Result<MapRequest> {
        let raw = self
            .path
            .ok_or_else(|| MapError::invalid("path is required"))?;
        Ok(MapRequest {
            path: ResolvedPath::resolve(Path::new(&raw))?,
            len: self.len,
            view: self.view,
        })
    }
}
