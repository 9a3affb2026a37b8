//! Zero-copy views over a [`MappedBuffer`].
//!
//! A view re-reads the buffer's bytes as fixed-size elements. The element
//! count is `floor(len / size)`: trailing bytes that cannot fill an element
//! stay in the mapping but are not addressable through the view. Views own
//! (or borrow) the buffer, so the mapping lives exactly as long as they do.

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::slice;

use crate::buffer::MappedBuffer;
use crate::errors::{MapError, Result};
use crate::request::{ElementKind, ViewKind};

mod private {
    pub trait Sealed {}
}

/// Plain numeric types a mapping can be viewed as.
///
/// Every bit pattern is a valid value of these types, so any mapped bytes can
/// be reinterpreted without copying.
pub trait Element: private::Sealed + Copy + Send + Sync + 'static {
    /// Runtime tag of this element type.
    const KIND: ElementKind;
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl private::Sealed for $ty {}
            impl Element for $ty {
                const KIND: ElementKind = ElementKind::$kind;
            }
        )*
    };
}

impl_element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

fn check_alignment<T: Element>(ptr: *const u8) -> Result<()> {
    if (ptr as usize) % align_of::<T>() != 0 {
        return Err(MapError::invalid(format!(
            "mapping at {ptr:p} is not aligned for {}",
            T::KIND
        )));
    }
    Ok(())
}

/// Reinterpret `bytes` as whole `T` elements.
pub(crate) fn cast_slice<T: Element>(bytes: &[u8]) -> Result<&[T]> {
    let count = bytes.len() / size_of::<T>();
    if count == 0 {
        return Ok(&[]);
    }
    check_alignment::<T>(bytes.as_ptr())?;
    // SAFETY: aligned, `count * size_of::<T>() <= bytes.len()`, and every bit
    // pattern is a valid `T`. The borrow of `bytes` bounds the lifetime.
    Ok(unsafe { slice::from_raw_parts(bytes.as_ptr().cast::<T>(), count) })
}

/// Mutable counterpart of [`cast_slice`].
pub(crate) fn cast_slice_mut<T: Element>(bytes: &mut [u8]) -> Result<&mut [T]> {
    let count = bytes.len() / size_of::<T>();
    if count == 0 {
        return Ok(&mut []);
    }
    check_alignment::<T>(bytes.as_ptr())?;
    // SAFETY: as in `cast_slice`, with exclusivity inherited from `&mut bytes`.
    Ok(unsafe { slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<T>(), count) })
}

/// Owned view of a mapping as a slice of `T`.
///
/// # Examples
///
/// ```no_run
/// let samples = mmap_view::map_view::<f32, _, _>("samples.f32", None::<u64>)?;
/// let peak = samples.iter().copied().fold(f32::MIN, f32::max);
/// # let _ = peak;
/// # Ok::<(), mmap_view::MapError>(())
/// ```
pub struct TypedView<T: Element> {
    buffer: MappedBuffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> TypedView<T> {
    pub(crate) fn new(buffer: MappedBuffer) -> Result<Self> {
        let len = cast_slice::<T>(buffer.as_slice())?.len();
        Ok(Self {
            buffer,
            len,
            _marker: PhantomData,
        })
    }

    /// Bytes covered by the view (`len() * size_of::<T>()`).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len * size_of::<T>()
    }

    /// The underlying buffer, including any trailing bytes outside the view.
    #[must_use]
    pub fn buffer(&self) -> &MappedBuffer {
        &self.buffer
    }

    /// Give the buffer back.
    #[must_use]
    pub fn into_buffer(self) -> MappedBuffer {
        self.buffer
    }
}

impl<T: Element> Deref for TypedView<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: alignment and length were validated in `new`; the mapping
        // address and size are fixed while `self.buffer` is alive.
        unsafe { slice::from_raw_parts(self.buffer.as_slice().as_ptr().cast::<T>(), self.len) }
    }
}

impl<T: Element> DerefMut for TypedView<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: as in `deref`, exclusive through `&mut self`.
        unsafe {
            slice::from_raw_parts_mut(
                self.buffer.as_mut_slice().as_mut_ptr().cast::<T>(),
                self.len,
            )
        }
    }
}

impl<T: Element> fmt::Debug for TypedView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedView")
            .field("kind", &T::KIND)
            .field("len", &self.len)
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Owned view whose element kind is chosen at runtime.
#[derive(Debug)]
pub struct ElementView {
    buffer: MappedBuffer,
    kind: ElementKind,
}

impl ElementView {
    pub(crate) fn new(buffer: MappedBuffer, kind: ElementKind) -> Self {
        Self { buffer, kind }
    }

    /// Element kind of the view.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Size of one element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.kind.size()
    }

    /// Number of whole elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len() / self.element_size()
    }

    /// Whether the view has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes covered by the view (`len() * element_size()`).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len() * self.element_size()
    }

    /// The bytes covered by the view.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.byte_len()]
    }

    /// The bytes covered by the view, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let end = self.byte_len();
        &mut self.buffer[..end]
    }

    /// Raw bytes of element `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.as_bytes().chunks_exact(self.element_size()).nth(index)
    }

    /// Borrow the elements as `T`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if `T` is not the view's element kind.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.check_kind::<T>()?;
        cast_slice(self.buffer.as_slice())
    }

    /// Borrow the elements as `T`, mutably.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidArgument` if `T` is not the view's element kind.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_kind::<T>()?;
        cast_slice_mut(self.buffer.as_mut_slice())
    }

    /// The underlying buffer, including any trailing bytes outside the view.
    #[must_use]
    pub fn buffer(&self) -> &MappedBuffer {
        &self.buffer
    }

    /// Give the buffer back.
    #[must_use]
    pub fn into_buffer(self) -> MappedBuffer {
        self.buffer
    }

    fn check_kind<T: Element>(&self) -> Result<()> {
        if T::KIND != self.kind {
            return Err(MapError::invalid(format!(
                "view holds {} elements, not {}",
                self.kind,
                T::KIND
            )));
        }
        Ok(())
    }
}

/// Result of a [`MapRequest`](crate::MapRequest): the buffer itself or a view over it.
#[derive(Debug)]
pub enum Mapped {
    /// Raw byte buffer.
    Buffer(MappedBuffer),
    /// Element view over the buffer.
    Elements(ElementView),
}

impl Mapped {
    /// Apply the requested view to a freshly mapped buffer.
    #[must_use]
    pub fn adapt(buffer: MappedBuffer, view: ViewKind) -> Self {
        match view {
            ViewKind::Raw => Self::Buffer(buffer),
            // byte-granular, so the whole length stays addressable
            ViewKind::Bytes => Self::Elements(ElementView::new(buffer, ElementKind::U8)),
            ViewKind::Typed(kind) => Self::Elements(ElementView::new(buffer, kind)),
        }
    }

    /// Length of the whole mapping in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.buffer().len()
    }

    /// Number of addressable elements (bytes for a raw buffer).
    #[must_use]
    pub fn element_count(&self) -> usize {
        match self {
            Self::Buffer(buffer) => buffer.len(),
            Self::Elements(view) => view.len(),
        }
    }

    /// The underlying buffer.
    #[must_use]
    pub fn buffer(&self) -> &MappedBuffer {
        match self {
            Self::Buffer(buffer) => buffer,
            Self::Elements(view) => view.buffer(),
        }
    }

    /// Give the buffer back, dropping any view.
    #[must_use]
    pub fn into_buffer(self) -> MappedBuffer {
        match self {
            Self::Buffer(buffer) => buffer,
            Self::Elements(view) => view.into_buffer(),
        }
    }

    /// The element view, if one was requested.
    #[must_use]
    pub fn into_elements(self) -> Option<ElementView> {
        match self {
            Self::Buffer(_) => None,
            Self::Elements(view) => Some(view),
        }
    }
}
