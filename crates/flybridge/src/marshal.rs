//! # Marshalling Layer
//!
//! Moves text and byte payloads between host values and guest memory.
//!
//! ## Rules
//!
//! - **Always paired**: every buffer is a `(ptr, len)` pair. Nothing is
//!   terminator-delimited, so payloads with embedded zero bytes survive intact.
//! - **One allocation, one copy**: `wrap` allocates once in the guest and
//!   copies once; `copy_out` copies once into a host `Vec`. No pooling.
//! - **Fatal on corruption**: a declared length that runs past guest memory is
//!   a `SizeMismatch`. Callers must not try to continue with that guest.

use std::fmt;

/// Marshalling failures.
///
/// Most variants mean guest memory or the guest's exports can no longer be
/// trusted. `InvalidUtf8` and `AllocatorTrap` are the exceptions: the guest
/// handed over bad text or its allocator faulted, but its memory is intact,
/// so the invocation layer reports them as guest faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// A buffer's declared extent lies outside guest memory.
    SizeMismatch { ptr: u32, len: u32, available: usize },
    /// A text buffer did not hold UTF-8.
    InvalidUtf8 { ptr: u32, len: u32 },
    /// The guest allocator is missing or unusable.
    Alloc(String),
    /// The guest's own `malloc` or `free` trapped.
    AllocatorTrap(String),
    /// The guest exports no linear memory.
    NoMemory,
    /// An import was called with fewer raw parameters than it declares.
    MissingArgument { import: &'static str, index: usize },
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { ptr, len, available } => write!(
                f,
                "Buffer {:#x}+{} exceeds guest memory of {} bytes",
                ptr, len, available
            ),
            Self::InvalidUtf8 { ptr, len } => {
                write!(f, "Buffer {:#x}+{} is not valid UTF-8", ptr, len)
            }
            Self::Alloc(msg) => write!(f, "Guest allocation failed: {}", msg),
            Self::AllocatorTrap(msg) => write!(f, "Guest allocator trapped: {}", msg),
            Self::NoMemory => write!(f, "Guest exports no memory"),
            Self::MissingArgument { import, index } => {
                write!(f, "Import '{}' is missing raw argument {}", import, index)
            }
        }
    }
}

impl std::error::Error for MarshalError {}

impl MarshalError {
    /// Whether the guest must be considered unusable after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidUtf8 { .. } | Self::AllocatorTrap(_))
    }
}

pub type Result<T> = std::result::Result<T, MarshalError>;

/// A length-qualified region of guest memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarshalledBuffer {
    pub ptr: u32,
    pub len: u32,
}

impl MarshalledBuffer {
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    /// Reinterprets a raw `(ptr, len)` pair received from the guest.
    pub fn from_raw(ptr: i32, len: i32) -> Self {
        Self {
            ptr: ptr as u32,
            len: len as u32,
        }
    }

    /// The pair in the guest's call convention.
    pub fn to_raw(self) -> [i32; 2] {
        [self.ptr as i32, self.len as i32]
    }
}

/// Access to a guest's linear memory and allocator.
pub trait GuestMemory {
    /// Allocates `len` bytes inside the guest and returns the offset.
    fn alloc(&mut self, len: u32) -> Result<u32>;

    /// Returns a buffer to the guest allocator.
    fn release(&mut self, ptr: u32) -> Result<()>;

    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Copies `bytes` into a fresh guest allocation.
pub fn wrap<M: GuestMemory + ?Sized>(memory: &mut M, bytes: &[u8]) -> Result<MarshalledBuffer> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| MarshalError::Alloc(format!("{} bytes exceed u32", bytes.len())))?;
    let ptr = memory.alloc(len)?;
    let buffer = MarshalledBuffer::new(ptr, len);
    let target = region_mut(memory, buffer)?;
    target.copy_from_slice(bytes);
    tracing::trace!(ptr, len, "wrapped buffer into guest");
    Ok(buffer)
}

/// Copies a guest buffer out into host memory.
pub fn copy_out<M: GuestMemory + ?Sized>(memory: &M, buffer: MarshalledBuffer) -> Result<Vec<u8>> {
    region(memory, buffer).map(<[u8]>::to_vec)
}

/// Copies UTF-8 text into guest memory. The length is the encoded byte count.
pub fn encode<M: GuestMemory + ?Sized>(memory: &mut M, text: &str) -> Result<MarshalledBuffer> {
    wrap(memory, text.as_bytes())
}

/// Reads UTF-8 text out of guest memory.
pub fn decode<M: GuestMemory + ?Sized>(memory: &M, buffer: MarshalledBuffer) -> Result<String> {
    let bytes = copy_out(memory, buffer)?;
    String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8 {
        ptr: buffer.ptr,
        len: buffer.len,
    })
}

/// Writes a little-endian u32 at `ptr`, for out-parameters.
pub fn store_u32<M: GuestMemory + ?Sized>(memory: &mut M, ptr: u32, value: u32) -> Result<()> {
    let target = region_mut(memory, MarshalledBuffer::new(ptr, 4))?;
    target.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

fn extent(available: usize, buffer: MarshalledBuffer) -> Result<std::ops::Range<usize>> {
    let start = buffer.ptr as usize;
    let end = start.checked_add(buffer.len as usize);
    match end {
        Some(end) if end <= available => Ok(start..end),
        _ => Err(MarshalError::SizeMismatch {
            ptr: buffer.ptr,
            len: buffer.len,
            available,
        }),
    }
}

fn region<M: GuestMemory + ?Sized>(memory: &M, buffer: MarshalledBuffer) -> Result<&[u8]> {
    let bytes = memory.bytes();
    let range = extent(bytes.len(), buffer)?;
    Ok(&bytes[range])
}

fn region_mut<M: GuestMemory + ?Sized>(
    memory: &mut M,
    buffer: MarshalledBuffer,
) -> Result<&mut [u8]> {
    let bytes = memory.bytes_mut();
    let range = extent(bytes.len(), buffer)?;
    Ok(&mut bytes[range])
}
