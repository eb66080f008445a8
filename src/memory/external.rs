//! Caller-owned buffers used as struct storage without taking ownership

use std::{collections::VecDeque, ptr::NonNull};

use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StructError};

/// Byte order of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the current target
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

/// A region of memory owned by the caller.
///
/// Only regions that are one directly addressable block in native byte
/// order can back structs. Both properties are checked before any access.
pub trait ExternalBuffer {
    /// Start of the region, or `None` when it is not one directly addressable block
    fn direct_ptr(&mut self) -> Option<NonNull<u8>>;

    /// Usable length in bytes
    fn byte_len(&self) -> usize;

    /// Byte order the region's contents are stored in
    fn byte_order(&self) -> ByteOrder {
        ByteOrder::native()
    }
}

impl ExternalBuffer for [u8] {
    fn direct_ptr(&mut self) -> Option<NonNull<u8>> {
        NonNull::new(self.as_mut_ptr())
    }

    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ExternalBuffer for Vec<u8> {
    fn direct_ptr(&mut self) -> Option<NonNull<u8>> {
        NonNull::new(self.as_mut_ptr())
    }

    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ExternalBuffer for MmapMut {
    fn direct_ptr(&mut self) -> Option<NonNull<u8>> {
        NonNull::new(self.as_mut_ptr())
    }

    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Ring buffers are only addressable while their contents do not wrap.
impl ExternalBuffer for VecDeque<u8> {
    fn direct_ptr(&mut self) -> Option<NonNull<u8>> {
        let (front, back) = self.as_mut_slices();
        if back.is_empty() {
            NonNull::new(front.as_mut_ptr())
        } else {
            None
        }
    }

    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Memory handed over by foreign code, described by raw parts
#[derive(Debug, Clone, Copy)]
pub struct ForeignBuffer {
    ptr: *mut u8,
    len: usize,
    order: ByteOrder,
}

impl ForeignBuffer {
    /// Describe `len` bytes at `ptr` stored in `order`.
    ///
    /// A null `ptr` describes a region that is not directly addressable.
    ///
    /// # Safety
    /// A non-null `ptr` must be valid for reads and writes of `len` bytes
    /// for as long as any struct handle wrapping it is in use.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize, order: ByteOrder) -> Self {
        Self { ptr, len, order }
    }
}

impl ExternalBuffer for ForeignBuffer {
    fn direct_ptr(&mut self) -> Option<NonNull<u8>> {
        NonNull::new(self.ptr)
    }

    fn byte_len(&self) -> usize {
        self.len
    }

    fn byte_order(&self) -> ByteOrder {
        self.order
    }
}

/// Validate `buffer` as struct storage and return its base address and
/// the number of whole `element_size` structs it holds.
pub fn wrap_external_buffer<B>(buffer: &mut B, element_size: usize) -> Result<(NonNull<u8>, usize)>
where
    B: ExternalBuffer + ?Sized,
{
    let base = buffer.direct_ptr().ok_or_else(|| {
        StructError::invalid_argument("buffer", "Buffer is not a directly addressable memory region")
    })?;

    let order = buffer.byte_order();
    if !order.is_native() {
        return Err(StructError::invalid_argument(
            "buffer",
            format!("Buffer byte order {:?} is not native ({:?})", order, ByteOrder::native()),
        ));
    }

    if element_size == 0 {
        return Err(StructError::invalid_argument("element_size", "Element size must be greater than 0"));
    }

    let len = buffer.byte_len();
    let element_count = len / element_size;
    if element_count == 0 {
        return Err(StructError::invalid_argument(
            "buffer",
            format!("Buffer of {} bytes cannot hold a {}-byte struct", len, element_size),
        ));
    }

    Ok((base, element_count))
}
