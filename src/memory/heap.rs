//! Raw allocations from the native C heap
//!
//! Memory handed out here is never tracked: releasing twice, or releasing an
//! address that did not come from this module, is undefined behavior.

use std::ptr::NonNull;

use crate::error::{Result, StructError};

fn check_request(bytes: usize) -> Result<()> {
    if bytes == 0 {
        return Err(StructError::invalid_argument("bytes", "Allocation size must be greater than 0"));
    }
    Ok(())
}

/// Allocate `bytes` of uninitialized memory
pub fn allocate_uninitialized(bytes: usize) -> Result<NonNull<u8>> {
    check_request(bytes)?;
    let ptr = unsafe { libc::malloc(bytes) } as *mut u8;
    NonNull::new(ptr).ok_or_else(|| StructError::out_of_memory(bytes))
}

/// Allocate `bytes` of zero-filled memory
pub fn allocate_zeroed(bytes: usize) -> Result<NonNull<u8>> {
    check_request(bytes)?;
    let ptr = unsafe { libc::calloc(1, bytes) } as *mut u8;
    NonNull::new(ptr).ok_or_else(|| StructError::out_of_memory(bytes))
}

/// Resize an allocation, preserving the first `min(old_bytes, new_bytes)` bytes.
///
/// Bytes past `old_bytes` are uninitialized. The allocation may move; on
/// failure the original allocation is left untouched.
///
/// # Safety
/// `ptr` must have been returned by this module and not yet released, and
/// `old_bytes` must be its current size.
pub unsafe fn resize(ptr: NonNull<u8>, old_bytes: usize, new_bytes: usize) -> Result<NonNull<u8>> {
    check_request(new_bytes)?;
    let moved = libc::realloc(ptr.as_ptr() as *mut libc::c_void, new_bytes) as *mut u8;
    let moved = NonNull::new(moved).ok_or_else(|| StructError::out_of_memory(new_bytes))?;

    tracing::trace!(
        from = ?ptr,
        to = ?moved,
        old_bytes,
        new_bytes,
        "Resized heap allocation"
    );
    Ok(moved)
}

/// Return an allocation to the C heap.
///
/// # Safety
/// `ptr` must be null or have been returned by this module and not yet
/// released. No other handle may use the memory afterwards.
pub unsafe fn release(ptr: *mut u8) {
    libc::free(ptr as *mut libc::c_void);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(allocate_uninitialized(0), Err(StructError::InvalidArgument { .. })));
        assert!(matches!(allocate_zeroed(0), Err(StructError::InvalidArgument { .. })));
    }

    #[test]
    fn test_allocate_zeroed() {
        let ptr = allocate_zeroed(64).unwrap();
        unsafe {
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), 64);
            assert!(bytes.iter().all(|&b| b == 0));
            release(ptr.as_ptr());
        }
    }

    #[test]
    fn test_resize_preserves_prefix() {
        let ptr = allocate_uninitialized(4).unwrap();
        unsafe {
            std::ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr.as_ptr(), 4);

            let grown = resize(ptr, 4, 4096).unwrap();
            assert_eq!(std::slice::from_raw_parts(grown.as_ptr(), 4), &[1, 2, 3, 4]);

            let shrunk = resize(grown, 4096, 2).unwrap();
            assert_eq!(std::slice::from_raw_parts(shrunk.as_ptr(), 2), &[1, 2]);
            release(shrunk.as_ptr());
        }
    }

    #[test]
    fn test_out_of_memory() {
        assert!(matches!(
            allocate_uninitialized(usize::MAX),
            Err(StructError::OutOfMemory { requested: usize::MAX })
        ));
    }
}
