//! Pointer and array handles over struct memory
//!
//! Owning handles ([`Pointer`], [`Array`]) are move-only and release their
//! memory exactly once, either through `free()` or when they go out of scope
//! on any path, including `?` returns and unwinding panics.
//!
//! A shallow clone ([`Pointer::alias`], [`Array::alias`]) is a copyable
//! borrowing handle ([`PointerRef`], [`ArrayRef`]) sharing the same bytes.
//! Aliases never release memory, and the borrow checker keeps the owner
//! from being freed or resized while an alias is alive. An alias copies the
//! address and size at the time it was taken; changing an alias's address
//! does not affect the owner or other aliases.
//!
//! `set_address` is the unchecked escape hatch: the new address is not
//! validated, and the owner releases whatever address it holds when dropped.

use std::{fmt, marker::PhantomData, ptr, sync::Arc};

use crate::{
    codec::StructView,
    error::{Result, StructError},
    layout::TypeDescriptor,
    memory::{heap, Backing, BackingKind},
};

unsafe fn element<'a>(
    base: *mut u8,
    descriptor: &'a TypeDescriptor,
    kind: BackingKind,
    len: usize,
    index: usize,
) -> Result<StructView<'a>> {
    StructError::check_index(index, len)?;
    Ok(StructView::new(base.add(index * descriptor.size()), descriptor, kind))
}

unsafe fn zero_element(base: *mut u8, descriptor: &TypeDescriptor, len: usize, index: usize) -> Result<()> {
    StructError::check_index(index, len)?;
    let size = descriptor.size();
    ptr::write_bytes(base.add(index * size), 0, size);
    Ok(())
}

fn release(ptr: *mut u8, backing: &Backing) {
    match backing {
        // SAFETY: owning heap handles hold memory from `heap` that only they release
        Backing::Heap => unsafe { heap::release(ptr) },
        // Unmapped when the region itself is dropped
        Backing::Mapped(_) => {}
    }
}

/// Owning handle to one struct instance
pub struct Pointer {
    ptr: *mut u8,
    descriptor: Arc<TypeDescriptor>,
    backing: Backing,
}

impl Pointer {
    /// # Safety
    /// `ptr` must address at least `descriptor.size()` bytes owned by `backing`.
    pub(crate) unsafe fn from_raw(ptr: *mut u8, descriptor: Arc<TypeDescriptor>, backing: Backing) -> Self {
        Self { ptr, descriptor, backing }
    }

    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Point this handle at another address.
    ///
    /// # Safety
    /// `address` must refer to at least `size_of(T)` bytes this handle may
    /// read and write. For heap handles, whatever address is held when the
    /// handle is released is passed to the C heap's `free`.
    pub unsafe fn set_address(&mut self, address: usize) {
        self.ptr = address as *mut u8;
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// View of the struct
    pub fn deref(&self) -> StructView<'_> {
        unsafe { StructView::new(self.ptr, &self.descriptor, self.backing.kind()) }
    }

    /// Same as `deref()` for index 0; any other index is out of range
    pub fn get(&self, index: usize) -> Result<StructView<'_>> {
        unsafe { element(self.ptr, &self.descriptor, self.backing.kind(), 1, index) }
    }

    /// Zero-fill the struct
    pub fn clear(&mut self) {
        unsafe { ptr::write_bytes(self.ptr, 0, self.descriptor.size()) }
    }

    /// Always 1
    pub fn size(&self) -> usize {
        1
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.backing.kind()
    }

    /// Shallow clone sharing this pointer's memory
    pub fn alias(&self) -> PointerRef<'_> {
        unsafe { PointerRef::new(self.ptr, &self.descriptor, self.backing.kind()) }
    }

    /// The struct's bytes.
    ///
    /// Memory from `allocate` must be written (for example with `clear`)
    /// before it is viewed as bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.descriptor.size()) }
    }

    /// Release the memory now instead of at the end of scope
    pub fn free(self) {
        drop(self)
    }
}

impl Drop for Pointer {
    fn drop(&mut self) {
        release(self.ptr, &self.backing);
    }
}

/// Owning handle to `size()` contiguous struct instances
pub struct Array {
    ptr: *mut u8,
    len: usize,
    descriptor: Arc<TypeDescriptor>,
    backing: Backing,
}

impl Array {
    /// # Safety
    /// `ptr` must address at least `len × descriptor.size()` bytes owned by `backing`.
    pub(crate) unsafe fn from_raw(ptr: *mut u8, len: usize, descriptor: Arc<TypeDescriptor>, backing: Backing) -> Self {
        Self {
            ptr,
            len,
            descriptor,
            backing,
        }
    }

    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Point this handle at another address.
    ///
    /// # Safety
    /// `address` must refer to at least `size() × size_of(T)` bytes this
    /// handle may read and write. For heap handles, whatever address is held
    /// when the handle is released or resized is handed to the C heap.
    pub unsafe fn set_address(&mut self, address: usize) {
        self.ptr = address as *mut u8;
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// View of element 0
    pub fn deref(&self) -> StructView<'_> {
        unsafe { StructView::new(self.ptr, &self.descriptor, self.backing.kind()) }
    }

    /// View of element `index`
    pub fn get(&self, index: usize) -> Result<StructView<'_>> {
        unsafe { element(self.ptr, &self.descriptor, self.backing.kind(), self.len, index) }
    }

    /// Zero-fill element `index`
    pub fn clear(&mut self, index: usize) -> Result<()> {
        unsafe { zero_element(self.ptr, &self.descriptor, self.len, index) }
    }

    /// Element count
    pub fn size(&self) -> usize {
        self.len
    }

    /// Length of the backing run in bytes
    pub fn byte_len(&self) -> usize {
        self.len * self.descriptor.size()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.backing.kind()
    }

    /// Shallow clone sharing this array's memory
    pub fn alias(&self) -> ArrayRef<'_> {
        unsafe { ArrayRef::new(self.ptr, &self.descriptor, self.len, self.backing.kind()) }
    }

    /// Views of every element in order
    pub fn iter(&self) -> impl Iterator<Item = StructView<'_>> + '_ {
        let kind = self.backing.kind();
        let size = self.descriptor.size();
        (0..self.len).map(move |i| unsafe { StructView::new(self.ptr.add(i * size), &self.descriptor, kind) })
    }

    /// All elements as one byte slice.
    ///
    /// Elements from `allocate_array` or a heap `resize` must be written
    /// before they are viewed as bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.byte_len()) }
    }

    /// Flush a file-backed array to disk; no-op for other backings
    pub fn flush(&self) -> Result<()> {
        match &self.backing {
            Backing::Mapped(region) => region.flush(),
            Backing::Heap => Ok(()),
        }
    }

    /// Grow or shrink in place, updating this record's address and size.
    ///
    /// Aliases taken earlier are not updated.
    pub(crate) fn resize_in_place(&mut self, element_count: usize) -> Result<()> {
        if element_count == 0 {
            return Err(StructError::invalid_argument("count", "Element count must be greater than 0"));
        }

        let size = self.descriptor.size();
        let new_bytes = element_count
            .checked_mul(size)
            .ok_or_else(|| StructError::invalid_argument("count", "Array size overflows usize"))?;

        match &mut self.backing {
            Backing::Heap => {
                let current = ptr::NonNull::new(self.ptr)
                    .ok_or_else(|| StructError::invalid_argument("array", "Array has a null address"))?;
                // SAFETY: heap arrays own `current`, sized `len × size`
                let moved = unsafe { heap::resize(current, self.len * size, new_bytes)? };
                self.ptr = moved.as_ptr();
            }
            Backing::Mapped(region) => {
                region.resize(element_count)?;
                self.ptr = region.as_ptr();
            }
        }

        self.len = element_count;
        Ok(())
    }

    /// Release the memory now instead of at the end of scope
    pub fn free(self) {
        drop(self)
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        release(self.ptr, &self.backing);
    }
}

/// Borrowing alias of one struct instance
#[derive(Clone, Copy)]
pub struct PointerRef<'a> {
    ptr: *mut u8,
    descriptor: &'a TypeDescriptor,
    kind: BackingKind,
    _owner: PhantomData<&'a ()>,
}

impl<'a> PointerRef<'a> {
    pub(crate) unsafe fn new(ptr: *mut u8, descriptor: &'a TypeDescriptor, kind: BackingKind) -> Self {
        Self {
            ptr,
            descriptor,
            kind,
            _owner: PhantomData,
        }
    }

    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Point this alias at another address.
    ///
    /// # Safety
    /// `address` must refer to at least `size_of(T)` bytes that stay valid for `'a`.
    pub unsafe fn set_address(&mut self, address: usize) {
        self.ptr = address as *mut u8;
    }

    pub fn deref(&self) -> StructView<'a> {
        unsafe { StructView::new(self.ptr, self.descriptor, self.kind) }
    }

    pub fn get(&self, index: usize) -> Result<StructView<'a>> {
        unsafe { element(self.ptr, self.descriptor, self.kind, 1, index) }
    }

    /// Zero-fill the struct
    pub fn clear(&self) {
        unsafe { ptr::write_bytes(self.ptr, 0, self.descriptor.size()) }
    }

    pub fn size(&self) -> usize {
        1
    }

    pub fn descriptor(&self) -> &'a TypeDescriptor {
        self.descriptor
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.kind
    }

    pub fn alias(&self) -> PointerRef<'a> {
        *self
    }

    /// Aliases never own memory; this only ends the borrow
    pub fn free(self) {}
}

/// Borrowing alias of a contiguous run of struct instances
#[derive(Clone, Copy)]
pub struct ArrayRef<'a> {
    ptr: *mut u8,
    len: usize,
    descriptor: &'a TypeDescriptor,
    kind: BackingKind,
    _owner: PhantomData<&'a ()>,
}

impl<'a> ArrayRef<'a> {
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len × descriptor.size()`
    /// bytes for `'a`.
    pub(crate) unsafe fn new(ptr: *mut u8, descriptor: &'a TypeDescriptor, len: usize, kind: BackingKind) -> Self {
        Self {
            ptr,
            len,
            descriptor,
            kind,
            _owner: PhantomData,
        }
    }

    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Point this alias at another address.
    ///
    /// # Safety
    /// `address` must refer to at least `size() × size_of(T)` bytes that stay
    /// valid for `'a`.
    pub unsafe fn set_address(&mut self, address: usize) {
        self.ptr = address as *mut u8;
    }

    pub fn deref(&self) -> StructView<'a> {
        unsafe { StructView::new(self.ptr, self.descriptor, self.kind) }
    }

    pub fn get(&self, index: usize) -> Result<StructView<'a>> {
        unsafe { element(self.ptr, self.descriptor, self.kind, self.len, index) }
    }

    pub fn clear(&self, index: usize) -> Result<()> {
        unsafe { zero_element(self.ptr, self.descriptor, self.len, index) }
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn byte_len(&self) -> usize {
        self.len * self.descriptor.size()
    }

    pub fn descriptor(&self) -> &'a TypeDescriptor {
        self.descriptor
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.kind
    }

    pub fn alias(&self) -> ArrayRef<'a> {
        *self
    }

    pub fn iter(&self) -> impl Iterator<Item = StructView<'a>> + 'a {
        let this = *self;
        (0..this.len).map(move |i| unsafe {
            StructView::new(this.ptr.add(i * this.descriptor.size()), this.descriptor, this.kind)
        })
    }

    /// Aliases never own memory; this only ends the borrow
    pub fn free(self) {}
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Pointer {}
    impl Sealed for super::Array {}
}

/// Handles that own the memory they address
pub trait OwnedHandle: sealed::Sealed {
    /// Layout the handle was allocated with
    fn descriptor(&self) -> &Arc<TypeDescriptor>;

    /// Release the memory
    fn release(self);
}

impl OwnedHandle for Pointer {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn release(self) {
        self.free()
    }
}

impl OwnedHandle for Array {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn release(self) {
        self.free()
    }
}

macro_rules! impl_address_fmt {
    ($($handle:ty),*) => {
        $(
            impl fmt::Display for $handle {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{:#x}", self.address())
                }
            }

            impl fmt::LowerHex for $handle {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::LowerHex::fmt(&self.address(), f)
                }
            }

            impl fmt::Debug for $handle {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($handle))
                        .field("type", &self.descriptor().name())
                        .field("address", &format_args!("{:#x}", self.address()))
                        .field("size", &self.size())
                        .field("backing", &self.backing_kind().name())
                        .finish()
                }
            }
        )*
    };
}

impl_address_fmt!(Pointer, Array, PointerRef<'_>, ArrayRef<'_>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::DescriptorRegistry,
        memory::heap,
        schema::{FieldSchema, FieldType, StructSchema},
    };

    fn val() -> Arc<TypeDescriptor> {
        let schema = StructSchema::new("Val").field(FieldSchema::new("val", FieldType::Int));
        let registry = DescriptorRegistry::from_schemas(vec![schema]).unwrap();
        Arc::clone(registry.get("Val").unwrap())
    }

    fn heap_array(len: usize) -> Array {
        let descriptor = val();
        let ptr = heap::allocate_zeroed(len * descriptor.size()).unwrap();
        unsafe { Array::from_raw(ptr.as_ptr(), len, descriptor, Backing::Heap) }
    }

    #[test]
    fn test_pointer_index_bounds() {
        let descriptor = val();
        let ptr = heap::allocate_zeroed(descriptor.size()).unwrap();
        let pointer = unsafe { Pointer::from_raw(ptr.as_ptr(), descriptor, Backing::Heap) };

        assert_eq!(pointer.size(), 1);
        assert!(pointer.get(0).is_ok());
        assert!(matches!(pointer.get(1), Err(StructError::IndexOutOfRange { index: 1, size: 1 })));
        assert_eq!(pointer.backing_kind(), BackingKind::Heap);
    }

    #[test]
    fn test_array_views_are_strided() {
        let array = heap_array(3);
        for (i, view) in array.iter().enumerate() {
            view.set_int("val", i as i32 * 10).unwrap();
            assert_eq!(view.address(), array.address() + i * 4);
        }
        assert_eq!(array.get(2).unwrap().get_int("val").unwrap(), 20);
        assert_eq!(array.deref(), array.get(0).unwrap());
    }

    #[test]
    fn test_alias_copies_state() {
        let array = heap_array(2);
        let alias = array.alias();
        assert_eq!(alias.address(), array.address());
        assert_eq!(alias.size(), array.size());

        alias.get(1).unwrap().set_int("val", 5).unwrap();
        assert_eq!(array.get(1).unwrap().get_int("val").unwrap(), 5);

        let mut moved = alias;
        unsafe { moved.set_address(array.get(1).unwrap().address()) };
        assert_eq!(alias.address(), array.address());
        assert_eq!(moved.deref().get_int("val").unwrap(), 5);
    }

    #[test]
    fn test_resize_in_place() {
        let mut array = heap_array(1);
        array.deref().set_int("val", 77).unwrap();

        array.resize_in_place(4).unwrap();
        assert_eq!(array.size(), 4);
        assert_eq!(array.byte_len(), 16);
        assert_eq!(array.get(0).unwrap().get_int("val").unwrap(), 77);

        assert!(matches!(array.resize_in_place(0), Err(StructError::InvalidArgument { .. })));
        assert_eq!(array.size(), 4);
    }

    #[test]
    fn test_display_prefix() {
        let array = heap_array(1);
        assert!(array.to_string().starts_with("0x"));
        assert_eq!(format!("{:x}", array), format!("{:x}", array.address()));
        assert!(format!("{:?}", array.alias()).contains("ArrayRef"));
    }
}
