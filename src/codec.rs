//! Typed field access at computed offsets in raw memory
//!
//! Every access is dispatched on the field's [`FieldType`]:
//!
//! | type   | Rust value | width (default / C) |
//! |--------|------------|---------------------|
//! | BYTE   | `i8`       | 1 / 1               |
//! | CHAR   | `u16`      | 2 / 1               |
//! | INT    | `i32`      | 4 / 4               |
//! | LONG   | `i64`      | 8 / 8               |
//! | STRING | `String`   | 2 / 1 per slot      |
//!
//! CHAR and STRING slots hold UTF-16 code units; C mode keeps the low
//! byte of each unit and zero-extends it on read.
//! | STRUCT | view       | nested size         |
//!
//! Integers are stored in native byte order without alignment. Scalar
//! accessors address element 0; the `_at` variants address any element of
//! an array field.

use std::{fmt, marker::PhantomData, ptr};

use crate::{
    error::{Result, StructError},
    handle::ArrayRef,
    layout::{ResolvedField, TypeDescriptor},
    memory::BackingKind,
    schema::FieldType,
};

trait Primitive: Copy {
    const FIELD_TYPE: FieldType;
}

impl Primitive for i8 {
    const FIELD_TYPE: FieldType = FieldType::Byte;
}

impl Primitive for i32 {
    const FIELD_TYPE: FieldType = FieldType::Int;
}

impl Primitive for i64 {
    const FIELD_TYPE: FieldType = FieldType::Long;
}

/// One struct instance bound to its descriptor.
///
/// Views share the memory of the handle they came from; nothing is copied.
/// Writes go through `&self`, so several views of the same memory may be
/// used interchangeably on one thread.
#[derive(Clone, Copy)]
pub struct StructView<'a> {
    ptr: *mut u8,
    descriptor: &'a TypeDescriptor,
    kind: BackingKind,
    _memory: PhantomData<&'a ()>,
}

impl<'a> StructView<'a> {
    /// # Safety
    /// `ptr` must be valid for reads and writes of `descriptor.size()` bytes
    /// for `'a`.
    pub(crate) unsafe fn new(ptr: *mut u8, descriptor: &'a TypeDescriptor, kind: BackingKind) -> Self {
        Self {
            ptr,
            descriptor,
            kind,
            _memory: PhantomData,
        }
    }

    /// Address of the first byte of the struct
    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    pub fn descriptor(&self) -> &'a TypeDescriptor {
        self.descriptor
    }

    /// Size of the struct in bytes
    pub fn size(&self) -> usize {
        self.descriptor.size()
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.kind
    }

    /// Zero every byte of the struct
    pub fn clear(&self) {
        unsafe { ptr::write_bytes(self.ptr, 0, self.descriptor.size()) }
    }

    fn typed_field(&self, name: &str, expected: FieldType) -> Result<&'a ResolvedField> {
        let field = self.descriptor.field(name)?;
        if field.field_type != expected {
            return Err(StructError::invalid_argument(
                "field",
                format!(
                    "field '{}.{}' is {}, not {}",
                    self.descriptor.name(),
                    name,
                    field.field_type.name(),
                    expected.name()
                ),
            ));
        }
        Ok(field)
    }

    fn slot(&self, field: &ResolvedField, index: usize) -> Result<*mut u8> {
        StructError::check_index(index, field.len)?;
        Ok(unsafe { self.ptr.add(field.element_offset(index)) })
    }

    fn read_at<T: Primitive>(&self, name: &str, index: usize) -> Result<T> {
        let field = self.typed_field(name, T::FIELD_TYPE)?;
        let slot = self.slot(field, index)?;
        Ok(unsafe { ptr::read_unaligned(slot as *const T) })
    }

    fn write_at<T: Primitive>(&self, name: &str, index: usize, value: T) -> Result<()> {
        let field = self.typed_field(name, T::FIELD_TYPE)?;
        let slot = self.slot(field, index)?;
        unsafe { ptr::write_unaligned(slot as *mut T, value) };
        Ok(())
    }

    fn read_all<T: Primitive>(&self, name: &str) -> Result<Vec<T>> {
        let field = self.typed_field(name, T::FIELD_TYPE)?;
        let base = unsafe { self.ptr.add(field.offset) } as *const T;
        Ok((0..field.len)
            .map(|i| unsafe { ptr::read_unaligned(base.add(i)) })
            .collect())
    }

    fn write_all<T: Primitive>(&self, name: &str, values: &[T]) -> Result<()> {
        let field = self.typed_field(name, T::FIELD_TYPE)?;
        let base = unsafe { self.ptr.add(field.offset) } as *mut T;
        for (i, value) in values.iter().take(field.len).enumerate() {
            unsafe { ptr::write_unaligned(base.add(i), *value) };
        }
        Ok(())
    }

    pub fn get_byte(&self, name: &str) -> Result<i8> {
        self.read_at(name, 0)
    }

    pub fn set_byte(&self, name: &str, value: i8) -> Result<()> {
        self.write_at(name, 0, value)
    }

    pub fn get_byte_at(&self, name: &str, index: usize) -> Result<i8> {
        self.read_at(name, index)
    }

    pub fn set_byte_at(&self, name: &str, index: usize, value: i8) -> Result<()> {
        self.write_at(name, index, value)
    }

    /// All elements of a byte field
    pub fn get_bytes(&self, name: &str) -> Result<Vec<i8>> {
        self.read_all(name)
    }

    /// Copy up to the field length from `values`; extra input is dropped
    pub fn set_bytes(&self, name: &str, values: &[i8]) -> Result<()> {
        self.write_all(name, values)
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.read_at(name, 0)
    }

    pub fn set_int(&self, name: &str, value: i32) -> Result<()> {
        self.write_at(name, 0, value)
    }

    pub fn get_int_at(&self, name: &str, index: usize) -> Result<i32> {
        self.read_at(name, index)
    }

    pub fn set_int_at(&self, name: &str, index: usize, value: i32) -> Result<()> {
        self.write_at(name, index, value)
    }

    pub fn get_ints(&self, name: &str) -> Result<Vec<i32>> {
        self.read_all(name)
    }

    pub fn set_ints(&self, name: &str, values: &[i32]) -> Result<()> {
        self.write_all(name, values)
    }

    pub fn get_long(&self, name: &str) -> Result<i64> {
        self.read_at(name, 0)
    }

    pub fn set_long(&self, name: &str, value: i64) -> Result<()> {
        self.write_at(name, 0, value)
    }

    pub fn get_long_at(&self, name: &str, index: usize) -> Result<i64> {
        self.read_at(name, index)
    }

    pub fn set_long_at(&self, name: &str, index: usize, value: i64) -> Result<()> {
        self.write_at(name, index, value)
    }

    pub fn get_longs(&self, name: &str) -> Result<Vec<i64>> {
        self.read_all(name)
    }

    pub fn set_longs(&self, name: &str, values: &[i64]) -> Result<()> {
        self.write_all(name, values)
    }

    fn char_width(&self) -> usize {
        if self.descriptor.is_c_compatible() {
            1
        } else {
            2
        }
    }

    unsafe fn read_unit(&self, slot: *const u8) -> u16 {
        match self.char_width() {
            1 => u16::from(*slot),
            _ => ptr::read_unaligned(slot as *const u16),
        }
    }

    // C mode keeps the low byte only
    unsafe fn write_unit(&self, slot: *mut u8, unit: u16) {
        match self.char_width() {
            1 => *slot = unit as u8,
            _ => ptr::write_unaligned(slot as *mut u16, unit),
        }
    }

    /// Character code unit at element 0
    pub fn get_char(&self, name: &str) -> Result<u16> {
        self.get_char_at(name, 0)
    }

    pub fn set_char(&self, name: &str, value: u16) -> Result<()> {
        self.set_char_at(name, 0, value)
    }

    pub fn get_char_at(&self, name: &str, index: usize) -> Result<u16> {
        let field = self.typed_field(name, FieldType::Char)?;
        let slot = self.slot(field, index)?;
        Ok(unsafe { self.read_unit(slot) })
    }

    pub fn set_char_at(&self, name: &str, index: usize, value: u16) -> Result<()> {
        let field = self.typed_field(name, FieldType::Char)?;
        let slot = self.slot(field, index)?;
        unsafe { self.write_unit(slot, value) };
        Ok(())
    }

    pub fn get_chars(&self, name: &str) -> Result<Vec<u16>> {
        let field = self.typed_field(name, FieldType::Char)?;
        Ok((0..field.len)
            .map(|i| unsafe { self.read_unit(self.ptr.add(field.element_offset(i))) })
            .collect())
    }

    pub fn set_chars(&self, name: &str, values: &[u16]) -> Result<()> {
        let field = self.typed_field(name, FieldType::Char)?;
        for (i, unit) in values.iter().take(field.len).enumerate() {
            unsafe { self.write_unit(self.ptr.add(field.element_offset(i)), *unit) };
        }
        Ok(())
    }

    /// Decode a string field.
    ///
    /// C mode zero-extends each byte and stops at the first zero unit or
    /// after `len - 1` units. Default mode decodes all `len` UTF-16 units,
    /// including any zeros.
    pub fn get_string(&self, name: &str) -> Result<String> {
        let field = self.typed_field(name, FieldType::String)?;
        let slots = |count: usize| {
            (0..count).map(move |i| unsafe { self.read_unit(self.ptr.add(field.element_offset(i))) })
        };

        let units: Vec<u16> = if self.descriptor.is_c_compatible() {
            slots(field.len - 1).take_while(|&unit| unit != 0).collect()
        } else {
            slots(field.len).collect()
        };
        Ok(String::from_utf16_lossy(&units))
    }

    /// Encode a string field, truncating input that does not fit.
    ///
    /// Each UTF-16 unit takes one slot, stored as for CHAR. C mode copies
    /// at most `len - 1` units then writes one zero terminator. Default
    /// mode copies at most `len` units and leaves the remaining slots
    /// untouched.
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let field = self.typed_field(name, FieldType::String)?;
        let capacity = if self.descriptor.is_c_compatible() {
            field.len - 1
        } else {
            field.len
        };

        let mut written = 0;
        for unit in value.encode_utf16().take(capacity) {
            unsafe { self.write_unit(self.ptr.add(field.element_offset(written)), unit) };
            written += 1;
        }
        if self.descriptor.is_c_compatible() {
            unsafe { self.write_unit(self.ptr.add(field.element_offset(written)), 0) };
        }
        Ok(())
    }

    /// View of a nested struct field
    pub fn get_struct(&self, name: &str) -> Result<StructView<'a>> {
        self.get_struct_at(name, 0)
    }

    /// View of element `index` of a nested struct array
    pub fn get_struct_at(&self, name: &str, index: usize) -> Result<StructView<'a>> {
        let field = self.typed_field(name, FieldType::Struct)?;
        let slot = self.slot(field, index)?;
        let nested = nested_descriptor(field)?;
        Ok(unsafe { StructView::new(slot, nested, self.kind) })
    }

    /// Array handle over a nested struct array field
    pub fn get_struct_array(&self, name: &str) -> Result<ArrayRef<'a>> {
        let field = self.typed_field(name, FieldType::Struct)?;
        let nested = nested_descriptor(field)?;
        let base = unsafe { self.ptr.add(field.offset) };
        Ok(unsafe { ArrayRef::new(base, nested, field.len, self.kind) })
    }
}

fn nested_descriptor(field: &ResolvedField) -> Result<&TypeDescriptor> {
    field
        .nested
        .as_deref()
        .ok_or_else(|| StructError::invalid_argument("field", format!("field '{}' has no nested layout", field.name)))
}

impl fmt::Debug for StructView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructView")
            .field("type", &self.descriptor.name())
            .field("address", &format_args!("{:#x}", self.address()))
            .field("size", &self.size())
            .finish()
    }
}

impl PartialEq for StructView<'_> {
    /// Views are equal when they address the same struct
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && std::ptr::eq(self.descriptor, other.descriptor)
    }
}

impl Eq for StructView<'_> {}
