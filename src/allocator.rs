//! Struct allocators binding handles to resolved descriptors

use std::{path::Path, sync::Arc};

use crate::{
    error::{Result, StructError},
    handle::{Array, ArrayRef, OwnedHandle, Pointer},
    layout::{DescriptorRegistry, TypeDescriptor},
    memory::{heap, wrap_external_buffer, Backing, BackingKind, ExternalBuffer, MappedRegion, MmapConfig},
    schema::StructSchema,
};

fn check_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(StructError::invalid_argument("count", "Element count must be greater than 0"));
    }
    Ok(())
}

fn array_bytes(count: usize, descriptor: &TypeDescriptor) -> Result<usize> {
    check_count(count)?;
    count
        .checked_mul(descriptor.size())
        .ok_or_else(|| StructError::invalid_argument("count", "Array size overflows usize"))
}

/// Operations shared by every allocator.
///
/// Each allocator owns the descriptors it resolved at construction; handles
/// for types outside that set are rejected with `UnknownType`.
pub trait StructAllocator {
    /// Descriptors resolved when the allocator was built
    fn registry(&self) -> &DescriptorRegistry;

    /// Descriptor of a supported struct type
    fn descriptor(&self, type_name: &str) -> Result<&Arc<TypeDescriptor>> {
        self.registry().get(type_name)
    }

    /// Size in bytes of one struct of the given type
    fn size_of(&self, type_name: &str) -> Result<usize> {
        self.descriptor(type_name).map(|d| d.size())
    }

    /// Whether the allocator was built with this struct type
    fn supports(&self, type_name: &str) -> bool {
        self.registry().contains(type_name)
    }

    /// Resize `array` in place to `count` elements.
    ///
    /// The same record is updated; aliases taken before the call are not.
    /// The first `min(old, new)` elements are preserved. Added heap
    /// elements are uninitialized, added mapped elements are zero.
    fn resize(&self, array: &mut Array, count: usize) -> Result<()> {
        let descriptor = self.descriptor(array.descriptor().name())?;
        if !Arc::ptr_eq(descriptor, array.descriptor()) {
            return Err(StructError::unknown_type(array.descriptor().name()));
        }

        let old_count = array.size();
        array.resize_in_place(count)?;
        tracing::debug!(
            struct_type = descriptor.name(),
            backing = array.backing_kind().name(),
            old_count,
            new_count = count,
            "Resized struct array"
        );
        Ok(())
    }

    /// Release a pointer or array now.
    ///
    /// The handle is always released. A handle whose layout this allocator
    /// did not resolve is reported as `UnknownType`.
    fn free<H: OwnedHandle>(&self, handle: H) -> Result<()>
    where
        Self: Sized,
    {
        let name = handle.descriptor().name().to_string();
        let owned = self
            .descriptor(&name)
            .map(|descriptor| Arc::ptr_eq(descriptor, handle.descriptor()))
            .unwrap_or(false);

        handle.release();
        if owned {
            Ok(())
        } else {
            tracing::warn!(struct_type = %name, "Released handle from another allocator");
            Err(StructError::unknown_type(name))
        }
    }
}

/// Allocates structs from the native C heap
#[derive(Debug)]
pub struct HeapAllocator {
    registry: DescriptorRegistry,
}

impl HeapAllocator {
    /// Resolve the layouts of `schemas` once.
    ///
    /// This is the expensive step; build one allocator and reuse it.
    pub fn new<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = StructSchema>,
    {
        let registry = DescriptorRegistry::from_schemas(schemas)?;
        tracing::debug!(types = ?registry.names(), "Created heap struct allocator");
        Ok(Self { registry })
    }

    /// Build an allocator over an already-resolved registry
    pub fn from_registry(registry: DescriptorRegistry) -> Self {
        Self { registry }
    }

    /// Allocate one struct; contents are unspecified until written.
    ///
    /// Write every byte (for example with `Pointer::clear`) before taking
    /// `as_bytes_mut`.
    pub fn allocate(&self, type_name: &str) -> Result<Pointer> {
        let descriptor = self.descriptor(type_name)?;
        let ptr = heap::allocate_uninitialized(descriptor.size())?;
        Ok(unsafe { Pointer::from_raw(ptr.as_ptr(), Arc::clone(descriptor), Backing::Heap) })
    }

    /// Allocate one zero-filled struct
    pub fn allocate_zeroed(&self, type_name: &str) -> Result<Pointer> {
        let descriptor = self.descriptor(type_name)?;
        let ptr = heap::allocate_zeroed(descriptor.size())?;
        Ok(unsafe { Pointer::from_raw(ptr.as_ptr(), Arc::clone(descriptor), Backing::Heap) })
    }

    /// Allocate `count` structs; contents are unspecified until written.
    ///
    /// Write every element (for example with `Array::clear`) before taking
    /// `as_bytes_mut`.
    pub fn allocate_array(&self, count: usize, type_name: &str) -> Result<Array> {
        let descriptor = self.descriptor(type_name)?;
        let ptr = heap::allocate_uninitialized(array_bytes(count, descriptor)?)?;
        Ok(unsafe { Array::from_raw(ptr.as_ptr(), count, Arc::clone(descriptor), Backing::Heap) })
    }

    /// Allocate `count` zero-filled structs
    pub fn allocate_array_zeroed(&self, count: usize, type_name: &str) -> Result<Array> {
        let descriptor = self.descriptor(type_name)?;
        let ptr = heap::allocate_zeroed(array_bytes(count, descriptor)?)?;
        Ok(unsafe { Array::from_raw(ptr.as_ptr(), count, Arc::clone(descriptor), Backing::Heap) })
    }
}

impl StructAllocator for HeapAllocator {
    fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }
}

/// Allocates structs in memory mappings and caller-owned buffers
#[derive(Debug)]
pub struct MmapAllocator {
    registry: DescriptorRegistry,
    config: MmapConfig,
}

impl MmapAllocator {
    /// Resolve the layouts of `schemas` with default mapping options
    pub fn new<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = StructSchema>,
    {
        Self::with_config(schemas, MmapConfig::default())
    }

    /// Resolve the layouts of `schemas` with custom mapping options
    pub fn with_config<I>(schemas: I, config: MmapConfig) -> Result<Self>
    where
        I: IntoIterator<Item = StructSchema>,
    {
        config.validate()?;
        let registry = DescriptorRegistry::from_schemas(schemas)?;
        tracing::debug!(types = ?registry.names(), "Created mmap struct allocator");
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &MmapConfig {
        &self.config
    }

    /// Map `count` structs onto `path`, creating or resizing the file to
    /// exactly `count × size_of(type)` bytes
    pub fn map_file(&self, path: impl AsRef<Path>, count: usize, type_name: &str) -> Result<Array> {
        let descriptor = self.descriptor(type_name)?;
        check_count(count)?;
        let region = MappedRegion::map_file(path, count, descriptor.size(), &self.config)?;
        let ptr = region.as_ptr();
        Ok(unsafe { Array::from_raw(ptr, count, Arc::clone(descriptor), Backing::Mapped(region)) })
    }

    /// Map `count` zero-filled structs with no backing file
    pub fn map_anonymous(&self, count: usize, type_name: &str) -> Result<Array> {
        let descriptor = self.descriptor(type_name)?;
        check_count(count)?;
        let region = MappedRegion::map_anonymous(count, descriptor.size())?;
        let ptr = region.as_ptr();
        Ok(unsafe { Array::from_raw(ptr, count, Arc::clone(descriptor), Backing::Mapped(region)) })
    }

    /// Use a caller-owned buffer as struct storage.
    ///
    /// The buffer must be directly addressable and in native byte order;
    /// both are checked before any access. The array covers as many whole
    /// structs as fit, and the buffer is never released by the returned handle.
    pub fn wrap_buffer<'b, B>(&'b self, buffer: &'b mut B, type_name: &str) -> Result<ArrayRef<'b>>
    where
        B: ExternalBuffer + ?Sized,
    {
        let descriptor = self.descriptor(type_name)?;
        let (base, count) = wrap_external_buffer(buffer, descriptor.size())?;
        tracing::trace!(struct_type = type_name, count, "Wrapped external buffer");
        Ok(unsafe { ArrayRef::new(base.as_ptr(), descriptor, count, BackingKind::External) })
    }

    /// Bytes of every element of `array`.
    ///
    /// Heap elements that were never written must be initialized first.
    pub fn to_bytes<'a>(&self, array: &'a mut Array) -> &'a mut [u8] {
        array.as_bytes_mut()
    }
}

impl StructAllocator for MmapAllocator {
    fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }
}
