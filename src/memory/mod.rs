//! Raw memory primitives backing struct handles

pub mod config;
pub mod external;
pub mod heap;
pub mod mapped;

pub use config::MmapConfig;
pub use external::{wrap_external_buffer, ByteOrder, ExternalBuffer, ForeignBuffer};
pub use mapped::MappedRegion;

/// Where a handle's memory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    /// C heap allocation
    Heap,
    /// Mapping of a file on disk
    MappedFile,
    /// Anonymous mapping
    MappedAnonymous,
    /// Caller-owned buffer, never released by this crate
    External,
}

impl BackingKind {
    /// Get a human-readable name for the backing kind
    pub fn name(&self) -> &'static str {
        match self {
            BackingKind::Heap => "heap",
            BackingKind::MappedFile => "mmap-file",
            BackingKind::MappedAnonymous => "mmap-anonymous",
            BackingKind::External => "external-buffer",
        }
    }
}

/// Memory owned by a handle, released exactly once when the handle is dropped
#[derive(Debug)]
pub(crate) enum Backing {
    /// Released with [`heap::release`] at the handle's current address
    Heap,
    /// Unmapped when the region is dropped
    Mapped(MappedRegion),
}

impl Backing {
    pub(crate) fn kind(&self) -> BackingKind {
        match self {
            Backing::Heap => BackingKind::Heap,
            Backing::Mapped(region) if region.is_file_backed() => BackingKind::MappedFile,
            Backing::Mapped(_) => BackingKind::MappedAnonymous,
        }
    }
}
