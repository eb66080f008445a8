//! # rawstruct - Fixed-Layout Structs in Raw Memory
//!
//! rawstruct lets a program declare fixed-layout records and allocate,
//! access and release them directly in raw memory: the C heap, memory-mapped
//! files, anonymous mappings or caller-owned buffers. Layouts can be made
//! byte-compatible with native C structs.
//!
//! ## Features
//!
//! - **Declarative schemas**: Named fields of BYTE, CHAR, INT, LONG, STRING or nested STRUCT type
//! - **Tight layouts**: Sequential packing with no alignment, rounded up to a pad multiple
//! - **Typed field access**: Native byte order, fixed-capacity strings with C or UTF-16 rules
//! - **Owning handles**: Pointers and arrays release their memory exactly once
//! - **Multiple backings**: Heap, mmap file, anonymous mmap and external buffers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           StructAllocator (heap | mmap)         │
//! ├─────────────────────────────────────────────────┤
//! │  DescriptorResolver      │  Raw memory          │
//! │  - Field offsets         │  - malloc / calloc   │
//! │  - Nested descriptors    │  - mmap file / anon  │
//! │  - Pad rounding          │  - External buffers  │
//! └─────────────────────────────────────────────────┘
//!           │                         │
//!           ▼                         ▼
//! ┌─────────────────┐    ┌─────────────────────────┐
//! │  Pointer/Array  │───▶│   StructView (codec)    │
//! │  (ownership)    │    │   get_x / set_x         │
//! └─────────────────┘    └─────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rawstruct::{FieldSchema, FieldType, HeapAllocator, StructSchema};
//!
//! let schema = StructSchema::new("Point")
//!     .field(FieldSchema::new("x", FieldType::Int))
//!     .field(FieldSchema::new("y", FieldType::Int));
//! let allocator = HeapAllocator::new(vec![schema])?;
//!
//! let point = allocator.allocate_zeroed("Point")?;
//! point.deref().set_int("x", 3)?;
//! assert_eq!(point.deref().get_int("x")?, 3);
//! # Ok::<(), rawstruct::StructError>(())
//! ```

// Core modules
pub mod error;
pub mod schema;
pub mod layout;
pub mod codec;
pub mod memory;
pub mod handle;
pub mod allocator;

// Main API re-exports
pub use error::{Result, StructError};
pub use schema::{FieldSchema, FieldType, StructSchema};
pub use layout::{DescriptorRegistry, DescriptorResolver, ResolvedField, TypeDescriptor};
pub use codec::StructView;
pub use handle::{Array, ArrayRef, OwnedHandle, Pointer, PointerRef};
pub use allocator::{HeapAllocator, MmapAllocator, StructAllocator};
pub use memory::{BackingKind, ByteOrder, ExternalBuffer, ForeignBuffer, MappedRegion, MmapConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default pad multiple for struct sizes
    pub const DEFAULT_PAD: usize = 1;

    /// Default permissions for mapped files
    pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o644;

    /// Width of CHAR and STRING slots outside C mode
    pub const WIDE_CHAR_WIDTH: usize = 2;
}
