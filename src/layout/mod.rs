//! Struct layout computation
//!
//! Schemas are resolved once into immutable [`TypeDescriptor`]s:
//! 1. Fields are packed in declaration order with no alignment padding
//! 2. Each field spans `width × len` bytes, width taken from the owning struct's mode
//! 3. The total is rounded up to the struct's pad multiple
//! 4. Nested structs contribute their own rounded size per element

pub mod descriptor;
pub mod resolver;

pub use descriptor::{ResolvedField, TypeDescriptor};
pub use resolver::{DescriptorRegistry, DescriptorResolver};
