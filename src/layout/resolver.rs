//! Schema resolution and the per-allocator descriptor registry

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{Result, StructError},
    schema::StructSchema,
};

use super::descriptor::TypeDescriptor;

/// Turns a set of struct schemas into resolved descriptors.
///
/// Nested `Struct` fields are resolved by name against the same set, so
/// every schema reachable from a requested type must be supplied.
#[derive(Debug, Default)]
pub struct DescriptorResolver {
    schemas: HashMap<String, StructSchema>,
}

impl DescriptorResolver {
    /// Collect schemas, rejecting duplicate type names
    pub fn new<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = StructSchema>,
    {
        let mut resolver = Self::default();
        for schema in schemas {
            resolver.add(schema)?;
        }
        Ok(resolver)
    }

    /// Add one more schema to the set
    pub fn add(&mut self, schema: StructSchema) -> Result<()> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.name) {
            return Err(StructError::invalid_argument(
                "schema.name",
                format!("struct type '{}' is declared twice", schema.name),
            ));
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Resolve every collected schema exactly once
    pub fn resolve(self) -> Result<DescriptorRegistry> {
        let mut resolved = HashMap::with_capacity(self.schemas.len());
        let mut in_progress = Vec::new();

        // Sorted for deterministic error reporting
        let mut names: Vec<&String> = self.schemas.keys().collect();
        names.sort();

        for name in names {
            self.resolve_one(name, &mut resolved, &mut in_progress)?;
        }

        Ok(DescriptorRegistry { descriptors: resolved })
    }

    fn resolve_one(
        &self,
        name: &str,
        resolved: &mut HashMap<String, Arc<TypeDescriptor>>,
        in_progress: &mut Vec<String>,
    ) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = resolved.get(name) {
            return Ok(Arc::clone(descriptor));
        }

        if in_progress.iter().any(|n| n == name) {
            return Err(StructError::invalid_argument(
                "field.nested",
                format!("struct '{}' contains itself ({} -> {})", name, in_progress.join(" -> "), name),
            ));
        }

        let schema = self
            .schemas
            .get(name)
            .ok_or_else(|| StructError::unknown_type(name))?;

        in_progress.push(name.to_string());
        let built = TypeDescriptor::build(schema, |nested| self.resolve_one(nested, resolved, in_progress));
        in_progress.pop();

        let descriptor = Arc::new(built?);
        tracing::trace!(
            struct_type = name,
            size = descriptor.size(),
            fields = descriptor.fields().len(),
            "Resolved struct layout"
        );
        resolved.insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

/// Resolved descriptors owned by one allocator instance
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<String, Arc<TypeDescriptor>>,
}

impl DescriptorRegistry {
    /// Resolve a set of schemas in one step
    pub fn from_schemas<I>(schemas: I) -> Result<Self>
    where
        I: IntoIterator<Item = StructSchema>,
    {
        DescriptorResolver::new(schemas)?.resolve()
    }

    /// Get the descriptor for a struct type
    pub fn get(&self, name: &str) -> Result<&Arc<TypeDescriptor>> {
        self.descriptors
            .get(name)
            .ok_or_else(|| StructError::unknown_type(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Number of resolved struct types
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Names of all resolved struct types, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
