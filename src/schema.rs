//! Declarative struct schemas consumed by the descriptor resolver

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_PAD, WIDE_CHAR_WIDTH},
    error::{Result, StructError},
};

/// Storage type of a struct field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Byte,
    Char,
    Int,
    Long,
    String,
    Struct,
}

impl FieldType {
    /// Element width in bytes for primitive types.
    ///
    /// `Struct` has no intrinsic width; its width is the nested
    /// descriptor's size and is filled in by the resolver.
    pub fn primitive_width(self, c_compatible: bool) -> Option<usize> {
        match self {
            FieldType::Byte => Some(1),
            FieldType::Char | FieldType::String => Some(if c_compatible { 1 } else { WIDE_CHAR_WIDTH }),
            FieldType::Int => Some(4),
            FieldType::Long => Some(8),
            FieldType::Struct => None,
        }
    }

    /// Get a human-readable name for the field type
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Byte => "BYTE",
            FieldType::Char => "CHAR",
            FieldType::Int => "INT",
            FieldType::Long => "LONG",
            FieldType::String => "STRING",
            FieldType::Struct => "STRUCT",
        }
    }
}

fn default_len() -> usize {
    1
}

/// A single field in a struct schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name, unique within the struct
    pub name: String,
    /// Storage type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Number of elements; 2 or more makes the field an array.
    /// For strings this is the character capacity.
    #[serde(default = "default_len")]
    pub len: usize,
    /// Name of the nested struct type when `field_type` is `Struct`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<String>,
}

impl FieldSchema {
    /// Create a primitive field of length 1
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            len: 1,
            nested: None,
        }
    }

    /// Create a field holding one instance of another struct type
    pub fn structure(name: impl Into<String>, nested: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Struct,
            len: 1,
            nested: Some(nested.into()),
        }
    }

    /// Set the element count
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Whether the field holds more than one element
    pub fn is_array(&self) -> bool {
        self.len >= 2
    }

    fn validate(&self, owner: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(StructError::invalid_argument(
                "field.name",
                format!("struct '{}' has a field without a name", owner),
            ));
        }

        if self.len == 0 {
            return Err(StructError::invalid_argument(
                "field.len",
                format!("field '{}.{}' must have a positive length", owner, self.name),
            ));
        }

        match (self.field_type, &self.nested) {
            (FieldType::Struct, None) => Err(StructError::invalid_argument(
                "field.nested",
                format!("struct field '{}.{}' names no nested type", owner, self.name),
            )),
            (FieldType::Struct, Some(nested)) if nested.is_empty() => Err(StructError::invalid_argument(
                "field.nested",
                format!("struct field '{}.{}' names an empty nested type", owner, self.name),
            )),
            (other, Some(_)) if other != FieldType::Struct => Err(StructError::invalid_argument(
                "field.nested",
                format!(
                    "{} field '{}.{}' cannot reference a nested type",
                    other.name(),
                    owner,
                    self.name
                ),
            )),
            _ => Ok(()),
        }
    }
}

fn default_pad() -> usize {
    DEFAULT_PAD
}

/// Ordered field list plus struct-level layout options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructSchema {
    /// Struct type name, used to reference it from other schemas and allocators
    pub name: String,
    /// Fields in layout order
    pub fields: Vec<FieldSchema>,
    /// Use 1-byte characters to match a native C struct
    #[serde(default)]
    pub c_compatible: bool,
    /// Round the total size up to a multiple of this value
    #[serde(default = "default_pad")]
    pub pad: usize,
}

impl StructSchema {
    /// Create an empty schema with default options
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            c_compatible: false,
            pad: DEFAULT_PAD,
        }
    }

    /// Append a field
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Switch C compatibility on or off
    pub fn with_c_compatible(mut self, c_compatible: bool) -> Self {
        self.c_compatible = c_compatible;
        self
    }

    /// Set the pad multiple
    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = pad;
        self
    }

    /// Names of the struct types referenced by this schema's fields
    pub fn nested_types(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| f.nested.as_deref())
    }

    /// Validate the schema
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StructError::invalid_argument("name", "Struct name cannot be empty"));
        }

        if self.fields.is_empty() {
            return Err(StructError::invalid_argument(
                "fields",
                format!("struct '{}' declares no fields", self.name),
            ));
        }

        if self.pad == 0 {
            return Err(StructError::invalid_argument(
                "pad",
                format!("struct '{}' must have a positive pad multiple", self.name),
            ));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            field.validate(&self.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(StructError::invalid_argument(
                    "field.name",
                    format!("field '{}.{}' is declared twice", self.name, field.name),
                ));
            }
        }

        Ok(())
    }
}
