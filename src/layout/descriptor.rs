//! Resolved, immutable struct layouts

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::{Result, StructError},
    schema::{FieldType, StructSchema},
};

/// A field with its computed position inside the struct
#[derive(Debug, Clone)]
pub struct ResolvedField {
    /// Field name
    pub name: String,
    /// Storage type
    pub field_type: FieldType,
    /// Width of one element in bytes
    pub width: usize,
    /// Element count (character capacity for strings)
    pub len: usize,
    /// Byte offset from the start of the struct
    pub offset: usize,
    /// Layout of the nested struct for `Struct` fields
    pub nested: Option<Arc<TypeDescriptor>>,
}

impl ResolvedField {
    /// Bytes occupied by the whole field
    pub fn span(&self) -> usize {
        self.width * self.len
    }

    /// Offset of the first byte after this field
    pub fn end_offset(&self) -> usize {
        self.offset + self.span()
    }

    /// Offset of element `index` within the struct
    pub fn element_offset(&self, index: usize) -> usize {
        self.offset + index * self.width
    }
}

/// Offsets, widths and total size for one struct type
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    fields: Vec<ResolvedField>,
    by_name: HashMap<String, usize>,
    raw_size: usize,
    size: usize,
    c_compatible: bool,
    pad: usize,
}

impl TypeDescriptor {
    /// Compute the layout of `schema`.
    ///
    /// `nested` supplies the already-resolved descriptor for every struct
    /// type referenced by a `Struct` field.
    pub(crate) fn build<F>(schema: &StructSchema, mut nested: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Arc<TypeDescriptor>>,
    {
        schema.validate()?;

        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut by_name = HashMap::with_capacity(schema.fields.len());
        let mut offset = 0usize;

        for field in &schema.fields {
            let (width, nested_descriptor) = match field.nested.as_deref() {
                Some(type_name) => {
                    let descriptor = nested(type_name)?;
                    (descriptor.size(), Some(descriptor))
                }
                None => {
                    let width = field
                        .field_type
                        .primitive_width(schema.c_compatible)
                        .ok_or_else(|| StructError::invalid_argument("field.nested", "missing nested type"))?;
                    (width, None)
                }
            };

            let span = width
                .checked_mul(field.len)
                .ok_or_else(|| overflow(&schema.name, &field.name))?;

            by_name.insert(field.name.clone(), fields.len());
            fields.push(ResolvedField {
                name: field.name.clone(),
                field_type: field.field_type,
                width,
                len: field.len,
                offset,
                nested: nested_descriptor,
            });

            offset = offset
                .checked_add(span)
                .ok_or_else(|| overflow(&schema.name, &field.name))?;
        }

        let size = round_up(offset, schema.pad).ok_or_else(|| overflow(&schema.name, "pad"))?;

        Ok(Self {
            name: schema.name.clone(),
            fields,
            by_name,
            raw_size: offset,
            size,
            c_compatible: schema.c_compatible,
            pad: schema.pad,
        })
    }

    /// Struct type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes, rounded up to the pad multiple
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sum of field spans before rounding
    pub fn raw_size(&self) -> usize {
        self.raw_size
    }

    pub fn is_c_compatible(&self) -> bool {
        self.c_compatible
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Fields in layout order
    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Result<&ResolvedField> {
        self.by_name
            .get(name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| {
                StructError::invalid_argument("field", format!("struct '{}' has no field '{}'", self.name, name))
            })
    }

    /// Whether a field with this name exists
    pub fn has_field(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Byte offset of a field
    pub fn offset_of(&self, name: &str) -> Result<usize> {
        self.field(name).map(|f| f.offset)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

/// Round `value` up to the next multiple of `multiple`
fn round_up(value: usize, multiple: usize) -> Option<usize> {
    let bumped = value.checked_add(multiple - 1)?;
    Some(bumped / multiple * multiple)
}

fn overflow(owner: &str, field: &str) -> StructError {
    StructError::invalid_argument("field.len", format!("layout of '{}.{}' overflows usize", owner, field))
}
