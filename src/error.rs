//! Error types and handling for rawstruct

/// Result type alias for rawstruct operations
pub type Result<T> = std::result::Result<T, StructError>;

/// Errors reported by layout resolution, field access and raw memory operations.
///
/// Double release and use of a released or foreign address are not
/// represented here: those are caller obligations and are never detected.
#[derive(Debug, thiserror::Error)]
pub enum StructError {
    /// Bad schema, zero element count, or an unusable external buffer
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument { parameter: String, message: String },

    /// Struct type the allocator was not built with
    #[error("Unknown struct type: {name}")]
    UnknownType { name: String },

    /// Element or array-field index outside `[0, size)`
    #[error("Index out of range: {index} >= {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// The platform allocator could not satisfy a request
    #[error("Out of memory: failed to allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    /// File create, grow, map or flush failure
    #[error("I/O failure: {message}")]
    IoFailure {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl StructError {
    /// Create an I/O failure from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::IoFailure {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an unknown type error
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Create an index out of range error
    pub fn index_out_of_range(index: usize, size: usize) -> Self {
        Self::IndexOutOfRange { index, size }
    }

    /// Create an out of memory error
    pub fn out_of_memory(requested: usize) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Fail with `IndexOutOfRange` unless `index < size`
    pub(crate) fn check_index(index: usize, size: usize) -> Result<()> {
        if index >= size {
            return Err(Self::index_out_of_range(index, size));
        }
        Ok(())
    }
}

impl From<std::io::Error> for StructError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
