use thiserror::Error;

pub type Result<T> = std::result::Result<T, RefError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefError {
    #[error("{operation}: expected {expected}, got {found}")]
    TypeArgument {
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{operation}: cannot dereference a null pointer")]
    NullDereference { operation: &'static str },

    #[error("reinterpretUntilZeros only supports element widths of 1, 2, 4 or 8 bytes, not {0}")]
    UnsupportedElementWidth(usize),

    #[error("{operation}: offset {offset} is outside a {len}-byte buffer")]
    OutOfRange {
        operation: &'static str,
        offset: i64,
        len: usize,
    },

    #[error("a {len}-byte region exceeds the {max}-byte maximum")]
    TooLarge { len: usize, max: usize },

    #[error("cannot allocate {0} bytes of host memory")]
    Allocation(usize),

    #[error("unknown type name: {0}")]
    UnknownType(String),

    #[error("unknown export: {0}")]
    UnknownExport(String),

    #[error("invalid or freed GC handle: {0}")]
    InvalidHandle(usize),

    #[error("native library error: {0}")]
    Library(String),
}

impl RefError {
    pub fn type_argument(
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self::TypeArgument {
            operation,
            expected,
            found,
        }
    }

    pub fn null_dereference(operation: &'static str) -> Self {
        Self::NullDereference { operation }
    }
}
