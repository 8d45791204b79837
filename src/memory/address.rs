//! Address arithmetic. Offsets are never bounds-checked: callers own that, exactly as with a
//! native pointer.
use crate::{
    error::Result,
    value::{Buffer, Value},
};

/// `base(buffer) + offset`, wrapping on overflow like pointer arithmetic in C.
pub fn compute_address(buffer: &Buffer<'_>, offset: i64) -> usize {
    buffer.address().wrapping_add_signed(offset as isize)
}

/// Reads an optional offset argument; a missing one means zero.
pub fn offset_argument(value: Value<'_>, operation: &'static str) -> Result<i64> {
    match value {
        Value::Undefined => Ok(0),
        v => v.to_integer(operation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefError;

    #[test]
    fn test_missing_offset_defaults_to_zero() {
        assert_eq!(offset_argument(Value::Undefined, "address"), Ok(0));
        assert_eq!(offset_argument(Value::Int(24), "address"), Ok(24));
        assert_eq!(offset_argument(Value::Float(3.0), "address"), Ok(3));
    }

    #[test]
    fn test_non_numeric_offset_is_a_type_error() {
        assert_eq!(
            offset_argument(Value::Bool(true), "address"),
            Err(RefError::type_argument("address", "number", "bool"))
        );
    }
}
