//! Binder/extractor protocol between typed records and a statement.
//!
//! A storage backend implements [`Binder`] over a prepared statement's
//! parameter slots and [`RowSource`] over the current result row. Column
//! descriptors only ever talk to these two traits, so the mapping layer
//! stays independent of the engine.
//!
//! Reading a column is a two-phase protocol: the backend is asked for the
//! run-time [`ValueType`] of the slot first, and only then for the typed
//! payload. [`RowSource::read_value`] performs both steps.

use crate::error::MappingError;
use crate::types::{Value, ValueType};

/// Destination for statement parameters.
///
/// Slots are 1-based, matching the engine's parameter numbering.
pub trait Binder {
    /// Backend error type; mapping failures must convert into it.
    type Error: From<MappingError>;

    /// Binds `value` into parameter `slot`.
    fn bind(&mut self, slot: usize, value: Value) -> Result<(), Self::Error>;
}

/// The current row of an executing statement.
///
/// Column indices are 0-based, matching the engine's result numbering.
pub trait RowSource {
    /// Backend error type; mapping failures must convert into it.
    type Error: From<MappingError>;

    /// Number of columns in the result set.
    fn column_count(&self) -> usize;

    /// Name of result column `index`, when the backend reports one.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Run-time type of the value stored in column `index`.
    fn value_type(&self, index: usize) -> Result<ValueType, Self::Error>;

    /// Reads column `index` as an integer.
    fn read_integer(&self, index: usize) -> Result<i64, Self::Error>;

    /// Reads column `index` as a float.
    fn read_real(&self, index: usize) -> Result<f64, Self::Error>;

    /// Reads column `index` as text.
    fn read_text(&self, index: usize) -> Result<String, Self::Error>;

    /// Reads column `index` as a blob.
    fn read_blob(&self, index: usize) -> Result<Vec<u8>, Self::Error>;

    /// Peeks the run-time type of column `index`, then performs the matching
    /// typed read.
    fn read_value(&self, index: usize) -> Result<Value, Self::Error> {
        let value = match self.value_type(index)? {
            ValueType::Null => Value::Null,
            ValueType::Integer => Value::Integer(self.read_integer(index)?),
            ValueType::Real => Value::Real(self.read_real(index)?),
            ValueType::Text => Value::Text(self.read_text(index)?),
            ValueType::Blob => Value::Blob(self.read_blob(index)?),
        };
        Ok(value)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::VecRow;
    use super::*;

    #[test]
    fn test_read_value_dispatches_on_type() {
        let row = VecRow(vec![
            Value::Null,
            Value::Integer(4),
            Value::Real(0.5),
            Value::Text("a".into()),
            Value::Blob(vec![1, 2]),
        ]);
        assert_eq!(row.read_value(0).unwrap(), Value::Null);
        assert_eq!(row.read_value(1).unwrap(), Value::Integer(4));
        assert_eq!(row.read_value(2).unwrap(), Value::Real(0.5));
        assert_eq!(row.read_value(3).unwrap(), Value::Text("a".into()));
        assert_eq!(row.read_value(4).unwrap(), Value::Blob(vec![1, 2]));
        assert!(row.read_value(5).is_err());
    }
}
