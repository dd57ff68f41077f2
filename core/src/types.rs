//! SQL value model shared by descriptors, expressions, and the storage
//! backend.
//!
//! [`Value`] is the tagged union every column value travels through on its
//! way between a typed record field and a statement slot. [`ColumnType`]
//! is implemented for each Rust type that may back a mapped field.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::{ColumnType, SqlType, Value, ValueType};
//!
//! assert_eq!(<i64 as ColumnType>::SQL_TYPE, SqlType::Integer);
//! assert_eq!(42_i64.to_value(), Value::Integer(42));
//! assert_eq!(Value::Null.value_type(), ValueType::Null);
//!
//! let name = String::from_value(Value::Text("Ted".into())).unwrap();
//! assert_eq!(name, "Ted");
//!
//! let missing: Option<i64> = ColumnType::from_value(Value::Null).unwrap();
//! assert!(missing.is_none());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};

/// Declared storage class of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Signed integer.
    Integer,
    /// 8-byte IEEE floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
}

impl SqlType {
    /// Returns the type name used in column definitions.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Run-time type tag of a value read back from the engine.
///
/// The engine's values are self-describing only through this tag, so
/// readers peek it first and then pick the matching typed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
    /// Binary blob.
    Blob,
}

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the run-time type tag of this value.
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Integer(_) => ValueType::Integer,
            Self::Real(_) => ValueType::Real,
            Self::Text(_) => ValueType::Text,
            Self::Blob(_) => ValueType::Blob,
        }
    }

    /// Returns `true` for SQL `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload, if any.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Maps `NULL` to `None` and everything else to `Some(self)`.
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A Rust type that can back a mapped column.
///
/// `to_value` feeds the binder on writes; `from_value` is called by the
/// extractor with the value read from the result column.
pub trait ColumnType: Sized {
    /// Storage class used in `CREATE TABLE`.
    const SQL_TYPE: SqlType;

    /// Converts the field into a bindable value.
    fn to_value(&self) -> Value;

    /// Converts a value read from a result column back into the field type.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Conversion`] when the value's run-time type
    /// cannot represent `Self`.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(MappingError::Conversion(format!(
        "expected {expected}, found {:?}",
        value.value_type()
    )))
}

impl ColumnType for i64 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            other => mismatch("integer", &other),
        }
    }
}

impl ColumnType for i32 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        Self::try_from(wide)
            .map_err(|_| MappingError::Conversion(format!("integer {wide} out of range for i32")))
    }
}

impl ColumnType for bool {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        i64::from_value(value).map(|v| v != 0)
    }
}

impl ColumnType for f64 {
    const SQL_TYPE: SqlType = SqlType::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.as_f64() {
            Some(v) => Ok(v),
            None => mismatch("real", &value),
        }
    }
}

impl ColumnType for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => mismatch("text", &other),
        }
    }
}

impl ColumnType for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            other => mismatch("blob", &other),
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ColumnType::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_names() {
        assert_eq!(SqlType::Integer.as_sql(), "INTEGER");
        assert_eq!(SqlType::Real.as_sql(), "REAL");
        assert_eq!(SqlType::Text.to_string(), "TEXT");
        assert_eq!(SqlType::Blob.to_string(), "BLOB");
    }

    #[test]
    fn test_value_type_tags() {
        assert_eq!(Value::Integer(1).value_type(), ValueType::Integer);
        assert_eq!(Value::Real(1.5).value_type(), ValueType::Real);
        assert_eq!(Value::from("x").value_type(), ValueType::Text);
        assert_eq!(Value::from(vec![1_u8]).value_type(), ValueType::Blob);
        assert_eq!(Value::from(None::<i64>).value_type(), ValueType::Null);
    }

    #[test]
    fn test_non_nullable_rejects_null() {
        let err = i64::from_value(Value::Null).unwrap_err();
        assert!(matches!(err, MappingError::Conversion(_)));
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_optional_field_accepts_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value(Value::Integer(7)).unwrap(),
            Some(7)
        );
        assert_eq!(Some(3_i64).to_value(), Value::Integer(3));
        assert_eq!(None::<String>.to_value(), Value::Null);
    }

    #[test]
    fn test_real_widens_integer() {
        assert_eq!(f64::from_value(Value::Integer(2)).unwrap(), 2.0);
        assert!(f64::from_value(Value::Text("2".into())).is_err());
    }

    #[test]
    fn test_i32_range_check() {
        assert_eq!(i32::from_value(Value::Integer(12)).unwrap(), 12);
        assert!(i32::from_value(Value::Integer(i64::MAX)).is_err());
    }

    #[test]
    fn test_bool_maps_to_integer() {
        assert_eq!(true.to_value(), Value::Integer(1));
        assert!(!bool::from_value(Value::Integer(0)).unwrap());
    }

    #[test]
    fn test_non_null_helper() {
        assert_eq!(Value::Null.non_null(), None);
        assert_eq!(Value::Integer(1).non_null(), Some(Value::Integer(1)));
    }
}
