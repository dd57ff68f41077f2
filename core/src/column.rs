//! Column descriptors and typed field references.
//!
//! A [`Column`] maps one field of a record type `T` to a table column. It is
//! built from a pair of accessors (`&T -> &F` and `&mut T -> &mut F`) and
//! captures them as a bind/extract capability pair, so no runtime reflection
//! is needed to move values between records and statements.
//!
//! Fields are identified by a [`FieldKey`]: the record type, the field's
//! byte offset inside the record, and the field's type. The same key is
//! produced by [`field`], which is how expressions and aggregates refer to
//! a column without spelling its name.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::{Column, field};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let id = Column::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id)
//!     .primary_key()
//!     .not_null();
//! let name = Column::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name).not_null();
//!
//! assert_eq!(id.definition(), "id INTEGER PRIMARY KEY NOT NULL");
//! assert_eq!(name.definition(), "name TEXT NOT NULL");
//! assert_eq!(*id.key(), field(|u: &User| &u.id).key());
//! assert_ne!(*name.key(), field(|u: &User| &u.id).key());
//! ```

use std::any::{TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::binding::{Binder, RowSource};
use crate::error::Result;
use crate::types::{ColumnType, SqlType, Value};

/// Identity of a record field, independent of any table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    record: TypeId,
    offset: usize,
    field_type: TypeId,
}

impl FieldKey {
    /// Type id of the record the field belongs to.
    pub const fn record(&self) -> TypeId {
        self.record
    }

    /// Byte offset of the field inside the record.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Computes the key of the field returned by `get`.
///
/// The accessor is applied to a default-constructed probe record and the
/// distance between the two addresses is the field offset.
fn key_of<T: Default + 'static, F: 'static>(get: fn(&T) -> &F) -> FieldKey {
    let probe = T::default();
    let base = std::ptr::from_ref(&probe) as usize;
    let target = std::ptr::from_ref(get(&probe)) as usize;
    FieldKey {
        record: TypeId::of::<T>(),
        offset: target.wrapping_sub(base),
        field_type: TypeId::of::<F>(),
    }
}

/// A typed reference to field `F` of record `T`.
///
/// Created with [`field`]; used to build expressions and to name the column
/// of an aggregate.
pub struct Field<T, F> {
    key: FieldKey,
    _marker: PhantomData<fn(&T) -> &F>,
}

impl<T, F> Clone for Field<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Field<T, F> {}

impl<T, F> fmt::Debug for Field<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("record", &type_name::<T>())
            .field("offset", &self.key.offset)
            .finish()
    }
}

impl<T: 'static, F> Field<T, F> {
    /// The field's identity.
    pub const fn key(&self) -> FieldKey {
        self.key
    }

    /// Name of the record type, used in error messages.
    pub fn record_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Returns a typed reference to the field selected by `get`.
///
/// ```
/// use tablemap_core::field;
///
/// #[derive(Default)]
/// struct Visit {
///     id: i64,
///     user_id: i64,
/// }
///
/// let a = field(|v: &Visit| &v.id);
/// let b = field(|v: &Visit| &v.user_id);
/// assert_ne!(a.key(), b.key());
/// ```
pub fn field<T: Default + 'static, F: ColumnType + 'static>(get: fn(&T) -> &F) -> Field<T, F> {
    Field {
        key: key_of(get),
        _marker: PhantomData,
    }
}

type ReadFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type WriteFn<T> = Box<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// Descriptor of one mapped field.
pub struct Column<T> {
    name: String,
    sql_type: SqlType,
    primary_key: bool,
    not_null: bool,
    default_value: Option<String>,
    key: FieldKey,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

impl<T: Default + 'static> Column<T> {
    /// Maps the field reached through `get`/`get_mut` to column `name`.
    ///
    /// Both accessors must select the same field.
    pub fn new<F: ColumnType + 'static>(
        name: impl Into<String>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            name: name.into(),
            sql_type: F::SQL_TYPE,
            primary_key: false,
            not_null: false,
            default_value: None,
            key: key_of(get),
            read: Box::new(move |record| get(record).to_value()),
            write: Box::new(move |record, value| {
                *get_mut(record) = F::from_value(value)?;
                Ok(())
            }),
        }
    }
}

impl<T> Column<T> {
    /// Adds a `PRIMARY KEY` constraint.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Adds a `NOT NULL` constraint.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Adds a `DEFAULT` clause. The text is emitted verbatim, so string
    /// defaults must carry their own quotes (`"'guest'"`).
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared storage class.
    pub const fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Whether the column carries `PRIMARY KEY`.
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Whether the column carries `NOT NULL`.
    pub const fn is_not_null(&self) -> bool {
        self.not_null
    }

    /// The `DEFAULT` clause text, if any.
    pub fn default_text(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Identity of the mapped field.
    pub const fn key(&self) -> &FieldKey {
        &self.key
    }

    /// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    pub fn definition(&self) -> String {
        self.info(0).definition()
    }

    /// Describes the column in the same shape as `PRAGMA table_info`.
    pub fn info(&self, cid: i64) -> TableInfo {
        TableInfo {
            cid,
            name: self.name.clone(),
            sql_type: self.sql_type.as_sql().to_string(),
            not_null: self.not_null,
            default_value: self.default_value.clone(),
            pk: i64::from(self.primary_key),
        }
    }

    /// Reads the field from `record`.
    pub fn value_of(&self, record: &T) -> Value {
        (self.read)(record)
    }

    /// Binds the field of `record` into parameter `slot`.
    pub fn bind<B: Binder>(
        &self,
        binder: &mut B,
        slot: usize,
        record: &T,
    ) -> std::result::Result<(), B::Error> {
        binder.bind(slot, self.value_of(record))
    }

    /// Reads result column `index` of `row` into the field of `record`.
    pub fn extract<R: RowSource>(
        &self,
        row: &R,
        index: usize,
        record: &mut T,
    ) -> std::result::Result<(), R::Error> {
        let value = row.read_value(index)?;
        (self.write)(record, value).map_err(R::Error::from)
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("primary_key", &self.primary_key)
            .field("not_null", &self.not_null)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}

/// One row of `PRAGMA table_info`, or a declared column in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Column position.
    pub cid: i64,
    /// Column name.
    pub name: String,
    /// Declared type text.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Whether the column is `NOT NULL`.
    pub not_null: bool,
    /// Default value expression, verbatim.
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pub pk: i64,
}

impl TableInfo {
    /// Whether the column is part of the primary key.
    pub const fn is_primary_key(&self) -> bool {
        self.pk != 0
    }

    /// Whether a default value is present.
    pub const fn has_default(&self) -> bool {
        self.default_value.is_some()
    }

    /// `name TYPE [PRIMARY KEY] [NOT NULL] [DEFAULT value]`.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.is_primary_key() {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::testing::{RecordingBinder, VecRow};
    use crate::error::MappingError;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        id: i64,
        label: String,
        weight: Option<f64>,
    }

    fn label() -> Column<Item> {
        Column::new("label", |i: &Item| &i.label, |i: &mut Item| &mut i.label)
    }

    #[test]
    fn test_definition_clauses_in_order() {
        let column = label().not_null().default_value("'none'");
        assert_eq!(column.definition(), "label TEXT NOT NULL DEFAULT 'none'");

        let id = Column::new("id", |i: &Item| &i.id, |i: &mut Item| &mut i.id).primary_key();
        assert_eq!(id.definition(), "id INTEGER PRIMARY KEY");
    }

    #[test]
    fn test_optional_field_uses_inner_sql_type() {
        let weight = Column::new("weight", |i: &Item| &i.weight, |i: &mut Item| &mut i.weight);
        assert_eq!(weight.sql_type(), SqlType::Real);
        assert!(!weight.is_not_null());
    }

    #[test]
    fn test_info_matches_pragma_shape() {
        let info = label().not_null().info(1);
        assert_eq!(info.cid, 1);
        assert_eq!(info.sql_type, "TEXT");
        assert!(info.not_null);
        assert!(!info.has_default());
        assert_eq!(info.pk, 0);
    }

    #[test]
    fn test_bind_passes_slot_and_value() {
        let record = Item {
            id: 1,
            label: "crate".into(),
            weight: None,
        };
        let mut binder = RecordingBinder::default();
        label().bind(&mut binder, 3, &record).unwrap();
        assert_eq!(binder.slots, vec![(3, Value::Text("crate".into()))]);
    }

    #[test]
    fn test_extract_writes_field() {
        let mut record = Item::default();
        let row = VecRow(vec![Value::Integer(9), Value::Text("box".into())]);
        label().extract(&row, 1, &mut record).unwrap();
        assert_eq!(record.label, "box");
    }

    #[test]
    fn test_extract_reports_conversion_error() {
        let mut record = Item::default();
        let row = VecRow(vec![Value::Null]);
        let err = label().extract(&row, 0, &mut record).unwrap_err();
        assert!(matches!(err, MappingError::Conversion(_)));
    }

    #[test]
    fn test_field_keys_are_distinct_per_field() {
        let id = field(|i: &Item| &i.id);
        let label = field(|i: &Item| &i.label);
        let weight = field(|i: &Item| &i.weight);
        assert_ne!(id.key(), label.key());
        assert_ne!(label.key(), weight.key());
        assert_eq!(id.key(), field(|i: &Item| &i.id).key());
        assert_eq!(id.key().record(), TypeId::of::<Item>());
    }

    #[test]
    fn test_table_info_serializes_type_key() {
        let json = serde_json::to_value(label().info(0)).unwrap();
        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["name"], "label");
    }
}
