//! Expression AST and its SQL serializer.
//!
//! Expressions are trees of column references, literals, comparisons, and
//! logical connectives. They are built from typed [`Field`]s, so a
//! comparison only type-checks when the literal matches the field's Rust
//! type, and rendered to a `WHERE` fragment against a [`SchemaProvider`]
//! that knows which table and column each field maps to.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::{AnyTable, Column, SerializeContext, Table, field};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let tables: Vec<Box<dyn AnyTable>> = vec![Box::new(
//!     Table::new("users")
//!         .column(Column::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id).primary_key())
//!         .column(Column::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name)),
//! )];
//! let ctx = SerializeContext::new(&tables);
//!
//! let by_id = field(|u: &User| &u.id).eq(3);
//! assert_eq!(by_id.serialize(&ctx).unwrap(), "users.id = 3");
//!
//! let named = field(|u: &User| &u.id)
//!     .gt(1)
//!     .and(field(|u: &User| &u.name).ne("O'Brien"));
//! assert_eq!(
//!     named.serialize(&ctx).unwrap(),
//!     "(users.id > 1) AND (users.name <> 'O''Brien')"
//! );
//! ```

use std::any::type_name;
use std::fmt::{self, Write as _};

use crate::column::{Field, FieldKey};
use crate::error::{MappingError, Result};
use crate::table::AnyTable;
use crate::types::{ColumnType, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LesserThan,
    /// `<=`
    LesserOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
}

impl BinaryOperator {
    /// SQL token for the operator.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LesserThan => "<",
            Self::LesserOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl LogicalOperator {
    /// SQL token for the connective.
    pub const fn token(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Untyped reference to a mapped field, as stored in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    key: FieldKey,
    record_name: &'static str,
}

impl ColumnRef {
    /// Identity of the referenced field.
    pub const fn key(&self) -> &FieldKey {
        &self.key
    }

    /// Name of the record type the field belongs to.
    pub const fn record_name(&self) -> &'static str {
        self.record_name
    }
}

impl<T: 'static, F> From<Field<T, F>> for ColumnRef {
    fn from(field: Field<T, F>) -> Self {
        Self {
            key: field.key(),
            record_name: type_name::<T>(),
        }
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A mapped column.
    Column(ColumnRef),
    /// A literal value.
    Literal(Value),
    /// `lhs <op> rhs`.
    Binary {
        /// Left operand.
        lhs: Box<Expression>,
        /// Comparison operator.
        op: BinaryOperator,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// `(lhs) AND|OR (rhs)`.
    Logical {
        /// Left operand.
        lhs: Box<Expression>,
        /// Connective.
        op: LogicalOperator,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// `NOT (expr)`.
    Not(Box<Expression>),
}

/// Resolves column references to table and column names.
pub trait SchemaProvider {
    /// Returns `(table, column)` for the referenced field.
    ///
    /// # Errors
    ///
    /// [`MappingError::TypeIsNotMapped`] if the record type has no table,
    /// [`MappingError::ColumnNotFound`] if the field is not mapped.
    fn resolve(&self, column: &ColumnRef) -> Result<(&str, &str)>;
}

impl SchemaProvider for Vec<Box<dyn AnyTable>> {
    fn resolve(&self, column: &ColumnRef) -> Result<(&str, &str)> {
        let table = self
            .iter()
            .find(|t| t.record_type() == column.key().record())
            .ok_or_else(|| MappingError::TypeIsNotMapped(column.record_name().to_string()))?;
        let name = table.column_name(column.key()).ok_or_else(|| {
            MappingError::ColumnNotFound(format!(
                "field at offset {} of {} is not mapped in table '{}'",
                column.key().offset(),
                column.record_name(),
                table.name()
            ))
        })?;
        Ok((table.name(), name))
    }
}

/// Naming context for [`Expression::serialize`].
#[derive(Clone, Copy)]
pub struct SerializeContext<'a> {
    schema: &'a dyn SchemaProvider,
    qualified: bool,
}

impl<'a> SerializeContext<'a> {
    /// Context rendering columns as `table.column`.
    pub fn new(schema: &'a dyn SchemaProvider) -> Self {
        Self {
            schema,
            qualified: true,
        }
    }

    /// Renders columns as bare `column` instead.
    #[must_use]
    pub const fn unqualified(mut self) -> Self {
        self.qualified = false;
        self
    }

    /// Renders a column reference.
    ///
    /// # Errors
    ///
    /// See [`SchemaProvider::resolve`].
    pub fn column_sql(&self, column: &ColumnRef) -> Result<String> {
        let (table, name) = self.schema.resolve(column)?;
        if self.qualified {
            Ok(format!("{table}.{name}"))
        } else {
            Ok(name.to_string())
        }
    }
}

impl Expression {
    /// Builds `lhs <op> rhs`.
    pub fn binary(lhs: impl Into<Self>, op: BinaryOperator, rhs: impl Into<Self>) -> Self {
        Self::Binary {
            lhs: Box::new(lhs.into()),
            op,
            rhs: Box::new(rhs.into()),
        }
    }

    /// Builds `(self) AND (other)`.
    #[must_use]
    pub fn and(self, other: impl Into<Self>) -> Self {
        Self::Logical {
            lhs: Box::new(self),
            op: LogicalOperator::And,
            rhs: Box::new(other.into()),
        }
    }

    /// Builds `(self) OR (other)`.
    #[must_use]
    pub fn or(self, other: impl Into<Self>) -> Self {
        Self::Logical {
            lhs: Box::new(self),
            op: LogicalOperator::Or,
            rhs: Box::new(other.into()),
        }
    }

    const fn is_composite(&self) -> bool {
        !matches!(self, Self::Column(_) | Self::Literal(_))
    }

    /// Renders the expression as a SQL fragment.
    ///
    /// # Errors
    ///
    /// Fails only when a column reference cannot be resolved.
    pub fn serialize(&self, ctx: &SerializeContext<'_>) -> Result<String> {
        match self {
            Self::Column(column) => ctx.column_sql(column),
            Self::Literal(value) => Ok(literal_sql(value)),
            Self::Binary { lhs, op, rhs } => Ok(format!(
                "{} {} {}",
                lhs.operand_sql(ctx)?,
                op.token(),
                rhs.operand_sql(ctx)?
            )),
            Self::Logical { lhs, op, rhs } => Ok(format!(
                "{} {} {}",
                lhs.operand_sql(ctx)?,
                op.token(),
                rhs.operand_sql(ctx)?
            )),
            Self::Not(inner) => Ok(format!("NOT ({})", inner.serialize(ctx)?)),
        }
    }

    /// Composite children are parenthesized so the tree shape survives
    /// rendering.
    fn operand_sql(&self, ctx: &SerializeContext<'_>) -> Result<String> {
        let sql = self.serialize(ctx)?;
        if self.is_composite() {
            Ok(format!("({sql})"))
        } else {
            Ok(sql)
        }
    }
}

impl std::ops::Not for Expression {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<ColumnRef> for Expression {
    fn from(column: ColumnRef) -> Self {
        Self::Column(column)
    }
}

impl<T: 'static, F> From<Field<T, F>> for Expression {
    fn from(field: Field<T, F>) -> Self {
        Self::Column(field.into())
    }
}

/// Renders a literal with engine quoting rules.
///
/// Text is single-quoted with embedded quotes doubled, numbers use
/// locale-independent formatting, blobs use `X'..'` hex.
pub fn literal_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => real_sql(*v),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Blob(bytes) => {
            let mut sql = String::with_capacity(bytes.len() * 2 + 3);
            sql.push_str("X'");
            for byte in bytes {
                let _ = write!(sql, "{byte:02X}");
            }
            sql.push('\'');
            sql
        }
    }
}

fn real_sql(value: f64) -> String {
    if value.is_nan() {
        "NULL".to_string()
    } else if value.is_infinite() {
        // SQLite reads an overflowing literal as infinity.
        if value > 0.0 { "9e999" } else { "-9e999" }.to_string()
    } else {
        format!("{value:?}")
    }
}

/// Builds a literal node.
pub fn literal(value: impl Into<Value>) -> Expression {
    Expression::Literal(value.into())
}

/// `lhs = rhs`
pub fn equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::Equal, rhs)
}

/// `lhs <> rhs`
pub fn not_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::NotEqual, rhs)
}

/// `lhs < rhs`
pub fn lesser_than(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::LesserThan, rhs)
}

/// `lhs <= rhs`
pub fn lesser_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::LesserOrEqual, rhs)
}

/// `lhs > rhs`
pub fn greater_than(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::GreaterThan, rhs)
}

/// `lhs >= rhs`
pub fn greater_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Expression {
    Expression::binary(lhs, BinaryOperator::GreaterOrEqual, rhs)
}

impl<T: 'static, F: ColumnType> Field<T, F> {
    fn compare(self, op: BinaryOperator, value: F) -> Expression {
        Expression::binary(self, op, value.to_value())
    }

    /// `field = value`
    pub fn eq(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::Equal, value.into())
    }

    /// `field <> value`
    pub fn ne(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::NotEqual, value.into())
    }

    /// `field < value`
    pub fn lt(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::LesserThan, value.into())
    }

    /// `field <= value`
    pub fn le(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::LesserOrEqual, value.into())
    }

    /// `field > value`
    pub fn gt(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::GreaterThan, value.into())
    }

    /// `field >= value`
    pub fn ge(self, value: impl Into<F>) -> Expression {
        self.compare(BinaryOperator::GreaterOrEqual, value.into())
    }

    /// `field = other`, comparing two columns of the same Rust type.
    pub fn eq_column<U: 'static>(self, other: Field<U, F>) -> Expression {
        equal(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, field};
    use crate::table::Table;

    #[derive(Default)]
    struct User {
        id: i64,
        name: String,
        score: f64,
    }

    #[derive(Default)]
    struct Visit {
        user_id: i64,
        unmapped: i64,
    }

    #[derive(Default)]
    struct Ghost {
        id: i64,
    }

    fn tables() -> Vec<Box<dyn AnyTable>> {
        vec![
            Box::new(
                Table::new("users")
                    .column(Column::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id))
                    .column(Column::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name))
                    .column(Column::new("score", |u: &User| &u.score, |u: &mut User| &mut u.score)),
            ),
            Box::new(Table::new("visits").column(Column::new(
                "user_id",
                |v: &Visit| &v.user_id,
                |v: &mut Visit| &mut v.user_id,
            ))),
        ]
    }

    fn render(expr: &Expression) -> Result<String> {
        let tables = tables();
        expr.serialize(&SerializeContext::new(&tables))
    }

    #[test]
    fn test_operator_tokens() {
        let id = field(|u: &User| &u.id);
        assert_eq!(render(&id.eq(5)).unwrap(), "users.id = 5");
        assert_eq!(render(&id.ne(5)).unwrap(), "users.id <> 5");
        assert_eq!(render(&id.lt(10)).unwrap(), "users.id < 10");
        assert_eq!(render(&id.le(10)).unwrap(), "users.id <= 10");
        assert_eq!(render(&id.gt(10)).unwrap(), "users.id > 10");
        assert_eq!(render(&id.ge(10)).unwrap(), "users.id >= 10");
    }

    #[test]
    fn test_text_literal_escapes_quotes() {
        let expr = field(|u: &User| &u.name).eq("it's");
        assert_eq!(render(&expr).unwrap(), "users.name = 'it''s'");
    }

    #[test]
    fn test_real_literal_is_locale_independent() {
        let expr = field(|u: &User| &u.score).ge(1.5);
        assert_eq!(render(&expr).unwrap(), "users.score >= 1.5");
        assert_eq!(literal_sql(&Value::Real(2.0)), "2.0");
        assert_eq!(literal_sql(&Value::Real(f64::NAN)), "NULL");
        assert_eq!(literal_sql(&Value::Real(f64::NEG_INFINITY)), "-9e999");
    }

    #[test]
    fn test_null_and_blob_literals() {
        assert_eq!(literal_sql(&Value::Null), "NULL");
        assert_eq!(literal_sql(&Value::Blob(vec![0x0a, 0xff])), "X'0AFF'");
    }

    #[test]
    fn test_column_to_column_comparison() {
        let expr = field(|v: &Visit| &v.user_id).eq_column(field(|u: &User| &u.id));
        assert_eq!(render(&expr).unwrap(), "visits.user_id = users.id");
    }

    #[test]
    fn test_free_function_builders() {
        let expr = lesser_than(field(|u: &User| &u.id), literal(10));
        assert_eq!(render(&expr).unwrap(), "users.id < 10");
        let expr = greater_or_equal(literal(1), field(|u: &User| &u.id));
        assert_eq!(render(&expr).unwrap(), "1 >= users.id");
    }

    #[test]
    fn test_logical_composition_parenthesizes_children() {
        let id = field(|u: &User| &u.id);
        let expr = id.gt(1).and(id.lt(5)).or(field(|u: &User| &u.name).eq("root"));
        assert_eq!(
            render(&expr).unwrap(),
            "((users.id > 1) AND (users.id < 5)) OR (users.name = 'root')"
        );
        assert_eq!(render(&!id.eq(3)).unwrap(), "NOT (users.id = 3)");
    }

    #[test]
    fn test_unqualified_context() {
        let tables = tables();
        let ctx = SerializeContext::new(&tables).unqualified();
        let expr = field(|u: &User| &u.id).eq(3);
        assert_eq!(expr.serialize(&ctx).unwrap(), "id = 3");
    }

    #[test]
    fn test_unmapped_type_is_reported() {
        let err = render(&field(|g: &Ghost| &g.id).eq(1)).unwrap_err();
        assert!(matches!(err, MappingError::TypeIsNotMapped(_)));
    }

    #[test]
    fn test_unmapped_field_is_reported() {
        let err = render(&field(|v: &Visit| &v.unmapped).eq(1)).unwrap_err();
        assert!(matches!(err, MappingError::ColumnNotFound(_)));
    }
}
