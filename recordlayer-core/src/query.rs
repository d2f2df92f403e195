//! Query options, sort specifications and filter expressions.
//!
//! Query modifiers are always call arguments: every finder takes a [`FindOptions`]
//! value and nothing about a query is kept on the store between calls.
//!
//! Filters use the document store's own syntax: a document mapping field names
//! (dot-paths allowed) to a literal value or an operator document.
//!
//! ```ignore
//! use recordlayer::query::{FindOptions, SortDirection};
//! use bson::doc;
//!
//! let options = FindOptions::builder()
//!     .filter(doc! { "price": { "$gte": 10 }, "tags": "sale" })
//!     .sort_by("price", SortDirection::Desc)
//!     .limit(50)
//!     .build();
//! ```
//!
//! The store validates the structure of filters and sorts before a query reaches a
//! backend. Backends that evaluate filters themselves parse them into an [`Expr`] tree
//! and walk it with a [`QueryVisitor`].

use bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};

/// Number of records a query returns when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 20;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Returns the document-store encoding of the direction (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    fn from_bson(field: &str, value: &Bson) -> StoreResult<Self> {
        let direction = match value {
            Bson::Int32(value) => *value as f64,
            Bson::Int64(value) => *value as f64,
            Bson::Double(value) => *value,
            _ => f64::NAN,
        };

        if direction == 1.0 {
            Ok(SortDirection::Asc)
        } else if direction == -1.0 {
            Ok(SortDirection::Desc)
        } else {
            Err(StoreError::InvalidArgument(format!(
                "sort direction for {field} must be 1 or -1, found {value}"
            )))
        }
    }
}

/// One key of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name (or dot-path) to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Caller-facing options of a find operation.
///
/// - `filter` - filter document; empty matches everything
/// - `sort` - sort document (`{ field: 1 | -1, ... }`), applied key by key in order
/// - `limit` - `None` caps results at the store's default page size, `Some(0)` means
///   no cap, `Some(n)` returns at most `n` records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Document,
    pub sort: Option<Document>,
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Creates options matching every document, unsorted, with the default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options with the given filter and no other modifiers.
    pub fn matching(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Creates a builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

/// Builder for [`FindOptions`].
#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter document.
    pub fn filter(mut self, filter: Document) -> Self {
        self.options.filter = filter;
        self
    }

    /// Sets the whole sort document, replacing any sort keys added so far.
    pub fn sort(mut self, sort: Document) -> Self {
        self.options.sort = Some(sort);
        self
    }

    /// Appends one sort key.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options
            .sort
            .get_or_insert_with(Document::new)
            .insert(field.into(), direction.as_i32());
        self
    }

    /// Sets the maximum number of records to return. `0` removes the cap.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Removes the result cap.
    pub fn unlimited(self) -> Self {
        self.limit(0)
    }

    /// Builds the options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// A validated query as handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    /// Filter document, unchanged from the caller.
    pub filter: Document,
    /// Sort document, unchanged from the caller; empty means natural storage order.
    pub sort: Document,
    /// Maximum number of documents; `None` means no cap.
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Validates `options` and resolves its limit against `default_limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed filter or a sort with an
    /// empty field name.
    pub fn resolve(options: FindOptions, default_limit: usize) -> StoreResult<Self> {
        validate_filter(&options.filter)?;

        let sort = options.sort.unwrap_or_default();
        validate_sort(&sort)?;

        let limit = match options.limit.unwrap_or(default_limit) {
            0 => None,
            limit => Some(limit),
        };

        Ok(Self {
            filter: options.filter,
            sort,
            limit,
        })
    }

    /// Parses the sort document into plain ascending/descending keys.
    ///
    /// For backends that order documents themselves; any other sort value is an
    /// invalid argument.
    pub fn sort_keys(&self) -> StoreResult<Vec<Sort>> {
        parse_sort(&self.sort)
    }
}

/// Parses a sort document into its keys, preserving order.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] for an empty field name or a direction
/// other than `1` / `-1`.
pub fn parse_sort(sort: &Document) -> StoreResult<Vec<Sort>> {
    sort.iter()
        .map(|(field, value)| {
            if field.is_empty() {
                return Err(StoreError::InvalidArgument(
                    "empty field name in sort".into(),
                ));
            }

            Ok(Sort {
                field: field.clone(),
                direction: SortDirection::from_bson(field, value)?,
            })
        })
        .collect()
}

/// Checks that every sort key names a field, leaving the sort values to the backend.
pub fn validate_sort(sort: &Document) -> StoreResult<()> {
    if sort.keys().any(String::is_empty) {
        return Err(StoreError::InvalidArgument(
            "empty field name in sort".into(),
        ));
    }

    Ok(())
}

/// Checks the structure of a filter document without judging its operators.
///
/// Logical operators must hold non-empty arrays of documents and field names must be
/// non-empty. Operators a particular backend may not support are left alone.
pub fn validate_filter(filter: &Document) -> StoreResult<()> {
    FilterParser { strict: false }.document(filter).map(|_| ())
}

/// Field comparison operators of filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to; array fields match if any element is equal.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Equal to any value of the operand array.
    In,
    /// Equal to none of the values of the operand array.
    Nin,
    /// Field is present (operand `true`) or absent (operand `false`).
    Exists,
}

impl FieldOp {
    /// Maps a filter operator name (`"$gt"`, ...) to its operator.
    pub fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "$eq" => Some(FieldOp::Eq),
            "$ne" => Some(FieldOp::Ne),
            "$gt" => Some(FieldOp::Gt),
            "$gte" => Some(FieldOp::Gte),
            "$lt" => Some(FieldOp::Lt),
            "$lte" => Some(FieldOp::Lte),
            "$in" => Some(FieldOp::In),
            "$nin" => Some(FieldOp::Nin),
            "$exists" => Some(FieldOp::Exists),
            _ => None,
        }
    }
}

/// A parsed filter expression.
///
/// # Example
///
/// ```ignore
/// use recordlayer::query::Expr;
/// use bson::doc;
///
/// let expr = Expr::parse(&doc! { "$or": [{ "name": "a" }, { "age": { "$gt": 18 } }] })?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOR of multiple expressions (none may match).
    Nor(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name or dot-path to compare.
        path: String,
        /// The comparison operator.
        op: FieldOp,
        /// The operand.
        value: Bson,
    },
}

impl Expr {
    /// Parses a filter document into an expression tree.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for a structurally malformed filter
    /// - [`StoreError::Unsupported`] for an operator outside [`FieldOp`] and
    ///   `$and` / `$or` / `$nor` / `$not`
    pub fn parse(filter: &Document) -> StoreResult<Expr> {
        FilterParser { strict: true }.document(filter)
    }
}

struct FilterParser {
    strict: bool,
}

impl FilterParser {
    fn document(&self, filter: &Document) -> StoreResult<Expr> {
        let mut clauses = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            if let Some(clause) = self.entry(key, value)? {
                clauses.push(clause);
            }
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }

    fn entry(&self, key: &str, value: &Bson) -> StoreResult<Option<Expr>> {
        match key {
            "$and" => Ok(Some(Expr::And(self.clauses(key, value)?))),
            "$or" => Ok(Some(Expr::Or(self.clauses(key, value)?))),
            "$nor" => Ok(Some(Expr::Nor(self.clauses(key, value)?))),
            "" => Err(StoreError::InvalidArgument(
                "empty field name in filter".into(),
            )),
            operator if operator.starts_with('$') => self.unsupported(operator),
            path => self.condition(path, value),
        }
    }

    fn clauses(&self, operator: &str, value: &Bson) -> StoreResult<Vec<Expr>> {
        let invalid = || {
            StoreError::InvalidArgument(format!(
                "{operator} requires a non-empty array of documents"
            ))
        };

        match value {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Bson::Document(clause) => self.document(clause),
                    _ => Err(invalid()),
                })
                .collect(),
            _ => Err(invalid()),
        }
    }

    fn condition(&self, path: &str, value: &Bson) -> StoreResult<Option<Expr>> {
        let operators = match value {
            Bson::Document(operators) if is_operator_document(operators)? => operators,
            literal => {
                return Ok(Some(Expr::Field {
                    path: path.to_string(),
                    op: FieldOp::Eq,
                    value: literal.clone(),
                }));
            }
        };

        let mut conditions = Vec::with_capacity(operators.len());

        for (operator, operand) in operators {
            if let Some(condition) = self.operator(path, operator, operand)? {
                conditions.push(condition);
            }
        }

        Ok(match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Expr::And(conditions)),
        })
    }

    fn operator(&self, path: &str, operator: &str, operand: &Bson) -> StoreResult<Option<Expr>> {
        if operator == "$not" {
            return match operand {
                Bson::Document(inner) if is_operator_document(inner)? => Ok(self
                    .condition(path, operand)?
                    .map(|expr| Expr::Not(Box::new(expr)))),
                Bson::RegularExpression(_) => self.unsupported("$not with a regular expression"),
                _ => Err(StoreError::InvalidArgument(format!(
                    "$not on {path} requires an operator document or a regular expression"
                ))),
            };
        }

        let Some(op) = FieldOp::from_operator(operator) else {
            return self.unsupported(operator);
        };

        let value = match (op, operand) {
            (FieldOp::In | FieldOp::Nin, Bson::Array(_)) => operand.clone(),
            (FieldOp::In | FieldOp::Nin, _) => {
                return Err(StoreError::InvalidArgument(format!(
                    "{operator} on {path} requires an array"
                )));
            }
            (FieldOp::Exists, Bson::Boolean(flag)) => Bson::Boolean(*flag),
            (FieldOp::Exists, Bson::Int32(flag)) => Bson::Boolean(*flag != 0),
            (FieldOp::Exists, Bson::Int64(flag)) => Bson::Boolean(*flag != 0),
            (FieldOp::Exists, Bson::Double(flag)) => Bson::Boolean(*flag != 0.0),
            (FieldOp::Exists, _) if !self.strict => operand.clone(),
            (FieldOp::Exists, _) => {
                return Err(StoreError::InvalidArgument(format!(
                    "$exists on {path} requires a boolean"
                )));
            }
            _ => operand.clone(),
        };

        Ok(Some(Expr::Field {
            path: path.to_string(),
            op,
            value,
        }))
    }

    fn unsupported(&self, operator: &str) -> StoreResult<Option<Expr>> {
        if self.strict {
            Err(StoreError::Unsupported(format!(
                "filter operator {operator} is not supported"
            )))
        } else {
            Ok(None)
        }
    }
}

fn is_operator_document(document: &Document) -> StoreResult<bool> {
    let operators = document.keys().filter(|key| key.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        count if count == document.len() => Ok(true),
        _ => Err(StoreError::InvalidArgument(
            "operator documents cannot mix operators and field names".into(),
        )),
    }
}

/// Walks an [`Expr`] tree.
///
/// Backends that evaluate filters themselves implement this trait; [`visit_expr`]
/// dispatches to the per-node methods.
///
/// [`visit_expr`]: QueryVisitor::visit_expr
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        path: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Nor(exprs) => self.visit_nor(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Field { path, op, value } => self.visit_field(path, op, value),
        }
    }
}
