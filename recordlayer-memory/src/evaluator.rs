//! Filter expression evaluation for in-memory document matching.
//!
//! This module provides the evaluation engine for parsed filter expressions and the
//! value ordering used for sorting.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use recordlayer_core::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Integers keep their exact value and compare with floats as f64. Null sorts before
/// every other value; values of different kinds are otherwise unordered.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (int32 and int64)
    Int(i64),
    /// Floating point value
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(a), Comparable::Number(b)) => *a as f64 == *b,
            (Comparable::Number(a), Comparable::Int(b)) => *a == *b as f64,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Null, _) => Some(Ordering::Less),
            (_, Comparable::Null) => Some(Ordering::Greater),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dot-path against a document. Numeric segments index into arrays.
pub(crate) fn resolve_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Orders two documents by a list of sort keys, falling through to the next key on ties.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = resolve_path(left, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right = resolve_path(right, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.partial_cmp(&right),
            SortDirection::Desc => right.partial_cmp(&left),
        }
        .unwrap_or(Ordering::Equal);

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> StoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn equals(field: Option<&Bson>, value: &Bson) -> bool {
        let Some(field) = field else {
            return matches!(value, Bson::Null);
        };

        let expected = Comparable::from(value);

        match Comparable::from(field) {
            Comparable::Array(items) if !matches!(value, Bson::Array(_)) => {
                items.iter().any(|item| item == &expected)
            }
            actual => actual == expected,
        }
    }

    fn compares(field: Option<&Bson>, value: &Bson, accept: fn(Ordering) -> bool) -> bool {
        let Some(field) = field else {
            return false;
        };

        let expected = Comparable::from(value);
        let matches = |actual: &Comparable<'_>| {
            actual
                .partial_cmp(&expected)
                .is_some_and(accept)
        };

        match Comparable::from(field) {
            Comparable::Array(items) => items.iter().any(matches),
            actual => !matches!(actual, Comparable::Null) && matches(&actual),
        }
    }

    fn any_of(field: Option<&Bson>, values: &Bson) -> bool {
        match values {
            Bson::Array(values) => values.iter().any(|value| Self::equals(field, value)),
            _ => false,
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_or(exprs)?)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_field(&mut self, path: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field = resolve_path(self.document, path);

        Ok(match op {
            FieldOp::Eq => Self::equals(field, value),
            FieldOp::Ne => !Self::equals(field, value),
            FieldOp::Gt => Self::compares(field, value, Ordering::is_gt),
            FieldOp::Gte => Self::compares(field, value, Ordering::is_ge),
            FieldOp::Lt => Self::compares(field, value, Ordering::is_lt),
            FieldOp::Lte => Self::compares(field, value, Ordering::is_le),
            FieldOp::In => Self::any_of(field, value),
            FieldOp::Nin => !Self::any_of(field, value),
            FieldOp::Exists => field.is_some() == value.as_bool().unwrap_or(true),
        })
    }
}
