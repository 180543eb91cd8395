//! Rows of a SELECT result, as raw terms ([`Row`]), as converted values ([`ValueRow`]),
//! or as terms that convert on access ([`DeferredRow`]).

use crate::datatypes::{Converter, Value};
use crate::term::Term;
use std::ops::Index;
use std::sync::Arc;

fn position(variables: &[String], name: &str) -> Option<usize> {
    let name = name.strip_prefix('?').unwrap_or(name);
    variables.iter().position(|v| v == name)
}

/// One solution, aligned with the result set's variables. `None` marks an unbound variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    variables: Arc<[String]>,
    terms: Vec<Option<Term>>,
}

impl Row {
    pub(crate) fn new(variables: Arc<[String]>, terms: Vec<Option<Term>>) -> Self {
        debug_assert_eq!(variables.len(), terms.len());
        Row { variables, terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The term at `idx`, or `None` if it is unbound or out of range.
    pub fn get(&self, idx: usize) -> Option<&Term> {
        self.terms.get(idx).and_then(Option::as_ref)
    }

    /// The term bound to `name`; a leading `?` is accepted.
    pub fn get_by_name(&self, name: &str) -> Option<&Term> {
        position(&self.variables, name).and_then(|idx| self.get(idx))
    }

    pub fn is_bound(&self, idx: usize) -> bool {
        self.get(idx).is_some()
    }

    pub fn terms(&self) -> &[Option<Term>] {
        &self.terms
    }

    pub fn into_terms(self) -> Vec<Option<Term>> {
        self.terms
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Term>> {
        self.terms.iter().map(Option::as_ref)
    }

    /// Converts every position now.
    pub fn to_values(&self, converter: &Converter) -> ValueRow {
        ValueRow {
            variables: self.variables.clone(),
            values: converter.convert_row(&self.terms),
        }
    }

    /// Wraps the row so each position is converted when it is read.
    pub fn deferred(self, converter: Arc<Converter>) -> DeferredRow {
        DeferredRow {
            row: self,
            converter,
        }
    }
}

impl Index<usize> for Row {
    type Output = Option<Term>;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.terms[idx]
    }
}

/// A row whose terms have been converted into native values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
    variables: Arc<[String]>,
    values: Vec<Option<Value>>,
}

impl ValueRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx).and_then(Option::as_ref)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        position(&self.variables, name).and_then(|idx| self.get(idx))
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<Value>> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values.iter().map(Option::as_ref)
    }
}

impl Index<usize> for ValueRow {
    type Output = Option<Value>;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.values[idx]
    }
}

/// A raw row paired with the converter that will be applied on access.
#[derive(Debug, Clone)]
pub struct DeferredRow {
    row: Row,
    converter: Arc<Converter>,
}

impl DeferredRow {
    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Value> {
        self.row.get(idx).map(|term| self.converter.convert(term))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Value> {
        self.row
            .get_by_name(name)
            .map(|term| self.converter.convert(term))
    }

    pub fn raw(&self) -> &Row {
        &self.row
    }

    pub fn into_raw(self) -> Row {
        self.row
    }

    pub fn materialize(&self) -> ValueRow {
        self.row.to_values(&self.converter)
    }
}
