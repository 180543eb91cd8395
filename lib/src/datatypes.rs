//! Conversion of RDF terms into native values.
//!
//! A [`Converter`] holds a built-in table keyed by XSD datatype IRI, a caller-supplied
//! override table that is consulted first, and an optional fallback for datatypes
//! neither table knows. Literals whose datatype is unknown come back as text; a
//! conversion never fails, so one odd literal cannot break iteration over a result set.

use crate::consts::*;
use crate::term::{Literal, Term};
use lazy_static::lazy_static;
use log::warn;
use oxsdatatypes::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A native value produced from a term.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    #[cfg(feature = "chrono")]
    DateTime(chrono::DateTime<chrono::FixedOffset>),
    /// A dateTime without a timezone.
    #[cfg(feature = "chrono")]
    LocalDateTime(chrono::NaiveDateTime),
    #[cfg(feature = "chrono")]
    Date(chrono::NaiveDate),
    #[cfg(feature = "chrono")]
    Time(chrono::NaiveTime),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Boolean(b) => write!(f, "{b}"),
            #[cfg(feature = "chrono")]
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            #[cfg(feature = "chrono")]
            Value::LocalDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            #[cfg(feature = "chrono")]
            Value::Date(d) => write!(f, "{d}"),
            #[cfg(feature = "chrono")]
            Value::Time(t) => write!(f, "{t}"),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// A conversion function: receives the literal's lexical form and its datatype IRI.
pub type ConvertFn = Arc<dyn Fn(&str, &str) -> Value + Send + Sync>;

type Builtin = fn(&str) -> Option<Value>;

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, Builtin> = {
        let mut table: HashMap<&'static str, Builtin> = HashMap::new();
        for dt in STRING_DATATYPES {
            table.insert(dt.as_str(), |v| Some(Value::Text(v.to_string())));
        }
        for dt in INTEGER_DATATYPES {
            table.insert(dt.as_str(), parse_integer);
        }
        table.insert(XSD_DOUBLE.as_str(), parse_float);
        table.insert(XSD_FLOAT.as_str(), parse_float);
        table.insert(XSD_DECIMAL.as_str(), parse_decimal);
        table.insert(XSD_BOOLEAN.as_str(), parse_boolean);
        // without chrono these stay text
        #[cfg(feature = "chrono")]
        table.insert(XSD_DATETIME.as_str(), parse_datetime);
        #[cfg(feature = "chrono")]
        table.insert(XSD_DATE.as_str(), parse_date);
        #[cfg(feature = "chrono")]
        table.insert(XSD_TIME.as_str(), parse_time);
        table
    };
}

fn parse_integer(v: &str) -> Option<Value> {
    let v = v.trim();
    let v = v.strip_prefix('+').unwrap_or(v);
    i64::from_str(v).ok().map(Value::Integer)
}

fn parse_float(v: &str) -> Option<Value> {
    let parsed = match v.trim() {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        other => f64::from_str(other).ok()?,
    };
    Some(Value::Float(parsed))
}

fn parse_decimal(v: &str) -> Option<Value> {
    Decimal::from_str(v.trim()).ok().map(Value::Decimal)
}

fn parse_boolean(v: &str) -> Option<Value> {
    match v.trim() {
        "true" | "1" => Some(Value::Boolean(true)),
        "false" | "0" => Some(Value::Boolean(false)),
        _ => None,
    }
}

#[cfg(feature = "chrono")]
fn parse_datetime(v: &str) -> Option<Value> {
    let v = v.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(v) {
        return Some(Value::DateTime(dt));
    }
    chrono::NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(Value::LocalDateTime)
}

/// Splits an optional trailing timezone (`Z`, `+hh:mm`, `-hh:mm`) off a date or time.
#[cfg(feature = "chrono")]
fn strip_timezone(v: &str) -> &str {
    if let Some(stripped) = v.strip_suffix('Z') {
        return stripped;
    }
    if v.len() > 6 && v.is_char_boundary(v.len() - 6) {
        let (head, tail) = v.split_at(v.len() - 6);
        let tz = tail.as_bytes();
        if (tz[0] == b'+' || tz[0] == b'-') && tz[3] == b':' {
            return head;
        }
    }
    v
}

#[cfg(feature = "chrono")]
fn parse_date(v: &str) -> Option<Value> {
    chrono::NaiveDate::parse_from_str(strip_timezone(v.trim()), "%Y-%m-%d")
        .ok()
        .map(Value::Date)
}

#[cfg(feature = "chrono")]
fn parse_time(v: &str) -> Option<Value> {
    chrono::NaiveTime::parse_from_str(strip_timezone(v.trim()), "%H:%M:%S%.f")
        .ok()
        .map(Value::Time)
}

/// Returns `true` if the built-in table has an entry for `datatype`.
pub fn is_builtin(datatype: &str) -> bool {
    BUILTINS.contains_key(datatype)
}

#[derive(Clone, Default)]
pub struct Converter {
    overrides: HashMap<String, ConvertFn>,
    fallback: Option<ConvertFn>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.overrides.keys().collect();
        keys.sort();
        f.debug_struct("Converter")
            .field("overrides", &keys)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `convert` for `datatype`, replacing any built-in handling of it.
    pub fn with_override<F>(mut self, datatype: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str, &str) -> Value + Send + Sync + 'static,
    {
        self.add_override(datatype, convert);
        self
    }

    pub fn add_override<F>(&mut self, datatype: impl Into<String>, convert: F)
    where
        F: Fn(&str, &str) -> Value + Send + Sync + 'static,
    {
        self.overrides.insert(datatype.into(), Arc::new(convert));
    }

    /// Sets the function applied to literals whose datatype neither table knows.
    pub fn with_fallback<F>(mut self, convert: F) -> Self
    where
        F: Fn(&str, &str) -> Value + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(convert));
        self
    }

    pub fn convert(&self, term: &Term) -> Value {
        match term {
            Term::Iri(iri) => Value::Text(iri.clone()),
            Term::BlankNode(label) => Value::Text(label.clone()),
            Term::Literal(literal) => self.convert_literal(literal),
        }
    }

    /// Converts every position of a row, keeping unbound positions unbound.
    pub fn convert_row<'a, I>(&self, terms: I) -> Vec<Option<Value>>
    where
        I: IntoIterator<Item = &'a Option<Term>>,
    {
        terms
            .into_iter()
            .map(|term| term.as_ref().map(|t| self.convert(t)))
            .collect()
    }

    fn convert_literal(&self, literal: &Literal) -> Value {
        // plain and language-tagged literals are strings; the tag stays on the term
        let Some(datatype) = literal.datatype() else {
            return Value::Text(literal.value().to_string());
        };
        if let Some(convert) = self.overrides.get(datatype) {
            return convert(literal.value(), datatype);
        }
        if let Some(builtin) = BUILTINS.get(datatype) {
            return match builtin(literal.value()) {
                Some(value) => value,
                None => {
                    warn!(
                        "Could not read '{}' as {}, keeping it as text",
                        literal.value(),
                        datatype
                    );
                    Value::Text(literal.value().to_string())
                }
            };
        }
        match &self.fallback {
            Some(convert) => convert(literal.value(), datatype),
            None => Value::Text(literal.value().to_string()),
        }
    }
}

/// Converts `term` with the built-in table plus `overrides`.
pub fn convert(term: &Term, overrides: Option<&Converter>) -> Value {
    match overrides {
        Some(converter) => converter.convert(term),
        None => Converter::default().convert(term),
    }
}
