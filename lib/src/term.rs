//! The RDF term model returned by result sets: IRIs, literals and blank nodes, with their
//! Notation3 serialization and conversions to and from the `oxrdf` model types.

use crate::consts::{RDF_LANG_STRING, XSD_STRING};
use crate::errors::{Result, SparqlError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Literal(Literal),
    /// The label is only meaningful within the result set it came from.
    BlankNode(String),
}

/// An RDF literal. Carries either a datatype or a language tag, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    value: String,
    datatype: Option<String>,
    language: Option<String>,
}

impl Literal {
    /// Fails with a configuration error if both `datatype` and `language` are given.
    pub fn new(
        value: impl Into<String>,
        datatype: Option<String>,
        language: Option<String>,
    ) -> Result<Self> {
        if datatype.is_some() && language.is_some() {
            return Err(SparqlError::config(
                "a literal cannot have both a datatype and a language tag",
            ));
        }
        Ok(Literal {
            value: value.into(),
            datatype,
            language,
        })
    }

    pub fn simple(value: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn lang_tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn n3(&self) -> String {
        let mut out = quote_n3(&self.value);
        if let Some(datatype) = &self.datatype {
            out.push_str("^^<");
            out.push_str(datatype);
            out.push('>');
        } else if let Some(language) = &self.language {
            out.push('@');
            out.push_str(language);
        }
        out
    }
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn blank_node(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    /// The IRI, the literal's lexical form, or the blank node label.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Literal(literal) => literal.value(),
            Term::BlankNode(label) => label,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Notation3 form: `<iri>`, `"value"^^<datatype>` / `"value"@lang`, or `_:label`.
    pub fn n3(&self) -> String {
        match self {
            Term::Iri(iri) => format!("<{iri}>"),
            Term::Literal(literal) => literal.n3(),
            Term::BlankNode(label) => format!("_:{label}"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.n3())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.n3())
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::Literal(literal)
    }
}

/// Quotes a lexical form the way N-Triples does: printable ASCII passes through,
/// quotes and backslashes and control characters are escaped, everything else
/// becomes a `\u`/`\U` escape.
fn quote_n3(txt: &str) -> String {
    let mut out = String::with_capacity(txt.len() + 2);
    out.push('"');
    for ch in txt.chars() {
        match ch {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            ' '..='~' => out.push(ch),
            c if (c as u32) < 0x10000 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    out.push('"');
    out
}

impl From<oxrdf::NamedNode> for Term {
    fn from(node: oxrdf::NamedNode) -> Self {
        Term::Iri(node.into_string())
    }
}

impl From<oxrdf::BlankNode> for Term {
    fn from(node: oxrdf::BlankNode) -> Self {
        Term::BlankNode(node.as_str().to_string())
    }
}

impl From<oxrdf::Literal> for Term {
    fn from(literal: oxrdf::Literal) -> Self {
        let (value, datatype, language) = literal.destruct();
        // plain xsd:string and rdf:langString are implied by the absence of a datatype
        let datatype = datatype
            .filter(|dt| dt.as_ref() != XSD_STRING && dt.as_ref() != RDF_LANG_STRING)
            .map(oxrdf::NamedNode::into_string);
        Term::Literal(Literal {
            value,
            datatype,
            language,
        })
    }
}

impl TryFrom<&Term> for oxrdf::Term {
    type Error = SparqlError;

    fn try_from(term: &Term) -> Result<Self> {
        Ok(match term {
            Term::Iri(iri) => oxrdf::NamedNode::new(iri.as_str())
                .map_err(|e| SparqlError::config(format!("invalid IRI '{iri}': {e}")))?
                .into(),
            Term::BlankNode(label) => oxrdf::BlankNode::new(label.as_str())
                .map_err(|e| SparqlError::config(format!("invalid blank node '{label}': {e}")))?
                .into(),
            Term::Literal(literal) => match (&literal.datatype, &literal.language) {
                (Some(datatype), _) => {
                    let datatype = oxrdf::NamedNode::new(datatype.as_str()).map_err(|e| {
                        SparqlError::config(format!("invalid datatype IRI '{datatype}': {e}"))
                    })?;
                    oxrdf::Literal::new_typed_literal(literal.value.as_str(), datatype).into()
                }
                (None, Some(language)) => {
                    oxrdf::Literal::new_language_tagged_literal(
                        literal.value.as_str(),
                        language.as_str(),
                    )
                    .map_err(|e| {
                        SparqlError::config(format!("invalid language tag '{language}': {e}"))
                    })?
                    .into()
                }
                (None, None) => oxrdf::Literal::new_simple_literal(literal.value.as_str()).into(),
            },
        })
    }
}
