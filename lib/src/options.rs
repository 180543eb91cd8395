//! Option types for how a query is sent and which result format is requested.

use crate::consts::{
    CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_SPARQL_QUERY, RESULT_TYPE_SPARQL_JSON,
    RESULT_TYPE_SPARQL_XML, RESULT_TYPE_XML_SCHEMA,
};
use crate::errors::SparqlError;
use crate::transport::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three ways the SPARQL 1.1 protocol allows a query to travel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SparqlMethod {
    /// Query and graph parameters in the URL query string.
    Get,
    /// Query text as the request body, graph parameters in the URL.
    #[default]
    Post,
    /// Query and graph parameters as an url-encoded form body.
    PostUrlEncoded,
}

impl SparqlMethod {
    pub fn http_method(self) -> HttpMethod {
        match self {
            SparqlMethod::Get => HttpMethod::Get,
            SparqlMethod::Post | SparqlMethod::PostUrlEncoded => HttpMethod::Post,
        }
    }

    /// Content-Type of the request body; GET has none.
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            SparqlMethod::Get => None,
            SparqlMethod::Post => Some(CONTENT_TYPE_SPARQL_QUERY),
            SparqlMethod::PostUrlEncoded => Some(CONTENT_TYPE_FORM_URLENCODED),
        }
    }
}

impl fmt::Display for SparqlMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SparqlMethod::Get => write!(f, "get"),
            SparqlMethod::Post => write!(f, "post"),
            SparqlMethod::PostUrlEncoded => write!(f, "post-url-encoded"),
        }
    }
}

impl FromStr for SparqlMethod {
    type Err = SparqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(SparqlMethod::Get),
            "post" | "post-direct" => Ok(SparqlMethod::Post),
            "post-url-encoded" | "post-urlencoded" | "form" => Ok(SparqlMethod::PostUrlEncoded),
            other => Err(SparqlError::config(format!(
                "unknown request method '{other}' (expected get, post or post-url-encoded)"
            ))),
        }
    }
}

/// Well-known result formats that can be asked for in the `Accept` header.
/// Only [`ResultType::Xml`] can be decoded into rows; the others are read raw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResultType {
    Xml,
    Json,
    XmlSchema,
}

impl ResultType {
    pub fn media_type(self) -> &'static str {
        match self {
            ResultType::Xml => RESULT_TYPE_SPARQL_XML,
            ResultType::Json => RESULT_TYPE_SPARQL_JSON,
            ResultType::XmlSchema => RESULT_TYPE_XML_SCHEMA,
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

impl FromStr for ResultType {
    type Err = SparqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" | RESULT_TYPE_SPARQL_XML => Ok(ResultType::Xml),
            "json" | RESULT_TYPE_SPARQL_JSON => Ok(ResultType::Json),
            "xmlschema" | RESULT_TYPE_XML_SCHEMA => Ok(ResultType::XmlSchema),
            other => Err(SparqlError::config(format!("unknown result type '{other}'"))),
        }
    }
}
