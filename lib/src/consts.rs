//! Defines constant NamedNodeRefs for the XSD datatypes understood by the conversion
//! engine, plus the media types, header names and defaults used when talking to an endpoint.

use oxrdf::NamedNodeRef;

// xsd primitive types
pub const XSD_STRING: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#string");
pub const XSD_BOOLEAN: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#boolean");
pub const XSD_DECIMAL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#decimal");
pub const XSD_DOUBLE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#double");
pub const XSD_FLOAT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#float");
pub const XSD_DATETIME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#dateTime");
pub const XSD_DATE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#date");
pub const XSD_TIME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#time");
pub const XSD_ANY_URI: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#anyURI");

// xsd types derived from decimal
pub const XSD_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#integer");
pub const XSD_LONG: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#long");
pub const XSD_INT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#int");
pub const XSD_SHORT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#short");
pub const XSD_BYTE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#byte");
pub const XSD_NON_NEGATIVE_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#nonNegativeInteger");
pub const XSD_POSITIVE_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#positiveInteger");
pub const XSD_NON_POSITIVE_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#nonPositiveInteger");
pub const XSD_NEGATIVE_INTEGER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#negativeInteger");
pub const XSD_UNSIGNED_LONG: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#unsignedLong");
pub const XSD_UNSIGNED_INT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#unsignedInt");
pub const XSD_UNSIGNED_SHORT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#unsignedShort");
pub const XSD_UNSIGNED_BYTE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#unsignedByte");

// xsd types derived from string
pub const XSD_NORMALIZED_STRING: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#normalizedString");
pub const XSD_TOKEN: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#token");
pub const XSD_LANGUAGE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#language");
pub const XSD_NAME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#Name");
pub const XSD_NCNAME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#NCName");

// rdf
pub const RDF_LANG_STRING: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#langString");

pub const INTEGER_DATATYPES: [NamedNodeRef<'_>; 13] = [
    XSD_INTEGER,
    XSD_LONG,
    XSD_INT,
    XSD_SHORT,
    XSD_BYTE,
    XSD_NON_NEGATIVE_INTEGER,
    XSD_POSITIVE_INTEGER,
    XSD_NON_POSITIVE_INTEGER,
    XSD_NEGATIVE_INTEGER,
    XSD_UNSIGNED_LONG,
    XSD_UNSIGNED_INT,
    XSD_UNSIGNED_SHORT,
    XSD_UNSIGNED_BYTE,
];

pub const STRING_DATATYPES: [NamedNodeRef<'_>; 7] = [
    XSD_STRING,
    XSD_NORMALIZED_STRING,
    XSD_TOKEN,
    XSD_LANGUAGE,
    XSD_NAME,
    XSD_NCNAME,
    XSD_ANY_URI,
];

// result serializations an endpoint can be asked for
pub const RESULT_TYPE_SPARQL_XML: &str = "application/sparql-results+xml";
pub const RESULT_TYPE_SPARQL_JSON: &str = "application/sparql-results+json";
pub const RESULT_TYPE_XML_SCHEMA: &str = "application/x-ms-access-export+xml";

// request bodies
pub const CONTENT_TYPE_SPARQL_QUERY: &str = "application/sparql-query";
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

// protocol parameters
pub const PARAM_QUERY: &str = "query";
pub const PARAM_DEFAULT_GRAPH: &str = "default-graph-uri";
pub const PARAM_NAMED_GRAPH: &str = "named-graph-uri";

pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

pub const USER_AGENT: &str = concat!(
    "sparqlc/",
    env!("CARGO_PKG_VERSION"),
    " +https://github.com/vlastocom/sparql-connector"
);

pub const DEFAULT_ENCODING: &str = "utf-8";
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Upper bound on what is read when a response body is surfaced as text.
pub const MAX_RAW_LEN: usize = 1024 * 1024;
