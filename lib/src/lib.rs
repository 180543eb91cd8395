//! A client for the SPARQL 1.1 query protocol.
//!
//! A [`Service`] holds the endpoint settings; queries derived from it copy those
//! settings, assemble a GET, POST or form-encoded POST request, send it through a
//! [`Transport`], and stream the SPARQL XML response back as rows.
//!
//! ```no_run
//! use sparqlc::{EndpointSettings, Service};
//!
//! # fn main() -> sparqlc::Result<()> {
//! let mut service = Service::new("https://dbpedia.org/sparql");
//! service.add_prefix("dbo", "http://dbpedia.org/ontology/");
//! let mut results = service.query("SELECT ?s WHERE { ?s a dbo:Planet } LIMIT 5")?;
//! println!("{:?}", results.variables()?);
//! for row in results {
//!     println!("{:?}", row?.get(0));
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consts;
pub mod datatypes;
pub mod errors;
pub mod n3;
pub mod options;
pub mod query;
pub mod result_set;
pub mod results;
pub mod row;
pub mod service;
pub mod term;
pub mod transport;

pub use config::{EndpointConfig, EndpointSettings};
pub use datatypes::{convert, Converter, Value};
pub use errors::{DecodeError, Result, SparqlError, TransportError, TransportErrorKind};
pub use n3::parse_n3_term;
pub use options::{ResultType, SparqlMethod};
pub use query::Query;
pub use result_set::{RawResultSet, ResultKind, ResultSet};
pub use row::{DeferredRow, Row, ValueRow};
pub use service::{query, raw_query, Service};
pub use term::{Literal, Term};
pub use transport::{
    Credentials, HttpMethod, HttpTransport, Transport, TransportRequest, TransportResponse,
};

/// Lets `SPARQLC_LOG` set the log filter.
///
/// If `SPARQLC_LOG` is set, `RUST_LOG` is set to its value. Call this before the
/// logger is initialized (e.g. `env_logger::init()`).
pub fn init_logging() {
    if let Ok(log_level) = std::env::var("SPARQLC_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}
