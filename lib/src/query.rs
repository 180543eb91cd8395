//! A single query against an endpoint: request assembly for the three protocol methods
//! and dispatch through a [`Transport`].

use crate::config::{EndpointConfig, EndpointSettings};
use crate::consts::{HEADER_CONTENT_TYPE, MAX_RAW_LEN, PARAM_DEFAULT_GRAPH, PARAM_NAMED_GRAPH, PARAM_QUERY};
use crate::datatypes::Converter;
use crate::errors::{Result, SparqlError};
use crate::options::SparqlMethod;
use crate::result_set::{RawResultSet, ResultSet};
use crate::transport::{HttpTransport, Transport, TransportRequest};
use log::{debug, info};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use url::form_urlencoded;

/// Appends `params` to `endpoint`, with `&` if the endpoint already has a query string.
fn join_params(endpoint: &str, params: &str) -> String {
    let endpoint = endpoint.trim();
    if params.is_empty() {
        return endpoint.to_string();
    }
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{params}")
}

/// Holds its own copy of the endpoint configuration; changing one never affects the
/// other.
#[derive(Clone)]
pub struct Query {
    config: EndpointConfig,
    transport: Arc<dyn Transport>,
    converter: Arc<Converter>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("config", &self.config)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl Query {
    /// A query sent over HTTP with the default conversions.
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: EndpointConfig, transport: Arc<dyn Transport>) -> Self {
        Query {
            config,
            transport,
            converter: Arc::new(Converter::default()),
        }
    }

    pub(crate) fn with_converter(mut self, converter: Arc<Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Conversions used by [`query`](Self::query).
    pub fn set_converter(&mut self, converter: Converter) {
        self.converter = Arc::new(converter);
    }

    /// The statement with the configured prefixes declared in front of it, one per line.
    pub fn query_string(&self, statement: &str) -> String {
        let mut out = String::new();
        for (name, iri) in &self.config.prefixes {
            out.push_str(&format!("PREFIX {name}: <{iri}>\n"));
        }
        out.push_str(statement);
        out
    }

    /// The url-encoded protocol parameters: the query (when a statement is given), then
    /// the default graphs, then the named graphs, each in configured order.
    pub fn param_string(&self, statement: Option<&str>) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        if let Some(statement) = statement {
            params.append_pair(PARAM_QUERY, &self.query_string(statement));
        }
        for graph in &self.config.default_graphs {
            params.append_pair(PARAM_DEFAULT_GRAPH, graph);
        }
        for graph in &self.config.named_graphs {
            params.append_pair(PARAM_NAMED_GRAPH, graph);
        }
        params.finish()
    }

    pub fn query_uri(&self, statement: &str) -> String {
        match self.config.method {
            SparqlMethod::Get => join_params(&self.config.endpoint, &self.param_string(Some(statement))),
            SparqlMethod::Post => join_params(&self.config.endpoint, &self.param_string(None)),
            SparqlMethod::PostUrlEncoded => self.config.endpoint.trim().to_string(),
        }
    }

    pub fn query_body(&self, statement: &str) -> Option<Vec<u8>> {
        match self.config.method {
            SparqlMethod::Get => None,
            SparqlMethod::Post => Some(self.query_string(statement).into_bytes()),
            SparqlMethod::PostUrlEncoded => Some(self.param_string(Some(statement)).into_bytes()),
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.config.method.content_type()
    }

    pub fn build_request(&self, statement: &str) -> TransportRequest {
        let mut headers = self.config.request_headers();
        if let Some(content_type) = self.content_type() {
            headers.push((HEADER_CONTENT_TYPE.to_string(), content_type.to_string()));
        }
        let request = TransportRequest {
            method: self.config.method.http_method(),
            url: self.query_uri(statement),
            headers,
            body: self.query_body(statement),
            timeout: self.config.timeout(),
            max_redirects: self.config.max_redirects,
            credentials: self.config.credentials.clone(),
            params: self.config.transport_params.clone(),
        };
        debug!("Built {} request for {}", request.method, request.url);
        request
    }

    /// Sends the statement and returns rows of raw terms.
    pub fn raw_query(&self, statement: &str) -> Result<RawResultSet> {
        let request = self.build_request(statement);
        self.transport.check_params(&request.params)?;
        info!(
            "Sending query to {} ({})",
            self.config.endpoint.trim(),
            self.config.method
        );
        let response = self.transport.send(request)?;
        if !response.is_success() {
            let status = response.status;
            let mut bytes = Vec::new();
            let body = match response.body.take(MAX_RAW_LEN as u64).read_to_end(&mut bytes) {
                Ok(_) if !bytes.is_empty() => Some(String::from_utf8_lossy(&bytes).into_owned()),
                _ => None,
            };
            info!("Endpoint answered with status {status}");
            return Err(SparqlError::Protocol { status, body });
        }
        debug!(
            "Response content type: {}",
            response.content_type().unwrap_or("unknown")
        );
        Ok(RawResultSet::from_response(response))
    }

    /// Sends the statement and returns rows converted with this query's converter.
    pub fn query(&self, statement: &str) -> Result<ResultSet> {
        let raw = self.raw_query(statement)?;
        Ok(ResultSet::new(raw, self.converter.clone()))
    }
}

impl EndpointSettings for Query {
    fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut EndpointConfig {
        &mut self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpMethod;

    fn query(method: SparqlMethod) -> Query {
        let mut config = EndpointConfig::new(" http://example.com/sparql ");
        config.method = method;
        Query::new(config)
    }

    #[test]
    fn test_prefixes_prepended() {
        let mut q = query(SparqlMethod::Get);
        q.add_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        q.add_prefix("dbo", "http://dbpedia.org/ontology/");
        assert_eq!(
            q.query_string("SELECT * WHERE { ?s ?p ?o }"),
            "PREFIX dbo: <http://dbpedia.org/ontology/>\nPREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\nSELECT * WHERE { ?s ?p ?o }"
        );
    }

    #[test]
    fn test_get_request() {
        let mut q = query(SparqlMethod::Get);
        q.add_default_graph("http://example.com/g1");
        q.add_default_graph("http://example.com/g2");
        q.add_named_graph("http://example.com/n1");
        let request = q.build_request("ASK {}");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.url,
            "http://example.com/sparql?query=ASK+%7B%7D\
             &default-graph-uri=http%3A%2F%2Fexample.com%2Fg1\
             &default-graph-uri=http%3A%2F%2Fexample.com%2Fg2\
             &named-graph-uri=http%3A%2F%2Fexample.com%2Fn1"
        );
        assert_eq!(request.body, None);
        assert_eq!(request.header("Content-Type"), None);
        assert_eq!(request.header("Accept"), Some("application/sparql-results+xml"));
    }

    #[test]
    fn test_get_appends_to_existing_query_string() {
        let mut q = query(SparqlMethod::Get);
        q.set_endpoint("http://example.com/sparql?key=1");
        assert_eq!(q.query_uri("ASK {}"), "http://example.com/sparql?key=1&query=ASK+%7B%7D");
    }

    #[test]
    fn test_post_direct_request() {
        let mut q = query(SparqlMethod::Post);
        assert_eq!(q.query_uri("ASK {}"), "http://example.com/sparql");
        q.add_named_graph("urn:g");
        let request = q.build_request("ASK {}");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://example.com/sparql?named-graph-uri=urn%3Ag");
        assert_eq!(request.body.as_deref(), Some("ASK {}".as_bytes()));
        assert_eq!(
            request.header("content-type"),
            Some("application/sparql-query")
        );
    }

    #[test]
    fn test_post_url_encoded_request() {
        let mut q = query(SparqlMethod::PostUrlEncoded);
        q.add_default_graph("urn:g");
        let request = q.build_request("ASK {}");
        assert_eq!(request.url, "http://example.com/sparql");
        assert_eq!(
            request.body.as_deref(),
            Some("query=ASK+%7B%7D&default-graph-uri=urn%3Ag".as_bytes())
        );
        assert_eq!(
            request.header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_passthrough_settings() {
        let mut q = query(SparqlMethod::Get);
        q.set_timeout(Some(std::time::Duration::from_secs(3)));
        q.set_max_redirects(0);
        q.set_transport_param("no_proxy", "true");
        let request = q.build_request("ASK {}");
        assert_eq!(request.timeout, Some(std::time::Duration::from_secs(3)));
        assert_eq!(request.max_redirects, 0);
        assert_eq!(request.params.get("no_proxy").map(String::as_str), Some("true"));
        assert_eq!(request.credentials, None);
    }

    #[test]
    fn test_invalid_passthrough_is_config_error() {
        for value in ["-1", "1e20"] {
            let mut q = query(SparqlMethod::Get);
            q.set_endpoint("http://127.0.0.1:1/sparql");
            q.set_transport_param("connect_timeout", value);
            assert!(matches!(q.raw_query("ASK {}"), Err(SparqlError::Config(_))));
        }
    }
}
