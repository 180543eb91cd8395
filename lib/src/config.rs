//! Endpoint configuration shared by [`Service`](crate::service::Service) and the queries
//! derived from it, plus the [`EndpointSettings`] trait both of them expose it through.

use crate::consts::{
    DEFAULT_ENCODING, DEFAULT_MAX_REDIRECTS, HEADER_ACCEPT, HEADER_USER_AGENT,
    RESULT_TYPE_SPARQL_XML, USER_AGENT,
};
use crate::errors::{Result, SparqlError};
use crate::options::{ResultType, SparqlMethod};
use crate::transport::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;

fn timeout_ser<S>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    // seconds as a float, like the CLI flag
    timeout.map(|d| d.as_secs_f64()).serialize(serializer)
}

fn timeout_de<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs: Option<f64> = Option::deserialize(deserializer)?;
    match secs {
        Some(s) if s == 0.0 => Ok(None),
        Some(s) => Duration::try_from_secs_f64(s)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid timeout {s}"))),
        None => Ok(None),
    }
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_accept() -> String {
    RESULT_TYPE_SPARQL_XML.to_string()
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn check_encoding(encoding: &str) -> Result<String> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(DEFAULT_ENCODING.to_string()),
        _ => Err(SparqlError::config(format!(
            "unsupported encoding '{encoding}', only utf-8 is supported"
        ))),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub endpoint: String,
    #[serde(default)]
    pub method: SparqlMethod,
    #[serde(default = "default_encoding")]
    encoding: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    // extra request headers; an entry here replaces the default of the same name
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub default_graphs: Vec<String>,
    #[serde(default)]
    pub named_graphs: Vec<String>,
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(
        default,
        serialize_with = "timeout_ser",
        deserialize_with = "timeout_de"
    )]
    timeout: Option<Duration>,
    // never written to disk
    #[serde(skip_serializing, default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub transport_params: BTreeMap<String, String>,
}

impl EndpointConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        EndpointConfig {
            endpoint: endpoint.into(),
            method: SparqlMethod::default(),
            encoding: default_encoding(),
            accept: default_accept(),
            headers: BTreeMap::new(),
            default_graphs: Vec::new(),
            named_graphs: Vec::new(),
            prefixes: BTreeMap::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout: None,
            credentials: None,
            transport_params: BTreeMap::new(),
        }
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Fails with a configuration error for anything but UTF-8.
    pub fn set_encoding(&mut self, encoding: &str) -> Result<()> {
        self.encoding = check_encoding(encoding)?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A zero duration means no timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|d| !d.is_zero());
    }

    /// `Accept` and `User-Agent` followed by the extra headers. An extra header with the
    /// same name (ignoring case) as a default one replaces it.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = Vec::new();
        let overridden = |name: &str| self.headers.keys().any(|k| k.eq_ignore_ascii_case(name));
        if !overridden(HEADER_ACCEPT) {
            headers.push((HEADER_ACCEPT.to_string(), self.accept.clone()));
        }
        if !overridden(HEADER_USER_AGENT) {
            headers.push((HEADER_USER_AGENT.to_string(), USER_AGENT.to_string()));
        }
        headers.extend(self.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        headers
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)
            .map_err(|e| SparqlError::config(format!("cannot serialize configuration: {e}")))?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let mut config: EndpointConfig = serde_json::from_reader(reader)
            .map_err(|e| SparqlError::config(format!("cannot read configuration: {e}")))?;
        config.encoding = check_encoding(&config.encoding)?;
        Ok(config)
    }

    /// Prints out the configuration in a readable way for command line output.
    pub fn print(&self) {
        println!("Endpoint configuration:");
        println!("  Endpoint: {}", self.endpoint);
        println!("  Method: {}", self.method);
        println!("  Encoding: {}", self.encoding);
        println!("  Accept: {}", self.accept);
        if !self.default_graphs.is_empty() {
            println!("  Default graphs:");
            for graph in &self.default_graphs {
                println!("    - {}", graph);
            }
        }
        if !self.named_graphs.is_empty() {
            println!("  Named graphs:");
            for graph in &self.named_graphs {
                println!("    - {}", graph);
            }
        }
        if !self.prefixes.is_empty() {
            println!("  Prefixes:");
            for (name, iri) in &self.prefixes {
                println!("    {}: <{}>", name, iri);
            }
        }
        if !self.headers.is_empty() {
            println!("  Headers:");
            for (name, value) in &self.headers {
                println!("    {}: {}", name, value);
            }
        }
        println!("  Max redirects: {}", self.max_redirects);
        match self.timeout {
            Some(t) => println!("  Timeout: {:.3}s", t.as_secs_f64()),
            None => println!("  Timeout: none"),
        }
        if let Some(credentials) = &self.credentials {
            println!("  Authenticated as: {}", credentials.username);
        }
        for (key, value) in &self.transport_params {
            println!("  Transport {}: {}", key, value);
        }
    }
}

/// Configuration accessors shared by the endpoint and the queries derived from it.
pub trait EndpointSettings {
    fn config(&self) -> &EndpointConfig;
    fn config_mut(&mut self) -> &mut EndpointConfig;

    fn endpoint(&self) -> &str {
        &self.config().endpoint
    }

    fn set_endpoint(&mut self, endpoint: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().endpoint = endpoint.into();
    }

    fn method(&self) -> SparqlMethod {
        self.config().method
    }

    fn set_method(&mut self, method: SparqlMethod) {
        self.config_mut().method = method;
    }

    fn encoding(&self) -> &str {
        self.config().encoding()
    }

    fn set_encoding(&mut self, encoding: &str) -> Result<()> {
        self.config_mut().set_encoding(encoding)
    }

    fn accept(&self) -> &str {
        &self.config().accept
    }

    /// Any media type; only `application/sparql-results+xml` responses decode into rows.
    fn set_accept(&mut self, accept: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().accept = accept.into();
    }

    fn set_result_type(&mut self, result_type: ResultType) {
        self.config_mut().accept = result_type.media_type().to_string();
    }

    fn default_graphs(&self) -> &[String] {
        &self.config().default_graphs
    }

    fn add_default_graph(&mut self, graph: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().default_graphs.push(graph.into());
    }

    fn clear_default_graphs(&mut self) {
        self.config_mut().default_graphs.clear();
    }

    fn named_graphs(&self) -> &[String] {
        &self.config().named_graphs
    }

    fn add_named_graph(&mut self, graph: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().named_graphs.push(graph.into());
    }

    fn clear_named_graphs(&mut self) {
        self.config_mut().named_graphs.clear();
    }

    fn prefixes(&self) -> &BTreeMap<String, String> {
        &self.config().prefixes
    }

    fn add_prefix(&mut self, name: impl Into<String>, iri: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().prefixes.insert(name.into(), iri.into());
    }

    fn remove_prefix(&mut self, name: &str) -> Option<String> {
        self.config_mut().prefixes.remove(name)
    }

    fn clear_prefixes(&mut self) {
        self.config_mut().prefixes.clear();
    }

    fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut().headers.insert(name.into(), value.into());
    }

    /// Every header that will be sent, defaults included.
    fn headers(&self) -> Vec<(String, String)> {
        self.config().request_headers()
    }

    fn timeout(&self) -> Option<Duration> {
        self.config().timeout()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config_mut().set_timeout(timeout);
    }

    fn max_redirects(&self) -> usize {
        self.config().max_redirects
    }

    fn set_max_redirects(&mut self, max_redirects: usize) {
        self.config_mut().max_redirects = max_redirects;
    }

    fn set_transport_param(&mut self, key: impl Into<String>, value: impl Into<String>)
    where
        Self: Sized,
    {
        self.config_mut()
            .transport_params
            .insert(key.into(), value.into());
    }

    fn transport_params(&self) -> &BTreeMap<String, String> {
        &self.config().transport_params
    }
}

impl EndpointSettings for EndpointConfig {
    fn config(&self) -> &EndpointConfig {
        self
    }

    fn config_mut(&mut self) -> &mut EndpointConfig {
        self
    }
}
