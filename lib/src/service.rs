//! A long-lived endpoint holding shared defaults; each query it runs works on a copy.

use crate::config::{EndpointConfig, EndpointSettings};
use crate::datatypes::Converter;
use crate::errors::Result;
use crate::query::Query;
use crate::result_set::{RawResultSet, ResultSet};
use crate::transport::{Credentials, HttpTransport, Transport};
use log::debug;
use std::fmt;
use std::sync::Arc;

pub struct Service {
    config: EndpointConfig,
    transport: Arc<dyn Transport>,
    converter: Arc<Converter>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("config", &self.config)
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// An endpoint with default settings, reached over HTTP.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::from_config(EndpointConfig::new(endpoint))
    }

    pub fn from_config(config: EndpointConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: EndpointConfig, transport: Arc<dyn Transport>) -> Self {
        Service {
            config,
            transport,
            converter: Arc::new(Converter::default()),
        }
    }

    /// Basic authentication for every query created afterwards.
    pub fn authenticate(&mut self, username: impl Into<String>, password: impl Into<String>) {
        let username = username.into();
        debug!("Using basic authentication as {username}");
        self.config.credentials = Some(Credentials {
            username,
            password: password.into(),
        });
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Conversions handed to every query created afterwards.
    pub fn set_converter(&mut self, converter: Converter) {
        self.converter = Arc::new(converter);
    }

    /// A query starting from a snapshot of this endpoint's settings.
    pub fn create_query(&self) -> Query {
        Query::with_transport(self.config.clone(), self.transport.clone())
            .with_converter(self.converter.clone())
    }

    pub fn query(&self, statement: &str) -> Result<ResultSet> {
        self.create_query().query(statement)
    }

    pub fn raw_query(&self, statement: &str) -> Result<RawResultSet> {
        self.create_query().raw_query(statement)
    }
}

impl EndpointSettings for Service {
    fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut EndpointConfig {
        &mut self.config
    }
}

/// Runs `statement` against `endpoint` with default settings.
pub fn query(endpoint: &str, statement: &str) -> Result<ResultSet> {
    Service::new(endpoint).query(statement)
}

/// Like [`query`], returning raw terms.
pub fn raw_query(endpoint: &str, statement: &str) -> Result<RawResultSet> {
    Service::new(endpoint).raw_query(statement)
}
