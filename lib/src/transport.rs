//! The seam between query dispatch and the network.
//!
//! A [`Transport`] takes a fully assembled [`TransportRequest`] and hands back a
//! [`TransportResponse`] whose body is a plain byte stream, so result sets can read
//! it incrementally. [`HttpTransport`] is the default, backed by a blocking `reqwest`
//! client; tests swap in canned responses.

use crate::errors::{SparqlError, TransportError, TransportErrorKind};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header names as configured; order is preserved.
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    pub max_redirects: usize,
    pub credentials: Option<Credentials>,
    /// Transport-specific settings that have no protocol meaning.
    pub params: BTreeMap<String, String>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub type ResponseBody = Box<dyn Read + Send>;

pub struct TransportResponse {
    pub status: u16,
    /// Keys are lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        TransportResponse {
            status,
            headers: BTreeMap::new(),
            body: Box::new(body),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub trait Transport: Send + Sync {
    /// Performs one request. Redirects and timeouts are handled here; the status code is
    /// reported as-is, whatever it is.
    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Rejects passthrough parameters this transport cannot honour, before anything is sent.
    fn check_params(&self, _params: &BTreeMap<String, String>) -> Result<(), SparqlError> {
        Ok(())
    }
}

/// [`Transport`] over a blocking `reqwest` client.
///
/// Understood `params`: `connect_timeout` (seconds), `no_proxy` and
/// `accept_invalid_certs` (`true`/`false`). Anything else is ignored with a warning.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport
    }

    fn client(&self, request: &TransportRequest) -> Result<Client, TransportError> {
        let params = ClientParams::parse(&request.params)
            .map_err(|msg| TransportError::new(TransportErrorKind::Request, msg))?;
        let policy = if request.max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(request.max_redirects)
        };
        let mut builder = Client::builder().timeout(request.timeout).redirect(policy);
        if let Some(connect_timeout) = params.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if params.no_proxy {
            builder = builder.no_proxy();
        }
        if let Some(accept) = params.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(accept);
        }
        builder
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e))
    }
}

/// The passthrough parameters [`HttpTransport`] understands.
#[derive(Debug, Default, PartialEq)]
struct ClientParams {
    connect_timeout: Option<Duration>,
    no_proxy: bool,
    accept_invalid_certs: Option<bool>,
}

impl ClientParams {
    fn parse(params: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut parsed = ClientParams::default();
        for (key, value) in params {
            match key.as_str() {
                "connect_timeout" => {
                    let timeout = value
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                        .ok_or_else(|| {
                            format!("connect_timeout must be a number of seconds, got '{value}'")
                        })?;
                    parsed.connect_timeout = Some(timeout);
                }
                "no_proxy" => parsed.no_proxy = parse_flag(key, value)?,
                "accept_invalid_certs" => {
                    parsed.accept_invalid_certs = Some(parse_flag(key, value)?)
                }
                other => warn!("Ignoring unknown transport parameter '{other}'"),
            }
        }
        Ok(parsed)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("{key} must be true or false, got '{value}'")),
    }
}

fn classify(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_redirect() {
        TransportErrorKind::Redirect
    } else if error.is_builder() || error.is_request() {
        TransportErrorKind::Request
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    }
}

impl Transport for HttpTransport {
    fn check_params(&self, params: &BTreeMap<String, String>) -> Result<(), SparqlError> {
        ClientParams::parse(params)
            .map(|_| ())
            .map_err(SparqlError::Config)
    }

    fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client(&request)?;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        debug!("{} {}", request.method, request.url);
        let mut builder = client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder
            .send()
            .map_err(|e| TransportError::new(classify(&e), e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        debug!("Response status {status} from {}", response.url());
        Ok(TransportResponse {
            status,
            headers,
            body: Box::new(response),
        })
    }
}
