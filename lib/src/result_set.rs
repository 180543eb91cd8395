//! Result sets over a response stream.
//!
//! A result set is used either for rows or for the raw response, never both: whichever
//! access comes first fixes the mode. Row access resolves the document head on first
//! use and then decodes one row per pull. The response stream is dropped, and so
//! released, as soon as the rows run out, a decode error occurs, or [`RawResultSet::close`]
//! is called.

use crate::consts::MAX_RAW_LEN;
use crate::datatypes::Converter;
use crate::errors::{Result, SparqlError, TransportError};
use crate::results::{XmlResults, XmlSolutionsReader};
use crate::row::{DeferredRow, Row, ValueRow};
use crate::transport::{ResponseBody, TransportResponse};
use log::{debug, error, info};
use std::io::Read;
use std::sync::Arc;

/// What the document head declared.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResultKind {
    /// SELECT: a variable list followed by rows.
    Solutions,
    /// ASK: a single boolean and no rows.
    Boolean,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    Rows,
    Raw,
}

enum State {
    Unread(ResponseBody),
    Rows(XmlSolutionsReader<ResponseBody>),
    Closed,
}

fn is_unsupported_format(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type.contains("json")
        || media_type == "text/csv"
        || media_type == "text/tab-separated-values"
}

/// A result set yielding raw [`Row`]s of terms.
pub struct RawResultSet {
    state: State,
    mode: Option<Mode>,
    variables: Arc<[String]>,
    kind: Option<ResultKind>,
    boolean: Option<bool>,
    content_type: Option<String>,
    rows: usize,
    // set once rows were refused for an unsupported content type
    rows_refused: bool,
}

impl RawResultSet {
    /// Wraps a response body. `content_type` is the response's `Content-Type`, if known.
    pub fn from_reader(body: impl Read + Send + 'static, content_type: Option<String>) -> Self {
        RawResultSet {
            state: State::Unread(Box::new(body)),
            mode: None,
            variables: Arc::from(Vec::new()),
            kind: None,
            boolean: None,
            content_type,
            rows: 0,
            rows_refused: false,
        }
    }

    pub fn from_response(response: TransportResponse) -> Self {
        let content_type = response.content_type().map(str::to_string);
        RawResultSet {
            state: State::Unread(response.body),
            mode: None,
            variables: Arc::from(Vec::new()),
            kind: None,
            boolean: None,
            content_type,
            rows: 0,
            rows_refused: false,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Releases the response stream. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = State::Closed;
        debug!("Closed result set after {} rows", self.rows);
    }

    fn enter(&mut self, mode: Mode) -> Result<()> {
        match self.mode {
            None => {
                self.mode = Some(mode);
                Ok(())
            }
            Some(current) if current == mode => Ok(()),
            Some(Mode::Rows) => Err(SparqlError::AccessMode(
                "rows have already been read from this result set, the raw response is no longer available".to_string(),
            )),
            Some(Mode::Raw) => Err(SparqlError::AccessMode(
                "the raw response of this result set has been accessed, rows are not available"
                    .to_string(),
            )),
        }
    }

    /// Resolves the head of the document on first call.
    /// An unsupported content type is reported without consuming the body, so the raw
    /// response stays available.
    fn resolve_head(&mut self) -> Result<()> {
        if self.mode.is_none() && matches!(self.state, State::Unread(_)) {
            if let Some(content_type) = self.content_type.as_deref() {
                if is_unsupported_format(content_type) {
                    debug!("Cannot decode rows from content type {content_type}");
                    self.rows_refused = true;
                    return Err(SparqlError::UnsupportedFormat(content_type.to_string()));
                }
            }
        }
        self.enter(Mode::Rows)?;
        if self.kind.is_some() {
            return Ok(());
        }
        let body = match std::mem::replace(&mut self.state, State::Closed) {
            State::Unread(body) => body,
            other => {
                // closed before anything was read
                self.state = other;
                return Ok(());
            }
        };
        match XmlResults::read(body) {
            Ok(XmlResults::Solutions {
                variables,
                solutions,
            }) => {
                debug!("Result set variables: {:?}", variables);
                self.variables = variables.into();
                self.kind = Some(ResultKind::Solutions);
                self.state = State::Rows(solutions);
                Ok(())
            }
            Ok(XmlResults::Boolean(value)) => {
                debug!("Boolean result: {value}");
                self.kind = Some(ResultKind::Boolean);
                self.boolean = Some(value);
                self.close();
                Ok(())
            }
            Err(e) => {
                error!("Aborting result set: {e}");
                Err(e)
            }
        }
    }

    /// The declared variables, in document order. Empty for ASK results.
    pub fn variables(&mut self) -> Result<&[String]> {
        self.resolve_head()?;
        Ok(&self.variables)
    }

    /// `Some(answer)` for an ASK result, `None` for a SELECT.
    pub fn has_result(&mut self) -> Result<Option<bool>> {
        self.resolve_head()?;
        Ok(self.boolean)
    }

    /// `None` only if the result set was closed before the head could be read.
    pub fn kind(&mut self) -> Result<Option<ResultKind>> {
        self.resolve_head()?;
        Ok(self.kind)
    }

    /// Decodes the next row. Returns `Ok(None)` once the rows are exhausted or the result
    /// set is closed; a decode error closes it.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        self.resolve_head()?;
        let State::Rows(solutions) = &mut self.state else {
            return Ok(None);
        };
        match solutions.read_next() {
            Ok(Some(terms)) => {
                self.rows += 1;
                Ok(Some(Row::new(self.variables.clone(), terms)))
            }
            Ok(None) => {
                info!("Read {} rows", self.rows);
                self.close();
                Ok(None)
            }
            Err(e) => {
                error!("Aborting result set after {} rows: {e}", self.rows);
                self.close();
                Err(e)
            }
        }
    }

    /// Reads up to `limit` rows, or all remaining rows when `limit` is 0.
    pub fn fetch_rows(&mut self, limit: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while limit == 0 || rows.len() < limit {
            match self.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Rows that convert their terms through `converter` when read.
    pub fn deferred(self, converter: Arc<Converter>) -> impl Iterator<Item = Result<DeferredRow>> {
        self.map(move |row| row.map(|r| r.deferred(converter.clone())))
    }

    fn take_raw(&mut self) -> Result<ResponseBody> {
        self.enter(Mode::Raw)?;
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Unread(body) => Ok(body),
            _ => Err(SparqlError::AccessMode(
                "the raw response has already been consumed".to_string(),
            )),
        }
    }

    /// At most `max_len` bytes of the undecoded response (1 MiB when `None`). Closes the
    /// result set.
    pub fn raw_response_bytes(&mut self, max_len: Option<usize>) -> Result<Vec<u8>> {
        let body = self.take_raw()?;
        let mut bytes = Vec::new();
        body.take(max_len.unwrap_or(MAX_RAW_LEN) as u64)
            .read_to_end(&mut bytes)
            .map_err(TransportError::body)?;
        debug!("Read {} bytes of raw response", bytes.len());
        Ok(bytes)
    }

    /// Like [`raw_response_bytes`](Self::raw_response_bytes), decoded as UTF-8 with
    /// invalid sequences replaced.
    pub fn raw_response_text(&mut self, max_len: Option<usize>) -> Result<String> {
        let bytes = self.raw_response_bytes(max_len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Hands over the undecoded response stream.
    pub fn into_raw_reader(mut self) -> Result<ResponseBody> {
        self.take_raw()
    }
}

impl Iterator for RawResultSet {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rows_refused {
            return None;
        }
        self.next_row().transpose()
    }
}

/// A result set yielding rows already converted through a [`Converter`].
pub struct ResultSet {
    raw: RawResultSet,
    converter: Arc<Converter>,
}

impl ResultSet {
    pub fn new(raw: RawResultSet, converter: Arc<Converter>) -> Self {
        ResultSet { raw, converter }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn content_type(&self) -> Option<&str> {
        self.raw.content_type()
    }

    pub fn variables(&mut self) -> Result<&[String]> {
        self.raw.variables()
    }

    pub fn has_result(&mut self) -> Result<Option<bool>> {
        self.raw.has_result()
    }

    pub fn kind(&mut self) -> Result<Option<ResultKind>> {
        self.raw.kind()
    }

    pub fn next_row(&mut self) -> Result<Option<ValueRow>> {
        Ok(self
            .raw
            .next_row()?
            .map(|row| row.to_values(&self.converter)))
    }

    pub fn fetch_rows(&mut self, limit: usize) -> Result<Vec<ValueRow>> {
        Ok(self
            .raw
            .fetch_rows(limit)?
            .iter()
            .map(|row| row.to_values(&self.converter))
            .collect())
    }

    pub fn raw_response_bytes(&mut self, max_len: Option<usize>) -> Result<Vec<u8>> {
        self.raw.raw_response_bytes(max_len)
    }

    pub fn raw_response_text(&mut self, max_len: Option<usize>) -> Result<String> {
        self.raw.raw_response_text(max_len)
    }

    pub fn into_raw_reader(self) -> Result<ResponseBody> {
        self.raw.into_raw_reader()
    }

    /// Switches to raw rows that are converted on access.
    pub fn deferred(self) -> impl Iterator<Item = Result<DeferredRow>> {
        self.raw.deferred(self.converter)
    }

    pub fn into_raw(self) -> RawResultSet {
        self.raw
    }

    pub fn close(&mut self) {
        self.raw.close()
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_closed()
    }
}

impl Iterator for ResultSet {
    type Item = Result<ValueRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let converter = &self.converter;
        self.raw
            .next()
            .map(|row| row.map(|row| row.to_values(converter)))
    }
}
