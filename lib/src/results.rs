//! Incremental reader for the [SPARQL Query Results XML Format](https://www.w3.org/TR/rdf-sparql-XMLres/).
//!
//! [`XmlResults::read`] consumes the document only as far as the end of the head (and the
//! `<boolean>` element for ASK results). Rows are then decoded one per
//! [`XmlSolutionsReader::read_next`] call, so the underlying stream is only read as fast
//! as the caller pulls rows. Reading stops at `</results>`; whatever follows is never
//! touched, which lets a transport close the stream early without upsetting the decoder.

use crate::consts::RDF_LANG_STRING;
use crate::errors::{DecodeError, SparqlError, TransportError};
use crate::term::{Literal, Term};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{self, BufReader, Read};
use std::sync::Arc;

type XmlReader<R> = Reader<BufReader<R>>;

/// The outcome of reading the document head.
pub enum XmlResults<R: Read> {
    Solutions {
        variables: Vec<String>,
        solutions: XmlSolutionsReader<R>,
    },
    Boolean(bool),
}

fn syntax_error<R>(reader: &XmlReader<R>, row: Option<usize>, message: impl Into<String>) -> SparqlError {
    DecodeError::Xml {
        message: message.into(),
        position: reader.buffer_position(),
        row,
    }
    .into()
}

fn map_xml_error<R>(reader: &XmlReader<R>, row: Option<usize>, error: quick_xml::Error) -> SparqlError {
    match error {
        quick_xml::Error::Io(error) => {
            let error = Arc::try_unwrap(error)
                .unwrap_or_else(|error| io::Error::new(error.kind(), error.to_string()));
            TransportError::body(error).into()
        }
        other => syntax_error(reader, row, other.to_string()),
    }
}

fn tag_name(event: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(event.name().as_ref()).into_owned()
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

enum HeadState {
    Start,
    Sparql,
    Head,
    AfterHead,
    Boolean,
}

impl<R: Read> XmlResults<R> {
    /// Reads the head of the document. Fails if the document does not start with
    /// `<sparql><head>` or ends before the head is complete.
    pub fn read(source: R) -> Result<Self, SparqlError> {
        let mut reader = Reader::from_reader(BufReader::new(source));
        reader.expand_empty_elements(true);

        let mut buffer = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut boolean_text = String::new();
        let mut state = HeadState::Start;

        loop {
            buffer.clear();
            let event = reader
                .read_event_into(&mut buffer)
                .map_err(|e| map_xml_error(&reader, None, e))?;
            match event {
                Event::Start(event) => match state {
                    HeadState::Start => {
                        if event.local_name().as_ref() != b"sparql" {
                            return Err(syntax_error(
                                &reader,
                                None,
                                format!("Expecting <sparql> tag, found <{}>", tag_name(&event)),
                            ));
                        }
                        state = HeadState::Sparql;
                    }
                    HeadState::Sparql => {
                        if event.local_name().as_ref() != b"head" {
                            return Err(syntax_error(
                                &reader,
                                None,
                                format!("Expecting <head> tag, found <{}>", tag_name(&event)),
                            ));
                        }
                        state = HeadState::Head;
                    }
                    HeadState::Head => match event.local_name().as_ref() {
                        b"variable" => {
                            let mut name = None;
                            for attr in event.attributes() {
                                let attr = attr
                                    .map_err(|e| map_xml_error(&reader, None, e.into()))?;
                                if attr.key.local_name().as_ref() == b"name" {
                                    name = Some(
                                        attr.decode_and_unescape_value(&reader)
                                            .map_err(|e| map_xml_error(&reader, None, e))?
                                            .into_owned(),
                                    );
                                }
                            }
                            let Some(name) = name else {
                                return Err(syntax_error(
                                    &reader,
                                    None,
                                    "No name attribute found for the <variable> tag",
                                ));
                            };
                            if variables.contains(&name) {
                                return Err(syntax_error(
                                    &reader,
                                    None,
                                    format!("The variable {name} is declared twice"),
                                ));
                            }
                            variables.push(name);
                        }
                        b"link" => (),
                        _ => {
                            return Err(syntax_error(
                                &reader,
                                None,
                                format!(
                                    "Expecting <variable> or <link> tag, found <{}>",
                                    tag_name(&event)
                                ),
                            ))
                        }
                    },
                    HeadState::AfterHead => match event.local_name().as_ref() {
                        b"boolean" => state = HeadState::Boolean,
                        b"results" => {
                            debug!("Result header declares variables {:?}", variables);
                            let mapping = variables
                                .iter()
                                .enumerate()
                                .map(|(i, v)| (v.clone(), i))
                                .collect();
                            return Ok(XmlResults::Solutions {
                                variables,
                                solutions: XmlSolutionsReader {
                                    reader,
                                    buffer: Vec::new(),
                                    mapping,
                                    rows: 0,
                                    finished: false,
                                },
                            });
                        }
                        b"link" => (),
                        _ => {
                            return Err(syntax_error(
                                &reader,
                                None,
                                format!(
                                    "Expecting <results> or <boolean> tag, found <{}>",
                                    tag_name(&event)
                                ),
                            ))
                        }
                    },
                    HeadState::Boolean => {
                        return Err(syntax_error(
                            &reader,
                            None,
                            format!("Unexpected tag inside of <boolean> tag: <{}>", tag_name(&event)),
                        ))
                    }
                },
                Event::Text(event) => {
                    let text = event.unescape().map_err(|e| map_xml_error(&reader, None, e))?;
                    if let HeadState::Boolean = state {
                        boolean_text.push_str(&text);
                    } else if !is_blank(&text) {
                        return Err(syntax_error(
                            &reader,
                            None,
                            format!("Unexpected textual value found: '{text}'"),
                        ));
                    }
                }
                Event::End(event) => match state {
                    HeadState::Head if event.local_name().as_ref() == b"head" => {
                        state = HeadState::AfterHead
                    }
                    HeadState::Boolean => {
                        return match boolean_text.trim() {
                            "true" => Ok(XmlResults::Boolean(true)),
                            "false" => Ok(XmlResults::Boolean(false)),
                            other => Err(syntax_error(
                                &reader,
                                None,
                                format!("Unexpected boolean value. Found '{other}'"),
                            )),
                        };
                    }
                    // a document with a head and no results section has no rows
                    HeadState::AfterHead if event.local_name().as_ref() == b"sparql" => {
                        let mapping = variables
                            .iter()
                            .enumerate()
                            .map(|(i, v)| (v.clone(), i))
                            .collect();
                        return Ok(XmlResults::Solutions {
                            variables,
                            solutions: XmlSolutionsReader {
                                reader,
                                buffer: Vec::new(),
                                mapping,
                                rows: 0,
                                finished: true,
                            },
                        });
                    }
                    _ => (),
                },
                Event::Eof => {
                    return Err(syntax_error(
                        &reader,
                        None,
                        "Unexpected early file end. All results file should have a <head> and a <results> or <boolean> tag",
                    ))
                }
                _ => (),
            }
        }
    }
}

enum RowState {
    Results,
    Result,
    Binding,
    Uri,
    BNode,
    Literal,
}

/// Pulls rows out of the `<results>` section, one per call.
pub struct XmlSolutionsReader<R: Read> {
    reader: XmlReader<R>,
    buffer: Vec<u8>,
    mapping: HashMap<String, usize>,
    rows: usize,
    finished: bool,
}

impl<R: Read> XmlSolutionsReader<R> {
    /// Number of rows decoded so far.
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    /// Byte offset of the decoder in the underlying stream.
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Decodes the next row. Positions whose variable has no binding are `None`.
    /// Returns `Ok(None)` once `</results>` has been read.
    pub fn read_next(&mut self) -> Result<Option<Vec<Option<Term>>>, SparqlError> {
        if self.finished {
            return Ok(None);
        }
        let row_idx = Some(self.rows);
        let mut state = RowState::Results;
        let mut bindings: Vec<Option<Term>> = vec![None; self.mapping.len()];
        let mut current_var: Option<usize> = None;
        let mut term: Option<Term> = None;
        let mut text = String::new();
        let mut lang: Option<String> = None;
        let mut datatype: Option<String> = None;

        loop {
            self.buffer.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buffer)
                .map_err(|e| map_xml_error(&self.reader, row_idx, e))?;
            match event {
                Event::Start(event) => match state {
                    RowState::Results => {
                        if event.local_name().as_ref() != b"result" {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                format!("Expecting <result>, found <{}>", tag_name(&event)),
                            ));
                        }
                        state = RowState::Result;
                    }
                    RowState::Result => {
                        if event.local_name().as_ref() != b"binding" {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                format!("Expecting <binding>, found <{}>", tag_name(&event)),
                            ));
                        }
                        let mut name = None;
                        for attr in event.attributes() {
                            let attr = attr
                                .map_err(|e| map_xml_error(&self.reader, row_idx, e.into()))?;
                            if attr.key.local_name().as_ref() == b"name" {
                                name = Some(
                                    attr.decode_and_unescape_value(&self.reader)
                                        .map_err(|e| map_xml_error(&self.reader, row_idx, e))?
                                        .into_owned(),
                                );
                            }
                        }
                        let Some(name) = name else {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                "No name attribute found for the <binding> tag",
                            ));
                        };
                        let Some(idx) = self.mapping.get(&name).copied() else {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                format!("The variable '{name}' is used in a binding but not declared in the variables list"),
                            ));
                        };
                        if bindings[idx].is_some() {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                format!("The variable '{name}' is bound twice in the same result"),
                            ));
                        }
                        current_var = Some(idx);
                        state = RowState::Binding;
                    }
                    RowState::Binding => {
                        if term.is_some() {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                "There is already a value for the current binding",
                            ));
                        }
                        text.clear();
                        match event.local_name().as_ref() {
                            b"uri" => state = RowState::Uri,
                            b"bnode" => state = RowState::BNode,
                            b"literal" => {
                                for attr in event.attributes() {
                                    let attr = attr.map_err(|e| {
                                        map_xml_error(&self.reader, row_idx, e.into())
                                    })?;
                                    if attr.key.as_ref() == b"xml:lang" {
                                        lang = Some(
                                            attr.decode_and_unescape_value(&self.reader)
                                                .map_err(|e| {
                                                    map_xml_error(&self.reader, row_idx, e)
                                                })?
                                                .into_owned(),
                                        );
                                    } else if attr.key.local_name().as_ref() == b"datatype" {
                                        datatype = Some(
                                            attr.decode_and_unescape_value(&self.reader)
                                                .map_err(|e| {
                                                    map_xml_error(&self.reader, row_idx, e)
                                                })?
                                                .into_owned(),
                                        );
                                    }
                                }
                                state = RowState::Literal;
                            }
                            _ => {
                                return Err(syntax_error(
                                    &self.reader,
                                    row_idx,
                                    format!(
                                        "Expecting <uri>, <bnode> or <literal>, found <{}>",
                                        tag_name(&event)
                                    ),
                                ))
                            }
                        }
                    }
                    RowState::Uri | RowState::BNode | RowState::Literal => {
                        return Err(syntax_error(
                            &self.reader,
                            row_idx,
                            format!("Unexpected tag inside of a term: <{}>", tag_name(&event)),
                        ))
                    }
                },
                Event::Text(event) => {
                    let data = event
                        .unescape()
                        .map_err(|e| map_xml_error(&self.reader, row_idx, e))?;
                    match state {
                        RowState::Uri | RowState::BNode | RowState::Literal => {
                            text.push_str(&data)
                        }
                        _ if is_blank(&data) => (),
                        _ => {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                format!("Unexpected textual value found: '{data}'"),
                            ))
                        }
                    }
                }
                Event::CData(event) => match state {
                    RowState::Uri | RowState::BNode | RowState::Literal => {
                        let data = self
                            .reader
                            .decoder()
                            .decode(&event)
                            .map_err(|e| map_xml_error(&self.reader, row_idx, e))?;
                        text.push_str(&data);
                    }
                    _ => {
                        return Err(syntax_error(
                            &self.reader,
                            row_idx,
                            "Unexpected CDATA section outside of a term",
                        ))
                    }
                },
                Event::End(_) => match state {
                    RowState::Results => {
                        // </results>: stop here, the rest of the stream is not needed
                        self.finished = true;
                        debug!("Reached the end of the results after {} rows", self.rows);
                        return Ok(None);
                    }
                    RowState::Result => {
                        self.rows += 1;
                        return Ok(Some(bindings));
                    }
                    RowState::Binding => {
                        let (Some(idx), Some(value)) = (current_var.take(), term.take()) else {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                "A <binding> must contain exactly one <uri>, <bnode> or <literal>",
                            ));
                        };
                        bindings[idx] = Some(value);
                        state = RowState::Result;
                    }
                    RowState::Uri => {
                        term = Some(Term::Iri(std::mem::take(&mut text)));
                        state = RowState::Binding;
                    }
                    RowState::BNode => {
                        if text.is_empty() {
                            return Err(syntax_error(
                                &self.reader,
                                row_idx,
                                "Empty blank node label",
                            ));
                        }
                        term = Some(Term::BlankNode(std::mem::take(&mut text)));
                        state = RowState::Binding;
                    }
                    RowState::Literal => {
                        let value = std::mem::take(&mut text);
                        let literal = build_literal(value, lang.take(), datatype.take())
                            .map_err(|message| syntax_error(&self.reader, row_idx, message))?;
                        term = Some(Term::Literal(literal));
                        state = RowState::Binding;
                    }
                },
                Event::Eof => {
                    return Err(syntax_error(
                        &self.reader,
                        row_idx,
                        "Unexpected end of document inside the <results> section",
                    ))
                }
                _ => (),
            }
        }
    }
}

fn build_literal(
    value: String,
    lang: Option<String>,
    datatype: Option<String>,
) -> Result<Literal, String> {
    match (lang, datatype) {
        (Some(lang), Some(datatype)) if datatype != RDF_LANG_STRING.as_str() => Err(format!(
            "xml:lang value '{lang}' provided with the datatype {datatype}"
        )),
        (Some(lang), _) => Ok(Literal::lang_tagged(value, lang)),
        (None, Some(datatype)) => Ok(Literal::typed(value, datatype)),
        (None, None) => Ok(Literal::simple(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(doc: &str) -> Result<XmlResults<&[u8]>, SparqlError> {
        XmlResults::read(doc.as_bytes())
    }

    fn solutions(doc: &str) -> (Vec<String>, XmlSolutionsReader<&[u8]>) {
        match read(doc).unwrap() {
            XmlResults::Solutions {
                variables,
                solutions,
            } => (variables, solutions),
            XmlResults::Boolean(_) => panic!("expected solutions"),
        }
    }

    const SELECT: &str = r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head>
    <variable name="s"/>
    <variable name="o"/>
    <link href="metadata.rdf"/>
  </head>
  <results>
    <result>
      <binding name="o"><literal xml:lang="en">one &amp; two</literal></binding>
      <binding name="s"><uri>http://example.com/a</uri></binding>
    </result>
    <result>
      <binding name="s"><bnode>b0</bnode></binding>
    </result>
  </results>
</sparql>"#;

    #[test]
    fn test_select_rows() {
        let (variables, mut rows) = solutions(SELECT);
        assert_eq!(variables, vec!["s", "o"]);
        assert_eq!(
            rows.read_next().unwrap(),
            Some(vec![
                Some(Term::iri("http://example.com/a")),
                Some(Term::from(Literal::lang_tagged("one & two", "en"))),
            ])
        );
        assert_eq!(
            rows.read_next().unwrap(),
            Some(vec![Some(Term::blank_node("b0")), None])
        );
        assert_eq!(rows.read_next().unwrap(), None);
        assert_eq!(rows.read_next().unwrap(), None);
        assert_eq!(rows.rows_read(), 2);
    }

    #[test]
    fn test_ask() {
        let doc = r#"<sparql xmlns="http://www.w3.org/2005/sparql-results#"><head/><boolean> true </boolean></sparql>"#;
        assert!(matches!(read(doc).unwrap(), XmlResults::Boolean(true)));
        let doc = r#"<sparql><head></head><boolean>false</boolean></sparql>"#;
        assert!(matches!(read(doc).unwrap(), XmlResults::Boolean(false)));
        let doc = r#"<sparql><head></head><boolean>maybe</boolean></sparql>"#;
        assert!(read(doc).is_err());
    }

    #[test]
    fn test_empty_literal_and_cdata() {
        let doc = r#"<sparql><head><variable name="x"/><variable name="y"/></head><results>
            <result><binding name="x"><literal/></binding><binding name="y"><literal><![CDATA[<b>bold</b>]]></literal></binding></result>
        </results></sparql>"#;
        let (_, mut rows) = solutions(doc);
        assert_eq!(
            rows.read_next().unwrap(),
            Some(vec![
                Some(Term::from(Literal::simple(""))),
                Some(Term::from(Literal::simple("<b>bold</b>"))),
            ])
        );
    }

    #[test]
    fn test_lang_string_datatype() {
        let doc = r#"<sparql><head><variable name="x"/></head><results>
            <result><binding name="x"><literal xml:lang="fr" datatype="http://www.w3.org/1999/02/22-rdf-syntax-ns#langString">chat</literal></binding></result>
        </results></sparql>"#;
        let (_, mut rows) = solutions(doc);
        assert_eq!(
            rows.read_next().unwrap(),
            Some(vec![Some(Term::from(Literal::lang_tagged("chat", "fr")))])
        );
    }

    #[test]
    fn test_no_results_section() {
        let doc = r#"<sparql><head><variable name="x"/></head></sparql>"#;
        let (variables, mut rows) = solutions(doc);
        assert_eq!(variables, vec!["x"]);
        assert_eq!(rows.read_next().unwrap(), None);
    }

    #[test]
    fn test_header_errors() {
        assert!(read("").is_err());
        assert!(read("<html><body/></html>").is_err());
        assert!(read("<sparql><results/></sparql>").is_err());
        assert!(read(r#"<sparql><head><variable/></head><results/></sparql>"#).is_err());
        assert!(read(r#"<sparql><head><variable name="a"/><variable name="a"/></head></sparql>"#).is_err());
        assert!(read(r#"<sparql><head><variable name="a"/>"#).is_err());
    }

    #[test]
    fn test_unknown_term_kind() {
        let doc = r#"<sparql><head><variable name="x"/></head><results>
            <result><binding name="x"><triple/></binding></result>
        </results></sparql>"#;
        let (_, mut rows) = solutions(doc);
        match rows.read_next() {
            Err(SparqlError::Decode(DecodeError::Xml { row, position, .. })) => {
                assert_eq!(row, Some(0));
                assert!(position > 0);
            }
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_variable() {
        let doc = r#"<sparql><head><variable name="x"/></head><results>
            <result><binding name="y"><uri>a</uri></binding></result>
        </results></sparql>"#;
        let (_, mut rows) = solutions(doc);
        assert!(rows.read_next().is_err());
    }

    #[test]
    fn test_truncated_document() {
        let doc = r#"<sparql><head><variable name="x"/></head><results>
            <result><binding name="x"><uri>a</uri></binding></result>
            <result><binding name="x"><uri>b"#;
        let (_, mut rows) = solutions(doc);
        assert!(rows.read_next().unwrap().is_some());
        match rows.read_next() {
            Err(SparqlError::Decode(DecodeError::Xml { row, .. })) => assert_eq!(row, Some(1)),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    /// A reader that fails once everything up to `</results>` has been handed out.
    struct FailingTail<'a> {
        data: &'a [u8],
    }

    impl Read for FailingTail<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "closed"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_stream_closed_after_results() {
        let doc = r#"<sparql><head><variable name="x"/></head><results><result><binding name="x"><uri>a</uri></binding></result></results>"#;
        let source = FailingTail {
            data: doc.as_bytes(),
        };
        let XmlResults::Solutions { mut solutions, .. } = XmlResults::read(source).unwrap() else {
            panic!("expected solutions");
        };
        assert!(solutions.read_next().unwrap().is_some());
        assert_eq!(solutions.read_next().unwrap(), None);
    }
}
