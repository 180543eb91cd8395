use sparqlc::consts::{XSD_FLOAT, XSD_INTEGER, XSD_STRING};
use sparqlc::{
    Converter, DecodeError, Literal, RawResultSet, ResultKind, ResultSet, SparqlError, Term, Value,
};
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const MILLION_USD: &str = "http://aims.fao.org/aos/geopolitical.owl#MillionUSD";

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn raw(name: &str) -> RawResultSet {
    let file = File::open(data(name)).unwrap();
    RawResultSet::from_reader(file, Some("application/sparql-results+xml".to_string()))
}

fn converted(name: &str) -> ResultSet {
    ResultSet::new(raw(name), Arc::new(Converter::new()))
}

fn lit(value: &str) -> Option<Term> {
    Some(Term::from(Literal::simple(value)))
}

fn typed(value: &str, datatype: &str) -> Option<Term> {
    Some(Term::from(Literal::typed(value, datatype)))
}

fn tagged(value: &str, lang: &str) -> Option<Term> {
    Some(Term::from(Literal::lang_tagged(value, lang)))
}

fn text(value: &str) -> Option<Value> {
    Some(Value::Text(value.to_string()))
}

#[test]
fn test_simple_result_raw() {
    let mut rs = raw("simple_result.srx");
    assert_eq!(
        rs.variables().unwrap(),
        ["eeaURI", "gdpTotal", "eeacode", "nutscode", "faocode", "gdp", "name"]
    );
    let rows = rs.fetch_rows(0).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.len() == 7));
    assert_eq!(
        rows[0].terms(),
        [
            Some(Term::iri("http://rdfdata.eionet.europa.eu/eea/countries/BE")),
            typed("471161.0", MILLION_USD),
            tagged("BE", "en"),
            lit("BE"),
            typed("255", XSD_STRING.as_str()),
            typed("44.252934", XSD_FLOAT.as_str()),
            tagged("Belgium", "en"),
        ]
    );
    assert_eq!(rows[1].get(3), None);
    assert_eq!(
        rows[2].terms(),
        [
            None,
            typed("5069000.0", MILLION_USD),
            None,
            None,
            None,
            None,
            tagged("Japan", "en"),
        ]
    );
    assert!(rs.is_closed());
}

#[test]
fn test_simple_result_converted() {
    let mut rs = converted("simple_result.srx");
    let rows = rs.fetch_rows(2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].values(),
        [
            text("http://rdfdata.eionet.europa.eu/eea/countries/BE"),
            text("471161.0"),
            text("BE"),
            text("BE"),
            text("255"),
            Some(Value::Float(44.252934)),
            text("Belgium"),
        ]
    );
    assert_eq!(rows[1].get_by_name("gdp"), Some(&Value::Float(3.808241)));
    assert!(!rs.is_closed());
    let rest: Vec<_> = rs.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].get_by_name("name"), Some(&Value::Text("Japan".to_string())));
    assert!(rs.is_closed());
}

#[test]
fn test_w3c_sample() {
    let mut rs = raw("w3c_sample_result.srx");
    let rows: Vec<_> = rs.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(
        rs.variables().unwrap(),
        ["x", "hpage", "name", "mbox", "age", "blurb", "friend"]
    );
    assert_eq!(
        rows[0].terms(),
        [
            Some(Term::blank_node("r1")),
            Some(Term::iri("http://work.example.org/alice/")),
            lit("Alice"),
            lit(""),
            None,
            typed(
                "<p xmlns=\"http://www.w3.org/1999/xhtml\">My name is <b>alice</b></p>",
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral"
            ),
            Some(Term::blank_node("r2")),
        ]
    );
    assert_eq!(
        rows[1].terms(),
        [
            Some(Term::blank_node("r2")),
            Some(Term::iri("http://work.example.org/bob/")),
            tagged("Bob", "en"),
            Some(Term::iri("mailto:bob@work.example.org")),
            typed("30", XSD_INTEGER.as_str()),
            None,
            Some(Term::blank_node("r1")),
        ]
    );

    let values = rows[1].to_values(&Converter::new());
    assert_eq!(values.get_by_name("age"), Some(&Value::Integer(30)));
    assert_eq!(values.get_by_name("x"), Some(&Value::Text("r2".to_string())));
}

#[test]
fn test_ask_results() {
    let mut rs = raw("ask_result_positive.srx");
    assert_eq!(rs.has_result().unwrap(), Some(true));
    assert_eq!(rs.kind().unwrap(), Some(ResultKind::Boolean));
    assert!(rs.fetch_rows(0).unwrap().is_empty());

    let mut rs = converted("ask_result_negative.srx");
    assert!(rs.next().is_none());
    assert_eq!(rs.has_result().unwrap(), Some(false));

    let mut rs = raw("simple_result.srx");
    assert_eq!(rs.has_result().unwrap(), None);
    assert_eq!(rs.kind().unwrap(), Some(ResultKind::Solutions));
}

#[test]
fn test_utf8_and_split_text() {
    let rows = converted("utf_8_result.srx").fetch_rows(0).unwrap();
    assert_eq!(
        rows[0].values(),
        [
            text("http://aims.fao.org/aos/geopolitical.owl#Germany"),
            text("Germany"),
            text("Германия"),
        ]
    );

    let rows = converted("big_text.srx").fetch_rows(0).unwrap();
    assert_eq!(
        rows[0].values(),
        [
            text("multiple<br>paragraphs<br>here"),
            text("http://example.com/"),
            text("bnode.id"),
        ]
    );
}

#[cfg(feature = "chrono")]
#[test]
fn test_remaining_conversions() {
    use chrono::{NaiveDate, NaiveTime};
    let rows = converted("xsd_types.srx").fetch_rows(0).unwrap();
    assert_eq!(
        rows[0].values(),
        [
            text("Estonia"),
            Some(Value::Decimal(oxsdatatypes::Decimal::from_str("123.456").unwrap())),
            Some(Value::LocalDateTime(
                NaiveDate::from_ymd_opt(2009, 11, 2)
                    .unwrap()
                    .and_hms_opt(14, 31, 40)
                    .unwrap()
            )),
            Some(Value::Date(NaiveDate::from_ymd_opt(1991, 8, 20).unwrap())),
            Some(Value::Time(NaiveTime::from_hms_opt(18, 58, 21).unwrap())),
        ]
    );
}

#[test]
fn test_custom_conversions() {
    let converter = Converter::new()
        .with_override(MILLION_USD, |v, _| {
            Value::Float(f64::from_str(v).unwrap_or(f64::NAN) * 1_000_000.0)
        })
        .with_fallback(|v, dt| Value::Text(format!("{v}:{dt}")));
    let mut rs = ResultSet::new(raw("simple_result.srx"), Arc::new(converter));
    let row = rs.next().unwrap().unwrap();
    assert_eq!(row.get(1), Some(&Value::Float(471161.0 * 1_000_000.0)));
    // xsd:string is built in, so the fallback is not consulted
    assert_eq!(row.get(4), Some(&Value::Text("255".to_string())));
}

#[test]
fn test_deferred_rows() {
    let rs = converted("orbits.srx");
    let rows: Vec<_> = rs.deferred().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_by_name("orbits"), Some(Value::Integer(86331)));
    assert_eq!(
        rows[1].raw().get(1),
        typed("51917", XSD_INTEGER.as_str()).as_ref()
    );
}

#[test]
fn test_truncated_document() {
    let mut rs = raw("truncated.srx");
    let first = rs.next().unwrap().unwrap();
    assert_eq!(first.get(0), Some(&Term::iri("http://example.com/complete")));
    match rs.next() {
        Some(Err(SparqlError::Decode(DecodeError::Xml { row, position, .. }))) => {
            assert_eq!(row, Some(1));
            assert!(position > 0);
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert!(rs.is_closed());
    assert!(rs.next().is_none());
}

#[test]
fn test_unknown_term_kind_aborts() {
    let mut rs = raw("unknown_term.srx");
    assert!(rs.next().unwrap().is_ok());
    assert!(matches!(rs.next(), Some(Err(SparqlError::Decode(_)))));
    assert!(rs.is_closed());
}

#[test]
fn test_raw_text_from_file() {
    let mut rs = raw("ask_result_positive.srx");
    let text = rs.raw_response_text(None).unwrap();
    assert!(text.contains("<boolean>true</boolean>"));
    assert!(rs.is_closed());
    assert!(matches!(rs.has_result(), Err(SparqlError::AccessMode(_))));
}

#[test]
fn test_not_xml() {
    let mut rs = RawResultSet::from_reader(
        "<html><body>Service unavailable</body></html>".as_bytes(),
        Some("text/html".to_string()),
    );
    assert!(matches!(rs.variables(), Err(SparqlError::Decode(_))));
    assert!(rs.is_closed());
}
