//! Reads a single Notation3-serialized term back into a [`Term`].
//!
//! This is the inverse of [`Term::n3`]: IRIs, quoted strings with an optional
//! `@lang` or `^^<datatype>` suffix, and blank node labels. Bare numbers and
//! booleans (`42`, `1.5`, `true`) are rejected rather than guessed at.

use crate::errors::{DecodeError, Result};
use crate::term::{Literal, Term};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SUFFIX: Regex = Regex::new(
        r#"^(?:@(?P<lang>[A-Za-z]+(?:-[A-Za-z0-9]+)*)|\^\^<(?P<datatype>[^<>"{}|^`\\\s]*)>)?$"#
    )
    .unwrap();
    static ref BLANK_LABEL: Regex = Regex::new(r"^_:(?P<label>[A-Za-z0-9_][A-Za-z0-9_.\-]*)$").unwrap();
}

fn syntax_error(message: impl Into<String>, position: usize) -> DecodeError {
    DecodeError::N3 {
        message: message.into(),
        position,
    }
}

/// Parses one serialized term, e.g. `<http://example.com/>` or `"chat"@fr`.
pub fn parse_n3_term(src: &str) -> Result<Term> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix('<') {
        let Some(value) = rest.strip_suffix('>') else {
            return Err(syntax_error("IRI is missing its closing '>'", src.len()).into());
        };
        if let Some(idx) = value.find(|c| c == '<' || c == '>') {
            return Err(syntax_error("unexpected angle bracket inside IRI", idx + 1).into());
        }
        return Ok(Term::Iri(value.to_string()));
    }
    if src.starts_with("_:") {
        return match BLANK_LABEL.captures(src) {
            Some(caps) => Ok(Term::BlankNode(caps["label"].to_string())),
            None => Err(syntax_error("invalid blank node label", 2).into()),
        };
    }
    let Some(quote) = src.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return Err(syntax_error(
            "expected an IRI, a blank node or a quoted string; bare numbers and booleans are not supported",
            0,
        )
        .into());
    };

    let (value, consumed) = read_quoted(src, quote)?;
    let suffix = &src[consumed..];
    let Some(caps) = SUFFIX.captures(suffix) else {
        return Err(syntax_error(
            format!("unexpected content after string: '{suffix}'"),
            consumed,
        )
        .into());
    };
    let literal = match (caps.name("datatype"), caps.name("lang")) {
        (Some(datatype), _) => Literal::typed(value, datatype.as_str()),
        (None, Some(lang)) => Literal::lang_tagged(value, lang.as_str()),
        (None, None) => Literal::simple(value),
    };
    Ok(Term::Literal(literal))
}

/// Reads a short (`"..."`) or long (`"""..."""`) string starting at the beginning of
/// `src`, returning the unescaped value and the number of bytes consumed.
fn read_quoted(src: &str, quote: char) -> Result<(String, usize), DecodeError> {
    let triple: String = std::iter::repeat(quote).take(3).collect();
    let quadruple: String = std::iter::repeat(quote).take(4).collect();
    let long = src.starts_with(&triple) && src.len() >= 6;
    let open = if long { 3 } else { 1 };

    let mut value = String::new();
    let mut chars = src.char_indices().skip(open).peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    return Err(syntax_error("dangling escape at end of input", idx));
                };
                match esc {
                    't' => value.push('\t'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    '\\' => value.push('\\'),
                    'u' | 'U' => {
                        let width = if esc == 'u' { 4 } else { 8 };
                        let hex: String = chars.by_ref().take(width).map(|(_, c)| c).collect();
                        let decoded = if hex.len() == width {
                            u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                        } else {
                            None
                        };
                        match decoded {
                            Some(c) => value.push(c),
                            None => {
                                return Err(syntax_error(
                                    format!("invalid unicode escape '\\{esc}{hex}'"),
                                    idx,
                                ))
                            }
                        }
                    }
                    other => {
                        return Err(syntax_error(format!("unknown escape '\\{other}'"), idx));
                    }
                }
            }
            c if c == quote => {
                if !long {
                    return Ok((value, idx + 1));
                }
                // a run of more than three quotes closes on its last three
                if src[idx..].starts_with(&triple) && !src[idx..].starts_with(&quadruple) {
                    return Ok((value, idx + 3));
                }
                value.push(c);
            }
            '\n' | '\r' if !long => {
                return Err(syntax_error("line break inside a short string", idx));
            }
            c => value.push(c),
        }
    }
    Err(syntax_error("unterminated string", src.len()))
}
