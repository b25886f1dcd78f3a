//! quick-xml based tokenizer.
//!
//! Turns UTF-8 XML bytes into [`ContentHandler`] notifications in the order
//! a namespace-aware SAX tokenizer delivers them: `start_namespace` for each
//! declaration before `start_element`, `end_namespace` after `end_element`.
//! Element and attribute names are passed lexically (`w:p`); `xmlns`
//! attributes are not part of the attribute list.
//!
//! The tokenizer is pull-driven: [`XmlTokenizer::step`] processes one
//! lexical event, so callers can interleave error polling or stop early.

use std::borrow::Cow;
use std::io::BufRead;

use log::debug;
use memchr::memchr;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::event::{Attribute, ContentHandler};
use crate::{Error, Result};

pub struct XmlTokenizer<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Pro offenem Element die deklarierten Prefixe (fuer end_namespace).
    scopes: Vec<Vec<String>>,
    finished: bool,
}

impl<R: BufRead> XmlTokenizer<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        config.check_end_names = true;
        Self { reader, buf: Vec::new(), scopes: Vec::new(), finished: false }
    }

    /// Processes one lexical event. Returns `false` once the end of input
    /// has been reached.
    pub fn step(&mut self, handler: &mut impl ContentHandler) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        self.buf.clear();
        let depth = self.scopes.len();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(e)) => {
                let declared = emit_start(&e, handler)?;
                self.scopes.push(declared);
            }
            Ok(Event::Empty(e)) => {
                // Nur ohne expand_empty_elements erreichbar.
                let declared = emit_start(&e, handler)?;
                handler.end_element(utf8(e.name().as_ref())?);
                emit_end_namespaces(declared, handler);
            }
            Ok(Event::End(e)) => {
                let Some(declared) = self.scopes.pop() else {
                    return Err(Error::XmlParseError("unexpected end tag at depth 0".into()));
                };
                handler.end_element(utf8(e.name().as_ref())?);
                emit_end_namespaces(declared, handler);
            }
            Ok(Event::Text(e)) => {
                let raw = utf8(&*e)?;
                if depth == 0 {
                    if !raw.trim().is_empty() {
                        return Err(Error::XmlParseError(
                            "character data outside root element".into(),
                        ));
                    }
                } else {
                    let text = quick_xml::escape::unescape(raw)
                        .map_err(|er| Error::XmlParseError(er.to_string()))?;
                    handler.characters(&normalize_line_endings(&text));
                }
            }
            Ok(Event::CData(e)) => {
                if depth > 0 {
                    let text = utf8(&*e)?;
                    handler.characters(&normalize_line_endings(text));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                let name = utf8(e.as_ref())?;
                let resolved: Cow<'_, str> = if name.starts_with('#') {
                    let ch = resolve_char_reference(name).ok_or_else(|| {
                        Error::XmlParseError(format!("invalid character reference '&{name};'"))
                    })?;
                    Cow::Owned(ch.to_string())
                } else if let Some(predef) = resolve_predefined_entity(name) {
                    Cow::Borrowed(predef)
                } else {
                    return Err(Error::XmlParseError(format!("undeclared entity '&{name};'")));
                };
                if depth > 0 {
                    handler.characters(&resolved);
                }
            }
            Ok(Event::Comment(e)) => {
                let text = utf8(e.as_ref())?;
                handler.comment(&normalize_line_endings(text));
            }
            Ok(Event::PI(e)) => {
                let target = utf8(e.target())?;
                // content() enthaelt den Separator-Whitespace nach dem Target.
                let data = utf8(e.content())?.trim_start();
                handler.processing_instruction(target, &normalize_line_endings(data));
            }
            Ok(Event::DocType(_)) => {
                debug!("DOCTYPE skipped");
            }
            Ok(Event::Decl(_)) => {}
            Ok(Event::Eof) => {
                self.finished = true;
                if !self.scopes.is_empty() {
                    return Err(Error::XmlParseError(format!(
                        "unexpected end of document, {} element(s) still open",
                        self.scopes.len()
                    )));
                }
                return Ok(false);
            }
            Err(e) => {
                self.finished = true;
                return Err(Error::XmlParseError(format!(
                    "parse XML error at {:?}: {e}",
                    self.reader.buffer_position()
                )));
            }
        }
        Ok(true)
    }

    /// Processes all remaining input.
    pub fn run(&mut self, handler: &mut impl ContentHandler) -> Result<()> {
        while self.step(handler)? {}
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Byte offset of the reader in the source.
    pub fn buffer_position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Tokenizes all of `source` into `handler`.
pub fn tokenize<R: BufRead>(source: R, handler: &mut impl ContentHandler) -> Result<()> {
    XmlTokenizer::new(source).run(handler)
}

/// Tokenizes an in-memory document.
pub fn tokenize_str(xml: &str, handler: &mut impl ContentHandler) -> Result<()> {
    tokenize(xml.as_bytes(), handler)
}

/// Emits namespace declarations and the start tag; returns the declared prefixes.
fn emit_start(e: &BytesStart<'_>, handler: &mut impl ContentHandler) -> Result<Vec<String>> {
    let qname = e.name();
    let name = utf8(qname.as_ref())?;
    let mut attributes = Vec::with_capacity(8);
    let mut declared: Vec<(String, String)> = Vec::new();

    for attr in e.attributes().with_checks(true) {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let key = utf8(attr.key.as_ref())?;
        let raw = utf8(attr.value.as_ref())?;
        let value = unescape_attr_value(&normalize_attr_whitespace(raw))?;

        if key == "xmlns" {
            declared.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value));
        } else {
            attributes.push(Attribute::new(key, value));
        }
    }

    for (prefix, uri) in &declared {
        handler.start_namespace(prefix, uri);
    }
    handler.start_element(name, &attributes);
    Ok(declared.into_iter().map(|(prefix, _)| prefix).collect())
}

fn emit_end_namespaces(declared: Vec<String>, handler: &mut impl ContentHandler) {
    for prefix in declared.iter().rev() {
        handler.end_namespace(prefix);
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|er| Error::XmlParseError(er.to_string()))
}

/// XML 1.0 Sec. 3.3.3: Whitespace-Zeichen in Attributwerten werden zu Leerzeichen,
/// `\r\n` zaehlt als ein Zeichen.
fn normalize_attr_whitespace(value: &str) -> Cow<'_, str> {
    if !value.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.replace("\r\n", " ").replace(['\t', '\n', '\r'], " "))
}

/// Loest vordefinierte Entities und Zeichenreferenzen in Attributwerten auf.
fn unescape_attr_value(value: &str) -> Result<String> {
    let bytes = value.as_bytes();
    let Some(mut amp) = memchr(b'&', bytes) else {
        return Ok(value.to_string());
    };

    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    loop {
        out.push_str(&value[pos..amp]);
        let Some(rel_semi) = memchr(b';', &bytes[amp + 1..]) else {
            return Err(Error::XmlParseError(format!("unterminated reference in attribute value '{value}'")));
        };
        let semi = amp + 1 + rel_semi;
        let name = &value[amp + 1..semi];
        if name.starts_with('#') {
            let ch = resolve_char_reference(name).ok_or_else(|| {
                Error::XmlParseError(format!("invalid character reference '&{name};'"))
            })?;
            out.push(ch);
        } else if let Some(predef) = resolve_predefined_entity(name) {
            out.push_str(predef);
        } else {
            return Err(Error::XmlParseError(format!("undeclared entity '&{name};'")));
        }
        pos = semi + 1;
        match memchr(b'&', &bytes[pos..]) {
            Some(rel) => amp = pos + rel,
            None => {
                out.push_str(&value[pos..]);
                return Ok(out);
            }
        }
    }
}

/// XML 1.0 Sec. 2.11: \r\n -> \n, alleinstehende \r -> \n
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

fn resolve_char_reference(ref_name: &str) -> Option<char> {
    let digits = &ref_name[1..]; // '#' ueberspringen
    let code_point = if let Some(hex) = digits.strip_prefix('x') {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code_point)
}
