//! Byte-emitting [`ContentHandler`].
//!
//! Serializes the filtered notification stream back into XML. Namespace
//! declarations are written on the next written start tag. Because the
//! filter may forward a declaration whose element tag stays hidden (an
//! unwrapped `Choice` or a hidden `AlternateContent`), a binding that is
//! still in scope after its carrier element was closed is declared again on
//! the next written start tag.
//!
//! Callbacks cannot fail; the first I/O error is kept and reported by
//! [`XmlWriter::finish`].

use std::io::{self, Write};

use memchr::memchr3;

use crate::event::{Attribute, ContentHandler};
use crate::{Error, Result};

struct NsBinding {
    prefix: String,
    uri: String,
    /// Output-Tiefe des Start-Tags, auf dem die Deklaration geschrieben wurde.
    declared_at: Option<usize>,
}

pub struct XmlWriter<W: Write> {
    writer: W,
    bindings: Vec<NsBinding>,
    /// Anzahl geschriebener, noch offener Start-Tags.
    depth: usize,
    /// Start-Tag geschrieben, aber `>` noch ausstehend.
    start_open: bool,
    error: Option<io::Error>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, bindings: Vec::new(), depth: 0, start_open: false, error: None }
    }

    /// Like [`XmlWriter::new`], starting the output with an XML declaration.
    pub fn with_declaration(writer: W) -> Self {
        let mut this = Self::new(writer);
        this.raw(br#"<?xml version="1.0" encoding="UTF-8"?>"#);
        this
    }

    /// Flushes the underlying writer and returns it, or the first I/O error.
    pub fn finish(mut self) -> Result<W> {
        self.close_start_tag();
        if let Some(e) = self.error.take() {
            return Err(Error::from(e));
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    /// Number of written start tags not yet closed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Access to the sink. Bytes already written are final.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn raw(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.writer.write_all(bytes) {
            self.error = Some(e);
        }
    }

    fn close_start_tag(&mut self) {
        if self.start_open {
            self.start_open = false;
            self.raw(b">");
        }
    }

    /// XML-Escaping mit memchr3: grosse Bloecke ohne Sonderzeichen in einem Stueck.
    fn escaped(&mut self, s: &str, needle: [u8; 3], replacement: [&[u8]; 3]) {
        let bytes = s.as_bytes();
        let mut start = 0;
        while let Some(offset) = memchr3(needle[0], needle[1], needle[2], &bytes[start..]) {
            let pos = start + offset;
            self.raw(&bytes[start..pos]);
            let idx = if bytes[pos] == needle[0] {
                0
            } else if bytes[pos] == needle[1] {
                1
            } else {
                2
            };
            self.raw(replacement[idx]);
            start = pos + 1;
        }
        self.raw(&bytes[start..]);
    }

    fn escaped_text(&mut self, s: &str) {
        self.escaped(s, [b'&', b'<', b'>'], [b"&amp;", b"&lt;", b"&gt;"]);
    }

    fn escaped_attr(&mut self, s: &str) {
        self.escaped(s, [b'&', b'<', b'"'], [b"&amp;", b"&lt;", b"&quot;"]);
    }

    /// Schreibt alle Bindungen im Scope, die im Output noch nicht deklariert sind.
    /// Pro Prefix zaehlt nur die innerste Bindung.
    fn write_pending_declarations(&mut self) {
        let mut seen: Vec<usize> = Vec::new();
        let mut todo: Vec<usize> = Vec::new();
        for (i, b) in self.bindings.iter().enumerate().rev() {
            if seen.iter().any(|&j| self.bindings[j].prefix == b.prefix) {
                continue;
            }
            seen.push(i);
            if b.declared_at.is_none() {
                todo.push(i);
            }
        }
        for i in todo.into_iter().rev() {
            let (prefix, uri) = {
                let b = &mut self.bindings[i];
                b.declared_at = Some(self.depth);
                (std::mem::take(&mut b.prefix), std::mem::take(&mut b.uri))
            };
            if prefix.is_empty() {
                self.raw(b" xmlns=\"");
            } else {
                self.raw(b" xmlns:");
                self.raw(prefix.as_bytes());
                self.raw(b"=\"");
            }
            self.escaped_attr(&uri);
            self.raw(b"\"");
            let b = &mut self.bindings[i];
            b.prefix = prefix;
            b.uri = uri;
        }
    }
}

impl<W: Write> ContentHandler for XmlWriter<W> {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        self.close_start_tag();
        self.depth += 1;
        self.raw(b"<");
        self.raw(name.as_bytes());
        self.write_pending_declarations();
        for attr in attributes {
            self.raw(b" ");
            self.raw(attr.name.as_bytes());
            self.raw(b"=\"");
            self.escaped_attr(&attr.value);
            self.raw(b"\"");
        }
        self.start_open = true;
    }

    fn end_element(&mut self, name: &str) {
        if self.depth == 0 {
            return;
        }
        if self.start_open {
            self.start_open = false;
            self.raw(b"/>");
        } else {
            self.raw(b"</");
            self.raw(name.as_bytes());
            self.raw(b">");
        }
        let depth = self.depth;
        for b in &mut self.bindings {
            if b.declared_at == Some(depth) {
                b.declared_at = None;
            }
        }
        self.depth -= 1;
    }

    fn start_namespace(&mut self, prefix: &str, uri: &str) {
        self.bindings.push(NsBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            declared_at: None,
        });
    }

    fn end_namespace(&mut self, prefix: &str) {
        if let Some(pos) = self.bindings.iter().rposition(|b| b.prefix == prefix) {
            self.bindings.remove(pos);
        }
    }

    fn characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.close_start_tag();
        self.escaped_text(text);
    }

    fn comment(&mut self, text: &str) {
        self.close_start_tag();
        self.raw(b"<!--");
        self.raw(text.as_bytes());
        self.raw(b"-->");
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.close_start_tag();
        self.raw(b"<?");
        self.raw(target.as_bytes());
        if !data.is_empty() {
            self.raw(b" ");
            self.raw(data.as_bytes());
        }
        self.raw(b"?>");
    }
}
