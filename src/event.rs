//! Notification surface shared by tokenizer, filter and consumer.
//!
//! [`ContentHandler`] mirrors the callbacks of a streaming XML tokenizer:
//! element begin/end with raw (prefixed) names, namespace scope begin/end
//! and character data. The filter implements it for its upstream side and
//! calls it on its downstream side.
//!
//! [`XmlEvent`] is the owned form of one notification; `Vec<XmlEvent>`
//! implements [`ContentHandler`] to capture a stream.

/// A raw attribute as delivered by the tokenizer (namespace declarations excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lexical name, e.g. `mc:Ignorable` or `val`.
    pub name: String,
    /// Unescaped value.
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    /// Prefix part of the name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Local part of the name.
    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(_, l)| l)
    }
}

/// Receiver of XML notifications.
///
/// Callbacks cannot fail: implementations that can (e.g. writers) keep the
/// first error and report it from a separate finishing call.
pub trait ContentHandler {
    /// Start tag. `name` is the lexical name (`w:p`).
    fn start_element(&mut self, name: &str, attributes: &[Attribute]);
    fn end_element(&mut self, name: &str);
    /// Called before the `start_element` of the declaring element.
    fn start_namespace(&mut self, prefix: &str, uri: &str);
    /// Called after the `end_element` of the declaring element.
    fn end_namespace(&mut self, prefix: &str);
    fn characters(&mut self, text: &str);

    fn comment(&mut self, _text: &str) {}

    fn processing_instruction(&mut self, _target: &str, _data: &str) {}
}

impl<H: ContentHandler + ?Sized> ContentHandler for &mut H {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        (**self).start_element(name, attributes);
    }

    fn end_element(&mut self, name: &str) {
        (**self).end_element(name);
    }

    fn start_namespace(&mut self, prefix: &str, uri: &str) {
        (**self).start_namespace(prefix, uri);
    }

    fn end_namespace(&mut self, prefix: &str) {
        (**self).end_namespace(prefix);
    }

    fn characters(&mut self, text: &str) {
        (**self).characters(text);
    }

    fn comment(&mut self, text: &str) {
        (**self).comment(text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        (**self).processing_instruction(target, data);
    }
}

/// Owned notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement { name: String, attributes: Vec<Attribute> },
    EndElement { name: String },
    StartNamespace { prefix: String, uri: String },
    EndNamespace { prefix: String },
    /// Character data; adjacent chunks are merged on capture.
    Characters(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl XmlEvent {
    /// Replays this event into `handler`.
    pub fn dispatch(&self, handler: &mut impl ContentHandler) {
        match self {
            Self::StartElement { name, attributes } => handler.start_element(name, attributes),
            Self::EndElement { name } => handler.end_element(name),
            Self::StartNamespace { prefix, uri } => handler.start_namespace(prefix, uri),
            Self::EndNamespace { prefix } => handler.end_namespace(prefix),
            Self::Characters(text) => handler.characters(text),
            Self::Comment(text) => handler.comment(text),
            Self::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data)
            }
        }
    }
}

/// Replays `events` into `handler` in order.
pub fn replay<'a>(events: impl IntoIterator<Item = &'a XmlEvent>, handler: &mut impl ContentHandler) {
    for event in events {
        event.dispatch(handler);
    }
}

impl ContentHandler for Vec<XmlEvent> {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        self.push(XmlEvent::StartElement {
            name: name.to_string(),
            attributes: attributes.to_vec(),
        });
    }

    fn end_element(&mut self, name: &str) {
        self.push(XmlEvent::EndElement { name: name.to_string() });
    }

    fn start_namespace(&mut self, prefix: &str, uri: &str) {
        self.push(XmlEvent::StartNamespace { prefix: prefix.to_string(), uri: uri.to_string() });
    }

    fn end_namespace(&mut self, prefix: &str) {
        self.push(XmlEvent::EndNamespace { prefix: prefix.to_string() });
    }

    fn characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        // CH-Coalescing: Tokenizer liefert Text ggf. in mehreren Stuecken.
        if let Some(XmlEvent::Characters(prev)) = self.last_mut() {
            prev.push_str(text);
        } else {
            self.push(XmlEvent::Characters(text.to_string()));
        }
    }

    fn comment(&mut self, text: &str) {
        self.push(XmlEvent::Comment(text.to_string()));
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.push(XmlEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
    }
}
