//! The Markup Compatibility filter.
//!
//! [`CompatibilityFilter`] sits between a tokenizer and a consumer. It
//! receives the tokenizer's notifications through its [`ContentHandler`]
//! implementation, evaluates MC markup with the strategy of the topmost
//! context frame and forwards the surviving notifications to the wrapped
//! handler.
//!
//! Notifications never fail. Violations are recorded and must be polled
//! with [`error_reported`](CompatibilityFilter::error_reported) /
//! [`drain_errors`](CompatibilityFilter::drain_errors) after each chunk of
//! input.
//!
//! # Beispiel
//!
//! ```
//! use mcx::event::XmlEvent;
//! use mcx::filter::CompatibilityFilter;
//! use mcx::xml::tokenize_str;
//!
//! let xml = r#"<root xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"
//!                    xmlns:e="urn:ext" mc:Ignorable="e"><e:foo>text</e:foo></root>"#;
//! let mut filter = CompatibilityFilter::new(Vec::<XmlEvent>::new());
//! tokenize_str(xml, &mut filter).unwrap();
//! assert!(!filter.error_reported());
//!
//! let names: Vec<_> = filter
//!     .handler()
//!     .iter()
//!     .filter_map(|e| match e {
//!         XmlEvent::StartElement { name, .. } => Some(name.as_str()),
//!         _ => None,
//!     })
//!     .collect();
//! assert_eq!(names, ["root"]);
//! ```

use log::trace;

use crate::context::ContextStack;
use crate::error_sink::{CompatibilityError, ErrorSink};
use crate::event::{Attribute, ContentHandler};
use crate::namespaces::{NamespaceBindings, NamespaceRegistry};
use crate::options::FilterOptions;
use crate::qname_registry::QualifiedNameRegistry;
use crate::strategy::{self, Disposition, Element, Environment};
use crate::Result;

/// Per open element: what happened to its start tag.
#[derive(Debug, Clone, Copy)]
struct OpenElement {
    disposition: Disposition,
}

pub struct CompatibilityFilter<H> {
    handler: H,
    supported: NamespaceRegistry,
    extensions: QualifiedNameRegistry,
    bindings: NamespaceBindings,
    contexts: ContextStack,
    open: Vec<OpenElement>,
    /// Binding-Slots aus start_namespace, die auf das naechste start_element warten.
    pending_namespaces: Vec<usize>,
    errors: ErrorSink,
    forward_comments: bool,
    forward_processing_instructions: bool,
}

impl<H: ContentHandler> CompatibilityFilter<H> {
    /// Filter with no supported namespaces besides the empty and `xml` namespaces.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            supported: NamespaceRegistry::new(),
            extensions: QualifiedNameRegistry::new(),
            bindings: NamespaceBindings::new(),
            contexts: ContextStack::new(),
            open: Vec::new(),
            pending_namespaces: Vec::new(),
            errors: ErrorSink::new(),
            forward_comments: true,
            forward_processing_instructions: true,
        }
    }

    /// Filter configured from `options`. Fails if an extension element name
    /// cannot be resolved against the supported namespaces' prefixes.
    pub fn with_options(handler: H, options: &FilterOptions) -> Result<Self> {
        let mut filter = Self::new(handler);
        for ns in options.supported_namespaces() {
            let prefixes: Vec<&str> = ns.prefixes.iter().map(String::as_str).collect();
            filter.add_supported_namespace(&ns.uri, &prefixes);
        }
        for name in options.extension_elements() {
            filter.add_extension_element_name(name)?;
        }
        filter.forward_comments = options.forward_comments();
        filter.forward_processing_instructions = options.forward_processing_instructions();
        Ok(filter)
    }

    /// Declares `uri` as understood by the consumer, optionally with the
    /// prefixes it is conventionally written with.
    pub fn add_supported_namespace(&mut self, uri: &str, prefixes: &[&str]) {
        if prefixes.is_empty() {
            self.supported.add(uri);
        }
        for prefix in prefixes {
            self.supported.add_with_prefix(prefix, uri);
        }
    }

    /// Registers an element that is always passed through verbatim, with
    /// its whole subtree. `prefix:local` resolves against the prefixes of
    /// the supported namespaces; `{uri}local` is taken as is.
    pub fn add_extension_element_name(&mut self, qualified_name: &str) -> Result<()> {
        self.extensions.add(qualified_name, &self.supported)
    }

    pub fn supported_namespaces(&self) -> &NamespaceRegistry {
        &self.supported
    }

    /// True if any violation was recorded since the last drain/reset.
    pub fn error_reported(&self) -> bool {
        self.errors.has_errors()
    }

    pub fn errors(&self) -> &ErrorSink {
        &self.errors
    }

    pub fn drain_errors(&mut self) -> Vec<CompatibilityError> {
        self.errors.drain()
    }

    /// Current element nesting depth.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Returns to the freshly constructed state for a new document.
    /// Supported namespaces and extension elements are kept.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.contexts.clear();
        self.open.clear();
        self.pending_namespaces.clear();
        self.errors.reset();
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Whether character data at the current position reaches the consumer.
    fn content_forwarded(&self) -> bool {
        self.open.last().is_none_or(|e| e.disposition.content_forwarded())
    }
}

impl<H: ContentHandler> ContentHandler for CompatibilityFilter<H> {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) {
        let depth = self.open.len() + 1;
        let env = Environment {
            supported: &self.supported,
            extensions: &self.extensions,
            bindings: &self.bindings,
        };
        let element = Element::new(name, attributes);
        let outcome =
            strategy::element_begin(self.contexts.current_mut(), &env, &element, &mut self.errors);
        trace!("{name} at depth {depth}: {:?}", outcome.disposition);

        let pending = std::mem::take(&mut self.pending_namespaces);
        if outcome.disposition.namespaces_forwarded() {
            for slot in pending {
                if let Some((prefix, uri)) = self.bindings.mark_forwarded(slot) {
                    self.handler.start_namespace(prefix, uri);
                }
            }
        }
        if outcome.disposition.tag_forwarded() {
            self.handler.start_element(name, &outcome.attributes);
        }
        if let Some(frame) = outcome.frame {
            self.contexts.push(depth, frame);
        }
        self.open.push(OpenElement { disposition: outcome.disposition });
    }

    fn end_element(&mut self, name: &str) {
        let Some(open) = self.open.pop() else {
            trace!("end_element {name} without open element");
            return;
        };
        if open.disposition.tag_forwarded() {
            self.handler.end_element(name);
        }
        self.contexts.pop_to(self.open.len() + 1);
    }

    fn start_namespace(&mut self, prefix: &str, uri: &str) {
        let slot = self.bindings.bind(prefix, uri);
        self.pending_namespaces.push(slot);
    }

    fn end_namespace(&mut self, prefix: &str) {
        if self.bindings.unbind(prefix) == Some(true) {
            self.handler.end_namespace(prefix);
        }
    }

    fn characters(&mut self, text: &str) {
        if self.content_forwarded() {
            self.handler.characters(text);
        }
    }

    fn comment(&mut self, text: &str) {
        if self.forward_comments && self.content_forwarded() {
            self.handler.comment(text);
        }
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        if self.forward_processing_instructions && self.content_forwarded() {
            self.handler.processing_instruction(target, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_sink::ErrorKind;
    use crate::event::XmlEvent;
    use crate::namespaces::MC_NAMESPACE;

    fn filter() -> CompatibilityFilter<Vec<XmlEvent>> {
        let mut f = CompatibilityFilter::new(Vec::new());
        f.add_supported_namespace("urn:a", &["a"]);
        f
    }

    fn start(name: &str) -> XmlEvent {
        XmlEvent::StartElement { name: name.into(), attributes: Vec::new() }
    }

    fn end(name: &str) -> XmlEvent {
        XmlEvent::EndElement { name: name.into() }
    }

    /// Frame-Tiefe wird beim passenden end_element abgebaut.
    #[test]
    fn frames_unwind_at_matching_end() {
        let mut f = filter();
        f.start_namespace("mc", MC_NAMESPACE);
        f.start_namespace("e", "urn:e");
        f.start_element("root", &[Attribute::new("mc:Ignorable", "e")]);
        assert_eq!(f.contexts.len(), 1);
        f.start_element("e:x", &[]);
        assert_eq!(f.contexts.len(), 2);
        f.start_element("e:y", &[]);
        assert_eq!(f.contexts.len(), 2);
        f.end_element("e:y");
        assert_eq!(f.contexts.len(), 2);
        f.end_element("e:x");
        assert_eq!(f.contexts.len(), 1);
        f.end_element("root");
        assert!(f.contexts.is_empty());
        assert_eq!(f.depth(), 0);
    }

    #[test]
    fn namespace_forwarding_follows_element() {
        let mut f = filter();
        f.start_element("root", &[]);
        f.start_namespace("u", "urn:unknown");
        f.start_element("u:x", &[]);
        f.end_element("u:x");
        f.end_namespace("u");
        f.start_namespace("a", "urn:a");
        f.start_element("a:y", &[]);
        f.end_element("a:y");
        f.end_namespace("a");
        f.end_element("root");

        assert_eq!(
            *f.handler(),
            [
                start("root"),
                XmlEvent::StartNamespace { prefix: "a".into(), uri: "urn:a".into() },
                start("a:y"),
                end("a:y"),
                XmlEvent::EndNamespace { prefix: "a".into() },
                end("root"),
            ]
        );
        assert_eq!(f.drain_errors()[0].kind, ErrorKind::UnknownElement);
        assert!(!f.error_reported());
    }

    #[test]
    fn characters_follow_innermost_disposition() {
        let mut f = filter();
        f.start_namespace("mc", MC_NAMESPACE);
        f.start_element("root", &[]);
        f.characters("a");
        f.start_element("mc:AlternateContent", &[]);
        f.characters("hidden");
        f.start_element("mc:Fallback", &[]);
        f.characters("b");
        f.end_element("mc:Fallback");
        f.end_element("mc:AlternateContent");
        f.end_element("root");

        let text: String = f
            .handler()
            .iter()
            .filter_map(|e| match e {
                XmlEvent::Characters(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "ab");
    }

    #[test]
    fn comments_can_be_disabled() {
        let opts = FilterOptions::new().with_comments(false);
        let mut f = CompatibilityFilter::with_options(Vec::<XmlEvent>::new(), &opts).unwrap();
        f.start_element("r", &[]);
        f.comment("c");
        f.processing_instruction("t", "d");
        f.end_element("r");
        assert_eq!(f.handler().len(), 3);
        assert!(matches!(f.handler()[1], XmlEvent::ProcessingInstruction { .. }));
    }

    #[test]
    fn with_options_registers_extension_elements() {
        let opts = FilterOptions::new()
            .with_supported_namespace("urn:a", ["a"])
            .with_extension_element("a:blob");
        let f = CompatibilityFilter::with_options(Vec::<XmlEvent>::new(), &opts).unwrap();
        assert!(f.extensions.has("urn:a", "blob"));
        assert!(f.supported_namespaces().contains_prefix("a"));
    }

    #[test]
    fn with_options_rejects_unresolvable_extension() {
        let opts = FilterOptions::new().with_extension_element("zz:blob");
        assert!(CompatibilityFilter::with_options(Vec::<XmlEvent>::new(), &opts).is_err());
    }

    #[test]
    fn reset_clears_document_state_only() {
        let mut f = filter();
        f.start_element("u:x", &[]);
        assert!(f.error_reported());
        f.reset();
        assert!(!f.error_reported());
        assert_eq!(f.depth(), 0);
        assert!(f.supported_namespaces().contains_uri("urn:a"));
    }

    #[test]
    fn stray_end_element_is_ignored() {
        let mut f = filter();
        f.end_element("x");
        assert!(f.handler().is_empty());
    }
}
