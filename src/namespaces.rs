//! Namespace registries and in-scope prefix bindings.
//!
//! [`NamespaceRegistry`] is a set of namespace URIs, optionally indexed by
//! the prefixes bound to them. The filter uses one instance for the
//! namespaces the consumer supports and one per context frame for the
//! namespaces currently ignorable.
//!
//! [`NamespaceBindings`] tracks `startNamespace`/`endNamespace`
//! notifications so prefixes in element names and MC attribute values can
//! be resolved.

use crate::{FastHashMap, FastIndexSet};

/// Markup Compatibility namespace (ECMA-376 Part 3).
pub const MC_NAMESPACE: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` declarations.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Resolves a namespace prefix to a URI. The empty prefix is the default namespace.
pub trait PrefixResolver {
    fn resolve_prefix(&self, prefix: &str) -> Option<&str>;

    /// True if `prefix` has a binding here, even one that makes it unbound
    /// again (`xmlns:p=""`).
    fn declares_prefix(&self, prefix: &str) -> bool {
        self.resolve_prefix(prefix).is_some()
    }
}

/// Set of namespace URIs with an optional prefix index.
///
/// Entries are never removed; a scope ends by dropping the whole registry.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    /// Einfuegereihenfolge bleibt erhalten.
    uris: FastIndexSet<String>,
    /// Prefix → URI. Der zuletzt registrierte Prefix gewinnt.
    prefixes: FastHashMap<String, String>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a namespace without a prefix. Adding a known URI is a no-op.
    pub fn add(&mut self, uri: &str) {
        if !self.uris.contains(uri) {
            self.uris.insert(uri.to_string());
        }
    }

    /// Adds a namespace and records `prefix` as bound to it.
    pub fn add_with_prefix(&mut self, prefix: &str, uri: &str) {
        self.add(uri);
        self.prefixes.insert(prefix.to_string(), uri.to_string());
    }

    pub fn contains_uri(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }

    /// URI registered for `prefix`, if any.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Iterates over the URIs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.uris.iter().map(String::as_str)
    }
}

impl PrefixResolver for NamespaceRegistry {
    fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        self.uri_for_prefix(prefix)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    prefix: String,
    uri: String,
    forwarded: bool,
}

/// In-scope prefix bindings, driven by namespace notifications.
///
/// Bindings shadow earlier ones with the same prefix until the matching
/// [`unbind`](Self::unbind). `xml` is always bound. An empty URI for a
/// non-empty prefix is kept as a binding (XML 1.1 undeclaration) and
/// resolves to "unbound".
#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    stack: Vec<Binding>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` and returns the slot index of the new binding.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> usize {
        self.stack.push(Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            forwarded: false,
        });
        self.stack.len() - 1
    }

    /// Removes the innermost binding of `prefix`. Returns whether that
    /// binding had been forwarded downstream, or `None` if it was not bound.
    pub fn unbind(&mut self, prefix: &str) -> Option<bool> {
        let pos = self.stack.iter().rposition(|b| b.prefix == prefix)?;
        Some(self.stack.remove(pos).forwarded)
    }

    /// Marks the binding in `slot` as forwarded and returns `(prefix, uri)`.
    pub(crate) fn mark_forwarded(&mut self, slot: usize) -> Option<(&str, &str)> {
        let b = self.stack.get_mut(slot)?;
        b.forwarded = true;
        Some((&b.prefix, &b.uri))
    }

    /// Number of bindings currently in scope (including shadowed ones).
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

impl PrefixResolver for NamespaceBindings {
    fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        if let Some(b) = self.stack.iter().rev().find(|b| b.prefix == prefix) {
            return (!b.uri.is_empty() || prefix.is_empty()).then_some(b.uri.as_str());
        }
        match prefix {
            "xml" => Some(XML_NAMESPACE),
            "xmlns" => Some(XMLNS_NAMESPACE),
            // Ohne Deklaration: kein Default-Namespace.
            "" => Some(""),
            _ => None,
        }
    }

    fn declares_prefix(&self, prefix: &str) -> bool {
        self.stack.iter().any(|b| b.prefix == prefix)
    }
}

/// Resolves against `primary` first, then against `fallback`. A prefix that
/// `primary` declares but leaves unbound does not fall back.
pub(crate) struct Chained<'a, A: ?Sized, B: ?Sized> {
    pub primary: &'a A,
    pub fallback: &'a B,
}

impl<A: PrefixResolver + ?Sized, B: PrefixResolver + ?Sized> PrefixResolver for Chained<'_, A, B> {
    fn resolve_prefix(&self, prefix: &str) -> Option<&str> {
        match self.primary.resolve_prefix(prefix) {
            Some(uri) => Some(uri),
            None if self.primary.declares_prefix(prefix) => None,
            None => self.fallback.resolve_prefix(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_add_and_contains() {
        let mut reg = NamespaceRegistry::new();
        reg.add("urn:a");
        reg.add("urn:a");
        assert!(reg.contains_uri("urn:a"));
        assert!(!reg.contains_uri("urn:b"));
        assert_eq!(reg.len(), 1);
    }

    /// Mehrere Prefixe duerfen auf dieselbe URI zeigen, die URI bleibt einmalig.
    #[test]
    fn registry_multiple_prefixes_one_uri() {
        let mut reg = NamespaceRegistry::new();
        reg.add_with_prefix("w", "urn:word");
        reg.add_with_prefix("w2", "urn:word");
        reg.add_with_prefix("w", "urn:word");
        assert_eq!(reg.len(), 1);
        assert!(reg.contains_prefix("w2"));
        assert_eq!(reg.resolve_prefix("w"), Some("urn:word"));
        assert!(!reg.contains_prefix("x"));
    }

    #[test]
    fn registry_iterates_in_insertion_order() {
        let mut reg = NamespaceRegistry::new();
        reg.add("urn:c");
        reg.add_with_prefix("a", "urn:a");
        reg.add("urn:b");
        let uris: Vec<_> = reg.iter().collect();
        assert_eq!(uris, ["urn:c", "urn:a", "urn:b"]);
    }

    #[test]
    fn bindings_shadow_and_unbind() {
        let mut b = NamespaceBindings::new();
        b.bind("a", "urn:outer");
        let inner = b.bind("a", "urn:inner");
        assert_eq!(b.resolve_prefix("a"), Some("urn:inner"));
        b.mark_forwarded(inner);
        assert_eq!(b.unbind("a"), Some(true));
        assert_eq!(b.resolve_prefix("a"), Some("urn:outer"));
        assert_eq!(b.unbind("a"), Some(false));
        assert_eq!(b.resolve_prefix("a"), None);
        assert_eq!(b.unbind("a"), None);
    }

    #[test]
    fn bindings_builtin_prefixes() {
        let b = NamespaceBindings::new();
        assert_eq!(b.resolve_prefix("xml"), Some(XML_NAMESPACE));
        assert_eq!(b.resolve_prefix(""), Some(""));
        assert_eq!(b.resolve_prefix("w"), None);
    }

    #[test]
    fn bindings_default_namespace() {
        let mut b = NamespaceBindings::new();
        b.bind("", "urn:default");
        assert_eq!(b.resolve_prefix(""), Some("urn:default"));
        b.bind("", "");
        assert_eq!(b.resolve_prefix(""), Some(""));
    }

    /// Prefix-Undeklaration (XML 1.1) macht den Prefix ungebunden.
    #[test]
    fn bindings_prefix_undeclaration() {
        let mut b = NamespaceBindings::new();
        b.bind("p", "urn:p");
        b.bind("p", "");
        assert_eq!(b.resolve_prefix("p"), None);
    }

    #[test]
    fn chained_falls_back() {
        let mut bindings = NamespaceBindings::new();
        bindings.bind("a", "urn:bound");
        let mut supported = NamespaceRegistry::new();
        supported.add_with_prefix("a", "urn:registered");
        supported.add_with_prefix("b", "urn:b");
        let chain = Chained { primary: &bindings, fallback: &supported };
        assert_eq!(chain.resolve_prefix("a"), Some("urn:bound"));
        assert_eq!(chain.resolve_prefix("b"), Some("urn:b"));
        assert_eq!(chain.resolve_prefix("c"), None);
    }

    #[test]
    fn chained_keeps_undeclared_prefix_unbound() {
        let mut bindings = NamespaceBindings::new();
        bindings.bind("b", "urn:doc");
        bindings.bind("b", "");
        let mut supported = NamespaceRegistry::new();
        supported.add_with_prefix("b", "urn:b");
        assert!(bindings.declares_prefix("b"));
        assert!(!bindings.declares_prefix("c"));
        let chain = Chained { primary: &bindings, fallback: &supported };
        assert_eq!(chain.resolve_prefix("b"), None);

        bindings.unbind("b");
        let chain = Chained { primary: &bindings, fallback: &supported };
        assert_eq!(chain.resolve_prefix("b"), Some("urn:doc"));
    }
}
