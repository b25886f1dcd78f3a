//! Set of expanded element names.
//!
//! Used for the `ProcessContent` exceptions of a context frame and for the
//! extension element names registered by the consumer. A local name of `*`
//! matches every element of its namespace.

use std::hash::{Hash, Hasher};

use hashbrown::Equivalent;

use crate::namespaces::PrefixResolver;
use crate::qname::{QName, compute_identity, parse_clark, split_qualified_name};
use crate::{Error, FastHashSet, Result};

const WILDCARD: &str = "*";

/// Geliehener Lookup-Key, hasht wie [`QName`] (Identity von uri + local).
struct NameRef<'a> {
    uri: &'a str,
    local: &'a str,
}

impl Hash for NameRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        compute_identity(self.uri, self.local).hash(state);
    }
}

impl Equivalent<QName> for NameRef<'_> {
    fn equivalent(&self, key: &QName) -> bool {
        key.is(self.uri, self.local)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualifiedNameRegistry {
    names: FastHashSet<QName>,
}

impl QualifiedNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a lexical qualified name, resolving its prefix with `resolver`.
    ///
    /// Accepts `prefix:local`, bare `local` (default namespace) and Clark
    /// notation `{uri}local`.
    pub fn add(&mut self, qualified_name: &str, resolver: &impl PrefixResolver) -> Result<()> {
        self.insert(resolve(qualified_name, resolver)?);
        Ok(())
    }

    /// Adds an already resolved `(namespace, local)` pair.
    pub fn add_resolved(&mut self, namespace: &str, local: &str) {
        self.insert(QName::new(namespace, local));
    }

    pub fn insert(&mut self, name: QName) {
        self.names.insert(name);
    }

    /// True if `(namespace, local)` is registered, directly or via `namespace:*`.
    pub fn has(&self, namespace: &str, local: &str) -> bool {
        self.names.contains(&NameRef { uri: namespace, local })
            || self.names.contains(&NameRef { uri: namespace, local: WILDCARD })
    }

    /// Like [`has`](Self::has) but resolves a lexical qualified name first.
    pub fn has_qualified(&self, qualified_name: &str, resolver: &impl PrefixResolver) -> Result<bool> {
        let name = resolve(qualified_name, resolver)?;
        Ok(self.has(&name.uri, &name.local_name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QName> {
        self.names.iter()
    }
}

/// Resolves a lexical qualified name; the prefix is kept for display.
pub(crate) fn resolve(qualified_name: &str, resolver: &impl PrefixResolver) -> Result<QName> {
    if let Some((uri, local)) = parse_clark(qualified_name) {
        return Ok(QName::new(uri, local));
    }
    let (prefix, local) = split_qualified_name(qualified_name)?;
    let prefix = prefix.unwrap_or("");
    let uri = match resolver.resolve_prefix(prefix) {
        Some(uri) => uri,
        // Bare local ohne gebundenen Default-Namespace: globaler Namespace.
        None if prefix.is_empty() => "",
        None => return Err(Error::UnknownNamespacePrefix(prefix.to_string())),
    };
    Ok(match prefix {
        "" => QName::new(uri, local),
        p => QName::with_prefix(uri, local, p),
    })
}
