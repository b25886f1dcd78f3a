//! Qualified names.
//!
//! A [`QName`] is the expanded form (namespace URI + local name) plus the
//! prefix it was written with. Two QNames are equal when URI and local
//! name match, regardless of prefix.
//!
//! Lexical helpers split `prefix:local` and Clark notation `{uri}local`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHasher;

use crate::{Error, Result};

/// An expanded XML name with its lexical prefix.
#[derive(Clone)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub uri: Rc<str>,
    /// The local name.
    pub local_name: Rc<str>,
    /// The prefix the name was written with (`None` for unprefixed names).
    pub prefix: Option<Rc<str>>,
    /// Vorberechneter Hash von (uri, local_name).
    identity: u64,
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QName")
            .field("uri", &self.uri)
            .field("local_name", &self.local_name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Berechnet den Identity-Hash fuer (uri, local_name).
pub(crate) fn compute_identity(uri: &str, local_name: &str) -> u64 {
    let mut hasher = AHasher::default();
    uri.hash(&mut hasher);
    local_name.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.uri == other.uri
            && self.local_name == other.local_name
    }
}

impl Eq for QName {}

/// Ordering konsistent mit PartialEq: erst uri, dann local_name, Prefix ignoriert.
impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.local_name.cmp(&other.local_name))
    }
}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Display: `prefix:local_name` wenn Prefix vorhanden, sonst `{uri}local_name`
/// bzw. nur `local_name` ohne Namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(pfx) if !pfx.is_empty() => write!(f, "{pfx}:{}", self.local_name),
            _ if !self.uri.is_empty() => write!(f, "{{{}}}{}", self.uri, self.local_name),
            _ => f.write_str(&self.local_name),
        }
    }
}

impl QName {
    /// Creates a new QName with the given URI and local name, without prefix.
    pub fn new(uri: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        let uri = uri.into();
        let local_name = local_name.into();
        let identity = compute_identity(&uri, &local_name);
        Self { uri, local_name, prefix: None, identity }
    }

    /// Creates a new QName with URI, local name and prefix.
    pub fn with_prefix(
        uri: impl Into<Rc<str>>,
        local_name: impl Into<Rc<str>>,
        prefix: impl Into<Rc<str>>,
    ) -> Self {
        let mut q = Self::new(uri, local_name);
        q.prefix = Some(prefix.into());
        q
    }

    /// True if this name has the given namespace URI and local name.
    #[inline]
    pub fn is(&self, uri: &str, local_name: &str) -> bool {
        &*self.uri == uri && &*self.local_name == local_name
    }
}

/// Splits a lexical qualified name into `(prefix, local)`.
///
/// `"w:p"` → `(Some("w"), "p")`, `"p"` → `(None, "p")`. Empty parts and
/// more than one colon are rejected.
pub fn split_qualified_name(raw: &str) -> Result<(Option<&str>, &str)> {
    let invalid = || Error::InvalidQualifiedName(raw.to_string());
    match raw.split_once(':') {
        Some((prefix, local)) => {
            if prefix.is_empty() || local.is_empty() || local.contains(':') {
                return Err(invalid());
            }
            Ok((Some(prefix), local))
        }
        None if raw.is_empty() => Err(invalid()),
        None => Ok((None, raw)),
    }
}

/// Parses Clark notation `{uri}local`. Returns `None` for other forms.
pub fn parse_clark(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix('{')?;
    let (uri, local) = rest.split_once('}')?;
    if local.is_empty() || local.contains(':') {
        return None;
    }
    Some((uri, local))
}

/// Iterates over the whitespace-separated tokens of an MC list attribute.
pub(crate) fn list_tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split_ascii_whitespace()
}
