//! mcx – Markup Compatibility (ECMA-376 Part 3) preprocessor
//!
//! Sits between a streaming XML tokenizer and a consumer and rewrites the
//! notification stream according to the consumer's set of understood
//! namespaces: ignorable markup is dropped, `AlternateContent` collapses to
//! the first applicable `Choice` (or the `Fallback`), ignorable elements
//! listed in `ProcessContent` keep their tag and have their content
//! processed. Violations are recorded in an [`ErrorSink`] and
//! polled by the driver; the stream itself keeps flowing.
//!
//! # Beispiel
//!
//! ```
//! use mcx::{CompatibilityFilter, XmlEvent};
//!
//! let xml = r#"<doc xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"
//!                   xmlns:v2="urn:v2">
//!     <mc:AlternateContent>
//!         <mc:Choice Requires="v2"><v2:shape/></mc:Choice>
//!         <mc:Fallback><picture/></mc:Fallback>
//!     </mc:AlternateContent>
//! </doc>"#;
//!
//! let mut filter = CompatibilityFilter::new(Vec::<XmlEvent>::new());
//! mcx::xml::tokenize_str(xml, &mut filter).unwrap();
//! assert!(!filter.error_reported());
//!
//! let names: Vec<&str> = filter
//!     .handler()
//!     .iter()
//!     .filter_map(|e| match e {
//!         XmlEvent::StartElement { name, .. } => Some(name.as_str()),
//!         _ => None,
//!     })
//!     .collect();
//! assert_eq!(names, ["doc", "picture"]);
//! ```

pub mod context;
pub mod error;
pub mod error_sink;
pub mod event;
pub mod filter;
pub mod namespaces;
pub mod options;
pub mod qname;
pub mod qname_registry;
pub mod strategy;
pub mod stream;
pub mod xml;
pub mod xml_writer;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent, nur für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexSet mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexSet<K> = indexmap::IndexSet<K, ahash::RandomState>;

// Public API: Filter
pub use context::{ContextStack, ProcessingContext};
pub use error_sink::{CompatibilityError, ErrorCategory, ErrorKind, ErrorSink};
pub use filter::CompatibilityFilter;
pub use options::{FilterOptions, SupportedNamespace};
pub use strategy::{ChoiceState, Strategy};

// Public API: Names
pub use namespaces::{MC_NAMESPACE, NamespaceBindings, NamespaceRegistry, PrefixResolver};
pub use qname::QName;
pub use qname_registry::QualifiedNameRegistry;

// Public API: Events/XML
pub use event::{Attribute, ContentHandler, XmlEvent};
pub use stream::{McStream, filter_str};
pub use xml::{XmlTokenizer, tokenize, tokenize_str};
pub use xml_writer::XmlWriter;
