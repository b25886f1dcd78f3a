//! Session-fatal error types.
//!
//! Markup Compatibility violations are *not* reported through this type:
//! they are recorded in the [`ErrorSink`](crate::error_sink::ErrorSink)
//! because notification callbacks must never fail from the tokenizer's
//! point of view. Only conditions that end the whole filtering session
//! (malformed XML, I/O failure) or invalid setup input use [`Error`].

use core::fmt;

/// Errors that abort a filtering session or reject setup input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The upstream tokenizer reported malformed XML.
    XmlParseError(String),
    /// Reading the source or writing the filtered output failed.
    IoError(String),
    /// A qualified name is syntactically invalid (empty part, extra colon, ...).
    InvalidQualifiedName(String),
    /// A namespace prefix could not be resolved against the supplied bindings.
    UnknownNamespacePrefix(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::InvalidQualifiedName(name) => write!(f, "invalid qualified name '{name}'"),
            Self::UnknownNamespacePrefix(prefix) => {
                if prefix.is_empty() {
                    write!(f, "no default namespace is bound")
                } else {
                    write!(f, "unknown namespace prefix '{prefix}'")
                }
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParseError(e.to_string())
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
