//! Deferred reporting of Markup Compatibility violations.
//!
//! The filter is driven through callbacks that cannot fail, so every
//! structural violation is appended to an [`ErrorSink`] and the driving code
//! polls it after each chunk of input (and always before trusting a parse
//! that looked successful).

use core::fmt;

use log::warn;

/// Top-level classification of a violation (ECMA-376 Part 3, 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The markup is structurally malformed with respect to MC rules.
    Format,
    /// The consumer does not support markup the producer requires.
    InsufficientSupport,
}

/// Concrete violation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A `ProcessContent` entry names a namespace that is not ignorable.
    InvalidNamespaceReference,
    /// A `Choice` follows a `Fallback` inside the same `AlternateContent`.
    LateChoice,
    /// An attribute that must not carry a prefix has one (e.g. `mc:Requires`).
    PrefixedAttribute,
    /// An attribute that must carry a prefix lacks one (e.g. `Ignorable` on `mc:Choice`).
    UnprefixedAttribute,
    /// A required attribute is absent (e.g. `Choice` without `Requires`).
    MissingAttribute,
    /// More than one `Fallback` inside the same `AlternateContent`.
    MultipleFallbacks,
    /// `AlternateContent` directly nested inside `AlternateContent`.
    XmlNestedAlternateContent,
    /// A namespace prefix used by MC markup is not bound.
    UnknownNamespacePrefix,
    /// A `MustUnderstand` namespace is not supported by the consumer.
    MustUnderstandViolation,
    /// An element that is neither supported nor ignorable.
    UnknownElement,
    /// An attribute that is neither supported nor ignorable.
    UnknownAttribute,
}

impl ErrorKind {
    /// Returns the top-level category of this kind.
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::MustUnderstandViolation | Self::UnknownElement | Self::UnknownAttribute => {
                ErrorCategory::InsufficientSupport
            }
            Self::InvalidNamespaceReference
            | Self::LateChoice
            | Self::PrefixedAttribute
            | Self::UnprefixedAttribute
            | Self::MissingAttribute
            | Self::MultipleFallbacks
            | Self::XmlNestedAlternateContent
            | Self::UnknownNamespacePrefix => ErrorCategory::Format,
        }
    }

    /// `IllegalAttribute` group: prefix present where forbidden or vice versa.
    pub fn is_illegal_attribute(self) -> bool {
        matches!(self, Self::PrefixedAttribute | Self::UnprefixedAttribute)
    }

    /// `UnknownItem` group: non-ignorable, unrecognized markup.
    pub fn is_unknown_item(self) -> bool {
        matches!(self, Self::UnknownElement | Self::UnknownAttribute)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::InvalidNamespaceReference => "InvalidNamespaceReference",
            Self::LateChoice => "LateChoice",
            Self::PrefixedAttribute => "PrefixedAttribute",
            Self::UnprefixedAttribute => "UnprefixedAttribute",
            Self::MissingAttribute => "MissingAttribute",
            Self::MultipleFallbacks => "MultipleFallbacks",
            Self::XmlNestedAlternateContent => "XMLNestedAlternateContent",
            Self::UnknownNamespacePrefix => "UnknownNamespacePrefix",
            Self::MustUnderstandViolation => "MustUnderstandViolation",
            Self::UnknownElement => "UnknownElement",
            Self::UnknownAttribute => "UnknownAttribute",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl fmt::Display for CompatibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.kind.category() {
            ErrorCategory::Format => "format error",
            ErrorCategory::InsufficientSupport => "insufficient support",
        };
        write!(f, "{category} ({}): {}", self.kind, self.detail)
    }
}

impl std::error::Error for CompatibilityError {}

/// Append-only log of violations for one filtering session.
#[derive(Debug, Default, Clone)]
pub struct ErrorSink {
    records: Vec<CompatibilityError>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a violation.
    pub fn record(&mut self, kind: ErrorKind, detail: impl Into<String>) {
        let detail = detail.into();
        warn!("markup compatibility {kind}: {detail}");
        self.records.push(CompatibilityError { kind, detail });
    }

    /// True if at least one violation has been recorded since the last drain/reset.
    pub fn has_errors(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompatibilityError> {
        self.records.iter()
    }

    /// True if a violation of `kind` has been recorded.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.records.iter().any(|r| r.kind == kind)
    }

    /// Takes all recorded violations in recording order.
    pub fn drain(&mut self) -> Vec<CompatibilityError> {
        std::mem::take(&mut self.records)
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}
