//! Element-processing strategies (ECMA-376 Part 3, 10 and 11).
//!
//! The strategy of the topmost context frame decides what happens to each
//! child element of the frame's element:
//!
//! - [`Strategy::Standard`]: interpret MC attributes, forward supported
//!   markup, ignore ignorable markup, report unknown markup.
//! - [`Strategy::Ignore`]: suppress everything below.
//! - [`Strategy::Consider`]: below a `ProcessContent` element; children are
//!   evaluated like `Standard`.
//! - [`Strategy::Choices`]: direct children of `AlternateContent`; selects
//!   the first satisfiable `Choice`, else the `Fallback`.
//! - [`Strategy::Fallback`]: direct children of a selected `Fallback`; like
//!   `Standard`, but elements of unknown namespaces are forwarded because the
//!   producer designated this branch for consumers that understand none of
//!   the choices. Their descendants are `Standard` again.
//! - [`Strategy::Verbatim`]: below an extension element; everything is
//!   forwarded unmodified.
//!
//! Violations are recorded in the [`ErrorSink`] and the offending subtree
//! is suppressed.

use std::borrow::Cow;

use log::{debug, trace};

use crate::context::ProcessingContext;
use crate::error_sink::{ErrorKind, ErrorSink};
use crate::event::Attribute;
use crate::namespaces::{
    Chained, MC_NAMESPACE, NamespaceBindings, NamespaceRegistry, PrefixResolver, XML_NAMESPACE,
    XMLNS_NAMESPACE,
};
use crate::qname::list_tokens;
use crate::qname_registry::{self, QualifiedNameRegistry};
use crate::Error;

pub(crate) const ALTERNATE_CONTENT: &str = "AlternateContent";
pub(crate) const CHOICE: &str = "Choice";
pub(crate) const FALLBACK: &str = "Fallback";
pub(crate) const REQUIRES: &str = "Requires";
pub(crate) const IGNORABLE: &str = "Ignorable";
pub(crate) const MUST_UNDERSTAND: &str = "MustUnderstand";
pub(crate) const PROCESS_CONTENT: &str = "ProcessContent";
pub(crate) const PRESERVE_ELEMENTS: &str = "PreserveElements";
pub(crate) const PRESERVE_ATTRIBUTES: &str = "PreserveAttributes";

/// Lokale Namen der MC-Attribute, die einen Prefix tragen muessen.
const MC_ATTRIBUTES: [&str; 5] =
    [IGNORABLE, MUST_UNDERSTAND, PROCESS_CONTENT, PRESERVE_ELEMENTS, PRESERVE_ATTRIBUTES];

/// Arbitration state of one `AlternateContent` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChoiceState {
    /// Index of the selected `Choice` among the block's `Choice` children.
    pub selected: Option<usize>,
    pub saw_fallback: bool,
    next_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Strategy {
    #[default]
    Standard,
    Ignore,
    Consider,
    Choices(ChoiceState),
    Fallback,
    Verbatim,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Ignore => "Ignore",
            Self::Consider => "Consider",
            Self::Choices(_) => "Choices",
            Self::Fallback => "Fallback",
            Self::Verbatim => "Verbatim",
        }
    }
}

/// What reaches the consumer for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Start/end tag and content.
    Forward,
    /// Content only (selected `Choice`/`Fallback`).
    Unwrap,
    /// Neither tag nor direct character data; children are evaluated
    /// (`AlternateContent`).
    Hide,
    /// Nothing.
    Suppress,
}

impl Disposition {
    pub(crate) fn tag_forwarded(self) -> bool {
        self == Self::Forward
    }

    pub(crate) fn content_forwarded(self) -> bool {
        matches!(self, Self::Forward | Self::Unwrap)
    }

    pub(crate) fn namespaces_forwarded(self) -> bool {
        self != Self::Suppress
    }
}

/// Result of evaluating one start tag.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub disposition: Disposition,
    /// Attributes to forward (only meaningful for [`Disposition::Forward`]).
    pub attributes: Vec<Attribute>,
    /// Frame to push for the element's children.
    pub frame: Option<ProcessingContext>,
}

impl Outcome {
    /// Suppress the element and everything below it.
    fn suppress() -> Self {
        Self {
            disposition: Disposition::Suppress,
            attributes: Vec::new(),
            frame: Some(ProcessingContext::new(Strategy::Ignore)),
        }
    }

    /// Suppress inside an already ignored subtree (no new frame needed).
    fn inert() -> Self {
        Self { disposition: Disposition::Suppress, attributes: Vec::new(), frame: None }
    }

    fn verbatim(attributes: &[Attribute]) -> Self {
        Self {
            disposition: Disposition::Forward,
            attributes: attributes.to_vec(),
            frame: Some(ProcessingContext::new(Strategy::Verbatim)),
        }
    }

    fn unwrap(frame: ProcessingContext) -> Self {
        Self { disposition: Disposition::Unwrap, attributes: Vec::new(), frame: Some(frame) }
    }
}

/// Read-only state the strategies consult.
pub(crate) struct Environment<'a> {
    pub supported: &'a NamespaceRegistry,
    pub extensions: &'a QualifiedNameRegistry,
    pub bindings: &'a NamespaceBindings,
}

impl Environment<'_> {
    /// In-scope bindings first, then the prefixes registered with supported namespaces.
    fn resolver(&self) -> Chained<'_, NamespaceBindings, NamespaceRegistry> {
        Chained { primary: self.bindings, fallback: self.supported }
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        match self.bindings.resolve_prefix(prefix) {
            Some(uri) => Some(uri),
            // Im Dokument undeklariert (`xmlns:p=""`): bleibt ungebunden.
            None if self.bindings.declares_prefix(prefix) => None,
            None => self.supported.resolve_prefix(prefix),
        }
    }

    /// No-namespace, `xml` and `xmlns` are always understood.
    fn is_supported(&self, uri: &str) -> bool {
        uri.is_empty()
            || uri == XML_NAMESPACE
            || uri == XMLNS_NAMESPACE
            || self.supported.contains_uri(uri)
    }
}

/// Start tag as seen by the strategies.
pub(crate) struct Element<'e> {
    pub name: &'e str,
    pub prefix: Option<&'e str>,
    pub local: &'e str,
    pub attributes: &'e [Attribute],
}

impl<'e> Element<'e> {
    pub(crate) fn new(name: &'e str, attributes: &'e [Attribute]) -> Self {
        let (prefix, local) = match name.split_once(':') {
            Some((p, l)) => (Some(p), l),
            None => (None, name),
        };
        Self { name, prefix, local, attributes }
    }
}

/// Registries of the frame in effect at the parent.
#[derive(Clone, Copy)]
struct Scope<'a> {
    ignorable: &'a NamespaceRegistry,
    process_content: &'a QualifiedNameRegistry,
}

/// Marker: a violation was recorded, the subtree is to be suppressed.
struct Rejected;

/// MC directives of one element on top of the inherited registries.
struct Directives<'a> {
    ignorable: Cow<'a, NamespaceRegistry>,
    process_content: Cow<'a, QualifiedNameRegistry>,
    changed: bool,
}

impl Directives<'_> {
    fn into_context(self, strategy: Strategy) -> ProcessingContext {
        ProcessingContext::with_registries(
            strategy,
            self.ignorable.into_owned(),
            self.process_content.into_owned(),
        )
    }
}

/// Evaluates a start tag under the topmost frame (`None`: no frame yet).
pub(crate) fn element_begin(
    frame: Option<&mut ProcessingContext>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Outcome {
    let Some(ctx) = frame else {
        let root = ProcessingContext::default();
        let scope = Scope { ignorable: &root.ignorable, process_content: &root.process_content };
        return standard_begin(scope, env, element, false, errors);
    };

    let ProcessingContext { strategy, ignorable, process_content } = ctx;
    let scope = Scope { ignorable, process_content };
    match strategy {
        Strategy::Ignore => {
            trace!("ignore {}", element.name);
            Outcome::inert()
        }
        Strategy::Verbatim => Outcome {
            disposition: Disposition::Forward,
            attributes: element.attributes.to_vec(),
            frame: None,
        },
        Strategy::Standard | Strategy::Consider => standard_begin(scope, env, element, false, errors),
        Strategy::Fallback => standard_begin(scope, env, element, true, errors),
        Strategy::Choices(state) => choices_begin(state, scope, env, element, errors),
    }
}

/// `fallback_child`: direct child of a selected `Fallback`.
fn standard_begin(
    scope: Scope<'_>,
    env: &Environment<'_>,
    element: &Element<'_>,
    fallback_child: bool,
    errors: &mut ErrorSink,
) -> Outcome {
    let Some(uri) = resolve_element(env, element, errors) else {
        return Outcome::suppress();
    };

    if env.extensions.has(uri, element.local) {
        trace!("extension element {} passed through verbatim", element.name);
        return Outcome::verbatim(element.attributes);
    }

    if uri == MC_NAMESPACE {
        if element.local == ALTERNATE_CONTENT {
            return alternate_content_begin(scope, env, element, errors);
        }
        let detail = if matches!(element.local, CHOICE | FALLBACK) {
            format!("{} outside of AlternateContent", element.name)
        } else {
            format!("{} is not a Markup Compatibility element", element.name)
        };
        errors.record(ErrorKind::UnknownElement, detail);
        return Outcome::suppress();
    }

    let Ok(directives) = read_directives(scope, env, element, errors) else {
        return Outcome::suppress();
    };

    let strategy = if env.is_supported(uri) {
        Strategy::Standard
    } else if directives.ignorable.contains_uri(uri) {
        if !directives.process_content.has(uri, element.local) {
            trace!("ignorable element {} dropped", element.name);
            return Outcome::suppress();
        }
        Strategy::Consider
    } else if fallback_child {
        trace!("{} ({uri}) forwarded as Fallback content", element.name);
        Strategy::Standard
    } else {
        errors.record(
            ErrorKind::UnknownElement,
            format!("{} ({uri}) is neither supported nor ignorable", element.name),
        );
        return Outcome::suppress();
    };

    // Fallback-Kinder behalten die Attribute ihres eigenen Namespace.
    let own_namespace = fallback_child.then_some(uri);
    let Ok(attributes) = filter_attributes(&directives.ignorable, own_namespace, env, element, errors) else {
        return Outcome::suppress();
    };

    // Unter Fallback braucht jedes Kind einen eigenen Frame, sonst gelten
    // Enkel als direkte Fallback-Kinder.
    let frame = (directives.changed || fallback_child || strategy == Strategy::Consider)
        .then(|| directives.into_context(strategy));
    Outcome { disposition: Disposition::Forward, attributes, frame }
}

fn alternate_content_begin(
    scope: Scope<'_>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Outcome {
    let Ok(directives) = read_directives(scope, env, element, errors) else {
        return Outcome::suppress();
    };
    if check_wrapper_attributes(&directives.ignorable, env, element, &[], errors).is_err() {
        return Outcome::suppress();
    }
    debug!("enter {}", element.name);
    Outcome {
        disposition: Disposition::Hide,
        attributes: Vec::new(),
        frame: Some(directives.into_context(Strategy::Choices(ChoiceState::default()))),
    }
}

fn choices_begin(
    state: &mut ChoiceState,
    scope: Scope<'_>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Outcome {
    let Some(uri) = resolve_element(env, element, errors) else {
        return Outcome::suppress();
    };

    if uri != MC_NAMESPACE {
        if scope.ignorable.contains_uri(uri) && !env.is_supported(uri) {
            trace!("ignorable element {} inside AlternateContent dropped", element.name);
        } else {
            errors.record(
                ErrorKind::UnknownElement,
                format!("{} is not allowed inside AlternateContent", element.name),
            );
        }
        return Outcome::suppress();
    }

    match element.local {
        ALTERNATE_CONTENT => {
            errors.record(
                ErrorKind::XmlNestedAlternateContent,
                format!("{} directly inside AlternateContent", element.name),
            );
            Outcome::suppress()
        }
        CHOICE => choice_begin(state, scope, env, element, errors),
        FALLBACK => fallback_begin(state, scope, env, element, errors),
        _ => {
            errors.record(
                ErrorKind::UnknownElement,
                format!("{} is not allowed inside AlternateContent", element.name),
            );
            Outcome::suppress()
        }
    }
}

fn choice_begin(
    state: &mut ChoiceState,
    scope: Scope<'_>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Outcome {
    if state.saw_fallback {
        errors.record(ErrorKind::LateChoice, format!("{} after Fallback", element.name));
        return Outcome::suppress();
    }
    let index = state.next_index;
    state.next_index += 1;

    let Ok(directives) = read_directives(scope, env, element, errors) else {
        return Outcome::suppress();
    };
    if check_wrapper_attributes(&directives.ignorable, env, element, &[REQUIRES], errors).is_err() {
        return Outcome::suppress();
    }
    let required: Vec<&str> = match element.attributes.iter().find(|a| a.name == REQUIRES) {
        Some(attr) => list_tokens(&attr.value).collect(),
        None => Vec::new(),
    };
    if required.is_empty() {
        errors.record(
            ErrorKind::MissingAttribute,
            format!("{} #{index} without Requires prefixes", element.name),
        );
        return Outcome::suppress();
    }

    if state.selected.is_some() {
        trace!("{} #{index} skipped, a Choice is already selected", element.name);
        return Outcome::suppress();
    }

    let mut satisfied = true;
    for prefix in required {
        let Some(uri) = env.resolve(prefix) else {
            errors.record(
                ErrorKind::UnknownNamespacePrefix,
                format!("Requires prefix '{prefix}' on {} is not bound", element.name),
            );
            return Outcome::suppress();
        };
        satisfied &= env.is_supported(uri);
    }

    if satisfied {
        debug!("{} #{index} selected", element.name);
        state.selected = Some(index);
        Outcome::unwrap(directives.into_context(Strategy::Standard))
    } else {
        trace!("{} #{index} not satisfiable", element.name);
        Outcome::suppress()
    }
}

fn fallback_begin(
    state: &mut ChoiceState,
    scope: Scope<'_>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Outcome {
    if state.saw_fallback {
        errors.record(ErrorKind::MultipleFallbacks, format!("second {}", element.name));
        return Outcome::suppress();
    }
    state.saw_fallback = true;

    let Ok(directives) = read_directives(scope, env, element, errors) else {
        return Outcome::suppress();
    };
    if check_wrapper_attributes(&directives.ignorable, env, element, &[], errors).is_err() {
        return Outcome::suppress();
    }

    if state.selected.is_some() {
        Outcome::suppress()
    } else {
        debug!("{} selected", element.name);
        Outcome::unwrap(directives.into_context(Strategy::Fallback))
    }
}

fn resolve_element<'a>(
    env: &'a Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Option<&'a str> {
    let prefix = element.prefix.unwrap_or("");
    let uri = env.resolve(prefix);
    if uri.is_none() {
        errors.record(
            ErrorKind::UnknownNamespacePrefix,
            format!("prefix '{prefix}' of element {} is not bound", element.name),
        );
    }
    uri
}

/// Applies `mc:Ignorable`, `mc:MustUnderstand` and `mc:ProcessContent`.
///
/// All `Ignorable` prefixes are added before any `ProcessContent` entry is
/// checked, so attribute order does not matter.
fn read_directives<'a>(
    scope: Scope<'a>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Result<Directives<'a>, Rejected> {
    let mut directives = Directives {
        ignorable: Cow::Borrowed(scope.ignorable),
        process_content: Cow::Borrowed(scope.process_content),
        changed: false,
    };
    let mut process_content_values = Vec::new();

    for attr in element.attributes {
        let Some(prefix) = attr.prefix() else { continue };
        if env.resolve(prefix) != Some(MC_NAMESPACE) {
            continue;
        }
        match attr.local_name() {
            IGNORABLE => {
                for prefix in list_tokens(&attr.value) {
                    let uri = resolve_listed(env, prefix, attr, element, errors)?;
                    directives.ignorable.to_mut().add_with_prefix(prefix, uri);
                    directives.changed = true;
                }
            }
            MUST_UNDERSTAND => {
                for prefix in list_tokens(&attr.value) {
                    let uri = resolve_listed(env, prefix, attr, element, errors)?;
                    if !env.is_supported(uri) {
                        errors.record(
                            ErrorKind::MustUnderstandViolation,
                            format!("{} requires unsupported namespace {uri} ('{prefix}')", element.name),
                        );
                        return Err(Rejected);
                    }
                }
            }
            PROCESS_CONTENT => process_content_values.push(attr.value.as_str()),
            // Nur fuer Editoren relevant, werden verworfen.
            PRESERVE_ELEMENTS | PRESERVE_ATTRIBUTES => {}
            REQUIRES => {
                errors.record(
                    ErrorKind::PrefixedAttribute,
                    format!("{} on {} must not carry a prefix", attr.name, element.name),
                );
                return Err(Rejected);
            }
            _ => {
                errors.record(
                    ErrorKind::UnknownAttribute,
                    format!("{} on {} is not a Markup Compatibility attribute", attr.name, element.name),
                );
                return Err(Rejected);
            }
        }
    }

    let resolver = env.resolver();
    for value in process_content_values {
        for token in list_tokens(value) {
            let name = match qname_registry::resolve(token, &resolver) {
                Ok(resolved) => resolved,
                Err(Error::UnknownNamespacePrefix(prefix)) => {
                    errors.record(
                        ErrorKind::UnknownNamespacePrefix,
                        format!("ProcessContent entry '{token}' on {}: prefix '{prefix}' is not bound", element.name),
                    );
                    return Err(Rejected);
                }
                Err(e) => {
                    errors.record(
                        ErrorKind::InvalidNamespaceReference,
                        format!("ProcessContent entry on {}: {e}", element.name),
                    );
                    return Err(Rejected);
                }
            };
            if !directives.ignorable.contains_uri(&name.uri) {
                errors.record(
                    ErrorKind::InvalidNamespaceReference,
                    format!(
                        "ProcessContent entry '{token}' on {} names non-ignorable namespace '{}'",
                        element.name, name.uri
                    ),
                );
                return Err(Rejected);
            }
            directives.process_content.to_mut().insert(name);
            directives.changed = true;
        }
    }

    Ok(directives)
}

fn resolve_listed<'a>(
    env: &'a Environment<'_>,
    prefix: &str,
    attr: &Attribute,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Result<&'a str, Rejected> {
    env.resolve(prefix).ok_or_else(|| {
        errors.record(
            ErrorKind::UnknownNamespacePrefix,
            format!("{} on {} lists unbound prefix '{prefix}'", attr.name, element.name),
        );
        Rejected
    })
}

/// Attributes of a forwarded element, minus MC and ignorable ones.
///
/// `own_namespace`: namespace whose attributes are kept although it is not
/// supported (element forwarded as `Fallback` content).
fn filter_attributes(
    ignorable: &NamespaceRegistry,
    own_namespace: Option<&str>,
    env: &Environment<'_>,
    element: &Element<'_>,
    errors: &mut ErrorSink,
) -> Result<Vec<Attribute>, Rejected> {
    let mut kept = Vec::with_capacity(element.attributes.len());
    for attr in element.attributes {
        let Some(prefix) = attr.prefix() else {
            kept.push(attr.clone());
            continue;
        };
        let Some(uri) = env.resolve(prefix) else {
            errors.record(
                ErrorKind::UnknownNamespacePrefix,
                format!("prefix '{prefix}' of attribute {} on {} is not bound", attr.name, element.name),
            );
            return Err(Rejected);
        };
        if uri == MC_NAMESPACE {
            continue;
        }
        if env.is_supported(uri) || own_namespace == Some(uri) {
            kept.push(attr.clone());
        } else if ignorable.contains_uri(uri) {
            trace!("ignorable attribute {} on {} dropped", attr.name, element.name);
        } else {
            errors.record(
                ErrorKind::UnknownAttribute,
                format!("{} ({uri}) on {} is neither supported nor ignorable", attr.name, element.name),
            );
            return Err(Rejected);
        }
    }
    Ok(kept)
}

/// Attribute rules for `AlternateContent`, `Choice` and `Fallback`.
///
/// Only prefixed MC directives, `xml:*`, ignorable attributes and the
/// unprefixed names in `allowed` may appear. `ignorable` includes the
/// wrapper's own `mc:Ignorable` declarations.
fn check_wrapper_attributes(
    ignorable: &NamespaceRegistry,
    env: &Environment<'_>,
    element: &Element<'_>,
    allowed: &[&str],
    errors: &mut ErrorSink,
) -> Result<(), Rejected> {
    for attr in element.attributes {
        let local = attr.local_name();
        let Some(prefix) = attr.prefix() else {
            if allowed.contains(&local) {
                continue;
            }
            let kind = if MC_ATTRIBUTES.contains(&local) {
                ErrorKind::UnprefixedAttribute
            } else {
                ErrorKind::UnknownAttribute
            };
            errors.record(kind, format!("{} on {}", attr.name, element.name));
            return Err(Rejected);
        };
        let Some(uri) = env.resolve(prefix) else {
            errors.record(
                ErrorKind::UnknownNamespacePrefix,
                format!("prefix '{prefix}' of attribute {} on {} is not bound", attr.name, element.name),
            );
            return Err(Rejected);
        };
        let dropped = ignorable.contains_uri(uri) && !env.is_supported(uri);
        // `e:Requires` einer ignorierbaren Erweiterung ist kein MC-Attribut.
        if local == REQUIRES && !dropped {
            errors.record(
                ErrorKind::PrefixedAttribute,
                format!("{} on {} must not carry a prefix", attr.name, element.name),
            );
            return Err(Rejected);
        }
        if uri == MC_NAMESPACE || uri == XML_NAMESPACE || uri == XMLNS_NAMESPACE || dropped {
            continue;
        }
        errors.record(
            ErrorKind::UnknownAttribute,
            format!("{} is not allowed on {}", attr.name, element.name),
        );
        return Err(Rejected);
    }
    Ok(())
}
