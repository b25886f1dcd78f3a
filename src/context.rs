//! Processing contexts and the frame stack.
//!
//! A [`ProcessingContext`] bundles the strategy applied to the children of
//! the element that created it with the ignorable namespaces and
//! `ProcessContent` exceptions in effect below that element. The
//! [`ContextStack`] owns all frames; contexts hold no references to each
//! other; a child context starts from a copy of its parent's registries.

use log::debug;

use crate::namespaces::NamespaceRegistry;
use crate::qname_registry::QualifiedNameRegistry;
use crate::strategy::Strategy;

#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    pub(crate) strategy: Strategy,
    pub(crate) ignorable: NamespaceRegistry,
    pub(crate) process_content: QualifiedNameRegistry,
}

impl ProcessingContext {
    /// Empty context with the given strategy.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ignorable: NamespaceRegistry::new(),
            process_content: QualifiedNameRegistry::new(),
        }
    }

    pub fn with_registries(
        strategy: Strategy,
        ignorable: NamespaceRegistry,
        process_content: QualifiedNameRegistry,
    ) -> Self {
        Self { strategy, ignorable, process_content }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn ignorable(&self) -> &NamespaceRegistry {
        &self.ignorable
    }

    pub fn process_content(&self) -> &QualifiedNameRegistry {
        &self.process_content
    }

    pub fn is_ignorable(&self, uri: &str) -> bool {
        self.ignorable.contains_uri(uri)
    }

    pub fn should_process_content(&self, uri: &str, local: &str) -> bool {
        self.process_content.has(uri, local)
    }
}

/// Frames keyed by the nesting depth of the element that pushed them.
///
/// Depths are strictly increasing from bottom to top. The filter calls
/// [`pop_to`](Self::pop_to) with the depth of every ending element, so a
/// frame disappears exactly at its element's end tag.
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<(usize, ProcessingContext)>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `context` for the element at `depth` and returns the frame depth.
    pub fn push(&mut self, depth: usize, context: ProcessingContext) -> usize {
        debug_assert!(
            self.frames.last().is_none_or(|(top, _)| *top < depth),
            "ContextStack::push: depth {depth} not above top frame"
        );
        debug!("push {:?} frame at depth {depth}", context.strategy.name());
        self.frames.push((depth, context));
        depth
    }

    /// Removes every frame with depth >= `depth`.
    pub fn pop_to(&mut self, depth: usize) {
        while let Some((top, _)) = self.frames.last() {
            if *top < depth {
                break;
            }
            if let Some((d, ctx)) = self.frames.pop() {
                debug!("pop {:?} frame at depth {d}", ctx.strategy.name());
            }
        }
    }

    /// Topmost frame; `None` means plain pass-through.
    pub fn current(&self) -> Option<&ProcessingContext> {
        self.frames.last().map(|(_, ctx)| ctx)
    }

    pub fn current_mut(&mut self) -> Option<&mut ProcessingContext> {
        self.frames.last_mut().map(|(_, ctx)| ctx)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
