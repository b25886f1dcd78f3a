//! Filter configuration.
//!
//! # Beispiel
//!
//! ```
//! use mcx::options::FilterOptions;
//!
//! let opts = FilterOptions::default()
//!     .with_supported_namespace("http://schemas.microsoft.com/xps/2005/06", ["x"])
//!     .with_extension_element("{urn:vendor}blob")
//!     .with_comments(true);
//!
//! assert_eq!(opts.supported_namespaces().len(), 1);
//! assert!(opts.forward_comments());
//! ```

/// A namespace the consumer understands, with its conventional prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedNamespace {
    pub uri: String,
    pub prefixes: Vec<String>,
}

/// Setup for a [`CompatibilityFilter`](crate::filter::CompatibilityFilter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    supported: Vec<SupportedNamespace>,
    /// Qualified names (`prefix:local` or `{uri}local`) passed through verbatim.
    extension_elements: Vec<String>,
    comments: bool,
    processing_instructions: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            supported: Vec::new(),
            extension_elements: Vec::new(),
            comments: true,
            processing_instructions: true,
        }
    }
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a supported namespace. Repeated URIs merge their prefixes.
    pub fn add_supported_namespace<I, S>(&mut self, uri: &str, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idx = match self.supported.iter().position(|s| s.uri == uri) {
            Some(idx) => idx,
            None => {
                self.supported.push(SupportedNamespace { uri: uri.to_string(), prefixes: Vec::new() });
                self.supported.len() - 1
            }
        };
        let entry = &mut self.supported[idx];
        for prefix in prefixes {
            let prefix = prefix.into();
            if !entry.prefixes.contains(&prefix) {
                entry.prefixes.push(prefix);
            }
        }
    }

    pub fn with_supported_namespace<I, S>(mut self, uri: &str, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_supported_namespace(uri, prefixes);
        self
    }

    pub fn add_extension_element(&mut self, qualified_name: impl Into<String>) {
        self.extension_elements.push(qualified_name.into());
    }

    pub fn with_extension_element(mut self, qualified_name: impl Into<String>) -> Self {
        self.add_extension_element(qualified_name);
        self
    }

    /// Forward comments in forwarded content (default: true).
    pub fn with_comments(mut self, forward: bool) -> Self {
        self.comments = forward;
        self
    }

    /// Forward processing instructions in forwarded content (default: true).
    pub fn with_processing_instructions(mut self, forward: bool) -> Self {
        self.processing_instructions = forward;
        self
    }

    pub fn supported_namespaces(&self) -> &[SupportedNamespace] {
        &self.supported
    }

    pub fn extension_elements(&self) -> &[String] {
        &self.extension_elements
    }

    pub fn forward_comments(&self) -> bool {
        self.comments
    }

    pub fn forward_processing_instructions(&self) -> bool {
        self.processing_instructions
    }
}
