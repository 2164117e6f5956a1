//! Match and target extensions.
//!
//! An extension owns the layout of its opaque data and knows how to fill it
//! from options and how to print it back. The registry is built once and then
//! only read, so it can be shared freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entry::{xt_align, XT_EXTENSION_MAXNAMELEN};
use crate::error::Result;
use crate::extensions::{classify::Classify, quota::Quota};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    Match,
    Target,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::Match => f.write_str("match"),
            ExtensionKind::Target => f.write_str("target"),
        }
    }
}

pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ExtensionKind;

    fn revision(&self) -> u8 {
        0
    }

    /// Unaligned size of the data structure.
    fn size(&self) -> usize;

    fn help(&self) -> &'static str;

    /// Zeroed data of the aligned size.
    fn init_data(&self) -> Vec<u8> {
        vec![0; xt_align(self.size())]
    }

    /// Consume one option. Returns `Ok(false)` when the option is not ours.
    fn parse(&self, option: &str, value: &str, invert: bool, data: &mut [u8]) -> Result<bool>;

    /// Listing form.
    fn print(&self, data: &[u8], numeric: bool) -> String;

    /// Save form, re-parsable by [`Extension::parse`].
    fn save(&self, data: &[u8]) -> String;
}

#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    extensions: HashMap<(ExtensionKind, String), Arc<dyn Extension>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .extensions
            .keys()
            .map(|(kind, name)| format!("{kind}:{name}"))
            .collect();
        names.sort();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &names)
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the extensions shipped in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Quota));
        registry.register(Arc::new(Classify));
        registry
    }

    /// Register an extension, replacing any previous one of the same kind and
    /// name. Names that do not fit `XT_EXTENSION_MAXNAMELEN` are rejected.
    pub fn register(&mut self, ext: Arc<dyn Extension>) -> bool {
        let name = ext.name().to_string();
        if name.is_empty() || name.len() >= XT_EXTENSION_MAXNAMELEN {
            tracing::warn!("Refusing to register extension with invalid name '{}'", name);
            return false;
        }
        tracing::debug!("Registered {} extension {}", ext.kind(), name);
        self.extensions.insert((ext.kind(), name), ext);
        true
    }

    pub fn find_target(&self, name: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions
            .get(&(ExtensionKind::Target, name.to_string()))
    }

    pub fn find_match(&self, name: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions.get(&(ExtensionKind::Match, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
