//! Authorization of resources before they reach the runtime.

use std::collections::{HashMap, HashSet};

/// Decides whether a resource may be loaded.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, kind: &str, name: &str) -> bool;
}

/// Authorizes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _kind: &str, _name: &str) -> bool {
        true
    }
}

/// Per-kind allow and deny lists.
///
/// Deny always wins. A kind without an allow list allows every name that is
/// not denied.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    allow: HashMap<String, HashSet<String>>,
    deny: HashMap<String, HashSet<String>>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.allow.entry(kind.into()).or_default().insert(name.into());
        self
    }

    pub fn deny(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.deny.entry(kind.into()).or_default().insert(name.into());
        self
    }
}

impl Authorizer for AccessList {
    fn is_authorized(&self, kind: &str, name: &str) -> bool {
        if self.deny.get(kind).is_some_and(|names| names.contains(name)) {
            return false;
        }
        match self.allow.get(kind) {
            Some(names) if !names.is_empty() => names.contains(name),
            _ => true,
        }
    }
}
