//! Resource kinds reconciled by the hot-reloader.
//!
//! Both kinds share the manifest envelope used on disk:
//! `apiVersion`, `kind`, `metadata`, `spec` and `scopes`.

mod component;
mod subscription;

pub use component::{Component, ComponentSpec, MetadataItem, SecretKeyRef};
pub use subscription::{BulkSubscribe, Routes, Rule, Subscription, SubscriptionSpec};

use serde::{Deserialize, Serialize};

/// `apiVersion` / `kind` header of a manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

/// Identity of a manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}
