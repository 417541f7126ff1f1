//! Declarative pub/sub subscriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ObjectMeta, TypeMeta};
use crate::resource::Resource;

/// A subscription manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SubscriptionSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    #[serde(default)]
    pub pubsubname: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub routes: Routes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_topic: Option<String>,
    /// Raw JSON values, like component metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_subscribe: Option<BulkSubscribe>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Route messages matching `match_expr` to `path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "match")]
    pub match_expr: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSubscribe {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_await_duration_ms: Option<u32>,
}

impl Subscription {
    pub fn new(
        name: impl Into<String>,
        pubsubname: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            type_meta: TypeMeta {
                api_version: "dapr.io/v2alpha1".to_string(),
                kind: Self::KIND.to_string(),
            },
            metadata: ObjectMeta::named(name),
            spec: SubscriptionSpec {
                pubsubname: pubsubname.into(),
                topic: topic.into(),
                ..Default::default()
            },
            scopes: Vec::new(),
        }
    }

    pub fn with_default_route(mut self, path: impl Into<String>) -> Self {
        self.spec.routes.default = Some(path.into());
        self
    }
}

impl Resource for Subscription {
    const KIND: &'static str = "Subscription";

    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn log_name(&self) -> String {
        format!(
            "{} ({}/{})",
            self.metadata.name, self.spec.pubsubname, self.spec.topic
        )
    }
}
