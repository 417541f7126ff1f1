//! Component resources (state stores, pub/sub brokers, bindings, ...).

use serde::{Deserialize, Serialize};

use super::{ObjectMeta, TypeMeta};
use crate::resource::Resource;

/// A component manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ComponentSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Component type, e.g. `state.redis`.
    #[serde(rename = "type", default)]
    pub component_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ignore_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataItem>,
}

/// One configuration entry of a component.
///
/// Values are kept as raw JSON so strings, numbers and booleans written in
/// a manifest survive untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeyRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeyRef {
    pub name: String,
    #[serde(default)]
    pub key: String,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        component_type: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            type_meta: TypeMeta {
                api_version: "dapr.io/v1alpha1".to_string(),
                kind: Self::KIND.to_string(),
            },
            metadata: ObjectMeta::named(name),
            spec: ComponentSpec {
                component_type: component_type.into(),
                version: version.into(),
                ..Default::default()
            },
            scopes: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.metadata.push(MetadataItem {
            name: name.into(),
            value: Some(serde_json::Value::String(value.into())),
            secret_key_ref: None,
        });
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

impl Resource for Component {
    const KIND: &'static str = "Component";

    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn log_name(&self) -> String {
        format!(
            "{} ({}/{})",
            self.metadata.name, self.spec.component_type, self.spec.version
        )
    }
}
