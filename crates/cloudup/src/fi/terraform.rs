//! Terraform JSON rendering target.
//!
//! Tasks render into a [`TerraformTarget`] instead of calling cloud APIs.
//! Cross-resource fields are written as [`Literal`] interpolation expressions
//! because real identifiers are not known until Terraform applies the output.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CloudupError, Result};

/// A Terraform value: either a plain string or an interpolation expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    expression: Option<String>,
    value: Option<String>,
}

impl Literal {
    /// `${<kind>.<name>.self_link}`
    #[must_use]
    pub fn self_link(resource_kind: &str, name: &str) -> Self {
        Self::property(resource_kind, name, "self_link")
    }

    /// `${<kind>.<name>.<property>}`
    #[must_use]
    pub fn property(resource_kind: &str, name: &str, property: &str) -> Self {
        Self {
            expression: Some(format!(
                "{resource_kind}.{}.{property}",
                sanitize_name(name)
            )),
            value: None,
        }
    }

    /// A literal string value.
    #[must_use]
    pub fn from_string_value(value: impl Into<String>) -> Self {
        Self {
            expression: None,
            value: Some(value.into()),
        }
    }

    /// The rendered form as it appears in Terraform JSON.
    #[must_use]
    pub fn rendered(&self) -> String {
        match (&self.value, &self.expression) {
            (Some(value), _) => value.clone(),
            (None, Some(expression)) => format!("${{{expression}}}"),
            (None, None) => String::new(),
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rendered())
    }
}

/// Terraform resource names may not contain `.` or `/`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.replace('.', "-").replace('/', "--")
}

/// Collects rendered resources and serializes them as Terraform JSON.
#[derive(Debug, Default)]
pub struct TerraformTarget {
    providers: Mutex<BTreeMap<String, Value>>,
    resources: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl TerraformTarget {
    /// Create an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `google` provider block.
    pub async fn add_google_provider(&self, project: &str, region: &str) {
        self.providers.lock().await.insert(
            "google".to_string(),
            json!({ "project": project, "region": region }),
        );
    }

    /// Record one resource, keyed by kind and (sanitized) name.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized or the same
    /// resource was already rendered.
    pub async fn render_resource<R: Serialize + Sync>(
        &self,
        resource_kind: &str,
        name: &str,
        record: &R,
    ) -> Result<()> {
        let value = serde_json::to_value(record)?;
        let name = sanitize_name(name);
        debug!(kind = resource_kind, name = %name, "Rendering terraform resource");

        let mut resources = self.resources.lock().await;
        let by_name = resources.entry(resource_kind.to_string()).or_default();
        if by_name.contains_key(&name) {
            return Err(CloudupError::Terraform(format!(
                "resource {resource_kind}.{name} rendered twice"
            )));
        }
        by_name.insert(name, value);
        Ok(())
    }

    /// A single rendered resource, if present.
    pub async fn resource(&self, resource_kind: &str, name: &str) -> Option<Value> {
        self.resources
            .lock()
            .await
            .get(resource_kind)
            .and_then(|by_name| by_name.get(&sanitize_name(name)))
            .cloned()
    }

    /// Serialize everything rendered so far as a Terraform JSON document.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub async fn to_json(&self) -> Result<String> {
        let mut root = Map::new();

        let providers = self.providers.lock().await;
        if !providers.is_empty() {
            root.insert("provider".to_string(), serde_json::to_value(&*providers)?);
        }

        let resources = self.resources.lock().await;
        if !resources.is_empty() {
            root.insert("resource".to_string(), serde_json::to_value(&*resources)?);
        }

        Ok(serde_json::to_string_pretty(&Value::Object(root))?)
    }
}

impl super::RenderTarget for TerraformTarget {
    fn name(&self) -> &'static str {
        "terraform"
    }

    fn check_existing(&self) -> bool {
        false
    }
}
