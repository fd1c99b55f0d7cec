//! Backend seam for flow persistence.
//!
//! Provides an abstraction over the telephony backend that stores flows:
//! - `MemBackend`: In-memory flows for tests and local tooling
//! - `HttpBackend`: The console's REST endpoints

mod http;
mod mem;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::{Result, model::FlowPayload};

pub use http::HttpBackend;
pub use mem::MemBackend;

/// Storage operations the lifecycle controller needs from a backend.
#[async_trait]
pub trait FlowBackend: Send + Sync {
    /// Names of every stored flow.
    async fn list_flows(&self) -> Result<Vec<String>>;

    /// Whether a flow named `name` already exists.
    async fn flow_name_exists(
        &self,
        name: &str,
    ) -> Result<bool>;

    /// Raw retrieve response for `name`.
    ///
    /// The shape is not normalized here; see [`crate::transcode::flatten_payload`].
    async fn fetch_flow(
        &self,
        name: &str,
    ) -> Result<Value>;

    /// Stores the exported record list, replacing any previous version.
    async fn write_flow(
        &self,
        payload: &FlowPayload,
    ) -> Result<()>;

    async fn deploy_flow(
        &self,
        name: &str,
    ) -> Result<()>;

    async fn delete_flow(
        &self,
        name: &str,
    ) -> Result<()>;
}

/// Extracts flow names from a project list response.
///
/// Accepts an array of names, an array of `{flowName}` objects, or an object
/// whose values are either.
pub(crate) fn parse_project_list(value: &Value) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map.get("flowName").and_then(Value::as_str).map(str::to_string),
            other => {
                debug!("skip project list item {}", other);
                None
            }
        })
        .filter(|name| !name.is_empty())
        .collect()
}
