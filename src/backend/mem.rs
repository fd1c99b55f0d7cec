use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::trace;

use crate::{IvrFlowError, Result, ShareLock, backend::FlowBackend, model::FlowPayload, utils};

#[derive(Debug, Clone)]
struct StoredFlow {
    last_data: Value,
    deployed: bool,
    create_time: i64,
    update_time: i64,
}

/// In-memory backend keyed by flow name.
#[derive(Debug, Clone, Default)]
pub struct MemBackend {
    flows: ShareLock<HashMap<String, StoredFlow>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self {
            flows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stores a raw retrieve response under `name`, bypassing export.
    pub fn insert_raw(
        &self,
        name: &str,
        data: Value,
    ) -> Result<()> {
        let now = utils::time_millis();
        let mut flows = self.flows.write().map_err(poisoned)?;
        flows.insert(
            name.to_string(),
            StoredFlow {
                last_data: data,
                deployed: false,
                create_time: now,
                update_time: now,
            },
        );
        Ok(())
    }

    pub fn is_deployed(
        &self,
        name: &str,
    ) -> Result<bool> {
        let flows = self.flows.read().map_err(poisoned)?;
        Ok(flows.get(name).is_some_and(|f| f.deployed))
    }

    /// Create and last update time of `name`, in milliseconds.
    pub fn times(
        &self,
        name: &str,
    ) -> Result<Option<(i64, i64)>> {
        let flows = self.flows.read().map_err(poisoned)?;
        Ok(flows.get(name).map(|f| (f.create_time, f.update_time)))
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> IvrFlowError {
    IvrFlowError::backend(None, format!("flow store lock poisoned: {}", err))
}

fn not_found(name: &str) -> IvrFlowError {
    IvrFlowError::backend(Some(404), format!("flow '{}' not found", name))
}

#[async_trait]
impl FlowBackend for MemBackend {
    async fn list_flows(&self) -> Result<Vec<String>> {
        let flows = self.flows.read().map_err(poisoned)?;
        let mut names: Vec<String> = flows.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flow_name_exists(
        &self,
        name: &str,
    ) -> Result<bool> {
        let flows = self.flows.read().map_err(poisoned)?;
        Ok(flows.contains_key(name))
    }

    async fn fetch_flow(
        &self,
        name: &str,
    ) -> Result<Value> {
        trace!("MemBackend.fetch_flow({})", name);
        let flows = self.flows.read().map_err(poisoned)?;
        Ok(flows.get(name).map(|f| f.last_data.clone()).unwrap_or_else(|| json!({})))
    }

    async fn write_flow(
        &self,
        payload: &FlowPayload,
    ) -> Result<()> {
        trace!("MemBackend.write_flow({})", payload.flow_name);
        let last_data = serde_json::to_value(&payload.last_data)?;
        let now = utils::time_millis();

        let mut flows = self.flows.write().map_err(poisoned)?;
        flows
            .entry(payload.flow_name.clone())
            .and_modify(|f| {
                f.last_data = last_data.clone();
                f.update_time = now;
            })
            .or_insert(StoredFlow {
                last_data,
                deployed: false,
                create_time: now,
                update_time: now,
            });
        Ok(())
    }

    async fn deploy_flow(
        &self,
        name: &str,
    ) -> Result<()> {
        trace!("MemBackend.deploy_flow({})", name);
        let mut flows = self.flows.write().map_err(poisoned)?;
        let flow = flows.get_mut(name).ok_or_else(|| not_found(name))?;
        flow.deployed = true;
        flow.update_time = utils::time_millis();
        Ok(())
    }

    async fn delete_flow(
        &self,
        name: &str,
    ) -> Result<()> {
        trace!("MemBackend.delete_flow({})", name);
        let mut flows = self.flows.write().map_err(poisoned)?;
        flows.remove(name).map(|_| ()).ok_or_else(|| not_found(name))
    }
}
