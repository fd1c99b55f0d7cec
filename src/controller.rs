//! Flow lifecycle controller.
//!
//! One controller holds one editing session: the active flow, its graph and
//! the sequence counters. The graph is only replaced once an operation has
//! fully succeeded, so a failed call leaves the session as it was.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    IvrFlowError, Result,
    backend::FlowBackend,
    model::{Counters, FlowGraph, GraphNode, LegacyRecord, NodeKind, NodePayload, StartData},
    transcode::{Diagnostic, export_flow, flatten_payload, import_flow},
};

/// Lifecycle state of the session's active flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
pub enum FlowState {
    /// No flow opened yet.
    Uncreated,
    /// Holds changes the backend has not stored.
    Draft,
    Saved,
    Deployed,
    /// The active flow was deleted from the backend.
    Deleted,
}

pub struct FlowController {
    backend: Arc<dyn FlowBackend>,
    state: FlowState,
    active_flow: Option<String>,
    graph: FlowGraph,
    counters: Counters,
    projects: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl FlowController {
    pub fn new(backend: Arc<dyn FlowBackend>) -> Self {
        Self {
            backend,
            state: FlowState::Uncreated,
            active_flow: None,
            graph: FlowGraph::default(),
            counters: Counters::new(),
            projects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn active_flow(&self) -> Option<&str> {
        self.active_flow.as_deref()
    }

    /// Flow names known to the session, as of the last [`Self::load_projects`]
    /// plus flows created or deleted since.
    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Diagnostics of the last retrieve.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state == FlowState::Draft
    }

    /// Refreshes the project list from the backend.
    pub async fn load_projects(&mut self) -> Result<&[String]> {
        self.projects = self.backend.list_flows().await?;
        Ok(&self.projects)
    }

    /// Starts a new flow holding a single start node. Nothing is written to
    /// the backend until [`Self::save`].
    pub async fn create(
        &mut self,
        name: &str,
    ) -> Result<&FlowGraph> {
        let name = required_name(name)?;
        if self.backend.flow_name_exists(name).await? {
            return Err(IvrFlowError::Validation(format!("flow '{}' already exists", name)));
        }

        let mut counters = Counters::new();
        let graph = FlowGraph::new(vec![start_node(&mut counters)], Vec::new());

        info!("create flow '{}'", name);
        self.counters = counters;
        self.graph = graph;
        self.diagnostics.clear();
        self.activate(name);
        self.state = FlowState::Draft;
        Ok(&self.graph)
    }

    /// Loads a stored flow into the session.
    pub async fn retrieve(
        &mut self,
        name: &str,
    ) -> Result<&FlowGraph> {
        let name = required_name(name)?;
        let value = self.backend.fetch_flow(name).await?;
        let records = LegacyRecord::parse_all(flatten_payload(value)?)?;
        let imported = import_flow(&records);

        let mut counters = Counters::new();
        let (graph, state) = if imported.graph.nodes.is_empty() {
            // unknown or empty flow: scaffold it the way create does
            warn!("flow '{}' has no nodes, starting from a start node", name);
            (FlowGraph::new(vec![start_node(&mut counters)], Vec::new()), FlowState::Draft)
        } else {
            (imported.graph, FlowState::Saved)
        };

        info!("retrieve flow '{}' with {} nodes, {} edges", name, graph.nodes.len(), graph.edges.len());
        self.counters = counters;
        self.graph = graph;
        self.diagnostics = imported.diagnostics;
        self.activate(name);
        self.state = state;
        Ok(&self.graph)
    }

    /// Takes the graph handed back by the editor as the session's unsaved
    /// working copy.
    pub fn update_graph(
        &mut self,
        graph: FlowGraph,
    ) -> Result<()> {
        if self.active_flow.is_none() {
            return Err(IvrFlowError::Validation("no active flow to update".to_string()));
        }
        self.graph = graph;
        self.state = FlowState::Draft;
        Ok(())
    }

    /// Exports `graph` and writes it to the backend under `name`.
    pub async fn save(
        &mut self,
        name: &str,
        graph: FlowGraph,
    ) -> Result<()> {
        let name = required_name(name)?;
        let (payload, counters) = export_flow(name, &graph, self.counters)?;
        self.backend.write_flow(&payload).await?;

        info!("save flow '{}' with {} records", name, payload.last_data.len());
        self.counters = counters;
        self.graph = graph;
        self.activate(name);
        self.state = FlowState::Saved;
        Ok(())
    }

    /// Deploys a stored flow. The active flow must not hold unsaved changes;
    /// the controller never saves on the caller's behalf.
    pub async fn deploy(
        &mut self,
        name: &str,
    ) -> Result<()> {
        let name = required_name(name)?;
        let is_active = self.active_flow.as_deref() == Some(name);
        if is_active && self.has_unsaved_changes() {
            return Err(IvrFlowError::Validation(format!("flow '{}' has unsaved changes, save it before deploying", name)));
        }

        self.backend.deploy_flow(name).await?;
        info!("deploy flow '{}'", name);
        if is_active {
            self.state = FlowState::Deployed;
        }
        Ok(())
    }

    pub async fn delete(
        &mut self,
        name: &str,
    ) -> Result<()> {
        let name = required_name(name)?;
        self.backend.delete_flow(name).await?;

        info!("delete flow '{}'", name);
        self.projects.retain(|p| p != name);
        if self.active_flow.as_deref() == Some(name) {
            self.graph = FlowGraph::default();
            self.diagnostics.clear();
            self.active_flow = None;
            self.state = FlowState::Deleted;
        }
        Ok(())
    }

    fn activate(
        &mut self,
        name: &str,
    ) {
        self.active_flow = Some(name.to_string());
        if !self.projects.iter().any(|p| p == name) {
            self.projects.push(name.to_string());
        }
    }
}

fn required_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IvrFlowError::Validation("flow name is required".to_string()));
    }
    Ok(name)
}

fn start_node(counters: &mut Counters) -> GraphNode {
    let id = counters.allocate_id(&NodeKind::Start);
    GraphNode::new(id, NodePayload::Start(StartData::default()))
}
