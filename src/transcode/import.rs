//! Legacy record list to editor graph.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    model::{FlowGraph, GraphEdge, GraphNode, LegacyEdgeRecord, LegacyNodeRecord, LegacyRecord, OptionKey},
    transcode::{
        Diagnostic,
        normalize::{Normalized, normalize},
    },
};

/// Result of an import: the graph plus anything worth reporting.
#[derive(Debug, Clone, Default)]
pub struct Imported {
    pub graph: FlowGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the editor graph from a flat record list.
///
/// Record order does not matter. Edges leaving a menu are not copied from the
/// list; they are synthesized from the menu's resolved `optionsTarget`.
pub fn import_flow(records: &[LegacyRecord]) -> Imported {
    let node_records: Vec<&LegacyNodeRecord> = records.iter().filter_map(LegacyRecord::as_node).collect();
    let edge_records: Vec<&LegacyEdgeRecord> = records.iter().filter_map(LegacyRecord::as_edge).collect();

    let mut nodes = Vec::with_capacity(node_records.len());
    let mut diagnostics = Vec::new();
    for record in &node_records {
        let Normalized { node, diagnostic } = normalize(record);
        nodes.push(node);
        diagnostics.extend(diagnostic);
    }

    let node_ids: HashSet<&str> = node_records.iter().map(|r| r.id.as_str()).collect();
    let menu_ids: HashSet<&str> = nodes.iter().filter(|n| n.is_menu()).map(|n| n.id.as_str()).collect();

    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for (index, record) in edge_records.iter().enumerate() {
        let Some(target) = record.target.as_deref().filter(|t| !t.is_empty()) else {
            debug!("skip dangling edge '{}' from {}", record.id, record.source);
            continue;
        };
        let source = correct_start_source(&record.source, &node_ids);
        if menu_ids.contains(source) {
            continue;
        }

        let id = if record.id.is_empty() {
            format!("edge-{}-{}-{}", source, target, index)
        } else {
            record.id.clone()
        };
        if !seen.insert(id.clone()) {
            debug!("skip duplicate edge '{}'", id);
            continue;
        }

        let mut edge = GraphEdge::new(id, source, target);
        if let Some(label) = record.source_label.as_deref() {
            edge = edge.with_label(label);
        }
        edges.push(edge);
    }

    for node in &nodes {
        for edge in menu_edges(node) {
            if seen.insert(edge.id.clone()) {
                edges.push(edge);
            }
        }
    }

    info!("import flow with {} nodes, {} edges", nodes.len(), edges.len());
    Imported {
        graph: FlowGraph::new(nodes, edges),
        diagnostics,
    }
}

/// Older flows point their first edge at `start-0` while the start node
/// itself is stored as `start-1`.
fn correct_start_source<'a>(
    source: &'a str,
    node_ids: &HashSet<&str>,
) -> &'a str {
    if source == "start-0" && node_ids.contains("start-1") && !node_ids.contains("start-0") {
        return "start-1";
    }
    source
}

/// One edge per non-empty `optionsTarget` entry of a menu node.
fn menu_edges(node: &GraphNode) -> Vec<GraphEdge> {
    let Some(menu) = node.menu() else {
        return Vec::new();
    };

    menu.options_target
        .iter()
        .filter(|(_, target)| !target.is_empty())
        .map(|(key, target)| {
            let marker = match key {
                OptionKey::Digit(n) => format!("option-{}", n.saturating_sub(1)),
                OptionKey::NoInput => "noinput".to_string(),
                OptionKey::NoMatch => "nomatch".to_string(),
            };
            GraphEdge::new(format!("xy-edge__{}-{}-{}", node.id, marker, target), &node.id, target)
                .with_handle(key.to_string())
                .with_label(key.label())
        })
        .collect()
}
