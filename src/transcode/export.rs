//! Editor graph to legacy record list.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::{
    IvrFlowError, Result,
    model::{BackendNodeType, Counters, FlowGraph, FlowPayload, GraphEdge, GraphNode, LegacyEdgeRecord, LegacyNodeRecord, LegacyRecord, MAX_MENU_OPTIONS, MenuData, NodePayload, OptionKey, OptionsTarget},
};

/// Edge id markers for the sentinel branches, used when the edge carries no
/// usable `sourceHandle`.
const NO_INPUT_PATTERN: &str = r"NI|(?i:no-?input)";
const NO_MATCH_PATTERN: &str = r"NM|(?i:no-?match)";

static NO_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(NO_INPUT_PATTERN).unwrap());
static NO_MATCH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(NO_MATCH_PATTERN).unwrap());

/// Serializes the editor graph into the backend's flat record list.
///
/// Each node record takes its `source` sequence id from `counters`; the
/// advanced counters are returned alongside the payload so the caller can
/// keep them only if the write succeeds.
pub fn export_flow(
    name: &str,
    graph: &FlowGraph,
    counters: Counters,
) -> Result<(FlowPayload, Counters)> {
    if name.trim().is_empty() {
        return Err(IvrFlowError::Validation("flow name is required".to_string()));
    }

    let mut counters = counters;
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        nodes.push(export_node(node, graph, &mut counters)?);
    }

    let edges: Vec<LegacyEdgeRecord> = graph.edges.iter().enumerate().map(|(index, edge)| export_edge(index, edge, &nodes)).collect();

    info!("export flow '{}' with {} nodes, {} edges", name, nodes.len(), edges.len());
    let last_data = nodes.into_iter().map(LegacyRecord::Node).chain(edges.into_iter().map(LegacyRecord::Edge)).collect();
    Ok((
        FlowPayload {
            flow_name: name.to_string(),
            last_data,
        },
        counters,
    ))
}

fn export_node(
    node: &GraphNode,
    graph: &FlowGraph,
    counters: &mut Counters,
) -> Result<LegacyNodeRecord> {
    let kind = node.kind();
    let backend_type = BackendNodeType::from_graph_type(kind.as_str());
    let type_name: &str = backend_type.as_ref();
    let source = counters.next(backend_type);

    let target = graph
        .outgoing(&node.id)
        .map(|e| e.target.as_str())
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or(node.target.as_str())
        .to_string();
    let label = if node.label.is_empty() { kind.display_name().to_string() } else { node.label.clone() };

    let mut data = Map::new();
    let mut popup = Map::new();
    popup.insert("id".to_string(), json!(node.id));
    popup.insert("Menuname".to_string(), json!(label));
    let mut options_target = None;

    match &node.payload {
        NodePayload::Start(start) => {
            data.insert("welcomeMessage".to_string(), json!(start.welcome_message));
            data.insert("prompt".to_string(), json!(start.prompt));
        }
        NodePayload::Menu(menu) => {
            let (table, max_options) = menu_options_target(node, menu, graph, &target);
            let options: Vec<String> = table.digits().iter().map(u32::to_string).collect();
            data.insert("prompt".to_string(), json!(menu.prompt));
            data.insert("options".to_string(), json!(options));

            let mut details = menu.popup_details.clone();
            details.menu_options = max_options.to_string();
            details.options_target = table.clone();
            if let Value::Object(fields) = serde_json::to_value(&details)? {
                popup.extend(fields);
            }
            options_target = Some(serde_json::to_value(&table)?);
        }
        NodePayload::PlayPrompt(prompt) => {
            data.insert("text".to_string(), json!(prompt.text));
            data.insert("promptType".to_string(), json!(prompt.prompt_type));
            if let Some(audio) = &prompt.audio_file {
                data.insert("audioFile".to_string(), audio.clone());
            }
            popup.insert("TexttoSay".to_string(), json!(prompt.text));
            popup.insert("promptType".to_string(), json!(prompt.prompt_type));
            popup.insert("initialAudio".to_string(), prompt.audio_file.clone().unwrap_or(Value::Null));
        }
        NodePayload::Transfer(transfer) => {
            data.insert("destinationNumber".to_string(), json!(transfer.destination_number));
            data.insert("transferType".to_string(), json!(transfer.transfer_type));
            data.insert("transferNumber".to_string(), json!(transfer.transfer_number));
            popup.insert("destinationNumber".to_string(), json!(transfer.destination_number));
        }
        NodePayload::End(end) => {
            data.insert("endType".to_string(), json!(end.end_type));
        }
        NodePayload::Condition(_) | NodePayload::Variable(_) | NodePayload::Webhook(_) | NodePayload::DigitsCollection(_) | NodePayload::Other { .. } => {
            data.extend(node.payload.fields()?);
        }
    }

    // Stored as "Play Prompt"; the label tells the kind apart on re-import.
    let data_label = if kind.is_designer_only() { kind.display_name().to_string() } else { label.clone() };
    data.insert("label".to_string(), json!(data_label));
    data.insert("type".to_string(), json!(type_name));

    let popup_details = match node.payload {
        NodePayload::Start(_) => None,
        _ => Some(popup),
    };

    Ok(LegacyNodeRecord {
        id: node.id.clone(),
        node_type: type_name.to_string(),
        legacy_type: None,
        source_label: Some(label),
        source: Some(source.to_string()),
        description: Some(node.description.clone()).filter(|d| !d.is_empty()),
        data,
        position: Some(node.position),
        target: Some(target),
        options_target,
        popup_details,
    })
}

/// Rebuilds a menu's `optionsTarget` from its outgoing edges and returns it
/// with the option count it covers.
fn menu_options_target(
    node: &GraphNode,
    menu: &MenuData,
    graph: &FlowGraph,
    fallback: &str,
) -> (OptionsTarget, u32) {
    let outgoing: Vec<(&GraphEdge, Option<OptionKey>)> = graph.outgoing(&node.id).map(|e| (e, branch_key(e))).collect();

    let mut table = OptionsTarget::new();
    for (edge, key) in &outgoing {
        match key {
            Some(key) if !edge.target.is_empty() => table.fill(*key, &edge.target),
            Some(_) => {}
            None => debug!("menu {}: edge '{}' carries no branch key", node.id, edge.id),
        }
    }

    let numbered_edges = outgoing.iter().filter(|(_, key)| matches!(key, Some(OptionKey::Digit(_)))).count() as u32;
    let counted = menu.popup_details.declared_options().or(Some(menu.options.len() as u32).filter(|n| *n > 0)).unwrap_or(numbered_edges);
    let max_options = counted.max(table.max_digit()).clamp(1, MAX_MENU_OPTIONS);

    let numbered_fallback = outgoing
        .iter()
        .filter(|(_, key)| !key.is_some_and(|k| k.is_sentinel()))
        .map(|(e, _)| e.target.as_str())
        .find(|t| !t.is_empty())
        .unwrap_or(fallback)
        .to_string();
    let sentinel_fallback = outgoing.iter().map(|(e, _)| e.target.as_str()).find(|t| !t.is_empty()).unwrap_or(fallback).to_string();

    for n in 1..=max_options {
        backfill(&mut table, OptionKey::Digit(n), &numbered_fallback);
    }
    backfill(&mut table, OptionKey::NoInput, &sentinel_fallback);
    backfill(&mut table, OptionKey::NoMatch, &sentinel_fallback);

    (table, max_options)
}

fn backfill(
    table: &mut OptionsTarget,
    key: OptionKey,
    target: &str,
) {
    if !target.is_empty() {
        table.fill(key, target);
    }
}

/// Branch key of a menu edge: its `sourceHandle` when that names a routable
/// key, else a sentinel marker in its id.
fn branch_key(edge: &GraphEdge) -> Option<OptionKey> {
    let from_handle = edge.source_handle.as_deref().and_then(|h| h.parse::<OptionKey>().ok()).filter(OptionKey::is_routable);
    if from_handle.is_some() {
        return from_handle;
    }

    if NO_INPUT_RE.is_match(&edge.id) {
        Some(OptionKey::NoInput)
    } else if NO_MATCH_RE.is_match(&edge.id) {
        Some(OptionKey::NoMatch)
    } else {
        None
    }
}

fn export_edge(
    index: usize,
    edge: &GraphEdge,
    nodes: &[LegacyNodeRecord],
) -> LegacyEdgeRecord {
    let id = if edge.id.is_empty() {
        format!("reactflow__edge-{}-{}-{}", edge.source, edge.target, index)
    } else {
        edge.id.clone()
    };
    // branch edges carry the option name as their label, not the node's
    let edge_label = Some(edge.data.label.as_str()).filter(|_| edge.source_handle.is_none());
    let source_label = [edge_label, nodes.iter().find(|n| n.id == edge.source).and_then(|n| n.source_label.as_deref())]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(edge.source.as_str())
        .to_string();

    LegacyEdgeRecord {
        id,
        source: edge.source.clone(),
        source_label: Some(source_label),
        target: Some(edge.target.clone()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ConditionData, EndData, GraphNode, MenuPopup, NodeKind, PromptData, StartData};

    fn menu_node(
        id: &str,
        declared: &str,
    ) -> GraphNode {
        GraphNode::new(
            id,
            NodePayload::Menu(MenuData {
                popup_details: MenuPopup {
                    menu_options: declared.to_string(),
                    ..MenuPopup::default()
                },
                ..MenuData::default()
            }),
        )
    }

    fn node_record<'a>(
        payload: &'a FlowPayload,
        id: &str,
    ) -> &'a LegacyNodeRecord {
        payload.nodes().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = export_flow("  ", &FlowGraph::default(), Counters::new()).unwrap_err();
        assert!(matches!(err, IvrFlowError::Validation(_)));
    }

    #[test]
    fn test_backend_types_and_sequence_ids() {
        let graph = FlowGraph::new(
            vec![
                GraphNode::new("start-1", NodePayload::Start(StartData::default())),
                GraphNode::new("playPrompt-1", NodePayload::PlayPrompt(PromptData::default())),
                GraphNode::new("playPrompt-2", NodePayload::PlayPrompt(PromptData::default())),
                GraphNode::new("condition-1", NodePayload::Condition(ConditionData::default())),
                GraphNode::new("end-1", NodePayload::End(EndData::default())),
            ],
            vec![],
        );
        let (payload, counters) = export_flow("Sales IVR", &graph, Counters::new()).unwrap();

        let types: Vec<&str> = payload.nodes().map(|n| n.node_type.as_str()).collect();
        assert_eq!(types, vec!["Start", "Play Prompt", "Play Prompt", "Play Prompt", "Disconnect"]);
        let sources: Vec<&str> = payload.nodes().filter_map(|n| n.source.as_deref()).collect();
        assert_eq!(sources, vec!["1", "1", "2", "3", "1"]);
        assert_eq!(counters.audio_counter, 4);
        assert_eq!(counters.entry_counter, 2);

        let condition = node_record(&payload, "condition-1");
        assert_eq!(condition.data.get("label"), Some(&json!("Condition")));
        assert_eq!(condition.data.get("conditionType"), Some(&json!("Condition")));
        assert_eq!(condition.data.get("type"), Some(&json!("Play Prompt")));
    }

    #[test]
    fn test_node_target_from_first_edge() {
        let graph = FlowGraph::new(
            vec![GraphNode::new("playPrompt-1", NodePayload::PlayPrompt(PromptData::default())).with_target("end-9")],
            vec![GraphEdge::new("e1", "playPrompt-1", "end-1"), GraphEdge::new("e2", "playPrompt-1", "end-2")],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        assert_eq!(node_record(&payload, "playPrompt-1").target.as_deref(), Some("end-1"));

        let graph = FlowGraph::new(graph.nodes.clone(), vec![]);
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        assert_eq!(node_record(&payload, "playPrompt-1").target.as_deref(), Some("end-9"));
    }

    #[test]
    fn test_menu_options_from_handles() {
        let graph = FlowGraph::new(
            vec![menu_node("menu-1", "3")],
            vec![
                GraphEdge::new("a", "menu-1", "playPrompt-1").with_handle("1"),
                GraphEdge::new("b", "menu-1", "playPrompt-2").with_handle("2"),
                GraphEdge::new("c", "menu-1", "end-1").with_handle("NM"),
            ],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        let menu = node_record(&payload, "menu-1");

        let expected = json!({"1": "playPrompt-1", "2": "playPrompt-2", "3": "playPrompt-1", "NI": "playPrompt-1", "NM": "end-1"});
        assert_eq!(menu.options_target, Some(expected.clone()));
        let popup = menu.popup_details.as_ref().unwrap();
        assert_eq!(popup.get("optionsTarget"), Some(&expected));
        assert_eq!(popup.get("menuoptions"), Some(&json!("3")));
        assert_eq!(popup.get("Menuname"), Some(&json!("Menu")));
        assert_eq!(popup.get("id"), Some(&json!("menu-1")));
        assert_eq!(menu.data.get("options"), Some(&json!(["1", "2", "3"])));
    }

    #[test]
    fn test_menu_options_from_id_markers() {
        let graph = FlowGraph::new(
            vec![menu_node("menu-1", "1").with_target("end-1")],
            vec![
                GraphEdge::new("reactflow__edge-menu-1NI-playPrompt-1", "menu-1", "playPrompt-1"),
                GraphEdge::new("edge-menu-1-no-match-playPrompt-2", "menu-1", "playPrompt-2"),
            ],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();

        assert_eq!(
            node_record(&payload, "menu-1").options_target,
            Some(json!({"1": "playPrompt-1", "NI": "playPrompt-1", "NM": "playPrompt-2"}))
        );
    }

    #[test]
    fn test_menu_without_edges_uses_node_target() {
        let graph = FlowGraph::new(vec![menu_node("menu-1", "2").with_target("end-1")], vec![]);
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        assert_eq!(
            node_record(&payload, "menu-1").options_target,
            Some(json!({"1": "end-1", "2": "end-1", "NI": "end-1", "NM": "end-1"}))
        );

        let graph = FlowGraph::new(vec![menu_node("menu-1", "2")], vec![]);
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        assert_eq!(node_record(&payload, "menu-1").options_target, Some(json!({})));
    }

    #[test]
    fn test_edge_records() {
        let graph = FlowGraph::new(
            vec![GraphNode::new("start-1", NodePayload::Start(StartData::default())).with_label("Entry")],
            vec![
                GraphEdge::new("e1", "start-1", "menu-1"),
                GraphEdge::new("", "start-1", "end-1").with_label("Go"),
                GraphEdge::new("e3", "ghost-1", "end-1"),
            ],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        let edges: Vec<&LegacyEdgeRecord> = payload.edges().collect();

        assert_eq!(edges[0].source_label.as_deref(), Some("Entry"));
        assert_eq!(edges[1].id, "reactflow__edge-start-1-end-1-1");
        assert_eq!(edges[1].source_label.as_deref(), Some("Go"));
        assert_eq!(edges[2].source_label.as_deref(), Some("ghost-1"));
        assert_eq!(payload.last_data.len(), 4);
        assert!(matches!(payload.last_data[0], LegacyRecord::Node(_)));
    }

    #[test]
    fn test_menu_edges_take_menu_label() {
        let graph = FlowGraph::new(
            vec![menu_node("menu-1", "1").with_label("Main menu")],
            vec![
                GraphEdge::new("xy-edge__menu-1-option-0-end-1", "menu-1", "end-1").with_handle("1").with_label("Option 1"),
                GraphEdge::new("xy-edge__menu-1-noinput-end-1", "menu-1", "end-1").with_handle("NI").with_label("No Input"),
                GraphEdge::new("xy-edge__menu-1-nomatch-end-1", "menu-1", "end-1").with_handle("NM").with_label("No Match"),
            ],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();

        let labels: Vec<Option<&str>> = payload.edges().map(|e| e.source_label.as_deref()).collect();
        assert_eq!(labels, vec![Some("Main menu"); 3]);
    }

    #[test]
    fn test_menu_option_count_capped() {
        let graph = FlowGraph::new(
            vec![menu_node("menu-1", "3000000")],
            vec![
                GraphEdge::new("a", "menu-1", "playPrompt-1").with_handle("1"),
                GraphEdge::new("b", "menu-1", "playPrompt-2").with_handle("4294967295"),
            ],
        );
        let (payload, _) = export_flow("f", &graph, Counters::new()).unwrap();
        let menu = node_record(&payload, "menu-1");

        let popup = menu.popup_details.as_ref().unwrap();
        assert_eq!(popup.get("menuoptions"), Some(&json!(MAX_MENU_OPTIONS.to_string())));
        let table = menu.options_target.as_ref().and_then(Value::as_object).unwrap();
        assert_eq!(table.len(), MAX_MENU_OPTIONS as usize + 2);
        assert!(!table.contains_key("4294967295"));
        assert_eq!(table.get("1"), Some(&json!("playPrompt-1")));
    }

    #[test]
    fn test_unknown_kind_exported_as_prompt() {
        let node = GraphNode::new(
            "queue-1",
            NodePayload::Other {
                kind: "queue".to_string(),
                data: Map::from_iter([("queueName".to_string(), json!("support"))]),
            },
        );
        assert_eq!(node.kind(), NodeKind::Other("queue".to_string()));
        let (payload, counters) = export_flow("f", &FlowGraph::new(vec![node], vec![]), Counters::new()).unwrap();

        let record = node_record(&payload, "queue-1");
        assert_eq!(record.node_type, "Play Prompt");
        assert_eq!(record.data.get("queueName"), Some(&json!("support")));
        assert_eq!(counters.audio_counter, 2);
    }
}
