//! Conversion between the backend's flat record list and the editor graph.

mod branch;
mod export;
mod import;
mod normalize;
mod payload;

pub use branch::{MenuBranches, resolve_menu_options};
pub use export::export_flow;
pub use import::{Imported, import_flow};
pub use normalize::{Normalized, normalize};
pub use payload::flatten_payload;

/// Something worth reporting about an import that did not stop it.
#[derive(Debug, Clone, PartialEq, Eq, strum::AsRefStr)]
pub enum Diagnostic {
    /// Node type outside the known vocabulary, kept as is.
    UnknownNodeType { node_id: String, node_type: String },
    /// Node record without any type field, imported as a prompt.
    MissingNodeType { node_id: String },
}

impl Diagnostic {
    pub fn node_id(&self) -> &str {
        match self {
            Diagnostic::UnknownNodeType { node_id, .. } | Diagnostic::MissingNodeType { node_id } => node_id,
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use super::*;
    use crate::model::{Counters, FlowGraph, LegacyRecord, OptionsTarget};

    fn legacy_flow() -> Vec<Value> {
        vec![
            json!({"id": "e1", "source": "start-1", "sourceLabel": "Start", "target": "menu-1"}),
            json!({
                "id": "start-1",
                "nodeType": "Start",
                "sourceLabel": "Start",
                "source": "1",
                "position": {"x": 0, "y": 0},
                "data": {"welcomeMessage": "Hi", "prompt": "Welcome to sales"}
            }),
            json!({
                "id": "menu-1",
                "nodeType": "Menu",
                "sourceLabel": "Main menu",
                "source": "1",
                "target": "playPrompt-1",
                "data": {"prompt": "Press 1 or 2"},
                "optionsTarget": {"1": "playPrompt-1", "2": "transfer-1", "NI": "playPrompt-1", "NM": "end-1"},
                "popupDetails": {"menuoptions": "2", "Maxtries": "2", "SessionData": "x"}
            }),
            json!({"id": "playPrompt-1", "nodeType": "Play Prompt", "sourceLabel": "Hours", "target": "end-1", "data": {"TexttoSay": "We are open 9 to 5"}}),
            json!({"id": "transfer-1", "nodeType": "Destination Transfer", "sourceLabel": "Sales desk", "data": {"destinationNumber": "5501"}}),
            json!({"id": "end-1", "nodeType": "Disconnect", "sourceLabel": "Bye"}),
            json!({"id": "e2", "source": "playPrompt-1", "sourceLabel": "Hours", "target": "end-1"}),
            json!({"id": "c1", "nodeType": "Play Prompt", "sourceLabel": "Condition", "data": {"conditionValue": "vip"}}),
        ]
    }

    fn import_values(values: Vec<Value>) -> FlowGraph {
        import_flow(&LegacyRecord::parse_all(values).unwrap()).graph
    }

    fn menu_tables(graph: &FlowGraph) -> Vec<(String, OptionsTarget)> {
        graph.nodes.iter().filter_map(|n| n.menu().map(|m| (n.id.clone(), m.options_target.clone()))).collect()
    }

    fn edge_set(graph: &FlowGraph) -> BTreeSet<(String, String, Option<String>)> {
        graph.edges.iter().map(|e| (e.source.clone(), e.target.clone(), e.source_handle.clone())).collect()
    }

    fn round_trip(graph: &FlowGraph) -> FlowGraph {
        let (payload, _) = export_flow("Sales IVR", graph, Counters::new()).unwrap();
        let values = serde_json::to_value(&payload).unwrap();
        let Value::Object(mut body) = values else {
            panic!("payload is an object");
        };
        let items = flatten_payload(body.remove("lastData").unwrap()).unwrap();
        import_values(items)
    }

    #[test]
    fn test_round_trip_idempotent() {
        let first = import_values(legacy_flow());
        let second = round_trip(&first);

        assert_eq!(menu_tables(&first), menu_tables(&second));
        assert_eq!(edge_set(&first), edge_set(&second));
        assert_eq!(first.nodes.len(), second.nodes.len());
        for node in &first.nodes {
            let again = second.node(&node.id).unwrap();
            assert_eq!(again.kind(), node.kind(), "node {}", node.id);
            assert_eq!(again.payload, node.payload, "node {}", node.id);
            assert_eq!(again.label, node.label, "node {}", node.id);
        }

        let third = round_trip(&second);
        assert_eq!(edge_set(&second), edge_set(&third));
    }

    #[test]
    fn test_round_trip_from_payload_shapes() {
        let shaped = json!({"pagesData": {"Main": {"NodesData": legacy_flow(), "EdgesData": []}}});
        let graph = import_values(flatten_payload(shaped).unwrap());
        assert_eq!(edge_set(&graph), edge_set(&import_values(legacy_flow())));

        let text = Value::String(serde_json::to_string(&legacy_flow()).unwrap());
        let graph = import_values(flatten_payload(text).unwrap());
        assert_eq!(graph.nodes.len(), 6);
    }

    #[test]
    fn test_diagnostic_node_id() {
        let diagnostic = Diagnostic::UnknownNodeType {
            node_id: "q1".to_string(),
            node_type: "Queue".to_string(),
        };
        assert_eq!(diagnostic.node_id(), "q1");
        assert_eq!(diagnostic.as_ref(), "UnknownNodeType");
    }
}
