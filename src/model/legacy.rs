//! Flat record list persisted by the telephony backend.
//!
//! A flow is one array mixing node records and edge records. Records are
//! told apart by the fields they carry, node records winning ties.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{IvrFlowError, Result, model::Position};

/// Node type vocabulary understood by the telephony backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display)]
pub enum BackendNodeType {
    Start,
    Menu,
    #[serde(rename = "Play Prompt")]
    #[strum(serialize = "Play Prompt")]
    PlayPrompt,
    #[serde(rename = "Destination Transfer")]
    #[strum(serialize = "Destination Transfer")]
    DestinationTransfer,
    Disconnect,
}

impl BackendNodeType {
    /// Maps an editor node type onto the backend vocabulary. Types the
    /// backend has no counterpart for are stored as "Play Prompt".
    pub fn from_graph_type(kind: &str) -> Self {
        match kind.trim().to_lowercase().as_str() {
            "start" | "input" => BackendNodeType::Start,
            "menu" | "output" => BackendNodeType::Menu,
            "playprompt" | "default" => BackendNodeType::PlayPrompt,
            "destination transfer" | "transfer" => BackendNodeType::DestinationTransfer,
            "end" | "disconnect" => BackendNodeType::Disconnect,
            _ => BackendNodeType::PlayPrompt,
        }
    }
}

/// A node record of the flat list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNodeRecord {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    pub node_type: String,
    /// Older exports carry the type here instead of `nodeType`.
    #[serde(rename = "type", default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    /// Sequence id assigned from the session counters.
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_object")]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_target: Option<Value>,
    #[serde(default, deserialize_with = "de_opt_object", skip_serializing_if = "Option::is_none")]
    pub popup_details: Option<Map<String, Value>>,
}

impl LegacyNodeRecord {
    /// The record's single fallback downstream id, empty when unset.
    pub fn fallback_target(&self) -> &str {
        self.target.as_deref().unwrap_or_default()
    }
}

/// An edge record of the flat list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEdgeRecord {
    #[serde(default, deserialize_with = "de_string")]
    pub id: String,
    pub source: String,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    /// `null` for dangling edges left behind by the editor.
    pub target: Option<String>,
}

/// One entry of the flat list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LegacyRecord {
    Node(LegacyNodeRecord),
    Edge(LegacyEdgeRecord),
}

impl LegacyRecord {
    /// Classifies and decodes one JSON item.
    ///
    /// Returns `Ok(None)` for items that are neither kind of record. An item
    /// recognized as a record but carrying undecodable fields is an error.
    pub fn from_value(value: Value) -> Result<Option<Self>> {
        if value.get("nodeType").is_some_and(Value::is_string) {
            let node = serde_json::from_value::<LegacyNodeRecord>(value).map_err(|e| IvrFlowError::MalformedPayload(format!("invalid node record: {}", e)))?;
            return Ok(Some(LegacyRecord::Node(node)));
        }

        let is_edge = value.get("source").is_some_and(Value::is_string) && matches!(value.get("target"), Some(Value::String(_)) | Some(Value::Null));
        if is_edge {
            let edge = serde_json::from_value::<LegacyEdgeRecord>(value).map_err(|e| IvrFlowError::MalformedPayload(format!("invalid edge record: {}", e)))?;
            return Ok(Some(LegacyRecord::Edge(edge)));
        }

        Ok(None)
    }

    /// Decodes a whole list, skipping items that are not records.
    pub fn parse_all(values: Vec<Value>) -> Result<Vec<Self>> {
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match Self::from_value(value)? {
                Some(record) => records.push(record),
                None => debug!("skip non-record item in flow data"),
            }
        }
        Ok(records)
    }

    pub fn as_node(&self) -> Option<&LegacyNodeRecord> {
        match self {
            LegacyRecord::Node(node) => Some(node),
            LegacyRecord::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&LegacyEdgeRecord> {
        match self {
            LegacyRecord::Edge(edge) => Some(edge),
            LegacyRecord::Node(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for LegacyRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match LegacyRecord::from_value(value).map_err(de::Error::custom)? {
            Some(record) => Ok(record),
            None => Err(de::Error::custom("item is neither a node nor an edge record")),
        }
    }
}

/// Body of a backend write: the flow name and its flat record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPayload {
    pub flow_name: String,
    pub last_data: Vec<LegacyRecord>,
}

impl FlowPayload {
    pub fn nodes(&self) -> impl Iterator<Item = &LegacyNodeRecord> {
        self.last_data.iter().filter_map(LegacyRecord::as_node)
    }

    pub fn edges(&self) -> impl Iterator<Item = &LegacyEdgeRecord> {
        self.last_data.iter().filter_map(LegacyRecord::as_edge)
    }
}

/// Scalar JSON value as text. The backend is loose about numbers vs strings.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(de_opt_string(deserializer)?.unwrap_or_default())
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

fn de_object<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error> {
    Ok(de_opt_object(deserializer)?.unwrap_or_default())
}

fn de_opt_object<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Map<String, Value>>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(de::Error::custom(format!("expected an object, found {}", other))),
    }
}
