//! Typed node/edge graph exchanged with the flow-graph editor.
//!
//! On the wire a node is `{id, type, position, data}`: the editor keys its
//! renderers on `type` and reads every field from `data`. In Rust, `type` and
//! the kind-specific part of `data` are one value, [`NodePayload`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    IvrFlowError, Result,
    model::{MAX_MENU_OPTIONS, OptionKey, OptionsTarget},
};

/// Editor node type.
///
/// Parsing is case-insensitive; unrecognized names are kept as given in
/// [`NodeKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::EnumString)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum NodeKind {
    Start,
    Menu,
    PlayPrompt,
    End,
    Condition,
    Variable,
    Webhook,
    Transfer,
    DigitsCollection,
    #[strum(default)]
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Menu => "menu",
            NodeKind::PlayPrompt => "playPrompt",
            NodeKind::End => "end",
            NodeKind::Condition => "condition",
            NodeKind::Variable => "variable",
            NodeKind::Webhook => "webhook",
            NodeKind::Transfer => "transfer",
            NodeKind::DigitsCollection => "digitsCollection",
            NodeKind::Other(kind) => kind,
        }
    }

    /// Label given to a node of this kind when the source has none.
    pub fn display_name(&self) -> &str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Menu => "Menu",
            NodeKind::PlayPrompt => "Play Prompt",
            NodeKind::End => "End",
            NodeKind::Condition => "Condition",
            NodeKind::Variable => "Variable",
            NodeKind::Webhook => "Webhook",
            NodeKind::Transfer => "Transfer",
            NodeKind::DigitsCollection => "Digits Collection",
            NodeKind::Other(kind) => kind,
        }
    }

    /// Kinds the backend stores as "Play Prompt" records and only the
    /// editor distinguishes.
    pub fn is_designer_only(&self) -> bool {
        matches!(self, NodeKind::Condition | NodeKind::Variable | NodeKind::Webhook | NodeKind::DigitsCollection)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(
        x: f64,
        y: f64,
    ) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartData {
    pub welcome_message: String,
    pub prompt: String,
}

impl Default for StartData {
    fn default() -> Self {
        Self {
            welcome_message: "Welcome".to_string(),
            prompt: "Welcome to the IVR".to_string(),
        }
    }
}

/// Menu configuration mirror kept in `popupDetails`.
///
/// Fields the console does not interpret (`SessionData`, `Operation`, ...)
/// are carried in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuPopup {
    #[serde(rename = "menuoptions")]
    pub menu_options: String,
    #[serde(rename = "Maxtries")]
    pub max_tries: String,
    #[serde(rename = "TexttoSay")]
    pub text_to_say: String,
    #[serde(rename = "NoinputTTS")]
    pub no_input_tts: String,
    #[serde(rename = "NomatchTTS")]
    pub no_match_tts: String,
    #[serde(rename = "initialAudio")]
    pub initial_audio: Option<Value>,
    #[serde(rename = "NoinputAudio")]
    pub no_input_audio: Option<Value>,
    #[serde(rename = "NomatchAudio")]
    pub no_match_audio: Option<Value>,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "optionsTarget")]
    pub options_target: OptionsTarget,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MenuPopup {
    fn default() -> Self {
        Self {
            menu_options: "1".to_string(),
            max_tries: "3".to_string(),
            text_to_say: "Select an option".to_string(),
            no_input_tts: "No input".to_string(),
            no_match_tts: "Invalid".to_string(),
            initial_audio: None,
            no_input_audio: None,
            no_match_audio: None,
            channel: String::new(),
            options_target: OptionsTarget::new(),
            extra: Map::new(),
        }
    }
}

impl MenuPopup {
    /// Declared option count, when `menuoptions` holds a positive number,
    /// capped at [`MAX_MENU_OPTIONS`].
    pub fn declared_options(&self) -> Option<u32> {
        self.menu_options.trim().parse::<u32>().ok().filter(|n| *n > 0).map(|n| n.min(MAX_MENU_OPTIONS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MenuData {
    pub prompt: String,
    /// Numeric option keys in ascending order.
    pub options: Vec<OptionKey>,
    pub options_target: OptionsTarget,
    pub popup_details: MenuPopup,
}

impl Default for MenuData {
    fn default() -> Self {
        Self {
            prompt: "Please select an option".to_string(),
            options: Vec::new(),
            options_target: OptionsTarget::new(),
            popup_details: MenuPopup::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptData {
    pub text: String,
    pub prompt_type: String,
    pub audio_file: Option<Value>,
}

impl Default for PromptData {
    fn default() -> Self {
        Self {
            text: "Enter your message here".to_string(),
            prompt_type: "text".to_string(),
            audio_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndData {
    pub end_type: String,
}

impl Default for EndData {
    fn default() -> Self {
        Self {
            end_type: "Disconnect".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionData {
    pub condition_type: String,
    pub condition_value: String,
    pub yes_target: String,
    pub no_target: String,
}

impl Default for ConditionData {
    fn default() -> Self {
        Self {
            condition_type: "Condition".to_string(),
            condition_value: String::new(),
            yes_target: String::new(),
            no_target: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariableData {
    pub variable_name: String,
    pub variable_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookData {
    pub webhook_url: String,
    pub http_method: String,
}

impl Default for WebhookData {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            http_method: "POST".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferData {
    pub transfer_type: String,
    pub transfer_number: String,
    pub destination_number: String,
}

impl Default for TransferData {
    fn default() -> Self {
        Self {
            transfer_type: "blind".to_string(),
            transfer_number: String::new(),
            destination_number: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DigitsData {
    pub min_digits: u32,
    pub max_digits: u32,
    pub terminator_key: String,
}

impl Default for DigitsData {
    fn default() -> Self {
        Self {
            min_digits: 1,
            max_digits: 10,
            terminator_key: "#".to_string(),
        }
    }
}

/// Kind-specific node payload, one variant per [`NodeKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    Start(StartData),
    Menu(MenuData),
    PlayPrompt(PromptData),
    End(EndData),
    Condition(ConditionData),
    Variable(VariableData),
    Webhook(WebhookData),
    Transfer(TransferData),
    DigitsCollection(DigitsData),
    /// A node type this crate does not know, kept with its raw data.
    Other {
        kind: String,
        data: Map<String, Value>,
    },
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Start(_) => NodeKind::Start,
            NodePayload::Menu(_) => NodeKind::Menu,
            NodePayload::PlayPrompt(_) => NodeKind::PlayPrompt,
            NodePayload::End(_) => NodeKind::End,
            NodePayload::Condition(_) => NodeKind::Condition,
            NodePayload::Variable(_) => NodeKind::Variable,
            NodePayload::Webhook(_) => NodeKind::Webhook,
            NodePayload::Transfer(_) => NodeKind::Transfer,
            NodePayload::DigitsCollection(_) => NodeKind::DigitsCollection,
            NodePayload::Other { kind, .. } => NodeKind::Other(kind.clone()),
        }
    }

    /// Payload of `kind` with every field at its default.
    pub fn default_for(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Start => NodePayload::Start(StartData::default()),
            NodeKind::Menu => NodePayload::Menu(MenuData::default()),
            NodeKind::PlayPrompt => NodePayload::PlayPrompt(PromptData::default()),
            NodeKind::End => NodePayload::End(EndData::default()),
            NodeKind::Condition => NodePayload::Condition(ConditionData::default()),
            NodeKind::Variable => NodePayload::Variable(VariableData::default()),
            NodeKind::Webhook => NodePayload::Webhook(WebhookData::default()),
            NodeKind::Transfer => NodePayload::Transfer(TransferData::default()),
            NodeKind::DigitsCollection => NodePayload::DigitsCollection(DigitsData::default()),
            NodeKind::Other(kind) => NodePayload::Other {
                kind: kind.clone(),
                data: Map::new(),
            },
        }
    }

    /// Kind-specific fields as a JSON object.
    pub fn fields(&self) -> Result<Map<String, Value>> {
        let value = match self {
            NodePayload::Start(d) => serde_json::to_value(d)?,
            NodePayload::Menu(d) => serde_json::to_value(d)?,
            NodePayload::PlayPrompt(d) => serde_json::to_value(d)?,
            NodePayload::End(d) => serde_json::to_value(d)?,
            NodePayload::Condition(d) => serde_json::to_value(d)?,
            NodePayload::Variable(d) => serde_json::to_value(d)?,
            NodePayload::Webhook(d) => serde_json::to_value(d)?,
            NodePayload::Transfer(d) => serde_json::to_value(d)?,
            NodePayload::DigitsCollection(d) => serde_json::to_value(d)?,
            NodePayload::Other { data, .. } => Value::Object(data.clone()),
        };
        match value {
            Value::Object(map) => Ok(map),
            other => Err(IvrFlowError::Convert(format!("node payload is not an object: {}", other))),
        }
    }

    fn from_fields(
        kind: &NodeKind,
        mut fields: Map<String, Value>,
    ) -> Result<Self> {
        if let NodeKind::Other(kind) = kind {
            for key in COMMON_KEYS {
                fields.remove(*key);
            }
            return Ok(NodePayload::Other {
                kind: kind.clone(),
                data: fields,
            });
        }

        let value = Value::Object(fields);
        let payload = match kind {
            NodeKind::Start => NodePayload::Start(serde_json::from_value(value)?),
            NodeKind::Menu => NodePayload::Menu(serde_json::from_value(value)?),
            NodeKind::PlayPrompt => NodePayload::PlayPrompt(serde_json::from_value(value)?),
            NodeKind::End => NodePayload::End(serde_json::from_value(value)?),
            NodeKind::Condition => NodePayload::Condition(serde_json::from_value(value)?),
            NodeKind::Variable => NodePayload::Variable(serde_json::from_value(value)?),
            NodeKind::Webhook => NodePayload::Webhook(serde_json::from_value(value)?),
            NodeKind::Transfer => NodePayload::Transfer(serde_json::from_value(value)?),
            NodeKind::DigitsCollection => NodePayload::DigitsCollection(serde_json::from_value(value)?),
            NodeKind::Other(_) => NodePayload::default_for(kind),
        };
        Ok(payload)
    }
}

const COMMON_KEYS: &[&str] = &["label", "target", "description", "type"];

/// A node of the editor graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGraphNode", into = "RawGraphNode")]
pub struct GraphNode {
    /// Stable across both representations.
    pub id: String,
    pub position: Position,
    pub label: String,
    /// Single fallback downstream node id, empty when unset.
    pub target: String,
    pub description: String,
    pub payload: NodePayload,
}

impl GraphNode {
    pub fn new(
        id: impl Into<String>,
        payload: NodePayload,
    ) -> Self {
        let label = payload.kind().display_name().to_string();
        Self {
            id: id.into(),
            position: Position::default(),
            label,
            target: String::new(),
            description: String::new(),
            payload,
        }
    }

    pub fn with_position(
        mut self,
        position: Position,
    ) -> Self {
        self.position = position;
        self
    }

    pub fn with_label(
        mut self,
        label: impl Into<String>,
    ) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_target(
        mut self,
        target: impl Into<String>,
    ) -> Self {
        self.target = target.into();
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn menu(&self) -> Option<&MenuData> {
        match &self.payload {
            NodePayload::Menu(menu) => Some(menu),
            _ => None,
        }
    }

    pub fn is_menu(&self) -> bool {
        self.menu().is_some()
    }
}

#[derive(Serialize, Deserialize)]
struct RawGraphNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    data: Map<String, Value>,
}

impl TryFrom<RawGraphNode> for GraphNode {
    type Error = IvrFlowError;

    fn try_from(raw: RawGraphNode) -> Result<Self> {
        let kind = NodeKind::from_str(&raw.kind).map_err(|e| IvrFlowError::Convert(format!("invalid node type '{}': {}", raw.kind, e)))?;
        let text = |key: &str| raw.data.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let label = text("label");
        let target = text("target");
        let description = text("description");
        let payload = NodePayload::from_fields(&kind, raw.data)?;

        Ok(GraphNode {
            id: raw.id,
            position: raw.position,
            label,
            target,
            description,
            payload,
        })
    }
}

impl From<GraphNode> for RawGraphNode {
    fn from(node: GraphNode) -> Self {
        // Every payload struct serializes to an object; fall back to the
        // common fields alone rather than panic if that ever changes.
        let mut data = node.payload.fields().unwrap_or_default();
        let kind = node.payload.kind().as_str().to_string();
        data.insert("label".to_string(), Value::String(node.label));
        data.insert("target".to_string(), Value::String(node.target));
        data.insert("description".to_string(), Value::String(node.description));
        data.insert("type".to_string(), Value::String(kind.clone()));

        RawGraphNode {
            id: node.id,
            kind,
            position: node.position,
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default)]
    pub label: String,
}

/// A directed connection between two graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Output port of the source node; set on menu-originated edges only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub data: EdgeData,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            data: EdgeData::default(),
        }
    }

    pub fn with_handle(
        mut self,
        handle: impl Into<String>,
    ) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn with_label(
        mut self,
        label: impl Into<String>,
    ) -> Self {
        self.data.label = label.into();
        self
    }
}

/// The editor's whole graph. Always replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl FlowGraph {
    pub fn new(
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(
        &self,
        id: &str,
    ) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges leaving `id`, in graph order.
    pub fn outgoing<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }
}
