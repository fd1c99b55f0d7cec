//! Legacy node normalization.
//!
//! Turns one backend node record into a typed [`GraphNode`]. The backend
//! vocabulary is small and overloaded: "Play Prompt" also stands for the
//! designer-only kinds, which are told apart by the record's label.

use std::sync::LazyLock;

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    model::{
        ConditionData, DigitsData, EndData, GraphNode, LegacyNodeRecord, MenuData, MenuPopup, NodeKind, NodePayload, PromptData, StartData, TransferData, VariableData,
        WebhookData, scalar_text,
    },
    transcode::{Diagnostic, branch::resolve_menu_options},
};

/// Popup fields rebuilt on export; never carried in `MenuPopup::extra`.
const MENU_POPUP_KEYS: &[&str] = &[
    "id",
    "Menuname",
    "menuoptions",
    "Maxtries",
    "TexttoSay",
    "NoinputTTS",
    "NomatchTTS",
    "initialAudio",
    "NoinputAudio",
    "NomatchAudio",
    "Channel",
    "optionsTarget",
];

static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// Result of normalizing one record.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub node: GraphNode,
    pub diagnostic: Option<Diagnostic>,
}

/// Normalizes a backend node record. Never fails: unknown types are kept
/// and reported through [`Normalized::diagnostic`].
pub fn normalize(record: &LegacyNodeRecord) -> Normalized {
    let raw_type = raw_node_type(record);
    let mut diagnostic = None;

    let kind = match classify(&raw_type) {
        Some(NodeKind::Other(kind)) => {
            warn!("node {}: unknown node type '{}', keeping it as '{}'", record.id, raw_type, kind);
            diagnostic = Some(Diagnostic::UnknownNodeType {
                node_id: record.id.clone(),
                node_type: raw_type.clone(),
            });
            NodeKind::Other(kind)
        }
        Some(kind) => kind,
        None => {
            warn!("node {}: record carries no node type, treating it as a prompt", record.id);
            diagnostic = Some(Diagnostic::MissingNodeType {
                node_id: record.id.clone(),
            });
            NodeKind::PlayPrompt
        }
    };
    let kind = disambiguate(kind, record);

    let label = [record.source_label.as_deref(), record.data.get("label").and_then(Value::as_str)]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(kind.display_name())
        .to_string();
    let description = record.description.clone().or_else(|| Fields::new(record).data(&["description"])).unwrap_or_default();

    let node = GraphNode {
        id: record.id.clone(),
        position: record.position.unwrap_or_default(),
        label,
        target: record.fallback_target().to_string(),
        description,
        payload: build_payload(&kind, record),
    };

    Normalized { node, diagnostic }
}

/// Type from `nodeType`, then `data.type`, then the legacy `type` field.
fn raw_node_type(record: &LegacyNodeRecord) -> String {
    [Some(record.node_type.as_str()), record.data.get("type").and_then(Value::as_str), record.legacy_type.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Maps a backend (or editor) type name onto a [`NodeKind`].
pub(crate) fn classify(raw_type: &str) -> Option<NodeKind> {
    let lowered = raw_type.trim().to_lowercase();
    let kind = match lowered.as_str() {
        "" => return None,
        "input" | "start" => NodeKind::Start,
        "menu" => NodeKind::Menu,
        "play prompt" | "playprompt" | "default" => NodeKind::PlayPrompt,
        "disconnect" | "output" | "end" => NodeKind::End,
        "destination transfer" | "transfer" => NodeKind::Transfer,
        "condition" => NodeKind::Condition,
        "variable" => NodeKind::Variable,
        "webhook" => NodeKind::Webhook,
        "digitscollection" | "digits collection" => NodeKind::DigitsCollection,
        _ => NodeKind::Other(lowered),
    };
    Some(kind)
}

/// A "Play Prompt" record labelled as a designer-only kind is that kind.
fn disambiguate(
    kind: NodeKind,
    record: &LegacyNodeRecord,
) -> NodeKind {
    if kind != NodeKind::PlayPrompt {
        return kind;
    }

    let labels = [record.source_label.as_deref(), record.data.get("label").and_then(Value::as_str)];
    labels
        .into_iter()
        .flatten()
        .find_map(|label| match label.trim().to_lowercase().as_str() {
            "condition" => Some(NodeKind::Condition),
            "digitscollection" | "digits collection" => Some(NodeKind::DigitsCollection),
            "transfer" => Some(NodeKind::Transfer),
            "variable" => Some(NodeKind::Variable),
            "webhook" => Some(NodeKind::Webhook),
            _ => None,
        })
        .unwrap_or(kind)
}

fn build_payload(
    kind: &NodeKind,
    record: &LegacyNodeRecord,
) -> NodePayload {
    let f = Fields::new(record);

    match kind {
        NodeKind::Start => {
            let d = StartData::default();
            NodePayload::Start(StartData {
                welcome_message: f.data(&["welcomeMessage"]).or_else(|| f.popup(&["welcomeMessage"])).unwrap_or(d.welcome_message),
                prompt: f.data(&["prompt"]).or_else(|| f.popup(&["prompt"])).unwrap_or(d.prompt),
            })
        }
        NodeKind::Menu => NodePayload::Menu(menu_payload(record, &f)),
        NodeKind::PlayPrompt => {
            let d = PromptData::default();
            NodePayload::PlayPrompt(PromptData {
                text: f.data(&["TexttoSay", "text", "textToSay"]).or_else(|| f.popup(&["TexttoSay"])).unwrap_or(d.text),
                prompt_type: f.data(&["promptType"]).or_else(|| f.popup(&["promptType"])).unwrap_or(d.prompt_type),
                audio_file: f.data_audio(&["audioFile"]).or_else(|| f.popup_audio(&["initialAudio"])),
            })
        }
        NodeKind::End => NodePayload::End(EndData {
            end_type: f.data(&["endType"]).or_else(|| f.popup(&["endType"])).unwrap_or(EndData::default().end_type),
        }),
        NodeKind::Condition => {
            let d = ConditionData::default();
            NodePayload::Condition(ConditionData {
                condition_type: f.data(&["conditionType"]).unwrap_or(d.condition_type),
                condition_value: f.data(&["conditionValue"]).unwrap_or(d.condition_value),
                yes_target: f.data(&["yesTarget"]).unwrap_or(d.yes_target),
                no_target: f.data(&["noTarget", "noMatchTarget"]).unwrap_or(d.no_target),
            })
        }
        NodeKind::Variable => NodePayload::Variable(VariableData {
            variable_name: f.data(&["variableName"]).unwrap_or_default(),
            variable_value: f.data(&["variableValue"]).unwrap_or_default(),
        }),
        NodeKind::Webhook => {
            let d = WebhookData::default();
            NodePayload::Webhook(WebhookData {
                webhook_url: f.data(&["webhookUrl", "url"]).or_else(|| f.popup(&["url"])).unwrap_or(d.webhook_url),
                http_method: f.data(&["httpMethod"]).unwrap_or(d.http_method),
            })
        }
        NodeKind::Transfer => {
            let d = TransferData::default();
            NodePayload::Transfer(TransferData {
                transfer_type: f.data(&["transferType"]).unwrap_or(d.transfer_type),
                transfer_number: f.data(&["transferNumber"]).unwrap_or(d.transfer_number),
                destination_number: f.data(&["destinationNumber"]).or_else(|| f.popup(&["destinationNumber"])).unwrap_or(d.destination_number),
            })
        }
        NodeKind::DigitsCollection => {
            let d = DigitsData::default();
            NodePayload::DigitsCollection(DigitsData {
                min_digits: f.data_number(&["minDigits", "MinDigits"]).unwrap_or(d.min_digits),
                max_digits: f.data_number(&["maxDigits", "MaxDigits"]).unwrap_or(d.max_digits),
                terminator_key: f.data(&["terminatorKey"]).unwrap_or(d.terminator_key),
            })
        }
        NodeKind::Other(kind) => {
            let mut data = record.data.clone();
            for key in ["label", "type", "target", "description"] {
                data.remove(key);
            }
            NodePayload::Other { kind: kind.clone(), data }
        }
    }
}

fn menu_payload(
    record: &LegacyNodeRecord,
    f: &Fields<'_>,
) -> MenuData {
    let branches = resolve_menu_options(record);
    let d = MenuPopup::default();

    let extra = f.popup.iter().filter(|(key, _)| !MENU_POPUP_KEYS.contains(&key.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect();

    let popup_details = MenuPopup {
        menu_options: branches.option_count.to_string(),
        max_tries: f.popup(&["Maxtries"]).or_else(|| f.data(&["Maxtries", "maxTries"])).unwrap_or(d.max_tries),
        text_to_say: f.popup(&["TexttoSay"]).or_else(|| f.data(&["TexttoSay", "textToSay"])).unwrap_or(d.text_to_say),
        no_input_tts: f.popup(&["NoinputTTS"]).or_else(|| f.data(&["NoinputTTS", "noInputTTS"])).unwrap_or(d.no_input_tts),
        no_match_tts: f.popup(&["NomatchTTS"]).or_else(|| f.data(&["NomatchTTS", "noMatchTTS"])).unwrap_or(d.no_match_tts),
        initial_audio: f.popup_audio(&["initialAudio"]).or_else(|| f.data_audio(&["audioFile"])),
        no_input_audio: f.popup_audio(&["NoinputAudio"]).or_else(|| f.data_audio(&["noInputAudio"])),
        no_match_audio: f.popup_audio(&["NomatchAudio"]).or_else(|| f.data_audio(&["noMatchAudio"])),
        channel: f.popup(&["Channel"]).unwrap_or(d.channel),
        options_target: branches.options_target.clone(),
        extra,
    };

    MenuData {
        prompt: f.data(&["prompt", "TexttoSay"]).unwrap_or(MenuData::default().prompt),
        options: branches.options,
        options_target: branches.options_target,
        popup_details,
    }
}

/// Field lookup over a record's `data` and `popupDetails`.
///
/// Empty strings count as missing.
struct Fields<'a> {
    data: &'a Map<String, Value>,
    popup: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(record: &'a LegacyNodeRecord) -> Self {
        Self {
            data: &record.data,
            popup: record.popup_details.as_ref().unwrap_or(&*EMPTY),
        }
    }

    fn data(
        &self,
        keys: &[&str],
    ) -> Option<String> {
        text_of(self.data, keys)
    }

    fn popup(
        &self,
        keys: &[&str],
    ) -> Option<String> {
        text_of(self.popup, keys)
    }

    fn data_number(
        &self,
        keys: &[&str],
    ) -> Option<u32> {
        keys.iter().filter_map(|k| self.data.get(*k)).filter_map(scalar_text).find_map(|s| s.trim().parse::<u32>().ok().filter(|n| *n > 0))
    }

    fn data_audio(
        &self,
        keys: &[&str],
    ) -> Option<Value> {
        audio_of(self.data, keys)
    }

    fn popup_audio(
        &self,
        keys: &[&str],
    ) -> Option<Value> {
        audio_of(self.popup, keys)
    }
}

fn text_of(
    map: &Map<String, Value>,
    keys: &[&str],
) -> Option<String> {
    keys.iter().filter_map(|k| map.get(*k)).filter_map(scalar_text).find(|s| !s.is_empty())
}

/// Audio references are opaque; any non-null, non-empty value is kept as is.
fn audio_of(
    map: &Map<String, Value>,
    keys: &[&str],
) -> Option<Value> {
    keys.iter().filter_map(|k| map.get(*k)).find(|v| !v.is_null() && v.as_str() != Some("")).cloned()
}
