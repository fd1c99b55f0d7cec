use serde::{Deserialize, Serialize};

use crate::model::{BackendNodeType, NodeKind};

/// Per-session sequence counters, one per node family.
///
/// Each exported node record takes the current value of its family's counter
/// as its `source` sequence id, then the counter moves on. Values are never
/// handed out twice within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub menu_counter: u32,
    pub audio_counter: u32,
    pub exit_counter: u32,
    pub entry_counter: u32,
    pub digits_counter: u32,
    pub transfer_counter: u32,
    pub application_modifier_counter: u32,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            menu_counter: 1,
            audio_counter: 1,
            exit_counter: 1,
            entry_counter: 1,
            digits_counter: 1,
            transfer_counter: 1,
            application_modifier_counter: 1,
        }
    }
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence id for `node_type` and advances its counter.
    pub fn next(
        &mut self,
        node_type: BackendNodeType,
    ) -> u32 {
        let counter = match node_type {
            BackendNodeType::Start => &mut self.entry_counter,
            BackendNodeType::Menu => &mut self.menu_counter,
            BackendNodeType::PlayPrompt => &mut self.audio_counter,
            BackendNodeType::DestinationTransfer => &mut self.transfer_counter,
            BackendNodeType::Disconnect => &mut self.exit_counter,
        };
        Self::advance(counter)
    }

    /// Allocates an editor node id such as `menu-3` for a new node of `kind`.
    ///
    /// Designer-only kinds without a backend counterpart draw from the
    /// digits-collection or generic-modifier counters. Only safe on counters
    /// that have not been reset under an imported graph, since a fresh counter
    /// hands out ids like `menu-1` that the graph may already hold.
    pub(crate) fn allocate_id(
        &mut self,
        kind: &NodeKind,
    ) -> String {
        let counter = match kind {
            NodeKind::Start => &mut self.entry_counter,
            NodeKind::Menu => &mut self.menu_counter,
            NodeKind::PlayPrompt => &mut self.audio_counter,
            NodeKind::End => &mut self.exit_counter,
            NodeKind::Transfer => &mut self.transfer_counter,
            NodeKind::DigitsCollection => &mut self.digits_counter,
            NodeKind::Condition | NodeKind::Variable | NodeKind::Webhook | NodeKind::Other(_) => &mut self.application_modifier_counter,
        };
        let n = Self::advance(counter);
        format!("{}-{}", kind.as_str(), n)
    }

    fn advance(counter: &mut u32) -> u32 {
        let value = (*counter).max(1);
        *counter = value + 1;
        value
    }
}
