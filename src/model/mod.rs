mod counters;
mod graph;
mod legacy;
mod options;

pub use counters::Counters;
pub use graph::*;
pub use legacy::{BackendNodeType, FlowPayload, LegacyEdgeRecord, LegacyNodeRecord, LegacyRecord};
pub(crate) use legacy::scalar_text;
pub use options::{MAX_MENU_OPTIONS, OptionKey, OptionsTarget};
