//! # ivrflow
//!
//! ivrflow transcodes IVR call-flow definitions between the flat record list
//! stored by a telephony backend and the typed node/edge graph edited in a
//! flow designer, and drives a flow through its lifecycle.
//!
//! ## Core Features
//!
//! - **Import**: Legacy records to a typed graph, with menu branches materialized as edges
//! - **Export**: Graph back to legacy records, rebuilding each menu's `optionsTarget`
//! - **Lifecycle**: Create, retrieve, save, deploy and delete flows against a backend
//! - **Pluggable Backend**: In-memory (testing) and HTTP (the console's REST endpoints)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ivrflow::FlowControllerBuilder;
//!
//! let mut controller = FlowControllerBuilder::new().build()?;
//! controller.create("Sales IVR").await?;
//!
//! // hand the graph to the editor, then save what it returns
//! let graph = controller.graph().clone();
//! controller.save("Sales IVR", graph).await?;
//! controller.deploy("Sales IVR").await?;
//! ```

mod backend;
mod builder;
mod config;
mod controller;
mod error;
mod model;
pub mod transcode;
mod utils;

use std::sync::{Arc, RwLock};

pub use backend::{FlowBackend, HttpBackend, MemBackend};
pub use builder::FlowControllerBuilder;
pub use config::{BackendConfig, BackendType, Config, HttpConfig};
pub use controller::{FlowController, FlowState};
pub use error::IvrFlowError;
pub use model::*;

/// Result type alias for ivrflow operations.
pub type Result<T> = std::result::Result<T, IvrFlowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
