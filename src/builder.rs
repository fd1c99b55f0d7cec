use std::sync::Arc;

use crate::{
    BackendType, Config, FlowController, IvrFlowError, Result,
    backend::{FlowBackend, HttpBackend, MemBackend},
};

#[derive(Default)]
pub struct FlowControllerBuilder {
    config: Config,
    backend: Option<Arc<dyn FlowBackend>>,
}

impl FlowControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Uses `backend` instead of the one named in the config.
    pub fn backend(
        mut self,
        backend: Arc<dyn FlowBackend>,
    ) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(&self) -> Result<FlowController> {
        let backend: Arc<dyn FlowBackend> = match &self.backend {
            Some(backend) => backend.clone(),
            None => match self.config.backend.backend_type {
                BackendType::Mem => Arc::new(MemBackend::new()),
                BackendType::Http => {
                    let http = self.config.backend.http.as_ref().ok_or_else(|| IvrFlowError::Config("missing [backend.http] config".to_string()))?;
                    Arc::new(HttpBackend::new(http)?)
                }
            },
        };

        Ok(FlowController::new(backend))
    }
}
