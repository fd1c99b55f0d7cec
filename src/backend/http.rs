use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{IvrFlowError, Result, backend::FlowBackend, config::HttpConfig, model::FlowPayload};

/// Backend speaking the console's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(IvrFlowError::Config("http backend requires a base_url".to_string()));
        }
        let client = Client::builder().timeout(Duration::from_millis(config.timeout)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> RequestBuilder {
        self.client.request(method, format!("{}/{}", self.base_url, path))
    }

    /// Sends `request` and maps non-2xx answers to [`IvrFlowError::Backend`].
    async fn send(
        &self,
        request: RequestBuilder,
    ) -> Result<Response> {
        let res = request.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        warn!("backend answered {}: {}", status, body);
        Err(status_error(status, &body))
    }

    async fn send_json(
        &self,
        request: RequestBuilder,
    ) -> Result<Value> {
        let res = self.send(request).await?;
        let text = res.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Parses a retrieve answer. A body that is not JSON is a malformed flow.
fn flow_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| IvrFlowError::MalformedPayload(format!("flow data is not valid JSON: {}", e)))
}

/// 400-class answers carry the backend's own message, preferably in an
/// `error` field; anything else gets a generic message.
fn status_error(
    status: StatusCode,
    body: &str,
) -> IvrFlowError {
    let code = status.as_u16();
    if !status.is_client_error() {
        return IvrFlowError::backend(Some(code), format!("request failed with status {}", status));
    }

    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("request failed with status {}", status),
    };
    IvrFlowError::backend(Some(code), message)
}

#[async_trait]
impl FlowBackend for HttpBackend {
    async fn list_flows(&self) -> Result<Vec<String>> {
        let value = self.send_json(self.request(Method::GET, "project_list")).await?;
        Ok(super::parse_project_list(&value))
    }

    async fn flow_name_exists(
        &self,
        name: &str,
    ) -> Result<bool> {
        let value = self.send_json(self.request(Method::POST, "check-flow-name").json(&json!({ "flowName": name }))).await?;
        Ok(value.get("exists").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn fetch_flow(
        &self,
        name: &str,
    ) -> Result<Value> {
        debug!("fetch flow '{}'", name);
        let res = self.send(self.request(Method::POST, "retrieve_flow_data").json(&json!({ "flowName": name }))).await?;
        flow_body(&res.text().await?)
    }

    async fn write_flow(
        &self,
        payload: &FlowPayload,
    ) -> Result<()> {
        debug!("save flow '{}' with {} records", payload.flow_name, payload.last_data.len());
        self.send(self.request(Method::PUT, "save-flow").json(payload)).await?;
        Ok(())
    }

    async fn deploy_flow(
        &self,
        name: &str,
    ) -> Result<()> {
        self.send(self.request(Method::POST, "deploy").json(&json!({ "flowName": name }))).await?;
        Ok(())
    }

    async fn delete_flow(
        &self,
        name: &str,
    ) -> Result<()> {
        self.send(self.request(Method::DELETE, "deleteFlow").json(&json!({ "flowName": name }))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_client_error_message_verbatim() {
        let err = status_error(StatusCode::BAD_REQUEST, r#"{"error": "Flow name already exists in deployment"}"#);
        assert_eq!(err, IvrFlowError::backend(Some(400), "Flow name already exists in deployment"));

        let err = status_error(StatusCode::NOT_FOUND, "no such flow");
        assert_eq!(err, IvrFlowError::backend(Some(404), "no such flow"));
    }

    #[test]
    fn test_server_error_generic() {
        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error": "stack trace"}"#);
        let IvrFlowError::Backend { status, message } = err else {
            panic!("expected backend error");
        };
        assert_eq!(status, Some(500));
        assert!(!message.contains("stack trace"));
    }

    #[test]
    fn test_flow_body() {
        assert_eq!(flow_body(r#"{"flowName": "f", "lastData": []}"#).unwrap(), json!({"flowName": "f", "lastData": []}));
        assert_eq!(flow_body("  ").unwrap(), Value::Null);

        let err = flow_body("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, IvrFlowError::MalformedPayload(_)));
    }

    #[test]
    fn test_base_url_required() {
        let config = HttpConfig {
            base_url: " ".to_string(),
            timeout: 1000,
        };
        assert!(matches!(HttpBackend::new(&config), Err(IvrFlowError::Config(_))));

        let config = HttpConfig {
            base_url: "http://localhost:5000/".to_string(),
            timeout: 1000,
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://localhost:5000");
    }
}
