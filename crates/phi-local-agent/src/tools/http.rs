//! Fetches a URL reachable from this machine (intranet dashboards, WMS exports).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolError};

/// Payload: `{url, headers?}`. Relative URLs are joined onto
/// `settings.base_url`. Returns `{status, body}` with a JSON body when the
/// response parses as JSON, text otherwise.
pub struct HttpTool {
    inner: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTool {
    pub fn from_settings(settings: &Value) -> Result<Self, ToolError> {
        let timeout = settings
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(30);
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;
        let base_url = settings
            .get("base_url")
            .and_then(Value::as_str)
            .map(|u| u.trim_end_matches('/').to_string());
        Ok(Self { inner, base_url })
    }

    fn url(&self, target: &str) -> Result<String, ToolError> {
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(target.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base, target.trim_start_matches('/'))),
            None => Err(ToolError::InvalidPayload(format!(
                "relative url '{target}' needs a base_url setting"
            ))),
        }
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, payload: &Value) -> Result<Value, ToolError> {
        let target = payload
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidPayload("url is required".into()))?;
        let url = self.url(target)?;

        let mut request = self.inner.get(&url);
        if let Some(headers) = payload.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(json!({ "status": status, "body": body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_resolution() {
        let tool = HttpTool::from_settings(&json!({ "base_url": "http://wms.local/api/" })).unwrap();
        assert_eq!(tool.url("/orders").unwrap(), "http://wms.local/api/orders");
        assert_eq!(tool.url("https://x.test/a").unwrap(), "https://x.test/a");

        let bare = HttpTool::from_settings(&Value::Null).unwrap();
        assert!(matches!(bare.url("orders"), Err(ToolError::InvalidPayload(_))));
    }
}
