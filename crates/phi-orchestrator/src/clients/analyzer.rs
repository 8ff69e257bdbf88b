//! LLM analysis of warehouse data.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Errors from an analyzer.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response had no content")]
    EmptyResponse,
}

/// Input to one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub system_prompt: String,
    pub prompt: String,
    /// Structured data the prompt was built from.
    pub data: Value,
    /// Context snippets already embedded in the prompt.
    pub context: Vec<String>,
}

/// Result of one analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub content: String,
    pub tokens_used: u64,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalyzerError>;
}

/// OpenAI-compatible chat completions analyzer.
pub struct OpenAiAnalyzer {
    inner: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAnalyzer {
    pub const TEMPERATURE: f64 = 0.2;

    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, AnalyzerError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalyzerError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, "Calling chat completions");

        let body = json!({
            "model": self.model,
            "temperature": Self::TEMPERATURE,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.prompt },
            ],
        });

        let response = self
            .inner
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AnalyzerError::EmptyResponse)?;

        Ok(Analysis {
            content,
            tokens_used: chat.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

/// Offline analyzer that summarises the data without calling a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestAnalyzer;

#[async_trait]
impl Analyzer for DigestAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalyzerError> {
        let data = &request.data;
        let mut lines = vec!["### Key metrics".to_string()];

        if let Some(fields) = data.as_object() {
            for (key, value) in fields {
                if let Some(n) = value.as_f64() {
                    lines.push(format!("- {key}: {n}"));
                }
            }
        }

        if let Some(anomalies) = data.get("anomalies").and_then(Value::as_array) {
            if !anomalies.is_empty() {
                lines.push(String::new());
                lines.push("### Anomalies".to_string());
                for anomaly in anomalies {
                    let kind = anomaly.get("type").and_then(Value::as_str).unwrap_or("unknown");
                    let count = anomaly.get("count").and_then(Value::as_u64).unwrap_or(0);
                    lines.push(format!("- {kind}: {count}"));
                }
            }
        }

        if let Some(bottlenecks) = data.get("bottlenecks").and_then(Value::as_array) {
            let names: Vec<&str> = bottlenecks.iter().filter_map(Value::as_str).collect();
            if !names.is_empty() {
                lines.push(String::new());
                lines.push(format!("### Bottlenecks\n- {}", names.join("\n- ")));
            }
        }

        if !request.context.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "Reviewed against {} reference document(s).",
                request.context.len()
            ));
        }

        Ok(Analysis {
            content: lines.join("\n"),
            tokens_used: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_digest_lists_metrics_and_anomalies() {
        let request = AnalysisRequest {
            system_prompt: "You are a warehouse analyst.".into(),
            prompt: String::new(),
            data: json!({
                "throughput": 1250,
                "anomalies": [{ "type": "delayed_pick", "count": 3 }],
                "bottlenecks": ["packing_station_3"],
            }),
            context: vec!["SOP".into()],
        };

        let analysis = DigestAnalyzer.analyze(&request).await.unwrap();

        assert!(analysis.content.contains("- throughput: 1250"));
        assert!(analysis.content.contains("- delayed_pick: 3"));
        assert!(analysis.content.contains("packing_station_3"));
        assert_eq!(analysis.tokens_used, 0);
    }

    #[test]
    fn test_chat_response_decoding() {
        let chat: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "All good" } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }))
        .unwrap();

        assert_eq!(chat.choices[0].message.content.as_deref(), Some("All good"));
        assert_eq!(chat.usage.unwrap().total_tokens, 15);
    }
}
