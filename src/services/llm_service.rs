use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::{Error, Result};

/// One round trip to a chat-completions model that answers in JSON.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete_json(
        &self,
        model: &str,
        messages: Vec<JsonValue>,
        temperature: Option<f32>,
    ) -> Result<JsonValue>;
}

#[derive(Debug, Clone)]
pub struct ModelOutput<T> {
    pub model: String,
    pub value: T,
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmService {
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl ChatCompletion for LlmService {
    async fn complete_json(
        &self,
        model: &str,
        messages: Vec<JsonValue>,
        temperature: Option<f32>,
    ) -> Result<JsonValue> {
        let mut payload = serde_json::json!({
            "model": model,
            "messages": messages,
            "response_format": { "type": "json_object" },
        });
        if let Some(t) = temperature {
            payload["temperature"] = serde_json::json!(t);
        }

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{} returned {}: {}", model, status, text)));
        }

        let body: JsonValue = res.json().await?;

        let content = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| Error::Upstream(format!("{} returned no message content", model)))?;

        serde_json::from_str(strip_code_fences(content))
            .map_err(|e| Error::Upstream(format!("{} returned malformed JSON: {}", model, e)))
    }
}

/// Walks the model chain in order until one reply passes `parse`.
///
/// Transport failures, bad statuses, malformed JSON and replies rejected by
/// `parse` all move on to the next model. The last failure is reported when
/// every model has been tried.
pub async fn complete_with_fallback<T, F>(
    chat: &dyn ChatCompletion,
    models: &[String],
    messages: &[JsonValue],
    temperature: Option<f32>,
    mut parse: F,
) -> Result<ModelOutput<T>>
where
    T: Send,
    F: FnMut(&JsonValue) -> Result<T> + Send,
{
    let mut last_error: Option<Error> = None;

    for model in models {
        let attempt = match chat
            .complete_json(model, messages.to_vec(), temperature)
            .await
        {
            Ok(reply) => parse(&reply),
            Err(e) => Err(e),
        };

        match attempt {
            Ok(value) => {
                return Ok(ModelOutput {
                    model: model.clone(),
                    value,
                })
            }
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "model attempt failed, trying next in chain");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => Error::Upstream(format!("all models failed, last error: {}", e)),
        None => Error::Config("no models configured".to_string()),
    })
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
