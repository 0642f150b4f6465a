//! HTTP client for Ollama, Claude and OpenAI chat endpoints.

use super::{CompletionRequest, LlmClient, ModelTier};
use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};
use crate::types::ChatRole;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Blocking client that drives async `reqwest` calls on its own runtime.
pub struct HttpLlmClient {
    model: String,
    fast_model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string())
            .trim_end_matches('/')
            .to_string();
        let api_key = config.api_key.clone().or_else(|| {
            config
                .provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
        });

        if config.provider.api_key_env().is_some() && api_key.is_none() {
            return Err(Error::Config(
                "llm.api_key (or provider env var) is required".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            fast_model: config
                .fast_model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
            provider: config.provider,
            endpoint,
            api_key,
            runtime,
            http,
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.model,
            ModelTier::Fast => &self.fast_model,
        }
    }

    async fn post_json(&self, url: String, headers: HeaderMap, body: Value) -> Result<Value> {
        let name = self.provider_name();
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("{name} request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Llm(format!("{name} read body failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{name} returned {}: {}",
                status.as_u16(),
                text
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "ollama",
            LlmProvider::Claude => "claude",
            LlmProvider::OpenAI => "openai",
        }
    }

    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}

/// History plus the new prompt as `{role, content}` chat messages.
fn chat_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages: Vec<Value> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "assistant",
            };
            json!({ "role": role, "content": turn.text() })
        })
        .collect();
    messages.push(json!({ "role": "user", "content": request.prompt }));
    messages
}

/// Messages with the system instruction prepended, for providers without a system field.
fn messages_with_system(request: &CompletionRequest) -> Vec<Value> {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(chat_messages(request));
    messages
}

fn text_at(json: &Value, pointer: &str, what: &str) -> Result<String> {
    json.pointer(pointer)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| Error::Llm(format!("response missing {what}")))
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let model = self.model_for(request.tier);
        tracing::debug!(
            provider = self.provider_name(),
            model,
            history = request.history.len(),
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        self.runtime.block_on(async {
            match self.provider {
                LlmProvider::Ollama => {
                    let url = format!("{}/api/chat", self.endpoint);
                    let body = json!({
                        "model": model,
                        "messages": messages_with_system(request),
                        "stream": false,
                        "options": { "temperature": 0 },
                    });
                    let json = self.post_json(url, HeaderMap::new(), body).await?;
                    text_at(&json, "/message/content", "message.content")
                }
                LlmProvider::Claude => {
                    let url = format!("{}/v1/messages", self.endpoint);
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    headers.insert(
                        "x-api-key",
                        HeaderValue::from_str(self.api_key()).map_err(|e| {
                            Error::Llm(format!("invalid claude api key header: {e}"))
                        })?,
                    );
                    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

                    let mut body = json!({
                        "model": model,
                        "max_tokens": MAX_OUTPUT_TOKENS,
                        "temperature": 0,
                        "messages": chat_messages(request),
                    });
                    if let Some(system) = &request.system {
                        body["system"] = json!(system);
                    }
                    let json = self.post_json(url, headers, body).await?;
                    text_at(&json, "/content/0/text", "content[0].text")
                }
                LlmProvider::OpenAI => {
                    let url = format!("{}/v1/chat/completions", self.endpoint);
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                    headers.insert(
                        AUTHORIZATION,
                        HeaderValue::from_str(&format!("Bearer {}", self.api_key()))
                            .map_err(|e| Error::Llm(format!("invalid auth header: {e}")))?,
                    );

                    let body = json!({
                        "model": model,
                        "temperature": 0,
                        "messages": messages_with_system(request),
                    });
                    let json = self.post_json(url, headers, body).await?;
                    text_at(&json, "/choices/0/message/content", "choices[0].message.content")
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatTurn;

    fn ollama_config() -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3.2".to_string(),
            fast_model: None,
            endpoint: Some("http://localhost:11434/".to_string()),
            api_key: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_chat_messages_map_model_role() {
        let request = CompletionRequest::new("and in the second half?")
            .with_system("be terse")
            .with_history(&[ChatTurn::user("shots?"), ChatTurn::model("Twelve.")]);

        let messages = chat_messages(&request);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "and in the second half?");

        let with_system = messages_with_system(&request);
        assert_eq!(with_system[0]["role"], "system");
        assert_eq!(with_system.len(), 4);
    }

    #[test]
    fn test_fast_model_defaults_to_primary() {
        let client = HttpLlmClient::new(&ollama_config()).unwrap();
        assert_eq!(client.model_for(ModelTier::Fast), "llama3.2");
        assert_eq!(client.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_text_at_reports_missing_field() {
        let json = json!({ "choices": [] });
        let err = text_at(&json, "/choices/0/message/content", "choices[0].message.content")
            .unwrap_err();
        assert!(err.to_string().contains("choices[0].message.content"));
    }
}
