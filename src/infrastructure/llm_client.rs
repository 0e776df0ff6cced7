//! OpenAI-compatible structured generation client
//!
//! Works against any `/chat/completions` endpoint that supports function
//! calling (Gemini's OpenAI endpoint, Ollama, OpenAI). The story schema is
//! sent as the single tool and the model is forced to call it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::application::ports::outbound::{ProviderError, ProviderRequest, StructuredGenerationPort};
use crate::application::services::llm::prompt_builder::STORY_TURN_FUNCTION;
use crate::domain::entities::ApiKey;
use crate::infrastructure::config::LlmConfig;

/// Client for an OpenAI-compatible chat completions API
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn build_body(&self, request: &ProviderRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": STORY_TURN_FUNCTION,
                    "description": "Continue the story and report the facts it establishes",
                    "parameters": request.schema
                }
            }],
            "tool_choice": {
                "type": "function",
                "function": { "name": STORY_TURN_FUNCTION }
            }
        })
    }
}

#[async_trait]
impl StructuredGenerationPort for OpenAiCompatibleClient {
    async fn generate_structured(
        &self,
        credential: &ApiKey,
        request: &ProviderRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.expose())
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        extract_arguments(&body)
    }
}

fn classify_status(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(message),
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull the function-call arguments out of a completion
///
/// Falls back to parsing the message content for endpoints that answer
/// with plain JSON instead of a tool call.
fn extract_arguments(body: &serde_json::Value) -> Result<serde_json::Value, ProviderError> {
    let message = &body["choices"][0]["message"];
    if message.is_null() {
        return Err(ProviderError::InvalidResponse("Missing choices".to_string()));
    }

    if let Some(arguments) = message["tool_calls"][0]["function"]["arguments"].as_str() {
        return serde_json::from_str(arguments).map_err(|e| {
            ProviderError::InvalidResponse(format!("Tool arguments are not JSON: {e}"))
        });
    }

    let content = message["content"].as_str().ok_or_else(|| {
        ProviderError::InvalidResponse("Missing tool call and content".to_string())
    })?;
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::InvalidResponse(format!("Content is not JSON: {e}")))
}
