use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ChatMessage;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion provider is not configured")]
    NotConfigured,

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion response carried no text")]
    Empty,
}

/// Produces one assistant reply for a conversation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<CompletionMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: &str, system_prompt: &str, history: &[ChatMessage]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(CompletionMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        messages.extend(history.iter().map(|message| CompletionMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }));

        Self {
            model: model.to_string(),
            messages,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    pub fn into_text(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::Empty)
    }
}

/// Chat-completions endpoint reached over HTTPS with a bearer key.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpCompletionClient {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::NotConfigured)?;
        let request = CompletionRequest::new(&self.model, system_prompt, history);

        let response: CompletionResponse = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_text()
    }
}
