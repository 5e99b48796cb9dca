use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderError, ProviderResult};

pub const API_KEY_ENV: &str = "CODEBUDDY_API_KEY";
pub const API_BASE_ENV: &str = "CODEBUDDY_API_BASE";
pub const MODEL_ENV: &str = "CODEBUDDY_MODEL";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// The chat client behind the `ai.*` builtins.
///
/// `options` is whatever the script passed as the second argument of
/// `ai.chat`; the default agent understands `system`, `model` and
/// `temperature`.
#[mockall::automock]
#[async_trait]
pub trait AiAgent: Send + Sync {
    async fn process_user_input(
        &self,
        text: &str,
        options: Option<serde_json::Value>,
    ) -> ProviderResult<AgentResponse>;
}

/// Chat completions against any OpenAI compatible endpoint.
pub struct OpenAiCompatibleAgent {
    client: Client<OpenAIConfig>,
    model: String,
}

impl std::fmt::Debug for OpenAiCompatibleAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleAgent")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleAgent {
    pub fn new(api_key: SecretString, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    /// Builds an agent from `CODEBUDDY_API_KEY`, or returns `None` when the
    /// key is not set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let api_base = std::env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(SecretString::from(api_key), api_base, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(
        text: &str,
        options: Option<&serde_json::Value>,
    ) -> ProviderResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::new();
        if let Some(system) = options
            .and_then(|o| o.get("system"))
            .and_then(|s| s.as_str())
        {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| ProviderError::Agent(e.to_string()))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .map_err(|e| ProviderError::Agent(e.to_string()))?
                .into(),
        );
        Ok(messages)
    }
}

#[async_trait]
impl AiAgent for OpenAiCompatibleAgent {
    async fn process_user_input(
        &self,
        text: &str,
        options: Option<serde_json::Value>,
    ) -> ProviderResult<AgentResponse> {
        let model = options
            .as_ref()
            .and_then(|o| o.get("model"))
            .and_then(|m| m.as_str())
            .unwrap_or(&self.model)
            .to_string();

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(model.clone())
            .messages(Self::build_messages(text, options.as_ref())?);
        if let Some(temperature) = options
            .as_ref()
            .and_then(|o| o.get("temperature"))
            .and_then(|t| t.as_f64())
        {
            request.temperature(temperature as f32);
        }
        let request = request
            .build()
            .map_err(|e| ProviderError::Agent(e.to_string()))?;

        debug!(model = %model, "sending chat completion");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ProviderError::Agent(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(AgentResponse::new)
            .ok_or_else(|| ProviderError::Agent("Empty response from model".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_is_prepended() {
        let options = serde_json::json!({ "system": "be brief" });
        let messages = OpenAiCompatibleAgent::build_messages("hi", Some(&options)).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));

        let messages = OpenAiCompatibleAgent::build_messages("hi", None).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_debug_hides_client() {
        let agent = OpenAiCompatibleAgent::new(
            SecretString::from("sk-test".to_string()),
            DEFAULT_API_BASE,
            DEFAULT_MODEL,
        );
        let debug = format!("{:?}", agent);
        assert!(debug.contains(DEFAULT_MODEL));
        assert!(!debug.contains("sk-test"));
    }

    #[tokio::test]
    async fn test_mock_agent() {
        let mut agent = MockAiAgent::new();
        agent
            .expect_process_user_input()
            .returning(|text, _| Ok(AgentResponse::new(format!("echo: {}", text))));
        let response = agent.process_user_input("ping", None).await.unwrap();
        assert_eq!(response.content, "echo: ping");
    }
}
