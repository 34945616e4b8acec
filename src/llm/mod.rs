//! LLM provider abstraction used by the mood classifier.

mod ollama;
mod openai;
mod provider;
mod types;

pub use ollama::OllamaProvider;
pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};

use crate::config::{LlmProviderKind, LlmSettings};
use std::sync::Arc;
use std::time::Duration;

pub fn create_provider(settings: &LlmSettings) -> Arc<dyn LlmProvider> {
    match settings.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(
            settings.base_url.clone(),
            settings.model.clone(),
        )),
        LlmProviderKind::OpenAI => {
            let key_source = match (&settings.api_key, &settings.api_key_command) {
                (Some(key), _) => ApiKeySource::Static(key.clone()),
                (None, Some(cmd)) => ApiKeySource::Command(cmd.clone()),
                (None, None) => ApiKeySource::None,
            };
            Arc::new(OpenAIProvider::new(
                settings.base_url.clone(),
                settings.model.clone(),
                key_source,
            ))
        }
    }
}

pub fn completion_options(settings: &LlmSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: settings.temperature,
        timeout: Duration::from_secs(settings.timeout_secs),
        ..Default::default()
    }
}
