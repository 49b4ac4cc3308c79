use anyhow::anyhow;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;

use crate::configuration::OpenaiSettings;

/// A chat model constrained to answer with a JSON object.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete_json(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

pub struct OpenaiClient {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenaiClient {
    pub fn new(settings: &OpenaiSettings) -> Self {
        let client = settings
            .api_key
            .as_ref()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(|key| Client::with_config(OpenAIConfig::new().with_api_key(key)));

        if client.is_none() {
            log::warn!("No OpenAI API key configured, generative extraction will fail");
        }

        OpenaiClient {
            client,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

#[async_trait]
impl CompletionModel for OpenaiClient {
    async fn complete_json(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key is not configured"))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()?;

        let response = client.chat().create(request).await?;
        log::info!("Model usage: {:?}", response.usage);

        response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))?
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("No content in OpenAI response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> OpenaiSettings {
        OpenaiSettings {
            api_key: api_key.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 256,
            temperature: 0.1,
            max_input_chars: 1000,
        }
    }

    #[tokio::test]
    async fn missing_key_is_an_error_not_a_panic() {
        let client = OpenaiClient::new(&settings(None));

        let err = client.complete_json("sys", "user").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let client = OpenaiClient::new(&settings(Some("   ")));
        assert!(client.complete_json("sys", "user").await.is_err());
    }
}
