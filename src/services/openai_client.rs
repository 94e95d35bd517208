use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use super::ExtractionError;

/// One schema-constrained chat completion.
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub schema_name: &'a str,
    pub schema: Value,
}

/// Service able to answer with JSON conforming to a supplied schema.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ExtractionError>;
}

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
}

impl Default for OpenaiClient {
    fn default() -> Self {
        OpenaiClient {
            client: Client::new(),
        }
    }
}

impl OpenaiClient {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl StructuredCompletion for OpenaiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ExtractionError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(request.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.user)
                    .build()?
                    .into(),
            ])
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: request.schema_name.to_string(),
                    schema: Some(request.schema),
                    strict: Some(true),
                },
            })
            .build()?;

        let response = self.client.chat().create(request).await?;

        if let Some(usage) = &response.usage {
            log::info!(
                "Model reported {} prompt tokens, {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or(ExtractionError::EmptyResponse)?
            .message;

        if let Some(refusal) = message.refusal {
            return Err(ExtractionError::Refused(refusal));
        }

        message.content.ok_or(ExtractionError::EmptyResponse)
    }
}
