use async_openai::error::OpenAIError;
use thiserror::Error;

use crate::domain::schema::{CollectionSchema, ExtractionResult};

use super::{
    trim_to_token_limit, CompletionRequest, StructuredCompletion, TiktokenTokenizer, Tokenizer,
    TokenizerError,
};

pub const DEFAULT_TOKEN_BUDGET: usize = 200_000;

const SYSTEM_MESSAGE: &str = "You are an intelligent text extraction and conversion assistant. \
Extract structured information from the given text and return it as pure JSON that matches the \
supplied schema, with no commentary, explanation or text before or after the JSON. \
Make sure every value is attached to the listing it belongs to. \
Some fields may have no data in the text, or the data may be in a foreign language: leave such a \
field empty rather than guessing, and do not translate. \
When a disclaimer or deal terms paragraph is present, break it down into separate points, \
one field per point (for example \"Disclaimer point 1\", \"Disclaimer point 2\").";

const USER_PREFIX: &str = "Extract the following information from the provided text and make \
points if there is a disclaimer:\nPage content:\n\n";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("model service failed: {0}")]
    Service(#[from] OpenAIError),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model refused the request: {0}")]
    Refused(String),
    #[error("model output does not match the schema: {0}")]
    NonConforming(String),
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// Turns normalized text into schema-conforming records.
pub struct StructuredExtractor<C> {
    client: C,
    token_budget: usize,
}

/// What one extraction produced, along with the exact text the model saw.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub result: ExtractionResult,
    pub input_text: String,
    pub output_text: String,
}

impl<C: StructuredCompletion> StructuredExtractor<C> {
    pub fn new(client: C, token_budget: usize) -> Self {
        StructuredExtractor {
            client,
            token_budget,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn extract(
        &self,
        text: &str,
        schema: &CollectionSchema,
        model: &str,
    ) -> Result<Extraction, ExtractionError> {
        let tokenizer = TiktokenTokenizer::for_model(model)?;
        self.extract_with(&tokenizer, text, schema, model).await
    }

    pub async fn extract_with(
        &self,
        tokenizer: &dyn Tokenizer,
        text: &str,
        schema: &CollectionSchema,
        model: &str,
    ) -> Result<Extraction, ExtractionError> {
        let input_text = trim_to_token_limit(tokenizer, text, self.token_budget)?;
        if input_text.len() < text.len() {
            log::warn!(
                "Input trimmed to {} tokens ({} of {} bytes kept)",
                self.token_budget,
                input_text.len(),
                text.len()
            );
        }

        let user = format!("{}{}", USER_PREFIX, input_text);
        let raw = self
            .client
            .complete(CompletionRequest {
                model,
                system: SYSTEM_MESSAGE,
                user: &user,
                schema_name: schema.name(),
                schema: schema.to_json_schema(),
            })
            .await?;

        let result = schema.parse(&raw).map_err(ExtractionError::NonConforming)?;
        log::info!("Extracted {} records with {}", result.len(), model);

        let output_text = serde_json::to_string(&result)
            .map_err(|e| ExtractionError::NonConforming(e.to_string()))?;

        Ok(Extraction {
            result,
            input_text,
            output_text,
        })
    }
}
