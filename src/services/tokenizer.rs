use thiserror::Error;
use tiktoken_rs::CoreBPE;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("no tokenizer is known for model \"{0}\"")]
    UnknownModel(String),
    #[error("failed to decode tokens: {0}")]
    Decode(String),
}

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// BPE tokenizer matching the OpenAI model family.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| TokenizerError::UnknownModel(model.to_string()))?;
        Ok(TiktokenTokenizer { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }
}

/// Cuts `text` to at most `max_tokens` tokens, dropping trailing content.
///
/// Text already within budget is returned unchanged. A cut that would split a
/// multi-byte character is moved back one token at a time until it decodes.
pub fn trim_to_token_limit(
    tokenizer: &dyn Tokenizer,
    text: &str,
    max_tokens: usize,
) -> Result<String, TokenizerError> {
    let tokens = tokenizer.encode(text);
    if tokens.len() <= max_tokens {
        return Ok(text.to_string());
    }

    let mut cut = max_tokens;
    while cut > 0 {
        if let Ok(trimmed) = tokenizer.decode(&tokens[..cut]) {
            if tokenizer.count(&trimmed) <= max_tokens {
                return Ok(trimmed);
            }
        }
        cut -= 1;
    }

    Ok(String::new())
}
