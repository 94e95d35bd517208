pub mod cost_accountant;
pub mod droid;
pub mod extractor;
pub mod normalizer;
pub mod openai_client;
pub mod page;
pub mod pipeline;
pub mod result_sink;
pub mod site_adapter;
pub mod tokenizer;

#[cfg(test)]
pub(crate) mod testing;

pub use cost_accountant::*;
pub use droid::*;
pub use extractor::*;
pub use normalizer::*;
pub use openai_client::*;
pub use page::*;
pub use pipeline::*;
pub use result_sink::*;
pub use site_adapter::*;
pub use tokenizer::*;
