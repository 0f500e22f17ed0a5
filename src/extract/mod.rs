pub mod extractor;
pub mod llm;

pub use extractor::{first_json_object, ExtractionOutcome, LeadExtractor};
pub use llm::{CompletionOptions, LlmClient, OpenRouterClient};
