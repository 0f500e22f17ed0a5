//! Structured-field extraction from raw captures.
//!
//! The extractor prompts an LLM with the capture plus an explicit JSON
//! schema and parses the first balanced JSON object out of the reply. When
//! the endpoint is unreachable or the reply has no usable JSON, the caller
//! keeps the lead with zero-value fields so it can be re-extracted later.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::browser::{BrowserContext, BrowserPage};
use crate::cancel::CancelSignal;
use crate::fetch::cards::INDUSTRY_PAGE_SELECTORS;
use crate::fetch::FetchEngine;
use crate::models::{LeadFields, RawCapture};

use super::llm::{CompletionOptions, LlmClient};

const SYSTEM_PROMPT: &str = "You are a strict information-extraction engine for hiring posts. \
Respond with a single JSON object matching the requested schema and nothing else: \
no markdown, no commentary.";

#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Enriched,
    Failed(String),
}

pub struct LeadExtractor {
    llm: Arc<dyn LlmClient>,
    opts: CompletionOptions,
}

impl LeadExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            opts: CompletionOptions::default(),
        }
    }

    pub fn with_options(llm: Arc<dyn LlmClient>, opts: CompletionOptions) -> Self {
        Self { llm, opts }
    }

    /// Extract structured fields from a raw capture. Never errors: a failed
    /// call or unparseable reply comes back as `Failed` with zero-value
    /// fields.
    pub async fn extract(&self, raw: &RawCapture) -> (LeadFields, ExtractionOutcome) {
        let prompt = build_prompt(raw);

        let reply = match self.llm.complete(SYSTEM_PROMPT, &prompt, &self.opts).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(provider_id = %raw.provider_id, error = %format!("{e:#}"), "extractor call failed");
                return (LeadFields::default(), ExtractionOutcome::Failed(format!("{e:#}")));
            }
        };

        match first_json_object(&reply).and_then(|json| serde_json::from_str::<LeadFields>(json).ok())
        {
            Some(fields) => (fields, ExtractionOutcome::Enriched),
            None => {
                warn!(
                    provider_id = %raw.provider_id,
                    "no parseable JSON object in extractor reply"
                );
                (
                    LeadFields::default(),
                    ExtractionOutcome::Failed(
                        "no parseable JSON object in extractor reply".to_string(),
                    ),
                )
            }
        }
    }

    /// Best-effort company-industry read from the company page, in the same
    /// authenticated context. Failures are swallowed; the lead is already
    /// enriched.
    pub async fn company_industry(
        &self,
        engine: &FetchEngine,
        context: &dyn BrowserContext,
        company_url: &str,
        proxy: Option<&str>,
        cancel: &CancelSignal,
    ) -> Option<String> {
        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                debug!(error = %e, "company page open failed");
                return None;
            }
        };

        if let Err(e) = engine.navigate(page.as_ref(), company_url, proxy, cancel).await {
            debug!(company_url, error = %e, "company page navigation failed");
            return None;
        }

        read_industry(page.as_ref()).await
    }
}

async fn read_industry(page: &dyn BrowserPage) -> Option<String> {
    for selector in INDUSTRY_PAGE_SELECTORS {
        let elements = page.query_all(selector).await.ok()?;
        for element in elements {
            if let Ok(text) = element.inner_text().await {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

fn build_prompt(raw: &RawCapture) -> String {
    format!(
        "Extract hiring details from this LinkedIn post.\n\
         \n\
         POST URL: {post_url}\n\
         AUTHOR: {author}\n\
         AUTHOR HEADLINE: {headline}\n\
         POST TEXT:\n{text}\n\
         \n\
         Return a JSON object with exactly these keys:\n\
         {{\n\
           \"company\": string,            // hiring company name, \"\" if unknown\n\
           \"companyUrl\": string,         // company page URL, \"\" if unknown\n\
           \"companyIndustry\": string,\n\
           \"jobTitles\": string[],        // roles being hired for\n\
           \"locations\": string[],\n\
           \"seniority\": string,          // e.g. \"senior\", \"staff\", \"\" if unknown\n\
           \"skills\": string[],\n\
           \"salaryRange\": string,\n\
           \"workMode\": string,           // \"remote\" | \"hybrid\" | \"onsite\" | \"\"\n\
           \"applicationLink\": string\n\
         }}\n\
         Use empty strings and empty arrays for anything not stated in the post.",
        post_url = raw.post_url,
        author = raw.author_name,
        headline = raw.author_headline,
        text = raw.post_text,
    )
}

/// First balanced `{ … }` block in `text`, tolerating prose before and
/// after, braces inside string literals, and escapes.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
