pub mod cards;
pub mod detect;
pub mod engine;

pub use detect::{classify_page, PageStatus};
pub use engine::{FetchEngine, FetchEngineConfig, HarvestSession, HarvestStop};

/// Host component of a URL, for pacing and bookkeeping. Falls back to the
/// primary provider host when the URL does not parse.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "www.linkedin.com".to_string())
}
