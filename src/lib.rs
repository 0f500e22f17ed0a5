//! LeadBot Backend Library
//!
//! Adaptive request-pacing and extraction pipeline for LinkedIn lead
//! generation: pacing governor, proxy pool, browser-driven fetch engine,
//! LLM-backed field extractor, and the campaign orchestrator composing
//! them. Exposed for the binary, the external API layer, and tests.

pub mod api;
pub mod browser;
pub mod campaigns;
pub mod cancel;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pacing;
pub mod proxy;
pub mod store;

// Re-export the composition-root types for convenience
pub use campaigns::{CampaignRunner, RunnerConfig};
pub use errors::FetchError;
pub use models::Config;
pub use pacing::PacingGovernor;
pub use proxy::ProxyPool;
