pub mod orchestrator;
pub mod search_url;

pub use orchestrator::{is_hiring_related, CampaignRunner, RunnerConfig};
pub use search_url::{classify_seed_url, SeedKind};
