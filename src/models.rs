//! Domain entities and process configuration.
//!
//! Campaigns and leads are persisted as JSON documents; field names follow
//! the store schema (camelCase) via serde renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proxy::RotationStrategy;

/// Where a campaign sources its content from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignSource {
    SearchPosts,
    SeedUrls,
    CompanyDirectory,
}

impl CampaignSource {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignSource::SearchPosts => "search-posts",
            CampaignSource::SeedUrls => "seed-urls",
            CampaignSource::CompanyDirectory => "company-directory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Queued,
    Running,
    // Older documents used "done" for the same state.
    #[serde(alias = "done")]
    Completed,
    Failed,
    Stopped,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignStatus::Queued => "queued",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
            CampaignStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Failed | CampaignStatus::Stopped
        )
    }
}

/// Machine-readable reason a campaign stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    LimitReached,
    Exhausted,
    RateLimitDetected,
    Unauthenticated,
    Fatal,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::LimitReached => "limit_reached",
            StopReason::Exhausted => "exhausted",
            StopReason::RateLimitDetected => "rate_limit_detected",
            StopReason::Unauthenticated => "unauthenticated",
            StopReason::Fatal => "fatal",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Search parameters for `search-posts` and `company-directory` campaigns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignQuery {
    pub mode: Option<String>,
    /// Role keywords, e.g. "AI engineer".
    pub roles: Option<String>,
    /// Time-window label, e.g. "past week".
    pub period: Option<String>,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub sort: Option<String>,
    pub language: Option<String>,
    pub connection_degree: Option<String>,
    pub industries: Vec<String>,
    pub company_sizes: Vec<String>,
    pub keyword_scope: Option<String>,
    pub summary: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignStats {
    pub posts_processed: u64,
    pub leads_extracted: u64,
    pub errors: u64,
    pub stop_reason: Option<StopReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A unit of lead-generation work owned by one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source: CampaignSource,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    #[serde(default)]
    pub query: CampaignQuery,
    pub status: CampaignStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub stats: CampaignStats,
    #[serde(default)]
    pub max_items: u32,
}

impl Campaign {
    /// Effective item cap: the query limit when present, otherwise the
    /// campaign-level cap.
    pub fn item_cap(&self) -> u32 {
        self.query.limit.unwrap_or(self.max_items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    Pending,
    Enriched,
    Failed,
    Skipped,
}

/// Structured fields produced by the LLM extractor. All fields default to
/// zero values so a partial or failed extraction still round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadFields {
    pub company: String,
    pub company_url: String,
    pub company_industry: String,
    pub job_titles: Vec<String>,
    pub locations: Vec<String>,
    pub seniority: String,
    pub skills: Vec<String>,
    pub salary_range: String,
    pub work_mode: String,
    pub application_link: String,
}

/// Untransformed per-card capture. Stored on the lead so enrichment can be
/// retried without refetching the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCapture {
    pub provider_id: String,
    pub post_url: String,
    pub author_name: String,
    pub author_headline: String,
    pub author_profile_url: String,
    pub post_title: String,
    pub post_text: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub company_url: String,
}

/// An extracted hiring lead. `(tenantId, providerId)` is unique per store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    pub provider_id: String,
    pub author_name: String,
    pub author_headline: String,
    pub author_profile_url: String,
    pub post_url: String,
    pub post_title: String,
    pub post_text: String,
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: LeadFields,
    pub raw_metadata: RawCapture,
    pub enrichment_status: EnrichmentStatus,
    pub enrichment_error: Option<String>,
    pub last_enrichment_attempt: Option<DateTime<Utc>>,
}

/// Directory-mode record. `(tenantId, linkedInUrl)` is unique per store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyRecord {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    #[serde(rename = "linkedInUrl")]
    pub linkedin_url: String,
    pub name: String,
    pub tagline: String,
    pub industry: String,
    pub company_size: String,
    pub headquarters: String,
    pub founded: String,
    pub website: String,
    pub specialties: Vec<String>,
    pub follower_count: String,
    pub logo: String,
}

/// Crash-restart checkpoint for multi-URL / paginated runs. Keyed by
/// campaign id; cleared on terminal transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Checkpoint {
    pub last_seed_index: usize,
    pub total_collected: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub proxy_urls: Vec<String>,
    pub proxy_rotation: RotationStrategy,
    pub max_posts: u32,
    pub user_agent: String,
    pub page_param: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./leadbot.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let proxy_urls: Vec<String> = std::env::var("PROXY_URLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let proxy_rotation = std::env::var("PROXY_ROTATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(RotationStrategy::Random);

        let max_posts = std::env::var("MAX_POSTS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let user_agent = std::env::var("USER_AGENT").unwrap_or_else(|_| {
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string()
        });

        // LinkedIn's directory pagination parameter has changed before; keep
        // it configurable rather than a constant.
        let page_param =
            std::env::var("DIRECTORY_PAGE_PARAM").unwrap_or_else(|_| "page".to_string());

        Ok(Self {
            database_path,
            port,
            proxy_urls,
            proxy_rotation,
            max_posts,
            user_agent,
            page_param,
        })
    }
}
