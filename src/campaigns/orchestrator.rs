//! Campaign lifecycle and mode dispatch.
//!
//! The runner owns every status transition. It composes the pacing
//! governor, proxy pool, fetch engine and extractor; none of them know
//! campaigns exist. Leads are persisted in harvest order with the store's
//! uniqueness constraint doing cross-restart dedupe.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::{BrowserContext, BrowserDriver, ContextOptions, SessionCookie, Viewport};
use crate::cancel::{sleep_cancellable, CancelSignal};
use crate::errors::FetchError;
use crate::extract::{ExtractionOutcome, LeadExtractor};
use crate::fetch::cards::CompanyCard;
use crate::fetch::{host_of, FetchEngine, FetchEngineConfig, HarvestStop};
use crate::models::{
    Campaign, CampaignSource, CampaignStatus, Checkpoint, CompanyRecord, EnrichmentStatus, Lead,
    RawCapture, StopReason,
};
use crate::pacing::PacingGovernor;
use crate::proxy::ProxyPool;
use crate::store::{DocumentStore, FindOptions, InsertOutcome, CAMPAIGNS, CHECKPOINTS, COMPANIES, LEADS};

use super::search_url::{
    build_content_search_url, build_directory_search_url, classify_seed_url, profile_activity_url,
    with_page_param, SeedKind,
};

/// Pre-extraction drop rule for noisy feed pages. Search pages are already
/// targeted, so the filter stays off there.
pub const HIRING_KEYWORDS: [&str; 8] = [
    "hiring",
    "recruiting",
    "join",
    "looking for",
    "opportunity",
    "position",
    "role",
    "opening",
];

pub fn is_hiring_related(post_text: &str) -> bool {
    let text = post_text.to_lowercase();
    HIRING_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub user_agent: String,
    pub viewport: Viewport,
    pub profile_dir: Option<String>,
    /// Session tokens injected at context creation; opaque to the engine.
    pub session_cookies: Vec<SessionCookie>,
    /// Directory pagination query parameter.
    pub page_param: String,
    /// Hard stop for directory pagination.
    pub max_directory_pages: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport: Viewport::default(),
            profile_dir: None,
            session_cookies: Vec::new(),
            page_param: "page".to_string(),
            max_directory_pages: 100,
        }
    }
}

/// How a dispatch finished when no error terminated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    LimitReached,
    Exhausted,
}

pub struct CampaignRunner {
    store: Arc<dyn DocumentStore>,
    driver: Arc<dyn BrowserDriver>,
    pacing: Arc<PacingGovernor>,
    proxies: Arc<ProxyPool>,
    extractor: Arc<LeadExtractor>,
    engine: FetchEngine,
    config: RunnerConfig,
}

impl CampaignRunner {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        driver: Arc<dyn BrowserDriver>,
        pacing: Arc<PacingGovernor>,
        proxies: Arc<ProxyPool>,
        extractor: Arc<LeadExtractor>,
        engine_config: FetchEngineConfig,
        config: RunnerConfig,
    ) -> Self {
        let engine = FetchEngine::new(pacing.clone(), proxies.clone(), engine_config);
        Self {
            store,
            driver,
            pacing,
            proxies,
            extractor,
            engine,
            config,
        }
    }

    /// Run one campaign to a terminal state. Each campaign is an
    /// independent task; fetch inside it is single-flight.
    pub async fn run(&self, campaign_id: &str, cancel: CancelSignal) -> Result<()> {
        let mut campaign = self.load_campaign(campaign_id).await?;
        if campaign.status != CampaignStatus::Queued {
            warn!(
                campaign = campaign_id,
                status = campaign.status.as_str(),
                "campaign not queued, skipping"
            );
            return Ok(());
        }

        let cap = campaign.item_cap();
        campaign.status = CampaignStatus::Running;
        campaign.stats.started_at = Some(Utc::now());
        self.patch_campaign(&campaign, cap)
            .await
            .context("transition to running")?;

        info!(
            campaign = campaign_id,
            source = campaign.source.as_str(),
            cap,
            "🎯 Campaign started"
        );

        if cap == 0 {
            return self
                .finish(&mut campaign, CampaignStatus::Completed, StopReason::LimitReached, cap)
                .await;
        }

        let outcome = match campaign.source {
            CampaignSource::SearchPosts => self.run_search(&mut campaign, cap, &cancel).await,
            CampaignSource::SeedUrls => self.run_seed_urls(&mut campaign, cap, &cancel).await,
            CampaignSource::CompanyDirectory => {
                self.run_directory(&mut campaign, cap, &cancel).await
            }
        };

        match outcome {
            Ok(RunEnd::LimitReached) => {
                self.finish(&mut campaign, CampaignStatus::Completed, StopReason::LimitReached, cap)
                    .await
            }
            Ok(RunEnd::Exhausted) => {
                self.finish(&mut campaign, CampaignStatus::Completed, StopReason::Exhausted, cap)
                    .await
            }
            Err(FetchError::Cancelled) => {
                self.finish(&mut campaign, CampaignStatus::Stopped, StopReason::Cancelled, cap)
                    .await
            }
            Err(error @ (FetchError::RateLimited | FetchError::Blocked { .. })) => {
                warn!(campaign = campaign_id, %error, "campaign terminated by pushback");
                self.finish(
                    &mut campaign,
                    CampaignStatus::Failed,
                    StopReason::RateLimitDetected,
                    cap,
                )
                .await
            }
            Err(FetchError::Unauthenticated) => {
                self.finish(
                    &mut campaign,
                    CampaignStatus::Failed,
                    StopReason::Unauthenticated,
                    cap,
                )
                .await
            }
            Err(error) => {
                error!(campaign = campaign_id, %error, "campaign failed");
                self.finish(&mut campaign, CampaignStatus::Failed, StopReason::Fatal, cap)
                    .await
            }
        }
    }

    /// Spawn `run` as a task, logging the outcome.
    pub fn spawn(self: &Arc<Self>, campaign_id: String, cancel: CancelSignal) {
        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(&campaign_id, cancel).await {
                error!(campaign = %campaign_id, error = %format!("{e:#}"), "campaign task failed");
            }
        });
    }

    // -- mode dispatch -----------------------------------------------------

    async fn run_search(
        &self,
        campaign: &mut Campaign,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<RunEnd, FetchError> {
        let url = build_content_search_url(&campaign.query);
        let (context, proxy) = self.launch().await?;

        let result = self
            .harvest_posts(campaign, context.as_ref(), proxy.as_deref(), &url, cap, false, cap, cancel)
            .await;
        let _ = context.close().await;

        match result {
            Ok(HarvestStop::CapReached) => Ok(RunEnd::LimitReached),
            Ok(HarvestStop::Exhausted) => {
                if campaign.stats.leads_extracted >= cap as u64 {
                    Ok(RunEnd::LimitReached)
                } else {
                    Ok(RunEnd::Exhausted)
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn run_seed_urls(
        &self,
        campaign: &mut Campaign,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<RunEnd, FetchError> {
        let seeds = campaign.seed_urls.clone();
        if seeds.is_empty() {
            warn!(campaign = %campaign.id, "seed campaign without seed urls");
            return Ok(RunEnd::Exhausted);
        }

        // Per-URL budget so one noisy feed cannot eat the whole limit.
        let per_url_cap = ((cap as usize + seeds.len() - 1) / seeds.len()) as u32;
        let start = match self.load_checkpoint(&campaign.id).await {
            Some(checkpoint) => {
                info!(
                    campaign = %campaign.id,
                    resume_at = checkpoint.last_seed_index + 1,
                    "resuming from checkpoint"
                );
                checkpoint.last_seed_index + 1
            }
            None => 0,
        };

        let (context, proxy) = self.launch().await?;
        let result = self
            .seed_loop(campaign, context.as_ref(), proxy.as_deref(), &seeds, start, per_url_cap, cap, cancel)
            .await;
        let _ = context.close().await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn seed_loop(
        &self,
        campaign: &mut Campaign,
        context: &dyn BrowserContext,
        proxy: Option<&str>,
        seeds: &[String],
        start: usize,
        per_url_cap: u32,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<RunEnd, FetchError> {
        for (index, seed) in seeds.iter().enumerate().skip(start) {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if campaign.stats.leads_extracted >= cap as u64 {
                return Ok(RunEnd::LimitReached);
            }

            match self
                .run_one_seed(campaign, context, proxy, seed, per_url_cap, cap, cancel)
                .await
            {
                Ok(()) => {}
                Err(FetchError::RateLimited) => {
                    // Keep working through the list until the governor says
                    // the host is burned.
                    let host = host_of(seed);
                    let burned = self
                        .pacing
                        .stats(&host)
                        .map(|s| s.extended_backoff_remaining_secs.is_some())
                        .unwrap_or(false);
                    if burned {
                        return Err(FetchError::RateLimited);
                    }
                    warn!(seed = %seed, "pushback on seed url, moving to next");
                }
                Err(FetchError::Transient(e)) => {
                    campaign.stats.errors += 1;
                    warn!(seed = %seed, error = %format!("{e:#}"), "seed url failed, moving to next");
                }
                Err(other) => return Err(other),
            }

            self.save_checkpoint(&campaign.id, index, campaign.stats.leads_extracted)
                .await;
            self.patch_stats(campaign, cap).await;
        }

        if campaign.stats.leads_extracted >= cap as u64 {
            Ok(RunEnd::LimitReached)
        } else {
            Ok(RunEnd::Exhausted)
        }
    }

    async fn run_one_seed(
        &self,
        campaign: &mut Campaign,
        context: &dyn BrowserContext,
        proxy: Option<&str>,
        seed: &str,
        per_url_cap: u32,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<(), FetchError> {
        match classify_seed_url(seed) {
            SeedKind::SinglePost => {
                let page = context
                    .new_page()
                    .await
                    .map_err(|e| FetchError::Transient(e.context("new page")))?;
                if let Some(raw) = self
                    .engine
                    .fetch_single_post(page.as_ref(), seed, proxy, cancel)
                    .await?
                {
                    self.process_capture(campaign, context, proxy, raw, false, cap, cancel)
                        .await?;
                }
                Ok(())
            }
            SeedKind::ProfileActivity => {
                // Profile feeds mix unrelated content; the hiring-keyword
                // filter stays on.
                let url = profile_activity_url(seed);
                self.harvest_posts(campaign, context, proxy, &url, per_url_cap, true, cap, cancel)
                    .await
                    .map(|_| ())
            }
            SeedKind::ContentSearch => self
                .harvest_posts(campaign, context, proxy, seed, per_url_cap, false, cap, cancel)
                .await
                .map(|_| ()),
            SeedKind::Company => {
                warn!(seed, "company seed urls are not supported, skipping");
                Ok(())
            }
            SeedKind::Unknown => {
                warn!(seed, "unrecognized seed url, skipping");
                Ok(())
            }
        }
    }

    async fn run_directory(
        &self,
        campaign: &mut Campaign,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<RunEnd, FetchError> {
        let base = build_directory_search_url(&campaign.query);
        let start_page = match self.load_checkpoint(&campaign.id).await {
            Some(checkpoint) => checkpoint.last_seed_index as u32 + 1,
            None => 1,
        };

        let (context, proxy) = self.launch().await?;
        let result = self
            .directory_loop(campaign, context.as_ref(), proxy.as_deref(), &base, start_page, cap, cancel)
            .await;
        let _ = context.close().await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn directory_loop(
        &self,
        campaign: &mut Campaign,
        context: &dyn BrowserContext,
        proxy: Option<&str>,
        base: &str,
        start_page: u32,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<RunEnd, FetchError> {
        let page = context
            .new_page()
            .await
            .map_err(|e| FetchError::Fatal(format!("new page: {e:#}")))?;

        for page_no in start_page..=self.config.max_directory_pages {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if campaign.stats.leads_extracted >= cap as u64 {
                return Ok(RunEnd::LimitReached);
            }

            let url = with_page_param(base, &self.config.page_param, page_no);
            match self.engine.navigate(page.as_ref(), &url, proxy, cancel).await {
                Ok(()) => {}
                Err(FetchError::Transient(e)) => {
                    campaign.stats.errors += 1;
                    warn!(url = %url, error = %format!("{e:#}"), "directory page failed, trying next");
                    continue;
                }
                Err(other) => return Err(other),
            }

            let cards = self.engine.harvest_directory_page(page.as_ref(), cancel).await?;
            if cards.is_empty() {
                debug!(page_no, "empty directory page, pagination done");
                return Ok(RunEnd::Exhausted);
            }

            for card in cards {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                if campaign.stats.leads_extracted >= cap as u64 {
                    return Ok(RunEnd::LimitReached);
                }
                self.process_company(campaign, page.as_ref(), proxy, card, cap, cancel)
                    .await?;
            }

            self.save_checkpoint(&campaign.id, page_no as usize, campaign.stats.leads_extracted)
                .await;
        }

        Ok(RunEnd::Exhausted)
    }

    // -- record processing -------------------------------------------------

    /// Navigate a list page and drain its harvest session into the store.
    #[allow(clippy::too_many_arguments)]
    async fn harvest_posts(
        &self,
        campaign: &mut Campaign,
        context: &dyn BrowserContext,
        proxy: Option<&str>,
        url: &str,
        session_cap: u32,
        filter: bool,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<HarvestStop, FetchError> {
        let page = context
            .new_page()
            .await
            .map_err(|e| FetchError::Transient(e.context("new page")))?;
        self.engine.navigate(page.as_ref(), url, proxy, cancel).await?;

        let mut session =
            self.engine
                .harvest(page.as_ref(), cancel.clone(), session_cap, proxy.map(str::to_string));

        while let Some(raw) = session.next_record().await? {
            self.process_capture(campaign, context, proxy, raw, filter, cap, cancel)
                .await?;
        }

        Ok(session.stop().unwrap_or(HarvestStop::Exhausted))
    }

    /// Filter, extract, enrich and persist one raw capture. Transient
    /// extraction and store failures are absorbed here.
    #[allow(clippy::too_many_arguments)]
    async fn process_capture(
        &self,
        campaign: &mut Campaign,
        context: &dyn BrowserContext,
        proxy: Option<&str>,
        raw: RawCapture,
        filter: bool,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<(), FetchError> {
        campaign.stats.posts_processed += 1;

        if filter && !is_hiring_related(&raw.post_text) {
            debug!(provider_id = %raw.provider_id, "dropped by hiring-keyword filter");
            self.patch_stats(campaign, cap).await;
            return Ok(());
        }

        let (mut fields, outcome) = self.extractor.extract(&raw).await;
        let (enrichment_status, enrichment_error) = match outcome {
            ExtractionOutcome::Enriched => (EnrichmentStatus::Enriched, None),
            // Kept re-extractable: pending plus the raw capture.
            ExtractionOutcome::Failed(message) => (EnrichmentStatus::Pending, Some(message)),
        };

        if enrichment_status == EnrichmentStatus::Enriched && fields.company_industry.is_empty() {
            let company_url = if fields.company_url.is_empty() {
                raw.company_url.clone()
            } else {
                fields.company_url.clone()
            };
            if !company_url.is_empty() {
                if let Some(industry) = self
                    .extractor
                    .company_industry(&self.engine, context, &company_url, proxy, cancel)
                    .await
                {
                    fields.company_industry = industry;
                }
            }
        }

        let lead = Lead {
            id: Uuid::new_v4().to_string(),
            tenant_id: campaign.tenant_id.clone(),
            campaign_id: campaign.id.clone(),
            provider_id: raw.provider_id.clone(),
            author_name: raw.author_name.clone(),
            author_headline: raw.author_headline.clone(),
            author_profile_url: raw.author_profile_url.clone(),
            post_url: raw.post_url.clone(),
            post_title: raw.post_title.clone(),
            post_text: raw.post_text.clone(),
            posted_at: raw.posted_at,
            fields,
            raw_metadata: raw,
            enrichment_status,
            enrichment_error,
            last_enrichment_attempt: Some(Utc::now()),
        };

        match serde_json::to_value(&lead) {
            Ok(doc) => match self
                .store
                .insert_if_absent(LEADS, doc, &["tenantId", "providerId"])
                .await
            {
                Ok(InsertOutcome::Inserted) => {
                    campaign.stats.leads_extracted += 1;
                    debug!(provider_id = %lead.provider_id, "lead persisted");
                }
                Ok(InsertOutcome::Duplicate) => {
                    debug!(provider_id = %lead.provider_id, "duplicate lead skipped");
                }
                Err(e) => {
                    campaign.stats.errors += 1;
                    warn!(error = %format!("{e:#}"), "lead insert failed");
                }
            },
            Err(e) => {
                campaign.stats.errors += 1;
                warn!(error = %e, "lead encode failed");
            }
        }

        self.patch_stats(campaign, cap).await;
        Ok(())
    }

    /// Visit a company's about page and persist the detailed record.
    async fn process_company(
        &self,
        campaign: &mut Campaign,
        page: &dyn crate::browser::BrowserPage,
        proxy: Option<&str>,
        card: CompanyCard,
        cap: u32,
        cancel: &CancelSignal,
    ) -> Result<(), FetchError> {
        campaign.stats.posts_processed += 1;

        let about_url = format!("{}/about/", card.linkedin_url.trim_end_matches('/'));
        let details = match self.engine.navigate(page, &about_url, proxy, cancel).await {
            Ok(()) => match crate::fetch::cards::extract_company_about(page).await {
                Ok(details) => details,
                Err(e) => {
                    campaign.stats.errors += 1;
                    warn!(url = %about_url, error = %format!("{e:#}"), "about extraction failed");
                    Default::default()
                }
            },
            Err(FetchError::Transient(e)) => {
                campaign.stats.errors += 1;
                warn!(url = %about_url, error = %format!("{e:#}"), "about page failed");
                Default::default()
            }
            Err(other) => return Err(other),
        };

        let record = CompanyRecord {
            id: Uuid::new_v4().to_string(),
            tenant_id: campaign.tenant_id.clone(),
            campaign_id: campaign.id.clone(),
            linkedin_url: card.linkedin_url.clone(),
            name: non_empty_or(details.name, card.name),
            tagline: non_empty_or(details.tagline, card.tagline),
            industry: details.industry,
            company_size: details.company_size,
            headquarters: details.headquarters,
            founded: details.founded,
            website: details.website,
            specialties: details.specialties,
            follower_count: details.follower_count,
            logo: details.logo,
        };

        match serde_json::to_value(&record) {
            Ok(doc) => match self
                .store
                .insert_if_absent(COMPANIES, doc, &["tenantId", "linkedInUrl"])
                .await
            {
                Ok(InsertOutcome::Inserted) => campaign.stats.leads_extracted += 1,
                Ok(InsertOutcome::Duplicate) => {
                    debug!(url = %record.linkedin_url, "duplicate company skipped");
                }
                Err(e) => {
                    campaign.stats.errors += 1;
                    warn!(error = %format!("{e:#}"), "company insert failed");
                }
            },
            Err(e) => {
                campaign.stats.errors += 1;
                warn!(error = %e, "company encode failed");
            }
        }

        self.patch_stats(campaign, cap).await;

        // Same human pacing as the posts loop between harvested cards.
        let pause = {
            use rand::Rng;
            std::time::Duration::from_secs(rand::thread_rng().gen_range(18..=30))
        };
        sleep_cancellable(pause, cancel).await?;
        Ok(())
    }

    // -- persistence helpers -----------------------------------------------

    async fn load_campaign(&self, campaign_id: &str) -> Result<Campaign> {
        let docs = self
            .store
            .find(CAMPAIGNS, json!({ "id": campaign_id }), FindOptions::default())
            .await
            .context("load campaign")?;
        let doc = docs
            .into_iter()
            .next()
            .with_context(|| format!("campaign {campaign_id} not found"))?;
        serde_json::from_value(doc).context("decode campaign")
    }

    async fn patch_campaign(&self, campaign: &Campaign, cap: u32) -> Result<()> {
        let stats = serde_json::to_value(&campaign.stats).context("encode stats")?;
        self.store
            .update(
                CAMPAIGNS,
                &campaign.id,
                json!({
                    "status": campaign.status.as_str(),
                    "progress": progress_for(campaign.stats.leads_extracted, cap),
                    "stats": stats,
                }),
            )
            .await
            .context("patch campaign")
    }

    /// Stats/progress patch inside the loop; store hiccups are counted, not
    /// propagated.
    async fn patch_stats(&self, campaign: &mut Campaign, cap: u32) {
        campaign.progress = progress_for(campaign.stats.leads_extracted, cap);
        if let Err(e) = self.patch_campaign(campaign, cap).await {
            warn!(campaign = %campaign.id, error = %format!("{e:#}"), "stats patch failed");
        }
    }

    /// Terminal transition: status, stop reason, finish stamp, checkpoint
    /// cleanup.
    async fn finish(
        &self,
        campaign: &mut Campaign,
        status: CampaignStatus,
        reason: StopReason,
        cap: u32,
    ) -> Result<()> {
        campaign.status = status;
        campaign.stats.stop_reason = Some(reason);
        campaign.stats.finished_at = Some(Utc::now());
        campaign.progress = match reason {
            StopReason::LimitReached => 100,
            _ => progress_for(campaign.stats.leads_extracted, cap),
        };

        let stats = serde_json::to_value(&campaign.stats).context("encode stats")?;
        self.store
            .update(
                CAMPAIGNS,
                &campaign.id,
                json!({
                    "status": campaign.status.as_str(),
                    "progress": campaign.progress,
                    "stats": stats,
                }),
            )
            .await
            .context("terminal transition")?;

        if let Err(e) = self.store.delete(CHECKPOINTS, &campaign.id).await {
            warn!(campaign = %campaign.id, error = %format!("{e:#}"), "checkpoint cleanup failed");
        }

        info!(
            campaign = %campaign.id,
            status = status.as_str(),
            stop_reason = reason.as_str(),
            leads = campaign.stats.leads_extracted,
            errors = campaign.stats.errors,
            "🏁 Campaign finished"
        );
        Ok(())
    }

    async fn load_checkpoint(&self, campaign_id: &str) -> Option<Checkpoint> {
        let docs = self
            .store
            .find(CHECKPOINTS, json!({ "id": campaign_id }), FindOptions::default())
            .await
            .ok()?;
        docs.into_iter()
            .next()
            .and_then(|doc| serde_json::from_value(doc).ok())
    }

    async fn save_checkpoint(&self, campaign_id: &str, last_seed_index: usize, total: u64) {
        let doc = json!({
            "id": campaign_id,
            "lastSeedIndex": last_seed_index,
            "totalCollected": total,
        });
        let patched = self
            .store
            .update(CHECKPOINTS, campaign_id, doc.clone())
            .await
            .is_ok();
        if !patched {
            if let Err(e) = self.store.insert_if_absent(CHECKPOINTS, doc, &["id"]).await {
                warn!(campaign = campaign_id, error = %format!("{e:#}"), "checkpoint save failed");
            }
        }
    }

    async fn launch(&self) -> Result<(Box<dyn BrowserContext>, Option<String>), FetchError> {
        let proxy = self.proxies.next();
        let options = ContextOptions {
            profile_dir: self.config.profile_dir.clone(),
            viewport: self.config.viewport,
            user_agent: self.config.user_agent.clone(),
            cookies: self.config.session_cookies.clone(),
            proxy: proxy.clone(),
        };
        let context = self
            .driver
            .launch_context(options)
            .await
            .map_err(|e| FetchError::Fatal(format!("browser launch: {e:#}")))?;
        Ok((context, proxy))
    }
}

fn progress_for(leads: u64, cap: u32) -> u8 {
    if cap == 0 {
        return 100;
    }
    ((leads.saturating_mul(100) / cap as u64).min(100)) as u8
}

fn non_empty_or(preferred: String, fallback: String) -> String {
    if preferred.trim().is_empty() {
        fallback
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiring_filter_matches_spec_keywords() {
        assert!(is_hiring_related("We're HIRING backend folks"));
        assert!(is_hiring_related("new role opening on my team"));
        assert!(is_hiring_related("great opportunity in Berlin"));
        assert!(!is_hiring_related("vacation pics"));
        assert!(!is_hiring_related("book recommendations"));
    }

    #[test]
    fn progress_is_floored_and_clamped() {
        assert_eq!(progress_for(0, 3), 0);
        assert_eq!(progress_for(1, 3), 33);
        assert_eq!(progress_for(2, 3), 66);
        assert_eq!(progress_for(3, 3), 100);
        assert_eq!(progress_for(10, 3), 100);
        assert_eq!(progress_for(0, 0), 100);
    }
}
