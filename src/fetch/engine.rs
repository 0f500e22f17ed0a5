//! Browser-driven fetch loop.
//!
//! The engine owns no campaign policy: it navigates under pacing admission,
//! classifies provider pushback, and yields raw records one at a time. The
//! orchestrator decides what to do with them and when to stop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::browser::BrowserPage;
use crate::cancel::{sleep_cancellable, CancelSignal};
use crate::errors::FetchError;
use crate::fetch::cards::{self, CompanyCard};
use crate::fetch::detect::{classify_page, PageStatus};
use crate::fetch::host_of;
use crate::models::RawCapture;
use crate::pacing::{Admission, PacingGovernor};
use crate::proxy::ProxyPool;

#[derive(Debug, Clone)]
pub struct FetchEngineConfig {
    /// Navigation deadline (domcontentloaded).
    pub nav_timeout: Duration,
    /// Consecutive empty-scroll retries before a long wait.
    pub quick_retries: u32,
    /// Long waits before the loop gives up.
    pub long_wait_retries: u32,
    pub long_wait: Duration,
    /// Inter-card delay bounds. Part of the pacing contract, not optional.
    pub card_delay_min: Duration,
    pub card_delay_max: Duration,
    pub card_selector: String,
    pub company_card_selector: String,
}

impl Default for FetchEngineConfig {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(60),
            quick_retries: 3,
            long_wait_retries: 3,
            long_wait: Duration::from_secs(60),
            card_delay_min: Duration::from_secs(18),
            card_delay_max: Duration::from_secs(30),
            card_selector: "div.feed-shared-update-v2, div[data-urn^='urn:li:activity']"
                .to_string(),
            company_card_selector: "li.reusable-search__result-container, .entity-result"
                .to_string(),
        }
    }
}

/// Why a harvest loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStop {
    CapReached,
    Exhausted,
}

pub struct FetchEngine {
    pacing: Arc<PacingGovernor>,
    proxies: Arc<ProxyPool>,
    config: FetchEngineConfig,
}

impl FetchEngine {
    pub fn new(
        pacing: Arc<PacingGovernor>,
        proxies: Arc<ProxyPool>,
        config: FetchEngineConfig,
    ) -> Self {
        Self {
            pacing,
            proxies,
            config,
        }
    }

    pub fn config(&self) -> &FetchEngineConfig {
        &self.config
    }

    /// Navigate under pacing admission and classify the landing page.
    /// Success and pushback feed back into the governor and the proxy pool.
    pub async fn navigate(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        proxy: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let host = host_of(url);
        match self.pacing.acquire(&host).await {
            Admission::Granted => {}
            Admission::Blocked {
                reason,
                retry_after,
            } => {
                return Err(FetchError::Blocked {
                    reason,
                    retry_after,
                })
            }
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        debug!(url, host = %host, "navigating");
        if let Err(e) = page.goto(url, self.config.nav_timeout).await {
            self.pacing.record_error(&host);
            if let Some(proxy) = proxy {
                self.proxies.record_failure(proxy, "navigation failed");
            }
            return Err(FetchError::Transient(e.context(format!("navigate {url}"))));
        }

        let resolved = page
            .url()
            .await
            .map_err(|e| FetchError::Transient(e.context("resolve url")))?;
        let body = page.body_text().await.unwrap_or_default();

        match classify_page(&resolved, &body) {
            PageStatus::Ok => {
                self.pacing.record_success(&host);
                if let Some(proxy) = proxy {
                    self.proxies.record_success(proxy);
                }
                Ok(())
            }
            PageStatus::RateLimited => {
                self.pacing.record_rate_limit(&host);
                warn!(url = %resolved, "provider pushback on navigation");
                Err(FetchError::RateLimited)
            }
            PageStatus::Unauthenticated => {
                warn!(url = %resolved, "session lost on navigation");
                Err(FetchError::Unauthenticated)
            }
        }
    }

    /// Start a scroll-and-harvest session over an already-navigated list
    /// page. `cap` bounds harvested records.
    pub fn harvest<'a>(
        &'a self,
        page: &'a dyn BrowserPage,
        cancel: CancelSignal,
        cap: u32,
        proxy: Option<String>,
    ) -> HarvestSession<'a> {
        HarvestSession {
            engine: self,
            page,
            cancel,
            proxy,
            host: String::new(),
            cap,
            harvested: 0,
            cursor: 0,
            seen: HashSet::new(),
            quick_left: self.config.quick_retries,
            long_left: self.config.long_wait_retries,
            stop: None,
        }
    }

    /// Fetch one specific post page (no scroll loop).
    pub async fn fetch_single_post(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        proxy: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<Option<RawCapture>, FetchError> {
        self.navigate(page, url, proxy, cancel).await?;

        let cards = page
            .query_all(&self.config.card_selector)
            .await
            .map_err(|e| FetchError::Transient(e.context("query post card")))?;
        let Some(card) = cards.first() else {
            return Ok(None);
        };

        cards::extract_card(card.as_ref())
            .await
            .map_err(|e| FetchError::Transient(e.context("extract post card")))
    }

    /// Harvest company cards from the current directory page, scrolling with
    /// the quick-retry budget until no new cards appear.
    pub async fn harvest_directory_page(
        &self,
        page: &dyn BrowserPage,
        cancel: &CancelSignal,
    ) -> Result<Vec<CompanyCard>, FetchError> {
        let mut collected: Vec<CompanyCard> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = 0usize;
        let mut quick_left = self.config.quick_retries;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            self.check_pushback(page).await?;

            let elements = page
                .query_all(&self.config.company_card_selector)
                .await
                .map_err(|e| FetchError::Transient(e.context("query company cards")))?;

            let mut progressed = false;
            while cursor < elements.len() {
                let element = &elements[cursor];
                cursor += 1;
                match cards::extract_company_card(element.as_ref()).await {
                    Ok(Some(card)) if seen.insert(card.linkedin_url.clone()) => {
                        collected.push(card);
                        progressed = true;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "company card extraction failed, skipping");
                    }
                }
            }

            if progressed {
                quick_left = self.config.quick_retries;
                continue;
            }
            if quick_left == 0 {
                return Ok(collected);
            }
            quick_left -= 1;
            self.human_scroll(page, cancel).await?;
        }
    }

    /// A short burst of human-paced wheel events.
    async fn human_scroll(
        &self,
        page: &dyn BrowserPage,
        cancel: &CancelSignal,
    ) -> Result<(), FetchError> {
        let steps: Vec<(f64, u64)> = {
            let mut rng = rand::thread_rng();
            let count = rng.gen_range(2..=4);
            (0..count)
                .map(|_| {
                    (
                        rng.gen_range(200..=600) as f64,
                        rng.gen_range(800..=1500u64),
                    )
                })
                .collect()
        };

        for (delta_y, pause_ms) in steps {
            page.wheel(0.0, delta_y)
                .await
                .map_err(|e| FetchError::Transient(e.context("wheel")))?;
            sleep_cancellable(Duration::from_millis(pause_ms), cancel).await?;
        }
        Ok(())
    }

    /// Re-classify the current DOM; scroll responses can surface pushback
    /// after the initial navigation succeeded.
    async fn check_pushback(&self, page: &dyn BrowserPage) -> Result<(), FetchError> {
        let resolved = page
            .url()
            .await
            .map_err(|e| FetchError::Transient(e.context("resolve url")))?;
        let body = page.body_text().await.unwrap_or_default();
        match classify_page(&resolved, &body) {
            PageStatus::Ok => Ok(()),
            PageStatus::RateLimited => {
                self.pacing.record_rate_limit(&host_of(&resolved));
                Err(FetchError::RateLimited)
            }
            PageStatus::Unauthenticated => Err(FetchError::Unauthenticated),
        }
    }
}

/// Pull-style iterator over harvested records. The orchestrator consumes
/// records one at a time and owns every stop decision beyond the cap.
pub struct HarvestSession<'a> {
    engine: &'a FetchEngine,
    page: &'a dyn BrowserPage,
    cancel: CancelSignal,
    proxy: Option<String>,
    host: String,
    cap: u32,
    harvested: u32,
    cursor: usize,
    seen: HashSet<String>,
    quick_left: u32,
    long_left: u32,
    stop: Option<HarvestStop>,
}

impl<'a> HarvestSession<'a> {
    /// Why the session ended; `None` while records may still be produced.
    pub fn stop(&self) -> Option<HarvestStop> {
        self.stop
    }

    pub fn harvested(&self) -> u32 {
        self.harvested
    }

    /// Yield the next raw record, or `None` when a stop condition fired.
    /// Provider pushback and auth loss surface as errors.
    pub async fn next_record(&mut self) -> Result<Option<RawCapture>, FetchError> {
        if self.stop.is_some() {
            return Ok(None);
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if self.harvested >= self.cap {
                self.stop = Some(HarvestStop::CapReached);
                return Ok(None);
            }

            self.engine.check_pushback(self.page).await?;
            if self.host.is_empty() {
                if let Ok(url) = self.page.url().await {
                    self.host = host_of(&url);
                }
            }

            let elements = self
                .page
                .query_all(&self.engine.config.card_selector)
                .await
                .map_err(|e| FetchError::Transient(e.context("query cards")))?;

            if self.cursor < elements.len() {
                let element = &elements[self.cursor];
                self.cursor += 1;
                // New DOM appeared; both retry budgets start over.
                self.quick_left = self.engine.config.quick_retries;
                self.long_left = self.engine.config.long_wait_retries;

                if let Err(e) = element.scroll_into_view().await {
                    self.record_transient("scroll into view", &e);
                    continue;
                }
                let settle = rand_ms(1_000, 2_000);
                sleep_cancellable(settle, &self.cancel).await?;

                match cards::extract_card(element.as_ref()).await {
                    Ok(Some(raw)) => {
                        if !self.seen.insert(raw.provider_id.clone()) {
                            continue;
                        }
                        if self.harvested > 0 {
                            let pause = rand_between(
                                self.engine.config.card_delay_min,
                                self.engine.config.card_delay_max,
                            );
                            sleep_cancellable(pause, &self.cancel).await?;
                        }
                        self.harvested += 1;
                        return Ok(Some(raw));
                    }
                    Ok(None) => {
                        debug!("card skipped: no provider id");
                        continue;
                    }
                    Err(e) => {
                        self.record_transient("card extraction", &e);
                        continue;
                    }
                }
            }

            // No new cards in the DOM: spend the retry budgets.
            if self.quick_left > 0 {
                self.quick_left -= 1;
                self.engine.human_scroll(self.page, &self.cancel).await?;
                continue;
            }
            if self.long_left > 0 {
                self.long_left -= 1;
                self.quick_left = self.engine.config.quick_retries;
                debug!(
                    long_waits_left = self.long_left,
                    "empty scrolls exhausted, long wait"
                );
                sleep_cancellable(self.engine.config.long_wait, &self.cancel).await?;
                continue;
            }

            self.stop = Some(HarvestStop::Exhausted);
            return Ok(None);
        }
    }

    fn record_transient(&self, what: &str, error: &anyhow::Error) {
        warn!(error = %error, what, "transient card failure, skipping");
        if !self.host.is_empty() {
            self.engine.pacing.record_error(&self.host);
        }
        if let Some(proxy) = &self.proxy {
            self.engine.proxies.record_failure(proxy, what);
        }
    }
}

fn rand_ms(lo: u64, hi: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

fn rand_between(lo: Duration, hi: Duration) -> Duration {
    let lo_ms = lo.as_millis() as u64;
    let hi_ms = hi.as_millis() as u64;
    if hi_ms <= lo_ms {
        return lo;
    }
    rand_ms(lo_ms, hi_ms)
}
