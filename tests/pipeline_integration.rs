//! End-to-end pipeline scenarios against scripted doubles.
//!
//! A stub browser serves canned cards, a stub LLM either extracts or times
//! out, and the in-memory store verifies persistence. Tests run under
//! paused tokio time so the mandated pacing sleeps are asserted on the
//! virtual clock instead of being waited out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use leadbot_backend::browser::{
    BrowserContext, BrowserDriver, BrowserPage, ContextOptions, PageElement,
};
use leadbot_backend::campaigns::{CampaignRunner, RunnerConfig};
use leadbot_backend::cancel::{cancel_pair, CancelSignal};
use leadbot_backend::extract::{CompletionOptions, LeadExtractor, LlmClient};
use leadbot_backend::fetch::FetchEngineConfig;
use leadbot_backend::models::{Campaign, EnrichmentStatus, Lead, LeadFields};
use leadbot_backend::pacing::{Admission, PacingGovernor};
use leadbot_backend::proxy::{ProxyPool, RotationStrategy};
use leadbot_backend::store::{DocumentStore, FindOptions, MemoryStore, CAMPAIGNS, CHECKPOINTS, LEADS};

// ---------------------------------------------------------------------------
// Stub browser
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct StubCard {
    data_urn: Option<String>,
    author_name: String,
    headline: String,
    profile_href: String,
    text: String,
    datetime: Option<String>,
    company_href: Option<String>,
}

impl StubCard {
    fn post(id: &str, author: &str, text: &str) -> Self {
        Self {
            data_urn: Some(format!("urn:li:activity:{id}")),
            author_name: author.to_string(),
            headline: format!("{author} — headline"),
            profile_href: format!(
                "https://www.linkedin.com/in/{}/",
                author.to_lowercase().replace(' ', "-")
            ),
            text: text.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
enum StubNode {
    Card(StubCard),
    Text(String),
    Anchor { href: String },
    Time { datetime: Option<String> },
}

#[async_trait]
impl PageElement for StubNode {
    async fn inner_text(&self) -> Result<String> {
        Ok(match self {
            StubNode::Card(card) => card.text.clone(),
            StubNode::Text(text) => text.clone(),
            _ => String::new(),
        })
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(match (self, name) {
            (StubNode::Card(card), "data-urn") => card.data_urn.clone(),
            (StubNode::Anchor { href }, "href") => Some(href.clone()),
            (StubNode::Time { datetime }, "datetime") => datetime.clone(),
            _ => None,
        })
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let StubNode::Card(card) = self else {
            return Ok(Vec::new());
        };

        let nodes: Vec<StubNode> = if selector == "[data-urn]" {
            Vec::new()
        } else if selector.contains("actor__name")
            || selector.contains("actor__title")
            || selector.contains("feed-shared-actor__name")
        {
            vec![StubNode::Text(card.author_name.clone())]
        } else if selector.contains("actor__description")
            || selector.contains("feed-shared-actor__description")
        {
            vec![StubNode::Text(card.headline.clone())]
        } else if selector.contains("update-components-text")
            || selector.contains("commentary")
            || selector.contains("update-v2__description")
            || selector.contains("feed-shared-text")
        {
            vec![StubNode::Text(card.text.clone())]
        } else if selector.contains("article__title")
            || selector.contains("meta-link")
            || selector.contains("/feed/update/")
            || selector.contains("View full post")
            || selector.contains("link-to-post")
        {
            Vec::new()
        } else if selector.contains("/in/") {
            if card.profile_href.is_empty() {
                Vec::new()
            } else {
                vec![StubNode::Anchor {
                    href: card.profile_href.clone(),
                }]
            }
        } else if selector == "time" {
            vec![StubNode::Time {
                datetime: card.datetime.clone(),
            }]
        } else if selector == "a" {
            let mut anchors = Vec::new();
            if !card.profile_href.is_empty() {
                anchors.push(StubNode::Anchor {
                    href: card.profile_href.clone(),
                });
            }
            if let Some(company) = &card.company_href {
                anchors.push(StubNode::Anchor {
                    href: company.clone(),
                });
            }
            anchors
        } else {
            Vec::new()
        };

        Ok(nodes
            .into_iter()
            .map(|node| Box::new(node) as Box<dyn PageElement>)
            .collect())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        Ok(())
    }
}

/// What the stub serves for one URL (matched exactly, then by prefix).
#[derive(Clone, Default)]
struct PageScript {
    resolved_url: Option<String>,
    body_text: String,
    cards: Vec<StubCard>,
}

struct StubPage {
    routes: Arc<Vec<(String, PageScript)>>,
    state: Mutex<(String, PageScript)>,
}

impl StubPage {
    fn new(routes: Arc<Vec<(String, PageScript)>>) -> Self {
        Self {
            routes,
            state: Mutex::new(("about:blank".to_string(), PageScript::default())),
        }
    }
}

#[async_trait]
impl BrowserPage for StubPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let script = self
            .routes
            .iter()
            .find(|(key, _)| key == url)
            .or_else(|| self.routes.iter().find(|(key, _)| url.starts_with(key)))
            .map(|(_, script)| script.clone())
            .unwrap_or_default();
        let resolved = script
            .resolved_url
            .clone()
            .unwrap_or_else(|| url.to_string());
        *self.state.lock() = (resolved, script);
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state.lock().0.clone())
    }

    async fn content(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn title(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn body_text(&self) -> Result<String> {
        Ok(self.state.lock().1.body_text.clone())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        if selector.contains("feed-shared-update-v2") {
            let cards = self.state.lock().1.cards.clone();
            return Ok(cards
                .into_iter()
                .map(|card| Box::new(StubNode::Card(card)) as Box<dyn PageElement>)
                .collect());
        }
        Ok(Vec::new())
    }

    async fn wheel(&self, _delta_x: f64, _delta_y: f64) -> Result<()> {
        Ok(())
    }
}

struct StubContext {
    routes: Arc<Vec<(String, PageScript)>>,
}

#[async_trait]
impl BrowserContext for StubContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(StubPage::new(self.routes.clone())))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct StubDriver {
    routes: Arc<Vec<(String, PageScript)>>,
    launches: Mutex<u32>,
}

impl StubDriver {
    fn new(routes: Vec<(String, PageScript)>) -> Self {
        Self {
            routes: Arc::new(routes),
            launches: Mutex::new(0),
        }
    }

    fn launch_count(&self) -> u32 {
        *self.launches.lock()
    }
}

#[async_trait]
impl BrowserDriver for StubDriver {
    async fn launch_context(&self, _options: ContextOptions) -> Result<Box<dyn BrowserContext>> {
        *self.launches.lock() += 1;
        Ok(Box::new(StubContext {
            routes: self.routes.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Stub LLM
// ---------------------------------------------------------------------------

enum StubLlm {
    Extracts,
    TimesOut,
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _opts: &CompletionOptions,
    ) -> Result<String> {
        match self {
            StubLlm::Extracts => {
                Ok(r#"{"company":"Acme","jobTitles":["Backend Engineer"],"workMode":"remote"}"#
                    .to_string())
            }
            StubLlm::TimesOut => Err(anyhow!("llm request timed out after 90s")),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryStore>,
    pacing: Arc<PacingGovernor>,
    runner: Arc<CampaignRunner>,
    driver: Arc<StubDriver>,
}

fn harness(routes: Vec<(String, PageScript)>, llm: StubLlm) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let pacing = Arc::new(PacingGovernor::default());
    let proxies = Arc::new(ProxyPool::new(Vec::new(), RotationStrategy::Random));
    let driver = Arc::new(StubDriver::new(routes));
    let extractor = Arc::new(LeadExtractor::new(Arc::new(llm)));

    let runner = Arc::new(CampaignRunner::new(
        store.clone() as Arc<dyn DocumentStore>,
        driver.clone() as Arc<dyn BrowserDriver>,
        pacing.clone(),
        proxies,
        extractor,
        FetchEngineConfig::default(),
        RunnerConfig::default(),
    ));

    Harness {
        store,
        pacing,
        runner,
        driver,
    }
}

async fn insert_campaign(store: &MemoryStore, doc: Value) {
    store
        .insert_if_absent(CAMPAIGNS, doc, &[])
        .await
        .expect("insert campaign");
}

async fn load_campaign(store: &MemoryStore, id: &str) -> Campaign {
    let docs = store
        .find(CAMPAIGNS, json!({ "id": id }), FindOptions::default())
        .await
        .expect("find campaign");
    serde_json::from_value(docs.into_iter().next().expect("campaign present"))
        .expect("decode campaign")
}

async fn load_leads(store: &MemoryStore, tenant: &str) -> Vec<Lead> {
    let docs = store
        .find(LEADS, json!({ "tenantId": tenant }), FindOptions::default())
        .await
        .expect("find leads");
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).expect("decode lead"))
        .collect()
}

fn search_campaign(id: &str, limit: u32) -> Value {
    json!({
        "id": id,
        "tenantId": "t1",
        "name": "ai engineers",
        "source": "search-posts",
        "status": "queued",
        "query": { "roles": "AI engineer", "period": "past week", "limit": limit },
        "maxItems": limit,
    })
}

const SEARCH_PREFIX: &str = "https://www.linkedin.com/search/results/content/";

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn search_campaign_stops_at_cap() {
    let cards = vec![
        StubCard::post("1001", "Ann A", "hiring a platform engineer"),
        StubCard::post("1002", "Bob B", "we are hiring ML folks"),
        StubCard::post("1003", "Cid C", "open role on my team"),
        StubCard::post("1004", "Dee D", "another opening"),
        StubCard::post("1005", "Eve E", "yet another role"),
    ];
    let h = harness(
        vec![(
            SEARCH_PREFIX.to_string(),
            PageScript {
                cards,
                ..Default::default()
            },
        )],
        StubLlm::Extracts,
    );
    insert_campaign(&h.store, search_campaign("c1", 3)).await;

    let started = tokio::time::Instant::now();
    h.runner.run("c1", CancelSignal::never()).await.unwrap();
    let elapsed = started.elapsed();

    let leads = load_leads(&h.store, "t1").await;
    let ids: Vec<&str> = leads.iter().map(|l| l.provider_id.as_str()).collect();
    assert_eq!(ids, vec!["1001", "1002", "1003"]);
    for lead in &leads {
        assert_eq!(
            lead.post_url,
            format!(
                "https://www.linkedin.com/feed/update/urn:li:activity:{}/",
                lead.provider_id
            )
        );
        assert!(!lead.post_url.contains("/in/"));
    }

    let campaign = load_campaign(&h.store, "c1").await;
    assert_eq!(campaign.status.as_str(), "completed");
    assert_eq!(campaign.progress, 100);
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("limit_reached".to_string())
    );
    assert!(campaign.stats.started_at.is_some());
    assert!(campaign.stats.finished_at.is_some());

    // Two inter-card pauses of at least 18s each were scheduled.
    assert!(
        elapsed >= Duration::from_secs(36),
        "expected >= 36s of scheduled pacing, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn seed_feed_applies_hiring_keyword_filter() {
    let seed = "https://www.linkedin.com/in/u/recent-activity/all/";
    let cards = vec![
        StubCard::post("2001", "Ann A", "we're hiring backend"),
        StubCard::post("2002", "Bob B", "vacation pics"),
        StubCard::post("2003", "Cid C", "new role opening on my team"),
        StubCard::post("2004", "Dee D", "book recommendations"),
    ];
    let h = harness(
        vec![(
            seed.to_string(),
            PageScript {
                cards,
                ..Default::default()
            },
        )],
        StubLlm::Extracts,
    );
    insert_campaign(
        &h.store,
        json!({
            "id": "c2",
            "tenantId": "t1",
            "name": "seed feed",
            "source": "seed-urls",
            "seedUrls": [seed],
            "status": "queued",
            "query": { "limit": 10 },
            "maxItems": 10,
        }),
    )
    .await;

    h.runner.run("c2", CancelSignal::never()).await.unwrap();

    let leads = load_leads(&h.store, "t1").await;
    let ids: Vec<&str> = leads.iter().map(|l| l.provider_id.as_str()).collect();
    assert_eq!(ids, vec!["2001", "2003"]);

    let campaign = load_campaign(&h.store, "c2").await;
    assert_eq!(campaign.status.as_str(), "completed");
    assert_eq!(campaign.stats.posts_processed, 4);
    assert_eq!(campaign.stats.leads_extracted, 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_cascade_burns_the_host() {
    let checkpoint = PageScript {
        resolved_url: Some("https://www.linkedin.com/checkpoint/challenge/".to_string()),
        ..Default::default()
    };
    let seeds: Vec<String> = (1..=3)
        .map(|n| format!("https://www.linkedin.com/in/user{n}/recent-activity/all/"))
        .collect();
    let routes = seeds
        .iter()
        .map(|seed| (seed.clone(), checkpoint.clone()))
        .collect();

    let h = harness(routes, StubLlm::Extracts);
    insert_campaign(
        &h.store,
        json!({
            "id": "c3",
            "tenantId": "t1",
            "name": "cascade",
            "source": "seed-urls",
            "seedUrls": seeds,
            "status": "queued",
            "query": { "limit": 9 },
            "maxItems": 9,
        }),
    )
    .await;

    h.runner.run("c3", CancelSignal::never()).await.unwrap();

    let campaign = load_campaign(&h.store, "c3").await;
    assert_eq!(campaign.status.as_str(), "failed");
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("rate_limit_detected".to_string())
    );

    let stats = h.pacing.stats("www.linkedin.com").expect("host tracked");
    assert_eq!(stats.consecutive_rate_limits, 3);
    assert!(stats.extended_backoff_remaining_secs.is_some());

    match h.pacing.acquire("www.linkedin.com").await {
        Admission::Blocked { retry_after, .. } => {
            assert!(retry_after > Duration::from_secs(7000));
            assert!(retry_after <= Duration::from_secs(7200));
        }
        Admission::Granted => panic!("expected blocked host"),
    }

    assert!(load_leads(&h.store, "t1").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn extractor_outage_keeps_lead_pending() {
    let cards = vec![StubCard::post("7777", "Ann A", "hiring senior engineer")];
    let h = harness(
        vec![(
            SEARCH_PREFIX.to_string(),
            PageScript {
                cards,
                ..Default::default()
            },
        )],
        StubLlm::TimesOut,
    );
    insert_campaign(&h.store, search_campaign("c4", 1)).await;

    h.runner.run("c4", CancelSignal::never()).await.unwrap();

    let leads = load_leads(&h.store, "t1").await;
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.provider_id, "7777");
    assert_eq!(lead.enrichment_status, EnrichmentStatus::Pending);
    assert!(lead
        .enrichment_error
        .as_deref()
        .is_some_and(|e| !e.is_empty()));
    assert_eq!(lead.raw_metadata.post_text, "hiring senior engineer");
    assert_eq!(lead.fields, LeadFields::default());

    let campaign = load_campaign(&h.store, "c4").await;
    assert_eq!(campaign.status.as_str(), "completed");
}

#[tokio::test(start_paused = true)]
async fn rerun_is_idempotent_per_tenant() {
    let routes = vec![(
        SEARCH_PREFIX.to_string(),
        PageScript {
            cards: vec![StubCard::post("2001", "Ann A", "hiring")],
            ..Default::default()
        },
    )];
    let h = harness(routes, StubLlm::Extracts);
    insert_campaign(&h.store, search_campaign("c5a", 1)).await;
    insert_campaign(&h.store, search_campaign("c5b", 1)).await;

    h.runner.run("c5a", CancelSignal::never()).await.unwrap();
    h.runner.run("c5b", CancelSignal::never()).await.unwrap();

    assert_eq!(
        h.store.count(LEADS, json!({ "tenantId": "t1" })).await.unwrap(),
        1
    );
    let first = load_campaign(&h.store, "c5a").await;
    let second = load_campaign(&h.store, "c5b").await;
    assert_eq!(first.status.as_str(), "completed");
    assert_eq!(second.status.as_str(), "completed");
    assert_eq!(first.stats.leads_extracted, 1);
    assert_eq!(second.stats.leads_extracted, 0);
}

#[tokio::test(start_paused = true)]
async fn zero_limit_completes_without_fetching() {
    let h = harness(Vec::new(), StubLlm::Extracts);
    insert_campaign(&h.store, search_campaign("c6", 0)).await;

    h.runner.run("c6", CancelSignal::never()).await.unwrap();

    let campaign = load_campaign(&h.store, "c6").await;
    assert_eq!(campaign.status.as_str(), "completed");
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("limit_reached".to_string())
    );
    assert!(load_leads(&h.store, "t1").await.is_empty());
    assert_eq!(h.driver.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn lost_session_fails_campaign() {
    let login = PageScript {
        resolved_url: Some("https://www.linkedin.com/login?session_redirect=/feed/".to_string()),
        ..Default::default()
    };
    let h = harness(
        vec![(SEARCH_PREFIX.to_string(), login)],
        StubLlm::Extracts,
    );
    insert_campaign(&h.store, search_campaign("c7", 5)).await;

    h.runner.run("c7", CancelSignal::never()).await.unwrap();

    let campaign = load_campaign(&h.store, "c7").await;
    assert_eq!(campaign.status.as_str(), "failed");
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("unauthenticated".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_campaign() {
    let cards: Vec<StubCard> = (0..20)
        .map(|n| StubCard::post(&format!("9{n:03}"), "Ann A", "hiring engineers"))
        .collect();
    let h = harness(
        vec![(
            SEARCH_PREFIX.to_string(),
            PageScript {
                cards,
                ..Default::default()
            },
        )],
        StubLlm::Extracts,
    );
    insert_campaign(&h.store, search_campaign("c8", 20)).await;

    let (handle, signal) = cancel_pair();
    handle.cancel();
    h.runner.run("c8", signal).await.unwrap();

    let campaign = load_campaign(&h.store, "c8").await;
    assert_eq!(campaign.status.as_str(), "stopped");
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("cancelled".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn checkpoint_resume_skips_finished_seeds() {
    let seed_a = "https://www.linkedin.com/in/aa/recent-activity/all/";
    let seed_b = "https://www.linkedin.com/in/bb/recent-activity/all/";
    let routes = vec![
        (
            seed_a.to_string(),
            PageScript {
                cards: vec![StubCard::post("3001", "Ann A", "hiring platform folks")],
                ..Default::default()
            },
        ),
        (
            seed_b.to_string(),
            PageScript {
                cards: vec![StubCard::post("3002", "Bob B", "hiring infra folks")],
                ..Default::default()
            },
        ),
    ];
    let h = harness(routes, StubLlm::Extracts);
    insert_campaign(
        &h.store,
        json!({
            "id": "c10",
            "tenantId": "t1",
            "name": "resume",
            "source": "seed-urls",
            "seedUrls": [seed_a, seed_b],
            "status": "queued",
            "query": { "limit": 10 },
            "maxItems": 10,
        }),
    )
    .await;
    // Checkpoint left behind by a crashed run that finished the first seed.
    h.store
        .insert_if_absent(
            CHECKPOINTS,
            json!({ "id": "c10", "lastSeedIndex": 0, "totalCollected": 1 }),
            &["id"],
        )
        .await
        .unwrap();

    h.runner.run("c10", CancelSignal::never()).await.unwrap();

    let leads = load_leads(&h.store, "t1").await;
    let ids: Vec<&str> = leads.iter().map(|l| l.provider_id.as_str()).collect();
    assert_eq!(ids, vec!["3002"], "first seed must be skipped");

    let campaign = load_campaign(&h.store, "c10").await;
    assert_eq!(campaign.status.as_str(), "completed");
    // Checkpoints are cleared on terminal transition.
    assert_eq!(
        h.store
            .count(CHECKPOINTS, json!({ "id": "c10" }))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn empty_feed_exhausts_and_completes() {
    let h = harness(
        vec![(SEARCH_PREFIX.to_string(), PageScript::default())],
        StubLlm::Extracts,
    );
    insert_campaign(&h.store, search_campaign("c9", 5)).await;

    h.runner.run("c9", CancelSignal::never()).await.unwrap();

    let campaign = load_campaign(&h.store, "c9").await;
    assert_eq!(campaign.status.as_str(), "completed");
    assert_eq!(
        campaign.stats.stop_reason.map(|r| r.as_str().to_string()),
        Some("exhausted".to_string())
    );
    assert_eq!(campaign.stats.leads_extracted, 0);
}
