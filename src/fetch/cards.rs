//! Per-card DOM extraction.
//!
//! LinkedIn's feed markup shifts frequently, so every field is read through
//! a ranked fallback chain, most reliable selector first. Missing optional
//! fields come back as empty strings; a card with no resolvable provider ID
//! is skipped entirely.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::browser::{BrowserPage, PageElement};
use crate::models::RawCapture;

lazy_static! {
    static ref ACTIVITY_URN_RE: Regex =
        Regex::new(r"urn:li:activity:(\d+)").expect("valid activity urn pattern");
    static ref POSTS_PATH_RE: Regex =
        Regex::new(r"/posts/[^\s'\x22]*?(\d{7,})").expect("valid posts path pattern");
    static ref ACTIVITY_LOOSE_RE: Regex =
        Regex::new(r"activity[:-](\d+)").expect("valid loose activity pattern");
}

/// Timestamp-style links inside a card, ranked.
const TIMESTAMP_LINK_SELECTORS: [&str; 2] = [
    "a.update-components-actor__sub-description-link",
    "a[href*='/feed/update/']",
];

/// Explicit "view post" links, ranked.
const VIEW_POST_LINK_SELECTORS: [&str; 2] = [
    "a[aria-label='View full post']",
    "a.update-components-mini-update-v2__link-to-post",
];

const ACTOR_LINK_SELECTORS: [&str; 2] = [
    "a.update-components-actor__meta-link",
    "a[href*='/in/']",
];

const ACTOR_NAME_SELECTORS: [&str; 3] = [
    ".update-components-actor__name",
    ".update-components-actor__title",
    ".feed-shared-actor__name",
];

const HEADLINE_SELECTORS: [&str; 2] = [
    ".update-components-actor__description",
    ".feed-shared-actor__description",
];

const POST_TEXT_SELECTORS: [&str; 4] = [
    ".update-components-text",
    ".update-components-update-v2__commentary",
    ".feed-shared-update-v2__description",
    ".feed-shared-text",
];

const POST_TITLE_SELECTORS: [&str; 2] = [
    ".update-components-article__title",
    ".feed-shared-article__title",
];

/// Industry-bearing elements on a company page, ranked. Shared with the
/// extractor's optional company enrichment step.
pub const INDUSTRY_PAGE_SELECTORS: [&str; 3] = [
    "dd[data-test-org-about-industry]",
    ".org-about-module__industry",
    ".org-top-card-summary-info-list__info-item",
];

/// Canonical activity URL. Always the post itself, never the author
/// profile.
pub fn canonical_post_url(provider_id: &str) -> String {
    format!("https://www.linkedin.com/feed/update/urn:li:activity:{provider_id}/")
}

/// Extract one raw record from a feed card, or `None` when the card has no
/// resolvable provider ID (promoted modules, ghost cards).
pub async fn extract_card(card: &dyn PageElement) -> Result<Option<RawCapture>> {
    let provider_id = match resolve_provider_id(card).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let author_profile_url = first_href(card, &ACTOR_LINK_SELECTORS)
        .await?
        .map(|href| absolute_url(&href))
        .unwrap_or_default();

    Ok(Some(RawCapture {
        post_url: canonical_post_url(&provider_id),
        provider_id,
        author_name: first_text(card, &ACTOR_NAME_SELECTORS).await?,
        author_headline: first_text(card, &HEADLINE_SELECTORS).await?,
        author_profile_url,
        post_title: first_text(card, &POST_TITLE_SELECTORS).await?,
        post_text: first_text(card, &POST_TEXT_SELECTORS).await?,
        posted_at: extract_timestamp(card).await,
        company_url: first_company_href(card).await?.unwrap_or_default(),
    }))
}

/// Provider-ID resolution chain, in priority order: the card's own
/// `data-urn`, descendant `data-urn`s, timestamp-style link hrefs, "view
/// post" link hrefs, then any descendant anchor with an activity-shaped
/// href.
async fn resolve_provider_id(card: &dyn PageElement) -> Result<Option<String>> {
    if let Some(urn) = card.attribute("data-urn").await? {
        if let Some(id) = capture_digits(&ACTIVITY_URN_RE, &urn) {
            return Ok(Some(id));
        }
    }

    for descendant in card.query_all("[data-urn]").await? {
        if let Some(urn) = descendant.attribute("data-urn").await? {
            if let Some(id) = capture_digits(&ACTIVITY_URN_RE, &urn) {
                return Ok(Some(id));
            }
        }
    }

    for selectors in [&TIMESTAMP_LINK_SELECTORS, &VIEW_POST_LINK_SELECTORS] {
        for selector in selectors.iter() {
            for link in card.query_all(selector).await? {
                if let Some(href) = link.attribute("href").await? {
                    if let Some(id) = id_from_href(&href) {
                        return Ok(Some(id));
                    }
                }
            }
        }
    }

    for anchor in card.query_all("a").await? {
        if let Some(href) = anchor.attribute("href").await? {
            if let Some(id) = capture_digits(&ACTIVITY_LOOSE_RE, &href) {
                return Ok(Some(id));
            }
        }
    }

    Ok(None)
}

/// Digit run from an href in any of the known shapes:
/// `urn:li:activity:<n>` (also inside `/feed/update/…`) or `posts/<n>`.
fn id_from_href(href: &str) -> Option<String> {
    capture_digits(&ACTIVITY_URN_RE, href).or_else(|| capture_digits(&POSTS_PATH_RE, href))
}

fn capture_digits(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First non-empty trimmed inner text among ranked selectors, else "".
async fn first_text(root: &dyn PageElement, selectors: &[&str]) -> Result<String> {
    for selector in selectors {
        for element in root.query_all(selector).await? {
            let text = element.inner_text().await?;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
    }
    Ok(String::new())
}

async fn first_href(root: &dyn PageElement, selectors: &[&str]) -> Result<Option<String>> {
    for selector in selectors {
        for element in root.query_all(selector).await? {
            if let Some(href) = element.attribute("href").await? {
                if !href.trim().is_empty() {
                    return Ok(Some(href));
                }
            }
        }
    }
    Ok(None)
}

/// First anchor pointing at a company page, absolutized.
async fn first_company_href(root: &dyn PageElement) -> Result<Option<String>> {
    for anchor in root.query_all("a").await? {
        if let Some(href) = anchor.attribute("href").await? {
            if href.contains("/company/") {
                return Ok(Some(absolute_url(&href)));
            }
        }
    }
    Ok(None)
}

/// Provider-relative hrefs become absolute against the main host.
pub fn absolute_url(href: &str) -> String {
    if href.starts_with('/') {
        format!("https://www.linkedin.com{href}")
    } else {
        href.to_string()
    }
}

/// Posted-at timestamp: `datetime` attribute first, then the inner text of
/// a time-like element. Anything that is not ISO-parseable is dropped.
async fn extract_timestamp(card: &dyn PageElement) -> Option<DateTime<Utc>> {
    let times = card.query_all("time").await.ok()?;
    for time in times {
        if let Ok(Some(datetime)) = time.attribute("datetime").await {
            if let Some(parsed) = parse_timestamp(&datetime) {
                return Some(parsed);
            }
        }
        if let Ok(text) = time.inner_text().await {
            if let Some(parsed) = parse_timestamp(text.trim()) {
                return Some(parsed);
            }
        }
    }
    None
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            date.and_hms_opt(0, 0, 0)?,
            Utc,
        ));
    }
    None
}

// ---------------------------------------------------------------------------
// Company-directory extraction
// ---------------------------------------------------------------------------

const COMPANY_CARD_NAME_SELECTORS: [&str; 2] =
    [".entity-result__title-text", ".org-company-card__name"];

const COMPANY_CARD_TAGLINE_SELECTORS: [&str; 2] = [
    ".entity-result__primary-subtitle",
    ".org-company-card__tagline",
];

const ABOUT_NAME_SELECTORS: [&str; 2] = [".org-top-card-summary__title", "h1"];
const ABOUT_TAGLINE_SELECTORS: [&str; 1] = [".org-top-card-summary__tagline"];
const ABOUT_SIZE_SELECTORS: [&str; 2] = [
    "dd[data-test-org-about-size]",
    ".org-about-module__company-size",
];
const ABOUT_HEADQUARTERS_SELECTORS: [&str; 2] = [
    "dd[data-test-org-about-headquarters]",
    ".org-about-module__headquarters",
];
const ABOUT_FOUNDED_SELECTORS: [&str; 2] =
    ["dd[data-test-org-about-founded]", ".org-about-module__founded"];
const ABOUT_WEBSITE_SELECTORS: [&str; 2] =
    ["a[data-test-org-about-website]", ".org-about-module__website a"];
const ABOUT_SPECIALTIES_SELECTORS: [&str; 2] = [
    "dd[data-test-org-about-specialties]",
    ".org-about-module__specialties",
];
const ABOUT_FOLLOWERS_SELECTORS: [&str; 2] = [
    ".org-top-card-summary-info-list__followers",
    ".org-top-card-summary-info-list__info-item--followers",
];
const ABOUT_LOGO_SELECTORS: [&str; 2] = [
    "img.org-top-card-primary-content__logo",
    ".org-top-card-primary-content__logo img",
];

/// A company hit on a directory search page.
#[derive(Debug, Clone)]
pub struct CompanyCard {
    pub linkedin_url: String,
    pub name: String,
    pub tagline: String,
}

/// Detailed fields read from a company "about" page.
#[derive(Debug, Clone, Default)]
pub struct CompanyDetails {
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

/// Extract a directory search hit. Cards without a company link are
/// skipped.
pub async fn extract_company_card(card: &dyn PageElement) -> Result<Option<CompanyCard>> {
    let linkedin_url = match first_company_href(card).await? {
        // Normalize away tracking query strings so the URL is a stable key.
        Some(href) => strip_query(&href),
        None => return Ok(None),
    };
    Ok(Some(CompanyCard {
        linkedin_url,
        name: first_text(card, &COMPANY_CARD_NAME_SELECTORS).await?,
        tagline: first_text(card, &COMPANY_CARD_TAGLINE_SELECTORS).await?,
    }))
}

/// Read detailed company fields from an already-navigated about page.
pub async fn extract_company_about(page: &dyn BrowserPage) -> Result<CompanyDetails> {
    let root = match page.query_all("body").await?.into_iter().next() {
        Some(body) => body,
        None => return Ok(CompanyDetails::default()),
    };

    let specialties = first_text(root.as_ref(), &ABOUT_SPECIALTIES_SELECTORS)
        .await?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let website = match first_href(root.as_ref(), &ABOUT_WEBSITE_SELECTORS).await? {
        Some(href) => href,
        None => first_text(root.as_ref(), &ABOUT_WEBSITE_SELECTORS).await?,
    };

    let logo = first_attr(root.as_ref(), &ABOUT_LOGO_SELECTORS, "src")
        .await?
        .unwrap_or_default();

    Ok(CompanyDetails {
        name: first_text(root.as_ref(), &ABOUT_NAME_SELECTORS).await?,
        tagline: first_text(root.as_ref(), &ABOUT_TAGLINE_SELECTORS).await?,
        industry: first_text(root.as_ref(), &INDUSTRY_PAGE_SELECTORS).await?,
        company_size: first_text(root.as_ref(), &ABOUT_SIZE_SELECTORS).await?,
        headquarters: first_text(root.as_ref(), &ABOUT_HEADQUARTERS_SELECTORS).await?,
        founded: first_text(root.as_ref(), &ABOUT_FOUNDED_SELECTORS).await?,
        website,
        specialties,
        follower_count: first_text(root.as_ref(), &ABOUT_FOLLOWERS_SELECTORS).await?,
        logo,
    })
}

async fn first_attr(
    root: &dyn PageElement,
    selectors: &[&str],
    name: &str,
) -> Result<Option<String>> {
    for selector in selectors {
        for element in root.query_all(selector).await? {
            if let Some(value) = element.attribute(name).await? {
                if !value.trim().is_empty() {
                    return Ok(Some(value));
                }
            }
        }
    }
    Ok(None)
}

fn strip_query(href: &str) -> String {
    match url::Url::parse(href) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => href.split(['?', '#']).next().unwrap_or(href).to_string(),
    }
}
