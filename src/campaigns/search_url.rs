//! Search-URL construction and seed-URL classification.

use lazy_static::lazy_static;
use url::Url;

use crate::models::CampaignQuery;

lazy_static! {
    static ref CONTENT_SEARCH_BASE: Url =
        Url::parse("https://www.linkedin.com/search/results/content/")
            .expect("valid content search base");
    static ref COMPANY_SEARCH_BASE: Url =
        Url::parse("https://www.linkedin.com/search/results/companies/")
            .expect("valid company search base");
}

/// Content-search URL from a campaign query. Facets the query does not set
/// are simply omitted.
pub fn build_content_search_url(query: &CampaignQuery) -> String {
    let mut url = CONTENT_SEARCH_BASE.clone();
    {
        let mut pairs = url.query_pairs_mut();

        if let Some(keywords) = keywords_of(query) {
            pairs.append_pair("keywords", &keywords);
        }
        if let Some(period) = query.period.as_deref().and_then(map_period) {
            pairs.append_pair("datePosted", period);
        }
        pairs.append_pair("sortBy", map_sort(query.sort.as_deref()));
        if let Some(content_type) = query.content_type.as_deref() {
            pairs.append_pair("contentType", content_type);
        }
        if let Some(language) = query.language.as_deref() {
            pairs.append_pair("contentLanguage", language);
        }
        if let Some(degree) = query.connection_degree.as_deref().and_then(map_degree) {
            pairs.append_pair("network", degree);
        }
        if let Some(location) = query.location.as_deref() {
            pairs.append_pair("location", location);
        }
        if !query.industries.is_empty() {
            pairs.append_pair("industry", &query.industries.join(","));
        }
        if !query.company_sizes.is_empty() {
            pairs.append_pair("companySize", &query.company_sizes.join(","));
        }
        pairs.append_pair("origin", "GLOBAL_SEARCH_HEADER");
    }
    url.to_string()
}

/// Company-directory search URL. Pagination is appended separately with
/// [`with_page_param`].
pub fn build_directory_search_url(query: &CampaignQuery) -> String {
    let mut url = COMPANY_SEARCH_BASE.clone();
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(keywords) = keywords_of(query) {
            pairs.append_pair("keywords", &keywords);
        }
        if let Some(location) = query.location.as_deref() {
            pairs.append_pair("location", location);
        }
        if !query.industries.is_empty() {
            pairs.append_pair("industry", &query.industries.join(","));
        }
        if !query.company_sizes.is_empty() {
            pairs.append_pair("companySize", &query.company_sizes.join(","));
        }
    }
    url.to_string()
}

fn keywords_of(query: &CampaignQuery) -> Option<String> {
    query
        .roles
        .as_deref()
        .or(query.summary.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn map_period(label: &str) -> Option<&'static str> {
    let label = label.to_ascii_lowercase();
    if label.contains("24") || label.contains("day") {
        Some("past-24h")
    } else if label.contains("week") {
        Some("past-week")
    } else if label.contains("month") {
        Some("past-month")
    } else {
        None
    }
}

fn map_sort(sort: Option<&str>) -> &'static str {
    match sort {
        Some(s) if s.to_ascii_lowercase().contains("recent") || s.to_ascii_lowercase().contains("date") => {
            "date_posted"
        }
        _ => "relevance",
    }
}

fn map_degree(degree: &str) -> Option<&'static str> {
    if degree.starts_with('1') {
        Some("F")
    } else if degree.starts_with('2') {
        Some("S")
    } else if degree.starts_with('3') {
        Some("O")
    } else {
        None
    }
}

/// Set or replace the pagination parameter. The parameter name is
/// configuration, not a constant.
pub fn with_page_param(base: &str, param: &str, page: u32) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != param)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            {
                let mut pairs = url.query_pairs_mut();
                pairs.clear();
                for (key, value) in &kept {
                    pairs.append_pair(key, value);
                }
                pairs.append_pair(param, &page.to_string());
            }
            url.to_string()
        }
        Err(_) => format!("{base}?{param}={page}"),
    }
}

/// Rewrite a profile URL to its activity feed.
pub fn profile_activity_url(url: &str) -> String {
    if url.contains("/recent-activity/") {
        return url.to_string();
    }
    format!("{}/recent-activity/all/", url.trim_end_matches('/'))
}

/// What a seed URL points at, deciding the fetch shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    SinglePost,
    ProfileActivity,
    ContentSearch,
    Company,
    Unknown,
}

pub fn classify_seed_url(url: &str) -> SeedKind {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    if path.contains("/feed/update/") || path.contains("/posts/") || path.contains("/activity/") {
        SeedKind::SinglePost
    } else if path.contains("/in/") {
        SeedKind::ProfileActivity
    } else if path.contains("/search/results/content/") {
        SeedKind::ContentSearch
    } else if path.contains("/company/") {
        SeedKind::Company
    } else {
        SeedKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_search_url_carries_facets() {
        let query = CampaignQuery {
            roles: Some("AI engineer".to_string()),
            period: Some("past week".to_string()),
            sort: Some("most recent".to_string()),
            connection_degree: Some("2nd".to_string()),
            industries: vec!["Software".to_string()],
            ..Default::default()
        };
        let url = build_content_search_url(&query);
        assert!(url.starts_with("https://www.linkedin.com/search/results/content/?"));
        assert!(url.contains("keywords=AI+engineer"));
        assert!(url.contains("datePosted=past-week"));
        assert!(url.contains("sortBy=date_posted"));
        assert!(url.contains("network=S"));
        assert!(url.contains("industry=Software"));
    }

    #[test]
    fn empty_query_still_produces_valid_url() {
        let url = build_content_search_url(&CampaignQuery::default());
        assert!(Url::parse(&url).is_ok());
        assert!(url.contains("sortBy=relevance"));
    }

    #[test]
    fn page_param_is_replaced_not_duplicated() {
        let base = "https://www.linkedin.com/search/results/companies/?keywords=fintech&page=3";
        let paged = with_page_param(base, "page", 4);
        assert!(paged.contains("page=4"));
        assert!(!paged.contains("page=3"));
        assert!(paged.contains("keywords=fintech"));
    }

    #[test]
    fn custom_page_param_name() {
        let paged = with_page_param(
            "https://www.linkedin.com/search/results/companies/?keywords=x",
            "start",
            2,
        );
        assert!(paged.contains("start=2"));
    }

    #[test]
    fn profile_urls_are_rewritten_to_activity_feeds() {
        assert_eq!(
            profile_activity_url("https://www.linkedin.com/in/jane-doe/"),
            "https://www.linkedin.com/in/jane-doe/recent-activity/all/"
        );
        let already = "https://www.linkedin.com/in/jane-doe/recent-activity/all/";
        assert_eq!(profile_activity_url(already), already);
    }

    #[test]
    fn seed_classification() {
        assert_eq!(
            classify_seed_url("https://www.linkedin.com/feed/update/urn:li:activity:7001/"),
            SeedKind::SinglePost
        );
        assert_eq!(
            classify_seed_url("https://www.linkedin.com/posts/jane_hiring-activity-7002-x"),
            SeedKind::SinglePost
        );
        assert_eq!(
            classify_seed_url("https://www.linkedin.com/in/jane-doe/"),
            SeedKind::ProfileActivity
        );
        assert_eq!(
            classify_seed_url("https://www.linkedin.com/search/results/content/?keywords=x"),
            SeedKind::ContentSearch
        );
        assert_eq!(
            classify_seed_url("https://www.linkedin.com/company/acme/"),
            SeedKind::Company
        );
        assert_eq!(classify_seed_url("https://example.com/blog"), SeedKind::Unknown);
    }
}
