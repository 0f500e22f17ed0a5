//! Page-state classification: did the provider serve content, push back, or
//! drop the session?

/// Login/authwall path prefixes that mean the session is gone.
const LOGIN_PATH_PREFIXES: [&str; 2] = ["/login", "/uas/login"];

/// URL markers for gated requests.
const GATE_URL_MARKERS: [&str; 2] = ["/checkpoint", "/authwall"];

/// Pushback phrases in rendered page text (matched case-insensitively).
const PUSHBACK_PHRASES: [&str; 5] = [
    "try again later",
    "unusual activity",
    "too many requests",
    "verify your identity",
    "security verification",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    RateLimited,
    Unauthenticated,
}

/// Classify a resolved URL plus rendered body text. Runs before any record
/// extraction.
pub fn classify_page(resolved_url: &str, body_text: &str) -> PageStatus {
    if let Ok(parsed) = url::Url::parse(resolved_url) {
        let path = parsed.path();
        if LOGIN_PATH_PREFIXES.iter().any(|p| path.starts_with(p)) {
            return PageStatus::Unauthenticated;
        }
    }

    let url_lower = resolved_url.to_ascii_lowercase();
    if GATE_URL_MARKERS.iter().any(|m| url_lower.contains(m)) {
        return PageStatus::RateLimited;
    }

    let text_lower = body_text.to_ascii_lowercase();
    if PUSHBACK_PHRASES.iter().any(|p| text_lower.contains(p)) {
        return PageStatus::RateLimited;
    }

    PageStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_page_is_ok() {
        assert_eq!(
            classify_page(
                "https://www.linkedin.com/search/results/content/?keywords=x",
                "1,234 results"
            ),
            PageStatus::Ok
        );
    }

    #[test]
    fn login_redirect_is_unauthenticated() {
        assert_eq!(
            classify_page("https://www.linkedin.com/login?session_redirect=x", ""),
            PageStatus::Unauthenticated
        );
        assert_eq!(
            classify_page("https://www.linkedin.com/uas/login-submit", ""),
            PageStatus::Unauthenticated
        );
    }

    #[test]
    fn checkpoint_url_is_rate_limited() {
        assert_eq!(
            classify_page("https://www.linkedin.com/checkpoint/challenge/abc", ""),
            PageStatus::RateLimited
        );
        assert_eq!(
            classify_page("https://www.linkedin.com/authwall?trk=x", ""),
            PageStatus::RateLimited
        );
    }

    #[test]
    fn pushback_phrases_are_rate_limited() {
        for phrase in [
            "Please Try Again Later",
            "we noticed unusual activity from your account",
            "Too Many Requests",
            "verify your identity to continue",
            "Security Verification",
        ] {
            assert_eq!(
                classify_page("https://www.linkedin.com/feed/", phrase),
                PageStatus::RateLimited,
                "phrase: {phrase}"
            );
        }
    }
}
