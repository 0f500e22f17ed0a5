//! Per-host admission control.
//!
//! Serializes outbound navigations per host under the pacing policy:
//! minimum spacing with jitter, exponential backoff on provider pushback,
//! an extended cooldown once pushback repeats, and a sliding-window request
//! cap. Pure in-memory, no I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Pacing constants for one host. These are policy, not end-user
/// configuration.
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    /// Minimum spacing between two permitted requests.
    pub min_spacing: Duration,
    /// Uniform jitter added on top of the spacing.
    pub jitter: Duration,
    /// Cap on the backoff-inflated spacing.
    pub backoff_cap: Duration,
    /// Consecutive rate limits that trigger the extended cooldown.
    pub rate_limit_threshold: u32,
    /// Length of the extended cooldown.
    pub extended_backoff: Duration,
    /// Sliding-window length.
    pub window: Duration,
    /// Maximum permitted requests per window.
    pub window_cap: usize,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_secs(10 * 60),
            jitter: Duration::from_secs(5 * 60),
            backoff_cap: Duration::from_secs(60 * 60),
            rate_limit_threshold: 3,
            extended_backoff: Duration::from_secs(2 * 60 * 60),
            window: Duration::from_secs(60 * 60),
            window_cap: 10,
        }
    }
}

impl PacingPolicy {
    /// Effective minimum spacing after pushback backoff:
    /// `min_spacing * 2^consecutive`, capped.
    pub fn effective_spacing(&self, consecutive_rate_limits: u32) -> Duration {
        let shift = consecutive_rate_limits.min(16);
        let inflated = self
            .min_spacing
            .checked_mul(1u32 << shift)
            .unwrap_or(self.backoff_cap);
        inflated.min(self.backoff_cap)
    }
}

/// Result of an admission request.
#[derive(Debug)]
pub enum Admission {
    Granted,
    /// The host is in extended backoff; the caller should abandon rather
    /// than wait.
    Blocked {
        reason: String,
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

#[derive(Debug, Default)]
struct DomainState {
    last_request_at: Option<Instant>,
    recent_requests: VecDeque<Instant>,
    consecutive_rate_limits: u32,
    extended_backoff_until: Option<Instant>,
    transport_errors: u64,
}

struct DomainEntry {
    state: DomainState,
    /// Serializes waiters for this host; held across the cooperative wait
    /// so concurrent callers stack their spacing instead of racing.
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Default for DomainEntry {
    fn default() -> Self {
        Self {
            state: DomainState::default(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Observability snapshot for one host.
#[derive(Debug, Clone, Serialize)]
pub struct DomainSnapshot {
    pub host: String,
    pub requests_in_window: usize,
    pub consecutive_rate_limits: u32,
    pub transport_errors: u64,
    pub seconds_since_last_request: Option<u64>,
    pub extended_backoff_remaining_secs: Option<u64>,
}

/// Process-wide pacing governor. Shared by all campaigns; one instance per
/// process, owned by the composition root.
pub struct PacingGovernor {
    policy: PacingPolicy,
    domains: Mutex<HashMap<String, DomainEntry>>,
}

impl Default for PacingGovernor {
    fn default() -> Self {
        Self::new(PacingPolicy::default())
    }
}

impl PacingGovernor {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until a request to `host` is permitted, or reports `Blocked`
    /// when the host is in extended backoff. Callers for the same host are
    /// strictly serialized; dropping the returned future releases the slot.
    pub async fn acquire(&self, host: &str) -> Admission {
        if let Some(blocked) = self.check_extended_backoff(host) {
            return blocked;
        }

        let gate = {
            let mut domains = self.domains.lock();
            domains.entry(host.to_string()).or_default().gate.clone()
        };
        let _slot = gate.lock().await;

        loop {
            // State is consulted under the lock but never held across the
            // sleep below.
            let wait = {
                let mut domains = self.domains.lock();
                let entry = domains.entry(host.to_string()).or_default();
                let now = Instant::now();

                if let Some(until) = entry.state.extended_backoff_until {
                    if until > now {
                        return Admission::Blocked {
                            reason: format!(
                                "{} consecutive rate limits",
                                entry.state.consecutive_rate_limits
                            ),
                            retry_after: until - now,
                        };
                    }
                    entry.state.extended_backoff_until = None;
                }

                while let Some(front) = entry.state.recent_requests.front().copied() {
                    if now.duration_since(front) >= self.policy.window {
                        entry.state.recent_requests.pop_front();
                    } else {
                        break;
                    }
                }

                let spacing_wait = match entry.state.last_request_at {
                    None => Duration::ZERO,
                    Some(last) => {
                        let spacing = jittered_spacing(
                            &self.policy,
                            entry.state.consecutive_rate_limits,
                        );
                        spacing.saturating_sub(now.duration_since(last))
                    }
                };

                let window_wait = if entry.state.recent_requests.len() >= self.policy.window_cap {
                    // Wait for the oldest request to fall out of the window.
                    match entry.state.recent_requests.front() {
                        Some(oldest) => (*oldest + self.policy.window).duration_since(now),
                        None => Duration::ZERO,
                    }
                } else {
                    Duration::ZERO
                };

                let wait = spacing_wait.max(window_wait);
                if wait.is_zero() {
                    entry.state.last_request_at = Some(now);
                    entry.state.recent_requests.push_back(now);
                    return Admission::Granted;
                }
                wait
            };

            debug!(host, wait_secs = wait.as_secs(), "pacing wait");
            sleep(wait).await;
        }
    }

    /// Provider accepted the request: pushback streak over.
    pub fn record_success(&self, host: &str) {
        let mut domains = self.domains.lock();
        let entry = domains.entry(host.to_string()).or_default();
        entry.state.consecutive_rate_limits = 0;
        entry.state.extended_backoff_until = None;
    }

    /// Provider pushed back (429-equivalent). Crossing the threshold arms
    /// the extended cooldown.
    pub fn record_rate_limit(&self, host: &str) {
        let mut domains = self.domains.lock();
        let entry = domains.entry(host.to_string()).or_default();
        entry.state.consecutive_rate_limits += 1;
        if entry.state.consecutive_rate_limits >= self.policy.rate_limit_threshold {
            let until = Instant::now() + self.policy.extended_backoff;
            entry.state.extended_backoff_until = Some(until);
            warn!(
                host,
                consecutive = entry.state.consecutive_rate_limits,
                backoff_secs = self.policy.extended_backoff.as_secs(),
                "⛔ Extended backoff armed"
            );
        }
    }

    /// Transport or DOM failure. Tracked for observability only; does not
    /// touch the pushback streak.
    pub fn record_error(&self, host: &str) {
        let mut domains = self.domains.lock();
        let entry = domains.entry(host.to_string()).or_default();
        entry.state.transport_errors += 1;
    }

    pub fn stats(&self, host: &str) -> Option<DomainSnapshot> {
        let domains = self.domains.lock();
        domains.get(host).map(|entry| snapshot(host, &entry.state))
    }

    pub fn snapshot(&self) -> Vec<DomainSnapshot> {
        let domains = self.domains.lock();
        let mut hosts: Vec<_> = domains
            .iter()
            .map(|(host, entry)| snapshot(host, &entry.state))
            .collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        hosts
    }

    pub fn reset(&self, host: &str) {
        let mut domains = self.domains.lock();
        if let Some(entry) = domains.get_mut(host) {
            entry.state = DomainState::default();
        }
    }

    fn check_extended_backoff(&self, host: &str) -> Option<Admission> {
        let domains = self.domains.lock();
        let entry = domains.get(host)?;
        let until = entry.state.extended_backoff_until?;
        let now = Instant::now();
        if until > now {
            return Some(Admission::Blocked {
                reason: format!(
                    "{} consecutive rate limits",
                    entry.state.consecutive_rate_limits
                ),
                retry_after: until - now,
            });
        }
        None
    }
}

fn snapshot(host: &str, state: &DomainState) -> DomainSnapshot {
    let now = Instant::now();
    DomainSnapshot {
        host: host.to_string(),
        requests_in_window: state.recent_requests.len(),
        consecutive_rate_limits: state.consecutive_rate_limits,
        transport_errors: state.transport_errors,
        seconds_since_last_request: state
            .last_request_at
            .map(|last| now.duration_since(last).as_secs()),
        extended_backoff_remaining_secs: state.extended_backoff_until.and_then(|until| {
            let remaining = until.duration_since(now);
            (!remaining.is_zero()).then(|| remaining.as_secs())
        }),
    }
}

/// Effective spacing plus jitter. Negative jitter is discarded so the
/// interval between permitted requests never undercuts the effective
/// spacing floor.
fn jittered_spacing(policy: &PacingPolicy, consecutive_rate_limits: u32) -> Duration {
    let base = policy.effective_spacing(consecutive_rate_limits);
    let jitter_ms = policy.jitter.as_millis() as i64;
    if jitter_ms == 0 {
        return base;
    }
    let sampled = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);
    if sampled > 0 {
        base + Duration::from_millis(sampled as u64)
    } else {
        base
    }
}
