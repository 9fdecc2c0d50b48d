//! Server registry: the process-wide view of the cluster's endpoints.
//!
//! Tracks the configured (later: cluster-supplied) endpoint list, a
//! current-master hint, and a per-endpoint back-off clock. The master is a
//! hint, not a guarantee: the endpoint that most recently served a 200,
//! corrected by the write path through redirects.
//!
//! All operations are infallible and run under the registry lock; the lock
//! is never held across I/O.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use rand::Rng;

/// First retry delay after a single failure.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
/// Upper bound on the nominal (pre-jitter) delay.
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Jitter applied to every delay: ±25%.
const BACKOFF_JITTER: f64 = 0.25;

/// Per-endpoint back-off state.
#[derive(Debug, Clone)]
struct Backoff {
    failures: u32,
    next_eligible: Instant,
}

/// Result of picking the next endpoint to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    /// An endpoint whose back-off has expired.
    Endpoint(String),
    /// No candidate is eligible; the minimum remaining wait.
    Wait(Duration),
}

#[derive(Debug, Default)]
struct Inner {
    servers: Vec<String>,
    master: Option<String>,
    backoff: HashMap<String, Backoff>,
}

/// Ordered list of known cluster endpoints with back-off and master hint.
#[derive(Debug)]
pub struct ServerRegistry {
    inner: RwLock<Inner>,
}

/// Randomized exponential delay: base 250 ms, doubling per consecutive
/// failure, capped at 60 s, then jittered by ±25%.
fn backoff_delay(failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    let nominal = BACKOFF_BASE
        .saturating_mul(1u32 << doublings)
        .min(BACKOFF_CAP);
    let factor = rand::thread_rng().gen_range(1.0 - BACKOFF_JITTER..=1.0 + BACKOFF_JITTER);
    nominal.mul_f64(factor)
}

impl ServerRegistry {
    /// Create a registry seeded with the configured endpoints. The first
    /// entry doubles as the initial master hint until the cluster says
    /// otherwise.
    pub fn new(servers: Vec<String>) -> Self {
        let master = servers.first().cloned();
        Self {
            inner: RwLock::new(Inner {
                servers,
                master,
                backoff: HashMap::new(),
            }),
        }
    }

    /// All candidate endpoints: the current master (if any) followed by the
    /// known list, de-duplicated in first-occurrence order.
    pub fn candidates(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::with_capacity(inner.servers.len() + 1);
        if let Some(ref master) = inner.master {
            out.push(master.clone());
        }
        for server in &inner.servers {
            if !out.contains(server) {
                out.push(server.clone());
            }
        }
        out
    }

    /// The first candidate whose back-off has expired, or the minimum
    /// remaining wait across `candidates` if none is eligible.
    pub fn next_eligible(&self, candidates: &[String]) -> Pick {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let mut soonest: Option<Duration> = None;
        for candidate in candidates {
            match inner.backoff.get(candidate) {
                Some(state) if state.next_eligible > now => {
                    let wait = state.next_eligible - now;
                    soonest = Some(match soonest {
                        Some(current) => current.min(wait),
                        None => wait,
                    });
                }
                _ => return Pick::Endpoint(candidate.clone()),
            }
        }
        Pick::Wait(soonest.unwrap_or(BACKOFF_BASE))
    }

    /// Record a failed attempt against `endpoint`, pushing its next-eligible
    /// instant further out.
    pub fn mark_failed(&self, endpoint: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let failures = inner
            .backoff
            .get(endpoint)
            .map(|state| state.failures + 1)
            .unwrap_or(1);
        inner.backoff.insert(
            endpoint.to_owned(),
            Backoff {
                failures,
                next_eligible: Instant::now() + backoff_delay(failures),
            },
        );
    }

    /// Record a successful response from `endpoint`: reset its back-off and
    /// make it the current master.
    pub fn mark_success(&self, endpoint: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.backoff.remove(endpoint);
        if !inner.servers.iter().any(|s| s.as_str() == endpoint) {
            // Redirect targets may not be in the known list yet; the next
            // cluster ping will settle membership.
            inner.servers.push(endpoint.to_owned());
        }
        inner.master = Some(endpoint.to_owned());
    }

    /// Atomically replace the known list and master from a cluster ping.
    /// Back-off state survives for endpoints still present and is dropped
    /// for removed ones.
    pub fn update_membership(&self, servers: Vec<String>, master: String) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.backoff.retain(|endpoint, _| servers.contains(endpoint));
        inner.servers = servers;
        inner.master = if master.is_empty() { None } else { Some(master) };
    }
}
