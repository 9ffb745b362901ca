//! Shared application state handed to every handler, and the server-level
//! configuration layered around it — mirrors the teacher's `AppState` /
//! `ServerConfig` split in `dashflow-registry/src/api/{state,server}.rs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::health::HealthValidator;
use crate::orchestrator::IngestionOrchestrator;
use crate::organization::OrganizationService;
use crate::persistence::{EdgeStore, OrganizationStore, ProfileStore};
use crate::scoring::ScoringEngine;
use crate::template::TemplateService;
use crate::tracker::RequestTracker;

/// HTTP-layer knobs, separate from [`AppConfig`]'s domain/env settings —
/// the teacher keeps the same split between `AppConfig` (business) and
/// `ServerConfig` (transport).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum accepted request body size, in bytes.
    pub max_body_size: usize,
    /// Requests permitted per API key per rolling hour window (spec §6).
    pub rate_limit_per_hour: u64,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024,
            rate_limit_per_hour: 100,
            cors_enabled: false,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestWindow {
    count: u64,
    window_start: Instant,
}

/// Per-key sliding-window request counter backing the `<= 100 requests per
/// key per hour` limit (spec §6). Status-polling routes are exempt — the
/// auth middleware decides which requests reach `check_and_increment`.
pub struct RateLimiterState {
    limit: u64,
    window: Duration,
    counters: RwLock<HashMap<String, RequestWindow>>,
}

pub enum RateLimitOutcome {
    Allowed { remaining: u64 },
    Limited { retry_after_secs: u64 },
}

impl RateLimiterState {
    pub fn new(limit_per_hour: u64) -> Self {
        Self {
            limit: limit_per_hour,
            window: Duration::from_secs(3600),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub async fn check_and_increment(&self, key: &str) -> RateLimitOutcome {
        let mut counters = self.counters.write().await;
        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert(RequestWindow {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.window_start);
            let retry_after_secs = self.window.saturating_sub(elapsed).as_secs();
            return RateLimitOutcome::Limited { retry_after_secs };
        }

        entry.count += 1;
        RateLimitOutcome::Allowed {
            remaining: self.limit - entry.count,
        }
    }

    /// Drops windows that have gone stale, so the map doesn't grow without
    /// bound across distinct keys over the process lifetime.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.counters
            .write()
            .await
            .retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

/// Everything a route handler might need, cloned cheaply per-request
/// (every field is an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub server: Arc<ServerConfig>,
    pub profiles: Arc<dyn ProfileStore>,
    pub organizations: Arc<dyn OrganizationStore>,
    pub edges: Arc<dyn EdgeStore>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub scoring: Arc<ScoringEngine>,
    pub templates: Arc<TemplateService>,
    pub health: Arc<HealthValidator>,
    pub tracker: Arc<RequestTracker>,
    pub rate_limiter: Arc<RateLimiterState>,
    /// Notifies the background scoring worker of a freshly created pending
    /// job. `ScoringJobStore` has no "list pending" query — claiming is
    /// by-id only (§4.7) — so the worker pool has to learn about new work
    /// this way rather than by polling the store for a pending set.
    pub job_queue: Arc<UnboundedSender<Uuid>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        profiles: Arc<dyn ProfileStore>,
        organizations: Arc<dyn OrganizationStore>,
        edges: Arc<dyn EdgeStore>,
        orchestrator: Arc<IngestionOrchestrator>,
        scoring: Arc<ScoringEngine>,
        templates: Arc<TemplateService>,
        health: Arc<HealthValidator>,
        tracker: Arc<RequestTracker>,
        job_queue: Arc<UnboundedSender<Uuid>>,
    ) -> Self {
        let server = Arc::new(ServerConfig::default());
        let rate_limiter = Arc::new(RateLimiterState::new(server.rate_limit_per_hour));
        Self {
            config,
            server,
            profiles,
            organizations,
            edges,
            orchestrator,
            scoring,
            templates,
            health,
            tracker,
            rate_limiter,
            job_queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_allows_up_to_limit_then_blocks() {
        let limiter = RateLimiterState::new(2);
        assert!(matches!(
            limiter.check_and_increment("key").await,
            RateLimitOutcome::Allowed { remaining: 1 }
        ));
        assert!(matches!(
            limiter.check_and_increment("key").await,
            RateLimitOutcome::Allowed { remaining: 0 }
        ));
        assert!(matches!(
            limiter.check_and_increment("key").await,
            RateLimitOutcome::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn rate_limiter_tracks_keys_independently() {
        let limiter = RateLimiterState::new(1);
        assert!(matches!(
            limiter.check_and_increment("a").await,
            RateLimitOutcome::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_and_increment("b").await,
            RateLimitOutcome::Allowed { .. }
        ));
    }
}
