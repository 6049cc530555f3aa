//! In-memory sessions keyed by id. Nothing is persisted; idle sessions are
//! swept on access and by a background sweeper.

use crate::store::ResultStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vw_llm::ProviderConfig;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Provider id to resolved config, key included.
    pub credentials: HashMap<String, ProviderConfig>,
    pub results: ResultStore,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            credentials: HashMap::new(),
            results: ResultStore::default(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn reset(&mut self) {
        self.credentials.clear();
        self.results.clear();
        self.last_active = Utc::now();
    }

    /// Stores `config` for its provider; a blank key removes the entry.
    pub fn set_credential(&mut self, config: ProviderConfig) -> bool {
        if config.has_credential() {
            self.credentials.insert(config.name.clone(), config);
            true
        } else {
            self.credentials.remove(&config.name);
            false
        }
    }

    pub fn credential(&self, provider: &str) -> Option<&ProviderConfig> {
        self.credentials.get(provider)
    }

    fn summary(&self) -> SessionSummary {
        let mut providers: Vec<String> = self.credentials.keys().cloned().collect();
        providers.sort();
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            last_active: self.last_active,
            configured_providers: providers,
            has_storyboard: self.results.storyboard().is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub configured_providers: Vec<String>,
    pub has_storyboard: bool,
}

pub struct SessionManager {
    sessions: DashMap<Uuid, Session>,
    idle_ttl: Duration,
}

impl SessionManager {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
        }
    }

    pub fn create(&self) -> SessionSummary {
        self.sweep_expired();
        let session = Session::new();
        let summary = session.summary();
        self.sessions.insert(session.id, session);
        tracing::info!(session_id = %summary.id, "session created");
        summary
    }

    /// Runs `f` on a live session and marks it active.
    ///
    /// The map shard stays locked while `f` runs, so `f` must not await.
    pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sweep_expired();
        let mut session = self.sessions.get_mut(&id)?;
        session.last_active = Utc::now();
        Some(f(&mut session))
    }

    pub fn summary(&self, id: Uuid) -> Option<SessionSummary> {
        self.with_session(id, |s| s.summary())
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        self.sweep_expired();
        let mut out: Vec<SessionSummary> =
            self.sessions.iter().map(|entry| entry.value().summary()).collect();
        out.sort_by_key(|s| s.last_active);
        out.reverse();
        out
    }

    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session deleted");
        }
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| {
            now.signed_duration_since(s.last_active)
                .to_std()
                .map(|idle| idle <= self.idle_ttl)
                .unwrap_or(true)
        });
        let swept = before.saturating_sub(self.sessions.len());
        if swept > 0 {
            tracing::info!(swept, "idle sessions expired");
        }
        swept
    }

    /// Sweeps on a fixed interval until `shutdown` fires.
    pub async fn run_sweeper(&self, every: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_expired();
                }
            }
        }
        tracing::debug!("session sweeper stopped");
    }

    /// Sweep interval derived from the idle ttl, at most a minute.
    pub fn sweep_interval(&self) -> Duration {
        self.idle_ttl
            .min(Duration::from_secs(60))
            .max(Duration::from_secs(1))
    }
}
