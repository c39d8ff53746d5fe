//! Session registry.
//!
//! Sessions are handed out as `Arc<Mutex<_>>` so one turn at a time runs per
//! session while different sessions proceed in parallel.

use crate::session::TrainingSession;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<TrainingSession>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session and mark it as recently used.
    async fn get(&self, id: &Uuid) -> Option<SharedSession>;
    async fn put(&self, session: TrainingSession) -> SharedSession;
    async fn delete(&self, id: &Uuid) -> bool;
    async fn len(&self) -> usize;
    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    async fn sweep_expired(&self, ttl: Duration) -> usize;
}

struct Entry {
    session: SharedSession,
    last_access: Instant,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_access = Instant::now();
        Some(entry.session.clone())
    }

    async fn put(&self, session: TrainingSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(
            id,
            Entry {
                session: shared.clone(),
                last_access: Instant::now(),
            },
        );
        shared
    }

    async fn delete(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_access) <= ttl);
        before - sessions.len()
    }
}

/// Periodically sweep idle sessions. A zero `ttl` disables sweeping.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if ttl.is_zero() {
        tracing::info!("Session TTL is zero, sweeping disabled");
        return None;
    }
    let every = every.max(Duration::from_secs(1));
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep_expired(ttl).await;
            if removed > 0 {
                let remaining = store.len().await;
                tracing::info!(removed, remaining, "Swept idle sessions");
            }
        }
    }))
}
