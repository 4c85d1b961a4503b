//! Live onboarding sessions keyed by user code.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::session::{OnboardingSession, Opened};
use crate::config::ValidationConfig;
use crate::error::OnboardingError;
use crate::profile::{PublicProfile, UserCode};
use crate::store::Database;

/// How long an untouched session stays cached by default.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A looked-up session, or the finished profile if onboarding is done.
pub enum SessionHandle {
    Published(PublicProfile),
    Active(Arc<OnboardingSession>),
}

struct CachedSession {
    session: Arc<OnboardingSession>,
    last_touched: Instant,
}

/// Caches one session per user code so concurrent requests share the same
/// saving flag and form state.
///
/// Sessions nobody has looked up for `idle_timeout` are dropped. Edits that
/// were never saved by an advance go with them; the next lookup resumes from
/// storage.
pub struct SessionRegistry {
    db: Arc<dyn Database>,
    validation: ValidationConfig,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<UserCode, CachedSession>>,
}

impl SessionRegistry {
    pub fn new(db: Arc<dyn Database>, validation: ValidationConfig) -> Self {
        Self {
            db,
            validation,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Password rules for the credential checks.
    pub fn validation(&self) -> &ValidationConfig {
        &self.validation
    }

    /// Return the cached session for `code`, opening one if needed.
    ///
    /// Completed profiles are not cached; a session that finished since it
    /// was cached is dropped and the stored profile returned instead.
    pub async fn get_or_open(&self, code: &UserCode) -> Result<SessionHandle, OnboardingError> {
        let cached = {
            let mut sessions = self.sessions.write().await;
            sessions.get_mut(code).map(|entry| {
                entry.last_touched = Instant::now();
                Arc::clone(&entry.session)
            })
        };
        if let Some(session) = cached {
            if !session.is_complete().await {
                return Ok(SessionHandle::Active(session));
            }
            // Finished sessions hand over to the stored profile.
            self.sessions.write().await.remove(code);
        }

        let opened = OnboardingSession::open(Arc::clone(&self.db), code.clone()).await?;
        match opened {
            Opened::Published(profile) => Ok(SessionHandle::Published(profile)),
            Opened::Active(session) => {
                let now = Instant::now();
                let mut sessions = self.sessions.write().await;
                self.sweep(&mut sessions, now);
                // Another request may have opened it while we were loading.
                let entry = sessions
                    .entry(code.clone())
                    .or_insert_with(|| CachedSession {
                        session: Arc::new(session),
                        last_touched: now,
                    });
                entry.last_touched = now;
                let session = Arc::clone(&entry.session);
                debug!(user_code = %code, cached = sessions.len(), "Session cached");
                Ok(SessionHandle::Active(session))
            }
        }
    }

    /// Drop the cached session so the next lookup reloads from storage.
    pub async fn evict(&self, code: &UserCode) -> bool {
        self.sessions.write().await.remove(code).is_some()
    }

    /// Drop every session idle for longer than the timeout.
    ///
    /// Returns the number of sessions dropped.
    pub async fn expire_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let dropped = self.sweep(&mut sessions, Instant::now());
        if dropped > 0 {
            info!(count = dropped, "Expired idle onboarding sessions");
        }
        dropped
    }

    /// A session with a save in flight is always kept.
    fn sweep(&self, sessions: &mut HashMap<UserCode, CachedSession>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.session.is_saving()
                || now.saturating_duration_since(entry.last_touched) < self.idle_timeout
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Spawn a background task that periodically expires idle sessions.
pub fn spawn_expiry_task(
    registry: Arc<SessionRegistry>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            registry.expire_idle().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn registry_with_drafts(codes: &[&str]) -> SessionRegistry {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        for c in codes {
            db.insert_draft(&UserCode::parse(*c).unwrap()).await.unwrap();
        }
        SessionRegistry::new(db, ValidationConfig::default())
    }

    fn code(s: &str) -> UserCode {
        UserCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn lookups_share_one_session() {
        let registry = registry_with_drafts(&["AAAA1111"]).await;
        let first = match registry.get_or_open(&code("AAAA1111")).await.unwrap() {
            SessionHandle::Active(s) => s,
            SessionHandle::Published(_) => panic!("expected active"),
        };
        let second = match registry.get_or_open(&code("AAAA1111")).await.unwrap() {
            SessionHandle::Active(s) => s,
            SessionHandle::Published(_) => panic!("expected active"),
        };
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_dropped_when_another_opens() {
        let codes: Vec<String> = (0..50).map(|i| format!("IDLE{i:04}")).collect();
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        let registry = registry_with_drafts(&refs)
            .await
            .with_idle_timeout(Duration::ZERO);

        for c in &refs {
            registry.get_or_open(&code(c)).await.unwrap();
        }
        // Only the most recent lookup survives a zero timeout.
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.expire_idle().await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn sessions_within_the_timeout_are_kept() {
        let registry = registry_with_drafts(&["AAAA1111", "BBBB2222"]).await;
        registry.get_or_open(&code("AAAA1111")).await.unwrap();
        registry.get_or_open(&code("BBBB2222")).await.unwrap();

        assert_eq!(registry.expire_idle().await, 0);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_task_sweeps_after_the_timeout() {
        let registry = Arc::new(
            registry_with_drafts(&["AAAA1111"])
                .await
                .with_idle_timeout(Duration::from_secs(60)),
        );
        registry.get_or_open(&code("AAAA1111")).await.unwrap();
        let task = spawn_expiry_task(Arc::clone(&registry), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(registry.is_empty().await);
        task.abort();
    }

    #[tokio::test]
    async fn missing_draft_is_not_cached() {
        let registry = registry_with_drafts(&[]).await;
        assert!(registry.get_or_open(&code("NOPE0000")).await.is_err());
        assert!(registry.is_empty().await);
    }
}
