//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::STEP_COUNT;
use crate::profile::{
    LINK_SLOTS, LinkCategory, LinkEntry, PersistedLink, ProfileDraft, ProfilePatch,
    ProfileSummary, PublicProfile, UserCode,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// Step index stored on a completed profile.
const COMPLETED_STEP: i64 = STEP_COUNT as i64;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
///
/// A transaction belongs to the connection, not the caller, so every write
/// goes through `write_lock`. Otherwise a statement from another request
/// could land inside (or commit) an open completion transaction.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn fetch_profile(&self, code: &UserCode) -> Result<Option<ProfileDraft>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_code = ?1"),
                params![code.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_draft(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_draft: {e}"))),
        }
    }

    async fn fetch_links(&self, code: &UserCode) -> Result<Vec<PersistedLink>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LINK_COLUMNS} FROM profile_links WHERE user_code = ?1 ORDER BY display_order"
                ),
                params![code.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("fetch_links: {e}")))?;

        let mut links = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            links.push(row_to_link(&row)?);
        }
        Ok(links)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_bool(b: Option<bool>) -> libsql::Value {
    match b {
        Some(b) => libsql::Value::Integer(b as i64),
        None => libsql::Value::Null,
    }
}

fn parse_code(s: String) -> Result<UserCode, DatabaseError> {
    UserCode::parse(s).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn row_to_draft(row: &libsql::Row) -> Result<ProfileDraft, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("profile row: {e}"));

    let code: String = row.get(0).map_err(read)?;
    let mut draft = ProfileDraft::new(parse_code(code)?);
    draft.name = row.get::<String>(1).ok();
    draft.date_of_birth = row.get::<String>(2).ok();
    draft.gender = row.get::<String>(3).ok();
    draft.eye_color = row.get::<String>(4).ok();
    draft.relationship_status = row.get::<String>(5).ok();
    draft.job_title = row.get::<String>(6).ok();
    draft.mobile = row.get::<String>(7).ok();
    draft.email = row.get::<String>(8).ok();
    draft.location = row.get::<String>(9).ok();
    draft.photo_url = row.get::<String>(10).ok();
    draft.bio = row.get::<String>(11).ok();
    draft.accepted_terms = row.get::<i64>(12).map_err(read)? != 0;
    draft.accepted_privacy = row.get::<i64>(13).map_err(read)? != 0;
    draft.onboarding_step = row.get::<i64>(14).map_err(read)?.max(0) as u32;
    draft.is_onboarding_complete = row.get::<i64>(15).map_err(read)? != 0;
    draft.onboarding_completed_at = row.get::<String>(16).ok().map(|s| parse_datetime(&s));
    Ok(draft)
}

fn row_to_link(row: &libsql::Row) -> Result<PersistedLink, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("link row: {e}"));

    let id: String = row.get(0).map_err(read)?;
    let code: String = row.get(1).map_err(read)?;
    let created: String = row.get(7).map_err(read)?;
    Ok(PersistedLink {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        user_code: parse_code(code)?,
        label: row.get(2).map_err(read)?,
        url: row.get(3).map_err(read)?,
        category_id: row.get(4).map_err(read)?,
        description: row.get::<String>(5).ok(),
        display_order: row.get::<i64>(6).map_err(read)?.max(0) as u32,
        created_at: parse_datetime(&created),
    })
}

/// Parameters 2..=14 of the profile field update, in column order.
fn patch_values(fields: &ProfilePatch) -> Vec<libsql::Value> {
    vec![
        opt_text(fields.name.as_deref()),
        opt_text(fields.date_of_birth.as_deref()),
        opt_text(fields.gender.as_deref()),
        opt_text(fields.eye_color.as_deref()),
        opt_text(fields.relationship_status.as_deref()),
        opt_text(fields.job_title.as_deref()),
        opt_text(fields.mobile.as_deref()),
        opt_text(fields.email.as_deref()),
        opt_text(fields.location.as_deref()),
        opt_text(fields.photo_url.as_deref()),
        opt_text(fields.bio.as_deref()),
        opt_bool(fields.accepted_terms),
        opt_bool(fields.accepted_privacy),
    ]
}

// ── Trait implementation ────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_code, name, date_of_birth, gender, eye_color, relationship_status, job_title, mobile, email, location, photo_url, bio, accepted_terms, accepted_privacy, onboarding_step, is_onboarding_complete, onboarding_completed_at";

const LINK_COLUMNS: &str =
    "id, user_code, label, url, category_id, description, display_order, created_at";

/// `None` parameters leave the column untouched.
const UPDATE_FIELDS: &str = "name = COALESCE(?2, name),
    date_of_birth = COALESCE(?3, date_of_birth),
    gender = COALESCE(?4, gender),
    eye_color = COALESCE(?5, eye_color),
    relationship_status = COALESCE(?6, relationship_status),
    job_title = COALESCE(?7, job_title),
    mobile = COALESCE(?8, mobile),
    email = COALESCE(?9, email),
    location = COALESCE(?10, location),
    photo_url = COALESCE(?11, photo_url),
    bio = COALESCE(?12, bio),
    accepted_terms = COALESCE(?13, accepted_terms),
    accepted_privacy = COALESCE(?14, accepted_privacy)";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Onboarding ──────────────────────────────────────────────────

    async fn load_draft(&self, code: &UserCode) -> Result<Option<ProfileDraft>, DatabaseError> {
        let Some(mut draft) = self.fetch_profile(code).await? else {
            return Ok(None);
        };

        // Links from an earlier completion pre-fill the slots.
        for (slot, link) in draft
            .links
            .iter_mut()
            .zip(self.fetch_links(code).await?.into_iter().take(LINK_SLOTS))
        {
            *slot = LinkEntry {
                label: link.label,
                url: link.url,
                category: link.category_id,
                description: link.description.unwrap_or_default(),
            };
        }
        Ok(Some(draft))
    }

    async fn save_step(
        &self,
        code: &UserCode,
        fields: &ProfilePatch,
        next_step: u32,
    ) -> Result<(), DatabaseError> {
        let mut values = vec![libsql::Value::Text(code.to_string())];
        values.extend(patch_values(fields));
        values.push(libsql::Value::Integer(next_step as i64));
        values.push(libsql::Value::Text(Utc::now().to_rfc3339()));

        let _write = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                &format!(
                    "UPDATE profiles SET {UPDATE_FIELDS}, onboarding_step = ?15, updated_at = ?16
                     WHERE user_code = ?1 AND is_onboarding_complete = 0"
                ),
                values,
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_step: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "incomplete profile".into(),
                id: code.to_string(),
            });
        }
        debug!(user_code = %code, next_step, "Saved onboarding step");
        Ok(())
    }

    async fn complete_onboarding(
        &self,
        code: &UserCode,
        fields: &ProfilePatch,
        links: &[LinkEntry],
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<PersistedLink>, DatabaseError> {
        let _write = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_onboarding begin: {e}")))?;

        let now = completed_at;
        let result: Result<Vec<PersistedLink>, DatabaseError> = async {
            let mut values = vec![libsql::Value::Text(code.to_string())];
            values.extend(patch_values(fields));
            values.push(libsql::Value::Integer(COMPLETED_STEP));
            values.push(libsql::Value::Text(now.to_rfc3339()));

            let affected = tx
                .execute(
                    &format!(
                        "UPDATE profiles SET {UPDATE_FIELDS}, onboarding_step = ?15,
                            is_onboarding_complete = 1, onboarding_completed_at = ?16,
                            updated_at = ?16
                         WHERE user_code = ?1 AND is_onboarding_complete = 0"
                    ),
                    values,
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("complete_onboarding: {e}")))?;
            if affected == 0 {
                return Err(DatabaseError::Constraint(format!(
                    "profile {code} is missing or already complete"
                )));
            }

            tx.execute(
                "DELETE FROM profile_links WHERE user_code = ?1",
                params![code.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_onboarding clear links: {e}")))?;

            let mut persisted = Vec::with_capacity(links.len());
            for (order, link) in links.iter().enumerate() {
                let row = PersistedLink {
                    id: Uuid::new_v4(),
                    user_code: code.clone(),
                    label: link.label.clone(),
                    url: link.url.clone(),
                    category_id: link.category.clone(),
                    description: Some(link.description.clone()).filter(|d| !d.trim().is_empty()),
                    display_order: order as u32,
                    created_at: now,
                };
                tx.execute(
                    "INSERT INTO profile_links (id, user_code, label, url, category_id, description, display_order, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.id.to_string(),
                        code.as_str(),
                        row.label.as_str(),
                        row.url.as_str(),
                        row.category_id.as_str(),
                        opt_text(row.description.as_deref()),
                        row.display_order as i64,
                        now.to_rfc3339(),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("complete_onboarding insert link: {e}")))?;
                persisted.push(row);
            }
            Ok(persisted)
        }
        .await;

        match result {
            Ok(persisted) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("complete_onboarding commit: {e}")))?;
                debug!(user_code = %code, links = persisted.len(), "Completed onboarding");
                Ok(persisted)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        user_code = %code,
                        error = %e,
                        rollback_error = %rollback,
                        "complete_onboarding rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn reset_onboarding(&self, code: &UserCode) -> Result<bool, DatabaseError> {
        let _write = self.write_lock.lock().await;
        let affected = self
            .conn()
            .execute(
                "UPDATE profiles SET onboarding_step = 0, is_onboarding_complete = 0,
                    onboarding_completed_at = NULL, updated_at = ?2
                 WHERE user_code = ?1",
                params![code.as_str(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reset_onboarding: {e}")))?;
        Ok(affected > 0)
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn insert_draft(&self, code: &UserCode) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let _write = self.write_lock.lock().await;
        self.conn()
            .execute(
                "INSERT INTO profiles (user_code, created_at, updated_at) VALUES (?1, ?2, ?3)",
                params![code.as_str(), now.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("UNIQUE") {
                    DatabaseError::Constraint(format!("user code {code} already exists"))
                } else {
                    DatabaseError::Query(format!("insert_draft: {message}"))
                }
            })?;
        debug!(user_code = %code, "Inserted profile draft");
        Ok(())
    }

    async fn get_public_profile(
        &self,
        code: &UserCode,
    ) -> Result<Option<PublicProfile>, DatabaseError> {
        let Some(profile) = self.fetch_profile(code).await? else {
            return Ok(None);
        };
        if !profile.is_onboarding_complete {
            return Ok(None);
        }
        let links = self.fetch_links(code).await?;
        Ok(Some(PublicProfile::new(profile, links)))
    }

    async fn list_profiles(&self, limit: usize) -> Result<Vec<ProfileSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_code, name, email, onboarding_step, is_onboarding_complete, created_at, updated_at
                 FROM profiles ORDER BY updated_at DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_profiles: {e}")))?;

        let read = |e: libsql::Error| DatabaseError::Query(format!("list_profiles row: {e}"));
        let mut profiles = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let code: String = row.get(0).map_err(read)?;
            let created: String = row.get(5).map_err(read)?;
            let updated: String = row.get(6).map_err(read)?;
            profiles.push(ProfileSummary {
                user_code: parse_code(code)?,
                name: row.get::<String>(1).ok(),
                email: row.get::<String>(2).ok(),
                onboarding_step: row.get::<i64>(3).map_err(read)?.max(0) as u32,
                is_onboarding_complete: row.get::<i64>(4).map_err(read)? != 0,
                created_at: parse_datetime(&created),
                updated_at: parse_datetime(&updated),
            });
        }
        Ok(profiles)
    }

    // ── Reference data ──────────────────────────────────────────────

    async fn list_categories(&self) -> Result<Vec<LinkCategory>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, icon FROM link_categories ORDER BY sort_order, name",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_categories: {e}")))?;

        let read = |e: libsql::Error| DatabaseError::Query(format!("list_categories row: {e}"));
        let mut categories = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            categories.push(LinkCategory {
                id: row.get(0).map_err(read)?,
                name: row.get(1).map_err(read)?,
                icon: row.get(2).map_err(read)?,
            });
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Consent, ProfileField};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn code(s: &str) -> UserCode {
        UserCode::parse(s).unwrap()
    }

    fn link(label: &str, url: &str) -> LinkEntry {
        LinkEntry {
            label: label.into(),
            url: url.into(),
            category: "website".into(),
            description: String::new(),
        }
    }

    async fn provisioned(db: &LibSqlBackend, s: &str) -> UserCode {
        let c = code(s);
        db.insert_draft(&c).await.unwrap();
        c
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("linkpage.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            let c = provisioned(&db, "ABCD1234").await;
            db.save_step(&c, &ProfilePatch::default(), 2).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let draft = db.load_draft(&code("ABCD1234")).await.unwrap().unwrap();
        assert_eq!(draft.onboarding_step, 2);
    }

    // ── Drafts ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_missing_draft_returns_none() {
        let db = test_db().await;
        assert!(db.load_draft(&code("NOPE0000")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_and_load_empty_draft() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;

        let draft = db.load_draft(&c).await.unwrap().unwrap();
        assert_eq!(draft, ProfileDraft::new(c));
    }

    #[tokio::test]
    async fn duplicate_code_is_a_constraint_error() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        let err = db.insert_draft(&c).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn save_step_writes_only_present_fields() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;

        let first = ProfilePatch::default()
            .with_text(ProfileField::Name, "Alice")
            .with_text(ProfileField::Email, "alice@example.com");
        db.save_step(&c, &first, 2).await.unwrap();

        let second = ProfilePatch::default()
            .with_text(ProfileField::Bio, "hello there")
            .with_consent(Consent::Terms, true);
        db.save_step(&c, &second, 4).await.unwrap();

        let draft = db.load_draft(&c).await.unwrap().unwrap();
        assert_eq!(draft.name.as_deref(), Some("Alice"));
        assert_eq!(draft.email.as_deref(), Some("alice@example.com"));
        assert_eq!(draft.bio.as_deref(), Some("hello there"));
        assert!(draft.accepted_terms);
        assert!(!draft.accepted_privacy);
        assert_eq!(draft.onboarding_step, 4);
    }

    #[tokio::test]
    async fn save_step_on_missing_profile_fails() {
        let db = test_db().await;
        let err = db
            .save_step(&code("NOPE0000"), &ProfilePatch::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    // ── Completion ──────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_writes_links_in_order() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        let fields = ProfilePatch::default().with_text(ProfileField::Name, "Alice");

        let persisted = db
            .complete_onboarding(
                &c,
                &fields,
                &[link("Blog", "https://blog.example"), link("Shop", "https://shop.example")],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].display_order, 0);
        assert_eq!(persisted[1].display_order, 1);
        assert_ne!(persisted[0].id, persisted[1].id);
        assert!(persisted[0].description.is_none());

        let public = db.get_public_profile(&c).await.unwrap().unwrap();
        assert!(public.profile.is_onboarding_complete);
        assert!(public.profile.onboarding_completed_at.is_some());
        assert_eq!(public.profile.onboarding_step, 5);
        assert_eq!(public.profile.name.as_deref(), Some("Alice"));
        let labels: Vec<_> = public.links.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, ["Blog", "Shop"]);
    }

    #[tokio::test]
    async fn complete_twice_is_rejected() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        db.complete_onboarding(
            &c,
            &ProfilePatch::default(),
            &[link("A", "https://a.example")],
            Utc::now(),
        )
        .await
        .unwrap();

        let err = db
            .complete_onboarding(
                &c,
                &ProfilePatch::default(),
                &[link("B", "https://b.example")],
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));

        // The first completion's links are untouched
        let public = db.get_public_profile(&c).await.unwrap().unwrap();
        assert_eq!(public.links.len(), 1);
        assert_eq!(public.links[0].label, "A");
    }

    #[tokio::test]
    async fn completion_time_is_the_one_passed_in() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        let completed_at = Utc::now() - chrono::Duration::minutes(3);

        let persisted = db
            .complete_onboarding(
                &c,
                &ProfilePatch::default(),
                &[link("Blog", "https://blog.example")],
                completed_at,
            )
            .await
            .unwrap();
        assert_eq!(persisted[0].created_at, completed_at);

        let public = db.get_public_profile(&c).await.unwrap().unwrap();
        assert_eq!(public.profile.onboarding_completed_at, Some(completed_at));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_and_saves_do_not_interfere() {
        let db = Arc::new(test_db().await);
        let mut completing = Vec::new();
        let mut saving = Vec::new();
        for i in 0..40 {
            completing.push(provisioned(&db, &format!("CMPL{i:04}")).await);
            saving.push(provisioned(&db, &format!("SAVE{i:04}")).await);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for (done, draft) in completing.iter().cloned().zip(saving.iter().cloned()) {
            let db_done = Arc::clone(&db);
            tasks.spawn(async move {
                db_done.complete_onboarding(
                    &done,
                    &ProfilePatch::default(),
                    &[link("Blog", "https://blog.example"), link("Shop", "https://shop.example")],
                    Utc::now(),
                )
                .await
                .map(|_| ())
            });
            let db_draft = Arc::clone(&db);
            tasks.spawn(async move {
                let fields = ProfilePatch::default().with_text(ProfileField::Name, "Alice");
                db_draft.save_step(&draft, &fields, 2).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        for c in &completing {
            let public = db.get_public_profile(c).await.unwrap().unwrap();
            assert_eq!(public.links.len(), 2);
        }
        for c in &saving {
            let draft = db.load_draft(c).await.unwrap().unwrap();
            assert!(!draft.is_onboarding_complete);
            assert_eq!(draft.onboarding_step, 2);
            assert_eq!(draft.name.as_deref(), Some("Alice"));
        }
    }

    #[tokio::test]
    async fn save_step_after_completion_fails() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        db.complete_onboarding(&c, &ProfilePatch::default(), &[], Utc::now())
            .await
            .unwrap();
        assert!(db.save_step(&c, &ProfilePatch::default(), 1).await.is_err());
    }

    #[tokio::test]
    async fn public_profile_hidden_while_incomplete() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        assert!(db.get_public_profile(&c).await.unwrap().is_none());
        assert!(db.get_public_profile(&code("NOPE0000")).await.unwrap().is_none());
    }

    // ── Reset ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn reset_clears_progress_and_prefills_links() {
        let db = test_db().await;
        let c = provisioned(&db, "ABCD1234").await;
        let fields = ProfilePatch::default().with_text(ProfileField::Name, "Alice");
        db.complete_onboarding(&c, &fields, &[link("Blog", "https://blog.example")], Utc::now())
            .await
            .unwrap();

        assert!(db.reset_onboarding(&c).await.unwrap());

        let draft = db.load_draft(&c).await.unwrap().unwrap();
        assert!(!draft.is_onboarding_complete);
        assert_eq!(draft.onboarding_step, 0);
        assert!(draft.onboarding_completed_at.is_none());
        assert_eq!(draft.name.as_deref(), Some("Alice"));
        assert_eq!(draft.links[0].label, "Blog");
        assert_eq!(draft.links[0].category, "website");
        assert!(draft.links[1].is_blank());
        assert!(db.get_public_profile(&c).await.unwrap().is_none());

        // Completing again replaces the old links
        db.complete_onboarding(
            &c,
            &ProfilePatch::default(),
            &[link("Shop", "https://shop.example")],
            Utc::now(),
        )
        .await
        .unwrap();
        let public = db.get_public_profile(&c).await.unwrap().unwrap();
        assert_eq!(public.links.len(), 1);
        assert_eq!(public.links[0].label, "Shop");
    }

    #[tokio::test]
    async fn reset_missing_profile_returns_false() {
        let db = test_db().await;
        assert!(!db.reset_onboarding(&code("NOPE0000")).await.unwrap());
    }

    // ── Listing ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_profiles_respects_limit() {
        let db = test_db().await;
        provisioned(&db, "AAAA1111").await;
        provisioned(&db, "BBBB2222").await;
        provisioned(&db, "CCCC3333").await;

        assert_eq!(db.list_profiles(10).await.unwrap().len(), 3);
        assert_eq!(db.list_profiles(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn categories_are_seeded_in_order() {
        let db = test_db().await;
        let categories = db.list_categories().await.unwrap();
        assert_eq!(categories.len(), 9);
        assert_eq!(categories[0].id, "website");
        assert_eq!(categories.last().unwrap().id, "other");
    }
}
