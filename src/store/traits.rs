//! `Database` trait: the single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::profile::{
    LinkCategory, LinkEntry, PersistedLink, ProfileDraft, ProfilePatch, ProfileSummary,
    PublicProfile, UserCode,
};

/// Backend-agnostic storage for profile drafts, links and categories.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Onboarding ──────────────────────────────────────────────────

    /// Load the draft for `code`, or `None` if it was never provisioned.
    async fn load_draft(&self, code: &UserCode) -> Result<Option<ProfileDraft>, DatabaseError>;

    /// Write the fields present in `fields` and set `onboarding_step`.
    async fn save_step(
        &self,
        code: &UserCode,
        fields: &ProfilePatch,
        next_step: u32,
    ) -> Result<(), DatabaseError>;

    /// Write the final fields and links and mark the draft complete, in one
    /// transaction. Fails if the draft is missing or already complete.
    ///
    /// `links` are written in order; `display_order` is the position in the
    /// slice. `completed_at` is stored as the completion time and as each
    /// link's creation time.
    async fn complete_onboarding(
        &self,
        code: &UserCode,
        fields: &ProfilePatch,
        links: &[LinkEntry],
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<PersistedLink>, DatabaseError>;

    /// Clear onboarding progress so the next session starts at step 0.
    /// Returns `false` if no draft exists.
    async fn reset_onboarding(&self, code: &UserCode) -> Result<bool, DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Create an empty, incomplete draft. Fails with a constraint error if
    /// the code is taken.
    async fn insert_draft(&self, code: &UserCode) -> Result<(), DatabaseError>;

    /// The completed profile and its links, or `None` while incomplete.
    async fn get_public_profile(
        &self,
        code: &UserCode,
    ) -> Result<Option<PublicProfile>, DatabaseError>;

    /// Most recently updated profiles first.
    async fn list_profiles(&self, limit: usize) -> Result<Vec<ProfileSummary>, DatabaseError>;

    // ── Reference data ──────────────────────────────────────────────

    /// Link categories ordered by `sort_order`.
    async fn list_categories(&self) -> Result<Vec<LinkCategory>, DatabaseError>;
}
