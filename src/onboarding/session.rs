//! OnboardingSession: one user's pass through the step flow.
//!
//! Holds the form state and the sequencer behind one lock and talks to the
//! [`Database`] between them. The lock is never held across a database call;
//! a separate saving flag keeps a second advance from racing the first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::sequencer::{StepSequencer, Transition};
use super::step::{OnboardingStep, STEP_COUNT};
use super::store::FormDataStore;
use super::validation::{ValidationResult, sanitize_link};
use crate::error::OnboardingError;
use crate::profile::{
    Consent, LinkEntry, LinkField, ProfileDraft, ProfileField, ProfilePatch, PublicProfile,
    UserCode,
};
use crate::store::Database;

/// What opening a user code produced.
pub enum Opened {
    /// Onboarding already finished; go straight to the public profile.
    Published(PublicProfile),
    Active(OnboardingSession),
}

/// Result of a forward move that did not error.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The active step's gate failed. Nothing moved or was saved.
    Blocked(ValidationResult),
    /// The step was saved and the flow moved on.
    Advanced {
        step: OnboardingStep,
        warnings: Vec<String>,
    },
    /// The last step was saved and onboarding is complete.
    Completed(PublicProfile),
}

/// Everything a client needs to render the active step.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub user_code: UserCode,
    pub step: OnboardingStep,
    pub step_index: usize,
    pub step_count: usize,
    pub title: &'static str,
    pub is_complete: bool,
    pub saving: bool,
    pub draft: ProfileDraft,
    /// Whether the active step may be left forwards.
    pub gate: ValidationResult,
    /// Format problems in the active step's fields.
    pub advisory: ValidationResult,
}

struct SessionState {
    form: FormDataStore,
    sequencer: StepSequencer,
}

pub struct OnboardingSession {
    db: Arc<dyn Database>,
    user_code: UserCode,
    state: RwLock<SessionState>,
    saving: AtomicBool,
}

/// Holds the saving flag for the duration of one save and clears it on drop.
struct SavingGuard<'a>(&'a AtomicBool);

impl<'a> SavingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OnboardingSession {
    /// Load the draft for `code` and resume at its persisted step.
    ///
    /// A missing draft is an error; one is never created here.
    pub async fn open(
        db: Arc<dyn Database>,
        user_code: UserCode,
    ) -> Result<Opened, OnboardingError> {
        let draft = db
            .load_draft(&user_code)
            .await?
            .ok_or_else(|| OnboardingError::NotFound {
                user_code: user_code.to_string(),
            })?;

        if draft.is_onboarding_complete {
            let profile = match db.get_public_profile(&user_code).await? {
                Some(profile) => profile,
                None => PublicProfile::new(draft, Vec::new()),
            };
            debug!(user_code = %user_code, "Opened completed profile");
            return Ok(Opened::Published(profile));
        }

        let sequencer = StepSequencer::resume(draft.onboarding_step);
        info!(
            user_code = %user_code,
            step = %sequencer.current(),
            "Resuming onboarding"
        );

        Ok(Opened::Active(Self {
            db,
            user_code,
            state: RwLock::new(SessionState {
                form: FormDataStore::new(draft),
                sequencer,
            }),
            saving: AtomicBool::new(false),
        }))
    }

    pub fn user_code(&self) -> &UserCode {
        &self.user_code
    }

    /// Whether an advance or jump is waiting on the database.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    pub async fn current_step(&self) -> OnboardingStep {
        self.state.read().await.sequencer.current()
    }

    pub async fn is_complete(&self) -> bool {
        self.state.read().await.sequencer.is_complete()
    }

    pub async fn snapshot(&self) -> ProfileDraft {
        self.state.read().await.form.snapshot()
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        let step = state.sequencer.current();
        let draft = state.form.snapshot();
        SessionStatus {
            user_code: self.user_code.clone(),
            step,
            step_index: state.sequencer.index(),
            step_count: STEP_COUNT,
            title: step.title(),
            is_complete: state.sequencer.is_complete(),
            saving: self.is_saving(),
            gate: step.gate(&draft),
            advisory: step.advisory(&draft, Utc::now().date_naive()),
            draft,
        }
    }

    /// Format checks for the active step. Never blocks a move.
    pub async fn advisory_report(&self) -> ValidationResult {
        let state = self.state.read().await;
        state
            .sequencer
            .current()
            .advisory(state.form.draft(), Utc::now().date_naive())
    }

    // ── Editing ─────────────────────────────────────────────────────

    pub async fn set_field(
        &self,
        field: ProfileField,
        value: impl Into<String>,
    ) -> Result<(), OnboardingError> {
        let mut state = self.editable().await?;
        state.form.set_field(field, value);
        Ok(())
    }

    pub async fn set_consent(&self, consent: Consent, value: bool) -> Result<(), OnboardingError> {
        let mut state = self.editable().await?;
        state.form.set_consent(consent, value);
        Ok(())
    }

    pub async fn set_link_field(
        &self,
        index: usize,
        field: LinkField,
        value: impl Into<String>,
    ) -> Result<(), OnboardingError> {
        let mut state = self.editable().await?;
        state.form.set_link_field(index, field, value)
    }

    pub async fn set_link(&self, index: usize, link: LinkEntry) -> Result<(), OnboardingError> {
        let mut state = self.editable().await?;
        state.form.set_link(index, link)
    }

    pub async fn apply_patch(&self, patch: &ProfilePatch) -> Result<(), OnboardingError> {
        let mut state = self.editable().await?;
        state.form.apply_patch(patch);
        Ok(())
    }

    async fn editable(&self) -> Result<tokio::sync::RwLockWriteGuard<'_, SessionState>, OnboardingError> {
        let state = self.state.write().await;
        if state.sequencer.is_complete() {
            return Err(self.already_complete());
        }
        Ok(state)
    }

    // ── Moving ──────────────────────────────────────────────────────

    /// Validate the active step, save it, and move forward.
    ///
    /// On the last step this writes the final fields and links and completes
    /// onboarding. A failed save leaves everything where it was; the same
    /// call may be retried.
    pub async fn advance(&self) -> Result<AdvanceOutcome, OnboardingError> {
        let _guard = SavingGuard::acquire(&self.saving).ok_or_else(|| {
            warn!(user_code = %self.user_code, "Advance rejected, save in flight");
            OnboardingError::AdvanceInFlight {
                user_code: self.user_code.to_string(),
            }
        })?;

        let (step, draft) = {
            let state = self.state.read().await;
            if state.sequencer.is_complete() {
                return Err(self.already_complete());
            }
            (state.sequencer.current(), state.form.snapshot())
        };

        let report = step.gate(&draft);
        if !report.is_valid {
            warn!(
                user_code = %self.user_code,
                step = %step,
                errors = ?report.errors,
                "Step blocked by validation"
            );
            return Ok(AdvanceOutcome::Blocked(report));
        }

        if step.is_last() {
            return self.complete(step, draft).await;
        }

        let next_index = step.index() + 1;
        let persisted_step = draft.onboarding_step.max(next_index as u32);
        let fields = step.persisted_fields(&draft);

        debug!(
            user_code = %self.user_code,
            step = %step,
            next_step = persisted_step,
            "Saving step"
        );
        if let Err(e) = self.db.save_step(&self.user_code, &fields, persisted_step).await {
            warn!(user_code = %self.user_code, step = %step, error = %e, "Step save failed");
            return Err(e.into());
        }

        let mut state = self.state.write().await;
        let moved = match state.sequencer.commit_advance(step) {
            Some(Transition::Moved(next)) => next,
            _ => return Err(self.already_complete()),
        };
        state.form.set_onboarding_step(persisted_step);
        info!(user_code = %self.user_code, from = %step, to = %moved, "Onboarding step advanced");

        Ok(AdvanceOutcome::Advanced {
            step: moved,
            warnings: report.warnings,
        })
    }

    async fn complete(
        &self,
        step: OnboardingStep,
        draft: ProfileDraft,
    ) -> Result<AdvanceOutcome, OnboardingError> {
        // Every field stays editable until the end, so all gates run again.
        let mut report = ValidationResult::valid();
        for gated in OnboardingStep::ALL {
            report.merge(gated.gate(&draft));
        }
        if !report.is_valid {
            warn!(
                user_code = %self.user_code,
                errors = ?report.errors,
                "Completion blocked by an earlier step"
            );
            return Ok(AdvanceOutcome::Blocked(report));
        }

        let fields = OnboardingStep::final_fields(&draft);
        let links: Vec<LinkEntry> = draft.complete_links().iter().map(sanitize_link).collect();

        debug!(
            user_code = %self.user_code,
            links = links.len(),
            "Completing onboarding"
        );
        let completed_at = Utc::now();
        let persisted = match self
            .db
            .complete_onboarding(&self.user_code, &fields, &links, completed_at)
            .await
        {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(user_code = %self.user_code, error = %e, "Completion failed");
                return Err(e.into());
            }
        };

        let mut state = self.state.write().await;
        if state.sequencer.commit_advance(step) != Some(Transition::Completed) {
            return Err(self.already_complete());
        }
        state.form.apply_patch(&fields);
        state.form.set_onboarding_step(STEP_COUNT as u32);
        let mut profile = state.form.snapshot();
        profile.is_onboarding_complete = true;
        profile.onboarding_completed_at = Some(completed_at);

        info!(
            user_code = %self.user_code,
            links = persisted.len(),
            "Onboarding completed"
        );
        Ok(AdvanceOutcome::Completed(PublicProfile::new(profile, persisted)))
    }

    /// Step back one. Nothing is saved and later-step data is kept.
    ///
    /// Returns the step now active; on the first step this is a no-op.
    pub async fn retreat(&self) -> Result<OnboardingStep, OnboardingError> {
        let mut state = self.state.write().await;
        if state.sequencer.is_complete() {
            return Err(self.already_complete());
        }
        let from = state.sequencer.current();
        if state.sequencer.retreat() {
            info!(
                user_code = %self.user_code,
                from = %from,
                to = %state.sequencer.current(),
                "Onboarding step retreated"
            );
        }
        Ok(state.sequencer.current())
    }

    /// Jump straight to `index`. Only the welcome step may hand over to the
    /// next one; no validation runs, but the new position is saved.
    pub async fn jump_to(&self, index: usize) -> Result<OnboardingStep, OnboardingError> {
        let _guard = SavingGuard::acquire(&self.saving).ok_or_else(|| {
            OnboardingError::AdvanceInFlight {
                user_code: self.user_code.to_string(),
            }
        })?;

        let (from, target, persisted_step) = {
            let state = self.state.read().await;
            let target = state.sequencer.check_jump(index)?;
            let persisted = state.form.draft().onboarding_step.max(index as u32);
            (state.sequencer.current(), target, persisted)
        };

        if let Err(e) = self
            .db
            .save_step(&self.user_code, &ProfilePatch::default(), persisted_step)
            .await
        {
            warn!(user_code = %self.user_code, error = %e, "Jump save failed");
            return Err(e.into());
        }

        let mut state = self.state.write().await;
        if state.sequencer.commit_advance(from) != Some(Transition::Moved(target)) {
            return Err(OnboardingError::InvalidJump {
                from: from.index(),
                to: index,
            });
        }
        state.form.set_onboarding_step(persisted_step);
        info!(user_code = %self.user_code, to = %target, "Skipped welcome step");
        Ok(target)
    }

    fn already_complete(&self) -> OnboardingError {
        OnboardingError::AlreadyComplete {
            user_code: self.user_code.to_string(),
        }
    }
}
