//! In-memory form state for one onboarding session.

use crate::error::OnboardingError;
use crate::profile::{Consent, LINK_SLOTS, LinkEntry, LinkField, ProfileDraft, ProfileField, ProfilePatch};

/// Accumulates everything the user has typed so far.
///
/// Nothing here touches storage; the session decides what gets saved.
#[derive(Debug, Clone)]
pub struct FormDataStore {
    draft: ProfileDraft,
}

impl FormDataStore {
    pub fn new(draft: ProfileDraft) -> Self {
        Self { draft }
    }

    /// Replace one text field.
    pub fn set_field(&mut self, field: ProfileField, value: impl Into<String>) {
        *self.draft.field_mut(field) = Some(value.into());
    }

    pub fn set_consent(&mut self, consent: Consent, value: bool) {
        match consent {
            Consent::Terms => self.draft.accepted_terms = value,
            Consent::Privacy => self.draft.accepted_privacy = value,
        }
    }

    /// Replace one field of one link slot. Other slots are untouched.
    pub fn set_link_field(
        &mut self,
        index: usize,
        field: LinkField,
        value: impl Into<String>,
    ) -> Result<(), OnboardingError> {
        self.slot_mut(index)?.set(field, value.into());
        Ok(())
    }

    /// Replace a whole link slot.
    pub fn set_link(&mut self, index: usize, link: LinkEntry) -> Result<(), OnboardingError> {
        *self.slot_mut(index)? = link;
        Ok(())
    }

    /// Apply every field present in `patch`.
    pub fn apply_patch(&mut self, patch: &ProfilePatch) {
        for field in ALL_FIELDS {
            if let Some(value) = patch.text(field) {
                self.set_field(field, value);
            }
        }
        if let Some(terms) = patch.accepted_terms {
            self.set_consent(Consent::Terms, terms);
        }
        if let Some(privacy) = patch.accepted_privacy {
            self.set_consent(Consent::Privacy, privacy);
        }
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    pub fn snapshot(&self) -> ProfileDraft {
        self.draft.clone()
    }

    pub(crate) fn set_onboarding_step(&mut self, step: u32) {
        self.draft.onboarding_step = step;
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut LinkEntry, OnboardingError> {
        self.draft
            .links
            .get_mut(index)
            .ok_or(OnboardingError::LinkSlotOutOfRange {
                index,
                capacity: LINK_SLOTS,
            })
    }
}

const ALL_FIELDS: [ProfileField; 11] = [
    ProfileField::Name,
    ProfileField::DateOfBirth,
    ProfileField::Gender,
    ProfileField::EyeColor,
    ProfileField::RelationshipStatus,
    ProfileField::JobTitle,
    ProfileField::Mobile,
    ProfileField::Email,
    ProfileField::Location,
    ProfileField::PhotoUrl,
    ProfileField::Bio,
];
