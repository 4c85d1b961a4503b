//! Onboarding steps: the fixed, ordered step list and what each step owns.
//!
//! Each step carries its gate, its advisory checks and the slice of the draft
//! it persists, so adding or reordering a step only touches this file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::validation::{
    self, ValidationResult, links_gate, optional, personal_details_gate, photo_bio_gate,
    sanitize_text, terms_gate,
};
use crate::profile::{Consent, ProfileDraft, ProfileField, ProfilePatch};

/// The steps of the onboarding flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    PersonalDetails,
    Links,
    PhotoBio,
    Terms,
}

/// Number of steps in the flow. Also the step index of a completed draft.
pub const STEP_COUNT: usize = OnboardingStep::ALL.len();

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 5] = [
        OnboardingStep::Welcome,
        OnboardingStep::PersonalDetails,
        OnboardingStep::Links,
        OnboardingStep::PhotoBio,
        OnboardingStep::Terms,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Welcome => 0,
            Self::PersonalDetails => 1,
            Self::Links => 2,
            Self::PhotoBio => 3,
            Self::Terms => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<OnboardingStep> {
        Self::ALL.get(index).copied()
    }

    pub fn next(&self) -> Option<OnboardingStep> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(&self) -> Option<OnboardingStep> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }

    /// Heading shown above the step.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::PersonalDetails => "About you",
            Self::Links => "Your links",
            Self::PhotoBio => "Photo & bio",
            Self::Terms => "Terms & privacy",
        }
    }

    /// The predicate that decides whether this step may be left forwards.
    pub fn gate(&self, draft: &ProfileDraft) -> ValidationResult {
        match self {
            Self::Welcome => ValidationResult::valid(),
            Self::PersonalDetails => personal_details_gate(draft),
            Self::Links => links_gate(&draft.links),
            Self::PhotoBio => photo_bio_gate(draft),
            Self::Terms => terms_gate(draft),
        }
    }

    /// Format checks on this step's fields. Shown to the user, never blocking.
    pub fn advisory(&self, draft: &ProfileDraft, today: NaiveDate) -> ValidationResult {
        let mut report = ValidationResult::valid();
        match self {
            Self::Welcome | Self::Terms => {}
            Self::PersonalDetails => {
                report.merge(optional(draft.field(ProfileField::Name), validation::validate_name));
                report.merge(optional(draft.field(ProfileField::Email), validation::validate_email));
                report.merge(optional(draft.field(ProfileField::Mobile), validation::validate_phone));
                report.merge(optional(draft.field(ProfileField::DateOfBirth), |dob| {
                    validation::validate_date_of_birth(dob, today)
                }));
            }
            Self::Links => {
                for (index, link) in draft.links.iter().enumerate() {
                    let checked = optional(Some(link.url.as_str()), validation::validate_url);
                    report.merge(ValidationResult {
                        is_valid: checked.is_valid,
                        errors: checked
                            .errors
                            .into_iter()
                            .map(|e| format!("Link {}: {e}", index + 1))
                            .collect(),
                        warnings: checked.warnings,
                    });
                }
            }
            Self::PhotoBio => {
                report.merge(optional(draft.field(ProfileField::PhotoUrl), validation::validate_url));
            }
        }
        report
    }

    /// The slice of the draft this step writes through `save_step`.
    ///
    /// Links are not part of any step slice; they are written once, at
    /// completion.
    pub fn persisted_fields(&self, draft: &ProfileDraft) -> ProfilePatch {
        let mut patch = ProfilePatch::default();
        let text_fields: &[ProfileField] = match self {
            Self::Welcome | Self::Links => &[],
            Self::PersonalDetails => &ProfileField::PERSONAL,
            Self::PhotoBio => &[ProfileField::PhotoUrl, ProfileField::Bio],
            Self::Terms => {
                return patch
                    .with_consent(Consent::Terms, draft.accepted_terms)
                    .with_consent(Consent::Privacy, draft.accepted_privacy);
            }
        };
        for field in text_fields {
            if let Some(value) = draft.field(*field) {
                patch = patch.with_text(*field, sanitize_text(value));
            }
        }
        patch
    }

    /// Everything written at completion: every text field entered so far
    /// plus the acceptance flags.
    pub fn final_fields(draft: &ProfileDraft) -> ProfilePatch {
        let mut patch = ProfilePatch::default();
        for step in Self::ALL {
            let slice = step.persisted_fields(draft);
            patch = merge_patch(patch, slice);
        }
        patch
    }
}

fn merge_patch(base: ProfilePatch, top: ProfilePatch) -> ProfilePatch {
    ProfilePatch {
        name: top.name.or(base.name),
        date_of_birth: top.date_of_birth.or(base.date_of_birth),
        gender: top.gender.or(base.gender),
        eye_color: top.eye_color.or(base.eye_color),
        relationship_status: top.relationship_status.or(base.relationship_status),
        job_title: top.job_title.or(base.job_title),
        mobile: top.mobile.or(base.mobile),
        email: top.email.or(base.email),
        location: top.location.or(base.location),
        photo_url: top.photo_url.or(base.photo_url),
        bio: top.bio.or(base.bio),
        accepted_terms: top.accepted_terms.or(base.accepted_terms),
        accepted_privacy: top.accepted_privacy.or(base.accepted_privacy),
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::PersonalDetails => "personal_details",
            Self::Links => "links",
            Self::PhotoBio => "photo_bio",
            Self::Terms => "terms",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{LinkEntry, UserCode};

    fn draft() -> ProfileDraft {
        ProfileDraft::new(UserCode::parse("ABCD1234").unwrap())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn indices_match_order() {
        for (i, step) in OnboardingStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(OnboardingStep::from_index(i), Some(*step));
        }
        assert_eq!(OnboardingStep::from_index(STEP_COUNT), None);
        assert_eq!(STEP_COUNT, 5);
    }

    #[test]
    fn next_and_previous_walk_the_list() {
        use OnboardingStep::*;
        assert_eq!(Welcome.next(), Some(PersonalDetails));
        assert_eq!(Terms.next(), None);
        assert_eq!(Welcome.previous(), None);
        assert_eq!(PhotoBio.previous(), Some(Links));
        assert!(Terms.is_last());
        assert!(!Links.is_last());
    }

    #[test]
    fn display_matches_serde() {
        for step in OnboardingStep::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json);
        }
    }

    #[test]
    fn welcome_gate_always_passes() {
        assert!(OnboardingStep::Welcome.gate(&draft()).is_valid);
    }

    #[test]
    fn gates_dispatch_to_the_right_checks() {
        let mut d = draft();
        assert!(!OnboardingStep::PersonalDetails.gate(&d).is_valid);
        assert!(!OnboardingStep::Links.gate(&d).is_valid);
        assert!(!OnboardingStep::PhotoBio.gate(&d).is_valid);
        assert!(!OnboardingStep::Terms.gate(&d).is_valid);

        d.links[0] = LinkEntry {
            label: "Blog".into(),
            url: "https://blog.example".into(),
            category: "website".into(),
            description: String::new(),
        };
        d.bio = Some("writing about rust and coffee".into());
        d.accepted_terms = true;
        d.accepted_privacy = true;
        assert!(OnboardingStep::Links.gate(&d).is_valid);
        assert!(OnboardingStep::PhotoBio.gate(&d).is_valid);
        assert!(OnboardingStep::Terms.gate(&d).is_valid);
    }

    #[test]
    fn advisory_reports_format_problems_without_gating() {
        let mut d = draft();
        for field in ProfileField::PERSONAL {
            *d.field_mut(field) = Some("x".into());
        }
        assert!(OnboardingStep::PersonalDetails.gate(&d).is_valid);

        let advisory = OnboardingStep::PersonalDetails.advisory(&d, today());
        assert!(!advisory.is_valid);
        assert!(advisory.errors.iter().any(|e| e.contains("email")));
        assert!(advisory.errors.iter().any(|e| e.contains("Mobile")));
    }

    #[test]
    fn advisory_prefixes_link_errors_with_slot_number() {
        let mut d = draft();
        d.links[1].url = "not a url".into();
        let advisory = OnboardingStep::Links.advisory(&d, today());
        assert_eq!(advisory.errors.len(), 1);
        assert!(advisory.errors[0].starts_with("Link 2:"));
    }

    #[test]
    fn persisted_fields_cover_only_the_step_slice() {
        let mut d = draft();
        d.name = Some("  Alice  ".into());
        d.bio = Some("hello".into());
        d.accepted_terms = true;

        let personal = OnboardingStep::PersonalDetails.persisted_fields(&d);
        assert_eq!(personal.name.as_deref(), Some("Alice"));
        assert!(personal.bio.is_none());
        assert!(personal.accepted_terms.is_none());

        let photo = OnboardingStep::PhotoBio.persisted_fields(&d);
        assert_eq!(photo.bio.as_deref(), Some("hello"));
        assert!(photo.name.is_none());

        let terms = OnboardingStep::Terms.persisted_fields(&d);
        assert_eq!(terms.accepted_terms, Some(true));
        assert_eq!(terms.accepted_privacy, Some(false));

        assert!(OnboardingStep::Welcome.persisted_fields(&d).is_empty());
        assert!(OnboardingStep::Links.persisted_fields(&d).is_empty());
    }

    #[test]
    fn final_fields_collect_every_slice() {
        let mut d = draft();
        d.name = Some("Alice".into());
        d.bio = Some("hello".into());
        d.accepted_terms = true;
        d.accepted_privacy = true;

        let patch = OnboardingStep::final_fields(&d);
        assert_eq!(patch.name.as_deref(), Some("Alice"));
        assert_eq!(patch.bio.as_deref(), Some("hello"));
        assert_eq!(patch.accepted_terms, Some(true));
        assert_eq!(patch.accepted_privacy, Some(true));
        assert!(patch.email.is_none());
    }
}
