//! Profile draft, link and category data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::code::UserCode;

/// Number of link slots offered by the links step.
pub const LINK_SLOTS: usize = 3;

/// A text field of the profile draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    DateOfBirth,
    Gender,
    EyeColor,
    RelationshipStatus,
    JobTitle,
    Mobile,
    Email,
    Location,
    PhotoUrl,
    Bio,
}

impl ProfileField {
    /// Fields the personal-details step requires, in display order.
    pub const PERSONAL: [ProfileField; 9] = [
        ProfileField::Name,
        ProfileField::DateOfBirth,
        ProfileField::Gender,
        ProfileField::EyeColor,
        ProfileField::Email,
        ProfileField::Mobile,
        ProfileField::Location,
        ProfileField::RelationshipStatus,
        ProfileField::JobTitle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::DateOfBirth => "date_of_birth",
            Self::Gender => "gender",
            Self::EyeColor => "eye_color",
            Self::RelationshipStatus => "relationship_status",
            Self::JobTitle => "job_title",
            Self::Mobile => "mobile",
            Self::Email => "email",
            Self::Location => "location",
            Self::PhotoUrl => "photo_url",
            Self::Bio => "bio",
        }
    }

    /// Human-readable label used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::DateOfBirth => "Date of birth",
            Self::Gender => "Gender",
            Self::EyeColor => "Eye color",
            Self::RelationshipStatus => "Relationship status",
            Self::JobTitle => "Job title",
            Self::Mobile => "Mobile",
            Self::Email => "Email",
            Self::Location => "Location",
            Self::PhotoUrl => "Photo",
            Self::Bio => "Bio",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "date_of_birth" => Ok(Self::DateOfBirth),
            "gender" => Ok(Self::Gender),
            "eye_color" => Ok(Self::EyeColor),
            "relationship_status" => Ok(Self::RelationshipStatus),
            "job_title" => Ok(Self::JobTitle),
            "mobile" => Ok(Self::Mobile),
            "email" => Ok(Self::Email),
            "location" => Ok(Self::Location),
            "photo_url" => Ok(Self::PhotoUrl),
            "bio" => Ok(Self::Bio),
            other => Err(format!("unknown profile field: {other}")),
        }
    }
}

/// The two acceptance flags collected by the terms step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consent {
    Terms,
    Privacy,
}

/// One attribute of a link slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkField {
    Label,
    Url,
    Category,
    Description,
}

/// A link slot as edited during onboarding. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub url: String,
    /// Selected category id.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl LinkEntry {
    pub fn get(&self, field: LinkField) -> &str {
        match field {
            LinkField::Label => &self.label,
            LinkField::Url => &self.url,
            LinkField::Category => &self.category,
            LinkField::Description => &self.description,
        }
    }

    pub fn set(&mut self, field: LinkField, value: String) {
        match field {
            LinkField::Label => self.label = value,
            LinkField::Url => self.url = value,
            LinkField::Category => self.category = value,
            LinkField::Description => self.description = value,
        }
    }

    /// Label, url and category are all non-blank.
    pub fn is_complete(&self) -> bool {
        !self.label.trim().is_empty()
            && !self.url.trim().is_empty()
            && !self.category.trim().is_empty()
    }

    /// Nothing has been typed into the slot.
    pub fn is_blank(&self) -> bool {
        self.label.trim().is_empty()
            && self.url.trim().is_empty()
            && self.category.trim().is_empty()
            && self.description.trim().is_empty()
    }
}

/// The accumulating onboarding record for one user code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub user_code: UserCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub accepted_terms: bool,
    #[serde(default)]
    pub accepted_privacy: bool,
    #[serde(default)]
    pub links: [LinkEntry; LINK_SLOTS],
    /// Index of the next step to show.
    #[serde(default)]
    pub onboarding_step: u32,
    #[serde(default)]
    pub is_onboarding_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

impl ProfileDraft {
    /// An empty, incomplete draft.
    pub fn new(user_code: UserCode) -> Self {
        Self {
            user_code,
            name: None,
            date_of_birth: None,
            gender: None,
            eye_color: None,
            relationship_status: None,
            job_title: None,
            mobile: None,
            email: None,
            location: None,
            photo_url: None,
            bio: None,
            accepted_terms: false,
            accepted_privacy: false,
            links: Default::default(),
            onboarding_step: 0,
            is_onboarding_complete: false,
            onboarding_completed_at: None,
        }
    }

    pub fn field(&self, field: ProfileField) -> Option<&str> {
        self.field_slot(field).as_deref()
    }

    /// The field's value if present and non-blank, trimmed.
    pub fn present(&self, field: ProfileField) -> Option<&str> {
        self.field(field).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn field_mut(&mut self, field: ProfileField) -> &mut Option<String> {
        match field {
            ProfileField::Name => &mut self.name,
            ProfileField::DateOfBirth => &mut self.date_of_birth,
            ProfileField::Gender => &mut self.gender,
            ProfileField::EyeColor => &mut self.eye_color,
            ProfileField::RelationshipStatus => &mut self.relationship_status,
            ProfileField::JobTitle => &mut self.job_title,
            ProfileField::Mobile => &mut self.mobile,
            ProfileField::Email => &mut self.email,
            ProfileField::Location => &mut self.location,
            ProfileField::PhotoUrl => &mut self.photo_url,
            ProfileField::Bio => &mut self.bio,
        }
    }

    fn field_slot(&self, field: ProfileField) -> &Option<String> {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::DateOfBirth => &self.date_of_birth,
            ProfileField::Gender => &self.gender,
            ProfileField::EyeColor => &self.eye_color,
            ProfileField::RelationshipStatus => &self.relationship_status,
            ProfileField::JobTitle => &self.job_title,
            ProfileField::Mobile => &self.mobile,
            ProfileField::Email => &self.email,
            ProfileField::Location => &self.location,
            ProfileField::PhotoUrl => &self.photo_url,
            ProfileField::Bio => &self.bio,
        }
    }

    pub fn consent(&self, consent: Consent) -> bool {
        match consent {
            Consent::Terms => self.accepted_terms,
            Consent::Privacy => self.accepted_privacy,
        }
    }

    /// Fully filled link slots in slot order; partial slots are dropped.
    pub fn complete_links(&self) -> Vec<LinkEntry> {
        self.links
            .iter()
            .filter(|l| l.is_complete())
            .cloned()
            .collect()
    }
}

/// A partial set of profile fields, written by one step or sent by a client.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_terms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_privacy: Option<bool>,
}

impl ProfilePatch {
    pub fn text(&self, field: ProfileField) -> Option<&str> {
        let slot = match field {
            ProfileField::Name => &self.name,
            ProfileField::DateOfBirth => &self.date_of_birth,
            ProfileField::Gender => &self.gender,
            ProfileField::EyeColor => &self.eye_color,
            ProfileField::RelationshipStatus => &self.relationship_status,
            ProfileField::JobTitle => &self.job_title,
            ProfileField::Mobile => &self.mobile,
            ProfileField::Email => &self.email,
            ProfileField::Location => &self.location,
            ProfileField::PhotoUrl => &self.photo_url,
            ProfileField::Bio => &self.bio,
        };
        slot.as_deref()
    }

    /// Builder: set one text field.
    pub fn with_text(mut self, field: ProfileField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::DateOfBirth => self.date_of_birth = value,
            ProfileField::Gender => self.gender = value,
            ProfileField::EyeColor => self.eye_color = value,
            ProfileField::RelationshipStatus => self.relationship_status = value,
            ProfileField::JobTitle => self.job_title = value,
            ProfileField::Mobile => self.mobile = value,
            ProfileField::Email => self.email = value,
            ProfileField::Location => self.location = value,
            ProfileField::PhotoUrl => self.photo_url = value,
            ProfileField::Bio => self.bio = value,
        }
        self
    }

    /// Builder: set one acceptance flag.
    pub fn with_consent(mut self, consent: Consent, value: bool) -> Self {
        match consent {
            Consent::Terms => self.accepted_terms = Some(value),
            Consent::Privacy => self.accepted_privacy = Some(value),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reference data used to categorize a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCategory {
    pub id: String,
    pub name: String,
    pub icon: String,
}

/// A link row written at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLink {
    /// Server-assigned identifier.
    pub id: Uuid,
    pub user_code: UserCode,
    pub label: String,
    pub url: String,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub display_order: u32,
    pub created_at: DateTime<Utc>,
}

/// A completed profile and its links, as handed to the public profile view.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub profile: ProfileDraft,
    /// Sorted by `display_order`.
    pub links: Vec<PersistedLink>,
}

impl PublicProfile {
    pub fn new(profile: ProfileDraft, mut links: Vec<PersistedLink>) -> Self {
        links.sort_by_key(|l| l.display_order);
        Self { profile, links }
    }

    /// The subset of the profile that is shown to visitors.
    ///
    /// Contact details and date of birth stay private.
    pub fn to_public_json(&self) -> serde_json::Value {
        let p = &self.profile;
        serde_json::json!({
            "user_code": p.user_code,
            "name": p.name,
            "job_title": p.job_title,
            "location": p.location,
            "photo_url": p.photo_url,
            "bio": p.bio,
            "links": self.links.iter().map(|l| serde_json::json!({
                "id": l.id,
                "label": l.label,
                "url": l.url,
                "category_id": l.category_id,
                "description": l.description,
                "display_order": l.display_order,
            })).collect::<Vec<_>>(),
        })
    }
}

/// One row of the admin listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub user_code: UserCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub onboarding_step: u32,
    pub is_onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> UserCode {
        UserCode::parse("ABCD1234").unwrap()
    }

    #[test]
    fn new_draft_is_empty_and_incomplete() {
        let draft = ProfileDraft::new(code());
        assert!(draft.name.is_none());
        assert!(!draft.accepted_terms);
        assert!(draft.links.iter().all(LinkEntry::is_blank));
        assert_eq!(draft.onboarding_step, 0);
        assert!(!draft.is_onboarding_complete);
    }

    #[test]
    fn present_ignores_blank_values() {
        let mut draft = ProfileDraft::new(code());
        *draft.field_mut(ProfileField::Name) = Some("   ".into());
        assert_eq!(draft.field(ProfileField::Name), Some("   "));
        assert_eq!(draft.present(ProfileField::Name), None);

        *draft.field_mut(ProfileField::Name) = Some("  Alice ".into());
        assert_eq!(draft.present(ProfileField::Name), Some("Alice"));
    }

    #[test]
    fn profile_field_names_roundtrip() {
        let all = [
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
        for field in all {
            assert_eq!(field.as_str().parse::<ProfileField>().unwrap(), field);
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{field}\""));
        }
        assert!("favourite_color".parse::<ProfileField>().is_err());
    }

    #[test]
    fn link_completeness() {
        let mut link = LinkEntry::default();
        assert!(link.is_blank());
        assert!(!link.is_complete());

        link.set(LinkField::Url, "https://example.com".into());
        link.set(LinkField::Label, "Site".into());
        assert!(!link.is_blank());
        assert!(!link.is_complete());

        link.set(LinkField::Category, "website".into());
        assert!(link.is_complete());
        assert_eq!(link.get(LinkField::Category), "website");
    }

    #[test]
    fn complete_links_keeps_slot_order_and_drops_partials() {
        let mut draft = ProfileDraft::new(code());
        draft.links[0] = LinkEntry {
            label: "First".into(),
            url: "https://a.example".into(),
            category: "social".into(),
            description: String::new(),
        };
        draft.links[1].url = "https://partial.example".into();
        draft.links[2] = LinkEntry {
            label: "Third".into(),
            url: "https://c.example".into(),
            category: "music".into(),
            description: "tunes".into(),
        };

        let links = draft.complete_links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].label, "First");
        assert_eq!(links[1].label, "Third");
    }

    #[test]
    fn patch_builders_and_emptiness() {
        assert!(ProfilePatch::default().is_empty());
        let patch = ProfilePatch::default()
            .with_text(ProfileField::Bio, "hello")
            .with_consent(Consent::Privacy, true);
        assert!(!patch.is_empty());
        assert_eq!(patch.text(ProfileField::Bio), Some("hello"));
        assert_eq!(patch.accepted_privacy, Some(true));
        assert_eq!(patch.accepted_terms, None);
    }

    #[test]
    fn patch_deserializes_partial_json() {
        let patch: ProfilePatch =
            serde_json::from_str(r#"{"name": "Alice", "accepted_terms": true}"#).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Alice"));
        assert_eq!(patch.accepted_terms, Some(true));
        assert!(patch.email.is_none());
    }

    #[test]
    fn public_profile_sorts_links_and_hides_contact_details() {
        let mut draft = ProfileDraft::new(code());
        draft.name = Some("Alice".into());
        draft.email = Some("alice@example.com".into());
        draft.mobile = Some("+15551234567".into());

        let link = |order: u32| PersistedLink {
            id: Uuid::new_v4(),
            user_code: code(),
            label: format!("link {order}"),
            url: "https://example.com".into(),
            category_id: "website".into(),
            description: None,
            display_order: order,
            created_at: Utc::now(),
        };
        let profile = PublicProfile::new(draft, vec![link(2), link(0), link(1)]);
        let orders: Vec<u32> = profile.links.iter().map(|l| l.display_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let json = profile.to_public_json();
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["links"].as_array().unwrap().len(), 3);
        let text = json.to_string();
        assert!(!text.contains("alice@example.com"));
        assert!(!text.contains("+15551234567"));
    }
}
