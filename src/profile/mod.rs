//! Profile data: user codes, drafts, links and categories.

pub mod code;
pub mod model;

pub use code::UserCode;
pub use model::{
    Consent, LINK_SLOTS, LinkCategory, LinkEntry, LinkField, PersistedLink, ProfileDraft,
    ProfileField, ProfilePatch, ProfileSummary, PublicProfile,
};
