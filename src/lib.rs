//! linkpage: onboarding and profile storage for a link-in-bio service.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod profile;
pub mod store;
