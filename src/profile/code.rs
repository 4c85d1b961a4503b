//! User codes: the short public identifier a profile is addressed by.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;

/// A fixed-length ASCII alphanumeric code, assigned before onboarding begins
/// and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserCode(String);

impl UserCode {
    /// Number of characters in every code.
    pub const LENGTH: usize = 8;

    /// Parse a code, rejecting anything that is not exactly
    /// [`UserCode::LENGTH`] ASCII alphanumerics.
    pub fn parse(code: impl Into<String>) -> Result<Self, OnboardingError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.len() != Self::LENGTH || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(OnboardingError::InvalidUserCode(code));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generate a fresh random code. Uniqueness is enforced by the store.
    pub fn generate() -> Self {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LENGTH)
            .map(char::from)
            .collect();
        Self(code)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserCode {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserCode {
    type Error = OnboardingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserCode> for String {
    fn from(code: UserCode) -> Self {
        code.0
    }
}

impl AsRef<str> for UserCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
