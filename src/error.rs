//! Error types for linkpage.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by an onboarding session.
///
/// Validation failures are not errors: a blocked step is reported through
/// `AdvanceOutcome::Blocked`.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Invalid user code: {0}")]
    InvalidUserCode(String),

    #[error("No profile draft exists for user code {user_code}")]
    NotFound { user_code: String },

    #[error("A save is already in flight for user code {user_code}")]
    AdvanceInFlight { user_code: String },

    #[error("Onboarding is already complete for user code {user_code}")]
    AlreadyComplete { user_code: String },

    #[error("Cannot jump from step {from} to step {to}")]
    InvalidJump { from: usize, to: usize },

    #[error("Link slot {index} is out of range (0..{capacity})")]
    LinkSlotOutOfRange { index: usize, capacity: usize },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),
}
