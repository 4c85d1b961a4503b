//! Onboarding: the step-by-step flow that turns a provisioned user code
//! into a published profile.
//!
//! A session walks the user through a fixed list of steps. Each step has a
//! gate that must pass before the flow moves on, and each forward move is
//! saved before it takes effect. The last step writes the links and marks
//! the profile complete.

pub mod registry;
pub mod routes;
pub mod sequencer;
pub mod session;
pub mod step;
pub mod store;
pub mod validation;

pub use registry::{DEFAULT_IDLE_TIMEOUT, SessionHandle, SessionRegistry, spawn_expiry_task};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use sequencer::{StepSequencer, Transition};
pub use session::{AdvanceOutcome, OnboardingSession, Opened, SessionStatus};
pub use step::{OnboardingStep, STEP_COUNT};
pub use store::FormDataStore;
pub use validation::ValidationResult;
