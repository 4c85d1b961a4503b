//! REST endpoints for onboarding, public profiles and administration.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::registry::{SessionHandle, SessionRegistry};
use super::session::{AdvanceOutcome, OnboardingSession};
use super::validation;
use crate::error::{DatabaseError, OnboardingError};
use crate::profile::{LinkEntry, ProfilePatch, UserCode};

/// Attempts at finding an unused code when provisioning a profile.
const PROVISION_ATTEMPTS: usize = 5;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub registry: Arc<SessionRegistry>,
    pub admin_list_limit: usize,
}

/// An error rendered as `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        let status = match &err {
            OnboardingError::InvalidUserCode(_)
            | OnboardingError::InvalidJump { .. }
            | OnboardingError::LinkSlotOutOfRange { .. } => StatusCode::BAD_REQUEST,
            OnboardingError::NotFound { .. } => StatusCode::NOT_FOUND,
            OnboardingError::AdvanceInFlight { .. } | OnboardingError::AlreadyComplete { .. } => {
                StatusCode::CONFLICT
            }
            OnboardingError::Persistence(e) => {
                error!(error = %e, "Onboarding persistence failure");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        error!(error = %err, "Database error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

type ApiResult = Result<Response, ApiError>;

async fn active_session(
    state: &OnboardingRouteState,
    raw_code: String,
) -> Result<Arc<OnboardingSession>, ApiError> {
    let code = UserCode::parse(raw_code)?;
    match state.registry.get_or_open(&code).await? {
        SessionHandle::Active(session) => Ok(session),
        SessionHandle::Published(_) => Err(OnboardingError::AlreadyComplete {
            user_code: code.to_string(),
        }
        .into()),
    }
}

async fn status_response(session: &OnboardingSession) -> Response {
    Json(session.status().await).into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/categories
async fn list_categories(State(state): State<OnboardingRouteState>) -> ApiResult {
    let categories = state.registry.database().list_categories().await?;
    Ok(Json(categories).into_response())
}

/// GET /api/onboarding/{code}
///
/// The active step, the draft and the step's gate report. A finished
/// profile is returned as-is with `is_complete: true`.
async fn get_onboarding(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let code = UserCode::parse(code)?;
    match state.registry.get_or_open(&code).await? {
        SessionHandle::Active(session) => Ok(status_response(&session).await),
        SessionHandle::Published(profile) => Ok(Json(serde_json::json!({
            "user_code": code,
            "is_complete": true,
            "profile": profile.to_public_json(),
        }))
        .into_response()),
    }
}

/// PATCH /api/onboarding/{code}/fields
async fn patch_fields(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
    Json(fields): Json<ProfilePatch>,
) -> ApiResult {
    let session = active_session(&state, code).await?;
    session.apply_patch(&fields).await?;
    Ok(status_response(&session).await)
}

/// PUT /api/onboarding/{code}/links/{index}
async fn put_link(
    State(state): State<OnboardingRouteState>,
    Path((code, index)): Path<(String, usize)>,
    Json(link): Json<LinkEntry>,
) -> ApiResult {
    let session = active_session(&state, code).await?;
    session.set_link(index, link).await?;
    Ok(status_response(&session).await)
}

/// POST /api/onboarding/{code}/advance
///
/// A blocked step answers 422 with the gate report.
async fn advance(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let session = active_session(&state, code).await?;
    let response = match session.advance().await? {
        AdvanceOutcome::Blocked(report) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"outcome": "blocked", "report": report})),
        )
            .into_response(),
        AdvanceOutcome::Advanced { step, warnings } => Json(serde_json::json!({
            "outcome": "advanced",
            "step": step,
            "step_index": step.index(),
            "title": step.title(),
            "warnings": warnings,
        }))
        .into_response(),
        AdvanceOutcome::Completed(profile) => Json(serde_json::json!({
            "outcome": "completed",
            "profile": profile.to_public_json(),
        }))
        .into_response(),
    };
    Ok(response)
}

/// POST /api/onboarding/{code}/retreat
async fn retreat(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let session = active_session(&state, code).await?;
    let step = session.retreat().await?;
    Ok(Json(serde_json::json!({"step": step, "step_index": step.index()})).into_response())
}

/// POST /api/onboarding/{code}/skip-welcome
async fn skip_welcome(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let session = active_session(&state, code).await?;
    let step = session.jump_to(1).await?;
    Ok(Json(serde_json::json!({"step": step, "step_index": step.index()})).into_response())
}

#[derive(Deserialize)]
struct PasswordCheck {
    password: String,
}

/// POST /api/password/strength
///
/// Score a candidate password against the configured rules.
async fn password_strength(
    State(state): State<OnboardingRouteState>,
    Json(check): Json<PasswordCheck>,
) -> ApiResult {
    let strength = validation::password_strength(&check.password, state.registry.validation());
    Ok(Json(strength).into_response())
}

/// GET /api/profiles/{code}
///
/// The public view of a completed profile, or 404 while onboarding is open.
async fn get_public_profile(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let code = UserCode::parse(code)?;
    match state.registry.database().get_public_profile(&code).await? {
        Some(profile) => Ok(Json(profile.to_public_json()).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Profile not found"})),
        )
            .into_response()),
    }
}

/// GET /api/admin/profiles
async fn list_profiles(State(state): State<OnboardingRouteState>) -> ApiResult {
    let profiles = state
        .registry
        .database()
        .list_profiles(state.admin_list_limit)
        .await?;
    Ok(Json(profiles).into_response())
}

/// POST /api/admin/profiles
///
/// Provision an empty draft under a fresh code.
async fn create_profile(State(state): State<OnboardingRouteState>) -> ApiResult {
    let db = state.registry.database();
    for _ in 0..PROVISION_ATTEMPTS {
        let code = UserCode::generate();
        match db.insert_draft(&code).await {
            Ok(()) => {
                info!(user_code = %code, "Provisioned profile");
                return Ok((
                    StatusCode::CREATED,
                    Json(serde_json::json!({"user_code": code})),
                )
                    .into_response());
            }
            Err(DatabaseError::Constraint(_)) => {
                warn!(user_code = %code, "User code collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(DatabaseError::Constraint("could not find an unused user code".into()).into())
}

/// POST /api/admin/profiles/{code}/reset
async fn reset_profile(
    State(state): State<OnboardingRouteState>,
    Path(code): Path<String>,
) -> ApiResult {
    let code = UserCode::parse(code)?;
    if !state.registry.database().reset_onboarding(&code).await? {
        return Err(OnboardingError::NotFound {
            user_code: code.to_string(),
        }
        .into());
    }
    state.registry.evict(&code).await;
    info!(user_code = %code, "Onboarding reset");
    Ok(Json(serde_json::json!({"user_code": code, "reset": true})).into_response())
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/categories", get(list_categories))
        .route("/api/onboarding/{code}", get(get_onboarding))
        .route("/api/onboarding/{code}/fields", patch(patch_fields))
        .route("/api/onboarding/{code}/links/{index}", put(put_link))
        .route("/api/onboarding/{code}/advance", post(advance))
        .route("/api/onboarding/{code}/retreat", post(retreat))
        .route("/api/onboarding/{code}/skip-welcome", post(skip_welcome))
        .route("/api/password/strength", post(password_strength))
        .route("/api/profiles/{code}", get(get_public_profile))
        .route("/api/admin/profiles", get(list_profiles).post(create_profile))
        .route("/api/admin/profiles/{code}/reset", post(reset_profile))
        .with_state(state)
}
