use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AccountError,
    state::AppState,
    users::{
        dto::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, Profile, RegisterRequest,
            ResetPasswordRequest,
        },
        repo_types::UserSummary,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/forgot_password", post(forgot_password))
        .route("/users/reset_password/:token", post(reset_password))
        .route("/users/creation_confirmation/:token", get(confirm_registration))
        .route("/users/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AccountError> {
    let Json(payload) = payload?;
    state.accounts.login(payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserSummary>, AccountError> {
    let Json(payload) = payload?;
    state.accounts.register(payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<String>, AccountError> {
    let Json(payload) = payload?;
    state.accounts.forgot_password(payload).await.map(Json)
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<&'static str>, AccountError> {
    // the path token is checked before the body
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(rejection) => {
            state.accounts.find_by_reset_token(&token).await?;
            return Err(rejection.into());
        }
    };
    state.accounts.reset_password(&token, payload).await.map(Json)
}

#[instrument(skip(state, token))]
pub async fn confirm_registration(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<&'static str>, AccountError> {
    state.accounts.confirm_registration(&token).await.map(Json)
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Profile>, AccountError> {
    state.accounts.profile(user_id).await.map(Json)
}
