use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validation;

#[cfg(test)]
pub(crate) mod fakes;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
