use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod handlers;
pub mod jwt;
pub(crate) mod extractors;
pub mod password;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
