use crate::state::AppState;
use axum::Router;

mod dto;
pub mod geo;
pub mod handlers;
pub mod lifecycle;

pub fn router() -> Router<AppState> {
    handlers::ride_routes()
}
