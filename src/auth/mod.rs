pub mod cookies;
pub mod dto;
pub mod extractors;
pub mod google;
pub mod handlers;
pub mod password;
pub mod reset;
pub mod tokens;
pub mod validate;

use axum::Router;

use crate::state::AppState;

/// Everything mounted under `/api/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
        .merge(google::google_routes())
}
