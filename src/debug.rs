//! Operational endpoints under `/api/debug`. The init endpoint exists for
//! bootstrapping fresh environments and is refused outright in production.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::password::hash_password,
    error::AuthError,
    state::AppState,
    store::NewUser,
};

const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/init", post(init))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, AuthError> {
    state.store.health().await?;
    let users = state.store.count().await?;
    Ok(Json(json!({ "database": "ok", "users": users })))
}

/// Seeds the first account. Only usable outside production, with the admin
/// key, and only while the store is empty.
#[instrument(skip(state, headers, payload))]
pub async fn init(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<InitRequest>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    if state.config.production {
        // Pretend the route does not exist.
        return Err(AuthError::NotFound);
    }

    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let expected = state.config.admin_secret.as_deref().unwrap_or_default();
    if provided.is_empty() || expected.is_empty() || provided != expected {
        warn!("debug init with bad admin key");
        return Err(AuthError::Unauthorized("Invalid admin key".into()));
    }

    if state.store.count().await? > 0 {
        return Err(AuthError::BadRequest("Store is already initialized".into()));
    }
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AuthError::BadRequest("Email and password are required".into()));
    }

    let user = state
        .store
        .create(NewUser {
            email: payload.email.trim().to_lowercase(),
            password_hash: hash_password(&payload.password)?,
            first_name: None,
            last_name: None,
            is_email_verified: true,
        })
        .await?;

    info!(user_id = %user.id, "seed admin created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Admin user created", "id": user.id })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn admin_headers(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_str(key).expect("ascii"));
        headers
    }

    fn init_body() -> Json<InitRequest> {
        Json(InitRequest {
            email: "admin@x.com".into(),
            password: "secret1".into(),
        })
    }

    #[tokio::test]
    async fn status_reports_user_count() {
        let state = AppState::fake();
        let Json(body) = status(State(state)).await.expect("status");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["users"], 0);
    }

    #[tokio::test]
    async fn init_requires_admin_key() {
        let state = AppState::fake();
        let err = init(State(state.clone()), admin_headers("wrong"), init_body())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));

        let err = init(State(state.clone()), HeaderMap::new(), init_body())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn init_seeds_only_an_empty_store() {
        let state = AppState::fake();
        let (status_code, _) = init(
            State(state.clone()),
            admin_headers("test-admin-secret"),
            init_body(),
        )
        .await
        .expect("seed");
        assert_eq!(status_code, StatusCode::CREATED);
        assert_eq!(state.store.count().await.expect("count"), 1);

        let err = init(
            State(state.clone()),
            admin_headers("test-admin-secret"),
            init_body(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::BadRequest(_)));
    }
}
