use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use super::cookies::{self, ACCESS_COOKIE};
use super::tokens::{Claims, JwtKeys};

/// Authenticated caller identity, decoded from the access token. The token is
/// taken from the `token` cookie first, then from a bearer Authorization
/// header.
pub struct AuthUser(pub Claims);

fn reject(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message })))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let token = cookies::cookie_value(&parts.headers, ACCESS_COOKIE).or_else(|| {
            parts
                .headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| {
                    v.strip_prefix("Bearer ")
                        .or_else(|| v.strip_prefix("bearer "))
                })
                .map(str::to_string)
        });

        let Some(token) = token else {
            return Err(reject("Authentication required"));
        };

        // One generic message whether the signature or the expiry failed.
        match keys.verify_access(&token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(_) => {
                warn!("invalid or expired token");
                Err(reject("Invalid or expired token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::store::User;
    use axum::http::Request;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn make_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            is_email_verified: true,
            reset_token: None,
            reset_token_expiry: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn parts_with_headers(headers: &[(&str, String)]) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[tokio::test]
    async fn extracts_identity_from_cookie() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = make_user();
        let token = keys.sign_access(&user).expect("sign");

        let mut parts = parts_with_headers(&[("cookie", format!("token={token}"))]);
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
    }

    #[tokio::test]
    async fn falls_back_to_bearer_header() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = make_user();
        let token = keys.sign_access(&user).expect("sign");

        let mut parts = parts_with_headers(&[("authorization", format!("Bearer {token}"))]);
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn cookie_takes_precedence_over_header() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let cookie_user = make_user();
        let header_user = make_user();
        let cookie_token = keys.sign_access(&cookie_user).expect("sign");
        let header_token = keys.sign_access(&header_user).expect("sign");

        let mut parts = parts_with_headers(&[
            ("cookie", format!("token={cookie_token}")),
            ("authorization", format!("Bearer {header_token}")),
        ]);
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(claims.sub, cookie_user.id);
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(&[]);
        let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_gets_generic_message() {
        let state = AppState::fake();
        let mut parts = parts_with_headers(&[("cookie", "token=garbage".to_string())]);
        let (status, Json(body)) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(&make_user()).expect("sign");
        let mut parts = parts_with_headers(&[("cookie", format!("token={token}"))]);
        assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
    }
}
