//! Google OAuth sign-in. The browser is redirected to Google's consent
//! screen, Google calls back with an authorization code, and the callback
//! exchanges it for a profile and establishes the same cookie session as a
//! password login. Failures in the callback redirect to the frontend error
//! page instead of returning JSON, since the caller is a browser mid-flow.

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{handlers::issue_session_cookies, tokens::JwtKeys},
    config::GoogleConfig,
    error::AuthError,
    notify::{publish_best_effort, CrmEvent},
    state::AppState,
    store::{NewUser, User, UserPatch, UserStore},
};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

pub fn google_routes() -> Router<AppState> {
    Router::new()
        .route("/google", get(google_start))
        .route("/google/callback", get(google_callback))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// OpenID Connect userinfo claims we consume.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Thin client over Google's token and userinfo endpoints.
pub struct GoogleClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<String> {
        let response: TokenResponse = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.callback_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<GoogleProfile> {
        let profile = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile)
    }
}

pub fn authorize_url(config: &GoogleConfig) -> anyhow::Result<String> {
    let url = reqwest::Url::parse_with_params(
        AUTH_ENDPOINT,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.callback_url.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
        ],
    )?;
    Ok(url.into())
}

/// Links the Google identity to a local account by email. Accounts created
/// here carry an empty password hash, which the password login path treats
/// as invalid credentials. For returning users the profile only backfills
/// names that are still unset, and Google's say-so upgrades verification.
pub async fn upsert_google_user(
    store: &dyn UserStore,
    profile: GoogleProfile,
) -> Result<(User, bool), AuthError> {
    let email = profile.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::BadRequest("Google profile has no email".into()));
    }

    if let Some(existing) = store.find_by_email(&email).await? {
        let patch = UserPatch {
            first_name: existing.first_name.is_none().then_some(profile.given_name).flatten(),
            last_name: existing.last_name.is_none().then_some(profile.family_name).flatten(),
            is_email_verified: (!existing.is_email_verified).then_some(true),
            ..UserPatch::default()
        };
        if patch.is_empty() {
            return Ok((existing, false));
        }
        let updated = store.update(existing.id, patch).await?;
        return Ok((updated, false));
    }

    let user = store
        .create(NewUser {
            email,
            password_hash: String::new(),
            first_name: profile.given_name,
            last_name: profile.family_name,
            is_email_verified: true,
        })
        .await?;
    Ok((user, true))
}

#[instrument(skip(state))]
pub async fn google_start(State(state): State<AppState>) -> Result<Redirect, AuthError> {
    let url = authorize_url(&state.config.google).map_err(AuthError::Internal)?;
    Ok(Redirect::to(&url))
}

#[instrument(skip(state, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let error_page = format!("{}/auth/error", state.config.frontend_url);

    if let Some(reason) = query.error {
        warn!(reason = %reason, "google consent denied");
        return Redirect::to(&error_page).into_response();
    }
    let code = match query.code {
        Some(code) => code,
        None => {
            warn!("google callback without code");
            return Redirect::to(&error_page).into_response();
        }
    };

    let client = GoogleClient::new(state.config.google.clone());
    let profile = match client.exchange_code(&code).await {
        Ok(access_token) => match client.fetch_profile(&access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                error!(error = %e, "google userinfo fetch failed");
                return Redirect::to(&error_page).into_response();
            }
        },
        Err(e) => {
            error!(error = %e, "google code exchange failed");
            return Redirect::to(&error_page).into_response();
        }
    };

    let (user, created) = match upsert_google_user(state.store.as_ref(), profile).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = ?e, "google account upsert failed");
            return Redirect::to(&error_page).into_response();
        }
    };

    if created {
        info!(user_id = %user.id, "user registered via google");
        publish_best_effort(
            state.notifier.as_ref(),
            CrmEvent::new_registration(&user.email),
        )
        .await;
    }

    let keys = JwtKeys::from_ref(&state);
    match issue_session_cookies(&keys, &user, false, state.config.production) {
        Ok((headers, _)) => {
            info!(user_id = %user.id, "google login established");
            let success = format!("{}/auth/success", state.config.frontend_url);
            (headers, Redirect::to(&success)).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to issue session cookies");
            Redirect::to(&error_page).into_response()
        }
    }
}
