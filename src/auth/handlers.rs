use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        cookies::{self, REFRESH_COOKIE},
        dto::{
            DeleteAccountRequest, LoginRequest, LoginResponse, MeResponse, MessageResponse,
            PublicUser, RefreshResponse, RegisterRequest, RegisterResponse, ResetPasswordBody,
            ResetRequestBody, UpdateProfileRequest, UpdateProfileResponse,
        },
        extractors::AuthUser,
        password::{hash_password, verify_password},
        reset::generate_reset_token,
        tokens::JwtKeys,
        validate,
    },
    error::AuthError,
    notify::{publish_best_effort, CrmEvent},
    state::AppState,
    store::{NewUser, User, UserPatch},
};

const RESET_TOKEN_TTL: Duration = Duration::hours(1);
const ACCESS_COOKIE_TTL: Duration = Duration::days(1);
const REMEMBER_ME_COOKIE_TTL: Duration = Duration::days(30);
const REFRESH_COOKIE_TTL: Duration = Duration::days(30);

/// Identical response whether or not the email exists, to resist enumeration.
const RESET_REQUEST_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh))
        .route("/reset-password-request", post(request_password_reset))
        .route("/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me).delete(delete_me))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shared token-issuance contract for local and federated login: both cookies
/// set, the access token value returned for the response body.
pub(super) fn issue_session_cookies(
    keys: &JwtKeys,
    user: &User,
    remember_me: bool,
    secure: bool,
) -> anyhow::Result<(HeaderMap, String)> {
    let access_token = keys.sign_access(user)?;
    let refresh_token = keys.sign_refresh(user)?;

    // The cookie lifetime tracks the rememberMe flag; the token's own exp
    // claim is configured independently.
    let access_ttl = if remember_me {
        REMEMBER_ME_COOKIE_TTL
    } else {
        ACCESS_COOKIE_TTL
    };

    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        cookies::access_cookie(&access_token, access_ttl, secure).context("build access cookie")?,
    );
    headers.append(
        SET_COOKIE,
        cookies::refresh_cookie(&refresh_token, REFRESH_COOKIE_TTL, secure)
            .context("build refresh cookie")?,
    );
    Ok((headers, access_token))
}

fn clear_session_cookies(secure: bool) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        cookies::clear_access_cookie(secure).context("build access cookie")?,
    );
    headers.append(
        SET_COOKIE,
        cookies::clear_refresh_cookie(secure).context("build refresh cookie")?,
    );
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    payload.email = normalize_email(&payload.email);

    let errors = validate::validate_register(&payload);
    if !errors.is_empty() {
        warn!(email = %payload.email, "registration validation failed");
        return Err(AuthError::Validation(errors));
    }

    // Read-then-write existence check; the unique index remains authoritative
    // and surfaces as Conflict through the store if two registrations race.
    if state.store.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AuthError::Conflict);
    }

    let hash = hash_password(&payload.password)?;

    let user = state
        .store
        .create(NewUser {
            email: payload.email,
            password_hash: hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
            // Verification-by-email is bypassed; accounts start verified.
            is_email_verified: true,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    // Registration has committed; event delivery is best-effort.
    publish_best_effort(
        state.notifier.as_ref(),
        CrmEvent::new_registration(&user.email),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), AuthError> {
    payload.email = normalize_email(&payload.email);

    let errors = validate::validate_login(&payload);
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    // Unknown email, wrong password and passwordless (federated-only) accounts
    // all get the same response.
    let user = match state.store.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    if user.password_hash.is_empty() || !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    // Dead in the primary flow since registration force-verifies, but guards
    // accounts created by other means.
    if !user.is_email_verified {
        warn!(user_id = %user.id, "login with unverified email");
        return Err(AuthError::EmailNotVerified);
    }

    let keys = JwtKeys::from_ref(&state);
    let (headers, token) = issue_session_cookies(
        &keys,
        &user,
        payload.remember_me.unwrap_or(false),
        state.config.production,
    )?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            message: "Login successful".into(),
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetRequestBody>,
) -> Result<Json<MessageResponse>, AuthError> {
    payload.email = normalize_email(&payload.email);

    let errors = validate::validate_reset_request(&payload);
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    if let Some(user) = state.store.find_by_email(&payload.email).await? {
        // A fresh token always replaces any prior pending one.
        let token = generate_reset_token();
        let expiry = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
        state.store.set_reset_token(user.id, &token, expiry).await?;

        info!(user_id = %user.id, "reset token issued");
        publish_best_effort(
            state.notifier.as_ref(),
            CrmEvent::reset_password_request(&user.email, &token),
        )
        .await;
    }

    Ok(Json(MessageResponse::new(RESET_REQUEST_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordBody>,
) -> Result<Json<MessageResponse>, AuthError> {
    let errors = validate::validate_reset_password(&payload);
    if !errors.is_empty() {
        warn!("password reset validation failed");
        return Err(AuthError::Validation(errors));
    }

    let user = match state.store.find_by_reset_token(&payload.token).await? {
        Some(user) => user,
        None => {
            warn!("invalid or expired reset token attempt");
            return Err(AuthError::BadRequest("Invalid or expired reset token".into()));
        }
    };

    if !user.reset_token_valid(OffsetDateTime::now_utc()) {
        // Stale token; drop it so the exact-match lookup can't keep hitting it.
        if let Err(e) = state.store.clear_reset_token(user.id).await {
            error!(error = %e, user_id = %user.id, "failed to clear expired reset token");
        }
        warn!(user_id = %user.id, "reset token has expired");
        return Err(AuthError::BadRequest("Reset token has expired".into()));
    }

    let hash = hash_password(&payload.password)?;
    // Single update: new hash in, token pair out. Replays fail the lookup.
    state.store.reset_password(user.id, &hash).await?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(MessageResponse::new("Password reset successful")))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<MessageResponse>), AuthError> {
    let headers = clear_session_cookies(state.config.production)?;
    Ok((headers, Json(MessageResponse::new("Logout successful"))))
}

#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<RefreshResponse>), AuthError> {
    // The refresh token travels only in its dedicated cookie.
    let refresh_token = cookies::cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| AuthError::Unauthorized("Refresh token not provided".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&refresh_token).map_err(|_| {
        warn!("invalid or expired refresh token");
        AuthError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::NotFound)?;

    // Only a new access token; the refresh token is never rotated here.
    let token = keys.sign_access(&user)?;
    let mut response_headers = HeaderMap::new();
    response_headers.append(
        SET_COOKIE,
        cookies::access_cookie(&token, ACCESS_COOKIE_TTL, state.config.production)
            .context("build access cookie")?,
    );

    info!(user_id = %user.id, "access token refreshed");
    Ok((
        response_headers,
        Json(RefreshResponse {
            message: "Token refreshed successfully".into(),
            token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MeResponse>, AuthError> {
    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(Json(MeResponse { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, AuthError> {
    let errors = validate::validate_update_profile(&payload);
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    let mut patch = UserPatch {
        first_name: payload.first_name,
        last_name: payload.last_name,
        ..UserPatch::default()
    };

    // A password change demands re-proof of the current password.
    if let (Some(current), Some(new)) = (&payload.current_password, &payload.new_password) {
        let user = state
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)?;
        if user.password_hash.is_empty() || !verify_password(current, &user.password_hash)? {
            warn!(user_id = %user.id, "profile update with wrong current password");
            return Err(AuthError::Unauthorized("Current password is incorrect".into()));
        }
        patch.password_hash = Some(hash_password(new)?);
    }

    let updated = state.store.update(claims.sub, patch).await?;
    info!(user_id = %updated.id, "profile updated");
    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully".into(),
        user: updated.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<(HeaderMap, Json<MessageResponse>), AuthError> {
    let errors = validate::validate_delete_account(&payload);
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::NotFound)?;

    // Destructive operation; the password must be proven again.
    if user.password_hash.is_empty() || !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "account deletion with wrong password");
        return Err(AuthError::Unauthorized("Invalid password".into()));
    }

    state.store.delete(user.id).await?;
    let headers = clear_session_cookies(state.config.production)?;

    info!(user_id = %user.id, "account deleted");
    Ok((headers, Json(MessageResponse::new("Account deleted successfully"))))
}
