use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use time::Duration;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";
/// The refresh cookie is only ever sent back to the refresh endpoint.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth/refresh-token";

fn build(
    name: &str,
    value: &str,
    path: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.whole_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn access_cookie(
    token: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build(ACCESS_COOKIE, token, "/", max_age, secure)
}

pub fn refresh_cookie(
    token: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build(REFRESH_COOKIE, token, REFRESH_COOKIE_PATH, max_age, secure)
}

pub fn clear_access_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build(ACCESS_COOKIE, "", "/", Duration::ZERO, secure)
}

pub fn clear_refresh_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build(REFRESH_COOKIE, "", REFRESH_COOKIE_PATH, Duration::ZERO, secure)
}

/// Reads one cookie value out of an inbound `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}
