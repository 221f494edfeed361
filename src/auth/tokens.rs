use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::User;

/// Claims embedded in both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing material for the two token domains. Access and refresh tokens use
/// independent secrets, so neither can be verified (or minted) with the
/// other's key, and either secret can be rotated on its own.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self::new(
            &jwt.access_secret,
            &jwt.refresh_secret,
            Duration::days(jwt.access_ttl_days),
            Duration::days(jwt.refresh_ttl_days),
        )
    }
}

impl JwtKeys {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign(&self, user: &User, key: &EncodingKey, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    fn verify(&self, token: &str, key: &DecodingKey) -> anyhow::Result<Claims> {
        let validation = Validation::default();
        let data = decode::<Claims>(token, key, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign(user, &self.access_encoding, self.access_ttl)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign(user, &self.refresh_encoding, self.refresh_ttl)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify(token, &self.refresh_decoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    fn make_user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            is_email_verified: true,
            reset_token: None,
            reset_token_expiry: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user = make_user("a@x.com");
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let user = make_user("a@x.com");
        let token = keys.sign_refresh(&user).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user.id);
    }

    #[test]
    fn token_domains_are_independent() {
        let keys = make_keys();
        let user = make_user("a@x.com");
        let access = keys.sign_access(&user).expect("sign access");
        let refresh = keys.sign_refresh(&user).expect("sign refresh");
        // An access token cannot stand in for a refresh token or vice versa.
        assert!(keys.verify_refresh(&access).is_err());
        assert!(keys.verify_access(&refresh).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new(
            "access-secret",
            "refresh-secret",
            Duration::seconds(-120),
            Duration::seconds(-120),
        );
        let user = make_user("a@x.com");
        let token = keys.sign_access(&user).expect("sign access");
        assert!(keys.verify_access(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let keys = make_keys();
        assert!(keys.verify_access("not.a.jwt").is_err());
    }
}
