use std::collections::HashMap;
use std::sync::RwLock;

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{NewUser, StoreError, User, UserPatch, UserStore};

/// In-memory user store backing `AppState::fake()` and the handler tests.
/// Mirrors the Postgres semantics, including the uniqueness constraint.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, User>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.write();
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_email_verified: new_user.is_email_verified,
            reset_token: None,
            reset_token_expiry: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.read().get(&id).cloned())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()
            .values()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<User, StoreError> {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(first_name) = patch.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(is_email_verified) = patch.is_email_verified {
            user.is_email_verified = is_email_verified;
        }
        Ok(user.clone())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.reset_token = Some(token.to_string());
        user.reset_token_expiry = Some(expiry);
        Ok(())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.reset_token = None;
        user.reset_token_expiry = None;
        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expiry = None;
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.write().remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.read().len() as i64)
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
            is_email_verified: true,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.expect("first create");
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn reset_token_fields_set_and_cleared_together() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");
        let expiry = OffsetDateTime::now_utc() + time::Duration::hours(1);

        store
            .set_reset_token(user.id, "tok", expiry)
            .await
            .expect("set token");
        let found = store
            .find_by_reset_token("tok")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.reset_token.as_deref(), Some("tok"));
        assert_eq!(found.reset_token_expiry, Some(expiry));

        store.clear_reset_token(user.id).await.expect("clear");
        let cleared = store.find_by_id(user.id).await.expect("lookup").expect("present");
        assert!(cleared.reset_token.is_none());
        assert!(cleared.reset_token_expiry.is_none());
    }

    #[tokio::test]
    async fn reset_password_clears_token_pair() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");
        let expiry = OffsetDateTime::now_utc() + time::Duration::hours(1);
        store
            .set_reset_token(user.id, "tok", expiry)
            .await
            .expect("set token");

        let updated = store
            .reset_password(user.id, "new-hash")
            .await
            .expect("reset password");
        assert_eq!(updated.password_hash, "new-hash");
        assert!(updated.reset_token.is_none());
        assert!(updated.reset_token_expiry.is_none());
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("a@x.com")).await.expect("create");
        store.delete(user.id).await.expect("delete");
        assert!(store.find_by_id(user.id).await.expect("lookup").is_none());
        assert!(matches!(
            store.delete(user.id).await.unwrap_err(),
            StoreError::NotFound
        ));
    }
}
