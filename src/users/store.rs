use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::users::domain::{NewUser, User, UserUpdate};

/// Owner of the canonical user records. All mutation goes through these
/// operations; token-list changes are genuine appends/removals, never a
/// read-modify-write of the whole record, so concurrent logins cannot drop
/// each other's tokens.
///
/// Passwords are hashed inside `create` and `update_fields` so the stored
/// value can never equal the submitted plaintext, whichever caller writes it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, draft: NewUser) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// All-or-nothing whitelisted update. Re-hashes the password if present.
    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError>;
    async fn append_token(&self, id: Uuid, token: &str) -> Result<(), AppError>;
    async fn remove_token(&self, id: Uuid, token: &str) -> Result<(), AppError>;
    async fn clear_tokens(&self, id: Uuid) -> Result<(), AppError>;
    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<(), AppError>;
    /// Removing an absent record is not an error at this layer.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

/// In-memory store used by the fake app state and the test suites. A single
/// mutex around the map makes every operation atomic.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, draft: NewUser) -> Result<User, AppError> {
        let password_hash = hash_password(&draft.password)?;
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == draft.email) {
            return Err(AppError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: draft.name,
            email: draft.email,
            password_hash,
            age: draft.age,
            tokens: Vec::new(),
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        // hash outside the lock; nothing is applied until every field is ready
        let password_hash = update.password.as_deref().map(hash_password).transpose()?;

        let mut users = self.users.lock().unwrap();
        if let Some(email) = &update.email {
            if users.values().any(|u| u.email == *email && u.id != id) {
                return Err(AppError::DuplicateEmail);
            }
        }
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        if let Some(age) = update.age {
            user.age = Some(age);
        }
        Ok(user.clone())
    }

    async fn append_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.tokens.push(token.to_string());
        Ok(())
    }

    async fn remove_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.tokens.retain(|t| t != token);
        Ok(())
    }

    async fn clear_tokens(&self, id: Uuid) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.tokens.clear();
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AppError::NotFound)?;
        user.avatar = avatar;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.users.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn draft(email: &str) -> NewUser {
        NewUser::new("Mike".into(), email.into(), "56what!!!".into(), Some(27)).unwrap()
    }

    #[tokio::test]
    async fn create_hashes_password_and_enforces_unique_email() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();
        assert_ne!(user.password_hash, "56what!!!");
        assert!(user.tokens.is_empty());

        let err = store.create(draft("mike@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn find_by_email_and_id() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert_eq!(
            store
                .find_by_email("mike@example.com")
                .await
                .unwrap()
                .unwrap()
                .id,
            user.id
        );
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_rehashes_password_inside_the_store() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();
        let old_hash = user.password_hash.clone();

        let update = UserUpdate {
            password: Some("NewSecret9!".into()),
            ..Default::default()
        };
        let updated = store.update_fields(user.id, update).await.unwrap();
        assert_ne!(updated.password_hash, "NewSecret9!");
        assert_ne!(updated.password_hash, old_hash);
    }

    #[tokio::test]
    async fn update_rejects_email_taken_by_another_user() {
        let store = MemoryUserStore::new();
        store.create(draft("mike@example.com")).await.unwrap();
        let other = store.create(draft("dave@example.com")).await.unwrap();

        let update = UserUpdate {
            email: Some("mike@example.com".into()),
            ..Default::default()
        };
        let err = store.update_fields(other.id, update).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));

        // unchanged on failure
        let reread = store.find_by_id(other.id).await.unwrap().unwrap();
        assert_eq!(reread.email, "dave@example.com");
    }

    #[tokio::test]
    async fn token_list_append_remove_clear() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();

        store.append_token(user.id, "t1").await.unwrap();
        store.append_token(user.id, "t2").await.unwrap();
        store.append_token(user.id, "t3").await.unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.tokens, vec!["t1", "t2", "t3"]);

        store.remove_token(user.id, "t2").await.unwrap();
        let after_remove = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after_remove.tokens, vec!["t1", "t3"]);

        store.clear_tokens(user.id).await.unwrap();
        let after_clear = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(after_clear.tokens.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_both_survive() {
        let store = Arc::new(MemoryUserStore::new());
        let user = store.create(draft("mike@example.com")).await.unwrap();

        let (a, b) = (Arc::clone(&store), Arc::clone(&store));
        let (id_a, id_b) = (user.id, user.id);
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.append_token(id_a, "session-a").await }),
            tokio::spawn(async move { b.append_token(id_b, "session-b").await }),
        );
        ra.unwrap().unwrap();
        rb.unwrap().unwrap();

        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.tokens.len(), 2);
        assert!(user.tokens.contains(&"session-a".to_string()));
        assert!(user.tokens.contains(&"session-b".to_string()));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();
        store.delete(user.id).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        // second delete of the same id is still fine
        store.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn set_avatar_roundtrip() {
        let store = MemoryUserStore::new();
        let user = store.create(draft("mike@example.com")).await.unwrap();
        store.set_avatar(user.id, Some(vec![1, 2, 3])).await.unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.avatar.as_deref(), Some(&[1u8, 2, 3][..]));

        store.set_avatar(user.id, None).await.unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.avatar.is_none());
    }
}
