use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::domain::User;

/// Request body for account creation.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i64>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client. The hash, token list and
/// avatar bytes never appear here.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            age: user.age,
        }
    }
}

/// Response for signup and login: the public view plus the one token issued
/// for this session. Other active tokens are never exposed.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn public_user_hides_sensitive_fields() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Dave".into(),
            email: "dave@example.com".into(),
            password_hash: "argon2-hash".into(),
            age: Some(27),
            tokens: vec!["secret-token".into()],
            avatar: Some(vec![0xde, 0xad]),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(json.contains("dave@example.com"));
        assert!(!json.contains("argon2-hash"));
        assert!(!json.contains("secret-token"));
    }

    #[test]
    fn absent_age_is_omitted() {
        let public = PublicUser {
            id: Uuid::new_v4(),
            name: "Dave".into(),
            email: "dave@example.com".into(),
            age: None,
        };
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("age"));
    }
}
