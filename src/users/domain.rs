use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// Fields a client may change through profile update. Anything else in the
/// payload rejects the whole request.
pub const UPDATABLE_FIELDS: [&str; 4] = ["age", "email", "name", "password"];

/// Canonical user record. The hash, token list, and avatar bytes never leave
/// the server in JSON form.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub age: Option<i32>,
    #[serde(skip_serializing)]
    pub tokens: Vec<String>,
    #[serde(skip_serializing)]
    pub avatar: Option<Vec<u8>>,
    pub created_at: OffsetDateTime,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if !is_valid_email(email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 7 {
        return Err(AppError::Validation(
            "password must be at least 7 characters".into(),
        ));
    }
    if password.to_lowercase().contains("password") {
        return Err(AppError::Validation(
            "password must not contain \"password\"".into(),
        ));
    }
    Ok(())
}

fn validate_age(age: i64) -> Result<i32, AppError> {
    if age < 0 {
        return Err(AppError::Validation("age must be a positive number".into()));
    }
    i32::try_from(age).map_err(|_| AppError::Validation("age out of range".into()))
}

/// Validated input for account creation. Email arrives normalized; the store
/// hashes the password before anything touches disk.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
}

impl NewUser {
    pub fn new(
        name: String,
        email: String,
        password: String,
        age: Option<i64>,
    ) -> Result<Self, AppError> {
        let email = normalize_email(&email);
        validate_name(&name)?;
        validate_email(&email)?;
        validate_password(&password)?;
        let age = age.map(validate_age).transpose()?;
        Ok(Self {
            name,
            email,
            password,
            age,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whitelisted partial update. Built from a raw JSON object so that unknown
/// keys are caught before any store interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub age: Option<i32>,
}

impl UserUpdate {
    pub fn from_json(payload: &serde_json::Value) -> Result<Self, AppError> {
        let map = payload
            .as_object()
            .ok_or_else(|| AppError::Validation("update body must be a JSON object".into()))?;

        if let Some(key) = map.keys().find(|k| !UPDATABLE_FIELDS.contains(&k.as_str())) {
            return Err(AppError::InvalidUpdate(key.clone()));
        }

        let mut update = UserUpdate::default();
        for (key, value) in map {
            match key.as_str() {
                "name" => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| AppError::Validation("name must be a string".into()))?;
                    validate_name(name)?;
                    update.name = Some(name.to_string());
                }
                "email" => {
                    let email = value
                        .as_str()
                        .map(normalize_email)
                        .ok_or_else(|| AppError::Validation("email must be a string".into()))?;
                    validate_email(&email)?;
                    update.email = Some(email);
                }
                "password" => {
                    let password = value
                        .as_str()
                        .ok_or_else(|| AppError::Validation("password must be a string".into()))?;
                    validate_password(password)?;
                    update.password = Some(password.to_string());
                }
                "age" => {
                    let age = value
                        .as_i64()
                        .ok_or_else(|| AppError::Validation("age must be a number".into()))?;
                    update.age = Some(validate_age(age)?);
                }
                _ => unreachable!("whitelist checked above"),
            }
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.age.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_valid_new_user() {
        let draft = NewUser::new(
            "Dave".into(),
            "  Dave@Example.COM ".into(),
            "MyPass888!".into(),
            Some(27),
        )
        .expect("valid draft");
        assert_eq!(draft.email, "dave@example.com");
        assert_eq!(draft.age, Some(27));
    }

    #[test]
    fn rejects_short_password() {
        let err = NewUser::new("a".into(), "a@b.co".into(), "short".into(), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_password_containing_password() {
        let err = NewUser::new("a".into(), "a@b.co".into(), "PassWord123".into(), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_email_and_negative_age() {
        assert!(NewUser::new("a".into(), "not-an-email".into(), "56what!!!".into(), None).is_err());
        assert!(NewUser::new("a".into(), "a@b.co".into(), "56what!!!".into(), Some(-1)).is_err());
    }

    #[test]
    fn update_rejects_unknown_field() {
        let err = UserUpdate::from_json(&json!({ "location": "New York" })).unwrap_err();
        match err {
            AppError::InvalidUpdate(field) => assert_eq!(field, "location"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn update_rejects_mixed_payload_entirely() {
        // one bad key poisons the whole update, even alongside valid ones
        let err = UserUpdate::from_json(&json!({ "name": "Joey", "height": 180 })).unwrap_err();
        assert!(matches!(err, AppError::InvalidUpdate(_)));
    }

    #[test]
    fn update_parses_whitelisted_fields() {
        let update = UserUpdate::from_json(&json!({ "name": "Joey", "age": 30 })).unwrap();
        assert_eq!(update.name.as_deref(), Some("Joey"));
        assert_eq!(update.age, Some(30));
        assert!(update.email.is_none());
    }

    #[test]
    fn update_normalizes_and_validates_email() {
        let update = UserUpdate::from_json(&json!({ "email": " New@Example.COM " })).unwrap();
        assert_eq!(update.email.as_deref(), Some("new@example.com"));
        assert!(UserUpdate::from_json(&json!({ "email": "nope" })).is_err());
    }

    #[test]
    fn empty_object_is_an_empty_update() {
        let update = UserUpdate::from_json(&json!({})).unwrap();
        assert!(update.is_empty());
    }
}
