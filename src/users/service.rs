use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::verify_password;
use crate::avatar;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::domain::{NewUser, User, UserUpdate};
use crate::users::dto::{LoginRequest, PublicUser, SignupRequest};

/// Create the account, then issue and append the first session token.
pub async fn sign_up(
    state: &AppState,
    payload: SignupRequest,
) -> Result<(PublicUser, String), AppError> {
    let draft = NewUser::new(payload.name, payload.email, payload.password, payload.age)?;
    let user = state.store.create(draft).await?;

    let token = issue_session(state, user.id).await?;
    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((PublicUser::from(&user), token))
}

/// Uniform failure whether the email is unknown or the password is wrong.
/// Every successful login appends a new token; prior sessions stay valid.
pub async fn log_in(
    state: &AppState,
    payload: LoginRequest,
) -> Result<(PublicUser, String), AppError> {
    let email = crate::users::domain::normalize_email(&payload.email);
    let user = match state.store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            warn!(email = %email, "login with unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash).map_err(AppError::Internal)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_session(state, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((PublicUser::from(&user), token))
}

async fn issue_session(state: &AppState, user_id: Uuid) -> Result<String, AppError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user_id).map_err(AppError::Internal)?;
    state.store.append_token(user_id, &token).await?;
    Ok(token)
}

/// Whole-payload whitelist check happens in `UserUpdate::from_json` before
/// the store is touched; the store applies it all-or-nothing.
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    payload: &serde_json::Value,
) -> Result<PublicUser, AppError> {
    let update = UserUpdate::from_json(payload)?;
    if update.is_empty() {
        // nothing to write; still answer with the current view
        let user = state
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        return Ok(PublicUser::from(&user));
    }
    let user = state.store.update_fields(user_id, update).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(PublicUser::from(&user))
}

/// Removes exactly the presented token; other sessions survive.
pub async fn log_out(state: &AppState, user_id: Uuid, token: &str) -> Result<(), AppError> {
    state.store.remove_token(user_id, token).await?;
    info!(user_id = %user_id, "session logged out");
    Ok(())
}

pub async fn log_out_all(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    state.store.clear_tokens(user_id).await?;
    info!(user_id = %user_id, "all sessions logged out");
    Ok(())
}

/// Deletes the record; every token vanishes with it.
pub async fn delete_account(state: &AppState, user: &User) -> Result<PublicUser, AppError> {
    state.store.delete(user.id).await?;
    info!(user_id = %user.id, "account deleted");
    Ok(PublicUser::from(user))
}

pub async fn store_avatar(
    state: &AppState,
    user_id: Uuid,
    raw: bytes::Bytes,
    declared_type: &str,
) -> Result<(), AppError> {
    let normalized = avatar::normalize(&raw, declared_type)?;
    state.store.set_avatar(user_id, Some(normalized)).await?;
    info!(user_id = %user_id, "avatar stored");
    Ok(())
}

pub async fn delete_avatar(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    state.store.set_avatar(user_id, None).await?;
    Ok(())
}

pub async fn fetch_avatar(state: &AppState, user_id: Uuid) -> Result<Vec<u8>, AppError> {
    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    user.avatar.ok_or(AppError::NotFound)
}
