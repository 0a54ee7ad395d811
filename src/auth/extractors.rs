use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{auth::jwt::JwtKeys, error::AppError, state::AppState, users::domain::User};

/// Authenticated session: the resolved user plus the exact token presented,
/// kept so logout can remove that token and no other.
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthenticated)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthenticated
        })?;

        // signature validity is not enough: the token must still be on the
        // user's active list, so logout and deletion revoke it for good
        let user = state
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.tokens.iter().any(|t| t == token) {
            warn!(user_id = %user.id, "token not in active session list");
            return Err(AppError::Unauthenticated);
        }

        Ok(AuthSession {
            user,
            token: token.to_string(),
        })
    }
}
