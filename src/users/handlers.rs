use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::extractors::AuthSession;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest};
use crate::users::service;

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, token) = service::sign_up(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, token) = service::log_in(&state, payload).await?;
    Ok(Json(AuthResponse { user, token }))
}

#[instrument(skip(state, session))]
pub async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, AppError> {
    service::log_out(&state, session.user.id, &session.token).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, session))]
pub async fn logout_all(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, AppError> {
    service::log_out_all(&state, session.user.id).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(session))]
pub async fn me(session: AuthSession) -> Json<PublicUser> {
    Json(PublicUser::from(&session.user))
}

#[instrument(skip(state, session, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<PublicUser>, AppError> {
    let user = service::update_profile(&state, session.user.id, &payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, session))]
pub async fn delete_me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<PublicUser>, AppError> {
    let user = service::delete_account(&state, &session.user).await?;
    Ok(Json(user))
}

#[instrument(skip(state, session, multipart))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: AuthSession,
    mut multipart: Multipart,
) -> Result<StatusCode, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("malformed multipart payload".into()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let declared_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::Validation("could not read avatar upload".into()))?;
        service::store_avatar(&state, session.user.id, bytes, &declared_type).await?;
        return Ok(StatusCode::OK);
    }
    Err(AppError::Validation("missing \"avatar\" field".into()))
}

#[instrument(skip(state, session))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, AppError> {
    service::delete_avatar(&state, session.user.id).await?;
    Ok(StatusCode::OK)
}

/// Public fetch of a stored avatar by user id, served as PNG.
#[instrument(skip(state))]
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let bytes = service::fetch_avatar(&state, user_id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}
