use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod domain;
pub mod dto;
pub mod handlers;
pub mod pg;
pub mod service;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        .route("/users/login", post(handlers::login))
        .route("/users/logout", post(handlers::logout))
        .route("/users/logoutAll", post(handlers::logout_all))
        .route(
            "/users/me",
            get(handlers::me)
                .patch(handlers::update_me)
                .delete(handlers::delete_me),
        )
        .route(
            "/users/me/avatar",
            post(handlers::upload_avatar).delete(handlers::delete_avatar),
        )
        .route("/users/:id/avatar", get(handlers::get_avatar))
}
