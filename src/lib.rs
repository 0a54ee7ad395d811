pub mod app;
pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod state;
pub mod users;
