pub mod auth;
pub mod webhook_auth;
