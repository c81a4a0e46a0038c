//! # trellis-server
//!
//! Axum HTTP API for Trellis.
//!
//! - `GET /health`: liveness plus a database ping
//! - `/api/tasks/*`, `/api/users/profile`: bearer-authenticated JSON API
//!
//! Every `/api` response uses the `{status, message, data, errors}` envelope
//! from [`response`]; service errors are mapped to status codes in [`error`].

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod response;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod validation;

pub use auth::{Claims, CurrentUser, JwtAuth};
pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, TrellisServer};
