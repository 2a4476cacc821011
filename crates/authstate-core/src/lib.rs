//! authstate-core - client-side session management for a JSON HTTP API.
//!
//! This crate contains the platform-independent logic:
//! - API request wrapper with bearer authorization
//! - Session store with refresh token persistence
//! - Sign-in, sign-up, sign-out and token refresh
//! - Configuration

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, FetchOptions};
pub use auth::{AuthClient, AuthError, AuthResult, SessionState, TokenStorage};
pub use config::{Config, StorageBackend};
