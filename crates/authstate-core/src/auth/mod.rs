//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionStore`: Access/refresh token state with a single setter
//! - `AuthClient`: Sign-in, sign-up, sign-out and refresh over the API
//! - `TokenStorage`: Persistence for the refresh token (file, keychain, memory)
//!
//! Only the refresh token is persisted; the access token lives in memory.

pub mod client;
pub mod error;
pub mod session;
pub mod storage;

pub use client::{AuthClient, AuthResult};
pub use error::AuthError;
pub use session::{SessionState, SessionStore, TokenPayload, REFRESH_TOKEN_KEY};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};
