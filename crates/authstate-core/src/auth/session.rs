use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::storage::TokenStorage;

/// Storage key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Snapshot of the client's authentication state.
///
/// `is_signed_in` is true exactly when `access_token` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub access_token: String,
    pub refresh_token: String,
    pub is_signed_in: bool,
    /// Remaining fields of the last auth response
    pub meta: Map<String, Value>,
}

/// Response-shaped input to the session setter: `{token, refresh_token, ...meta}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl TokenPayload {
    /// Parse the `data` object of an auth response
    pub fn from_response(data: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(data)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

pub struct SessionStore {
    state: SessionState,
    storage: Box<dyn TokenStorage>,
}

impl SessionStore {
    /// Initialize from persisted storage. Only the refresh token survives
    /// restarts, so a loaded session always starts signed out.
    pub fn load(storage: Box<dyn TokenStorage>) -> Self {
        let refresh_token = match storage.get(REFRESH_TOKEN_KEY) {
            Ok(token) => non_empty(token).unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored refresh token");
                String::new()
            }
        };
        debug!(has_refresh_token = !refresh_token.is_empty(), "Session loaded");

        Self {
            state: SessionState {
                refresh_token,
                ..SessionState::default()
            },
            storage,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.is_signed_in
    }

    /// Get the bearer token if signed in
    pub fn bearer(&self) -> Option<&str> {
        if self.state.is_signed_in {
            Some(self.state.access_token.as_str())
        } else {
            None
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        if self.state.refresh_token.is_empty() {
            None
        } else {
            Some(self.state.refresh_token.as_str())
        }
    }

    /// Replace the session from an auth response.
    ///
    /// The refresh token is written to storage, or removed from it when the
    /// payload has none. A storage failure is logged and the in-memory state
    /// is still updated.
    pub(crate) fn set_tokens(&mut self, payload: TokenPayload) {
        let TokenPayload {
            token,
            refresh_token,
            meta,
        } = payload;

        let access_token = non_empty(token);
        let refresh_token = non_empty(refresh_token);

        let persisted = match refresh_token {
            Some(ref value) => self.storage.set(REFRESH_TOKEN_KEY, value),
            None => self.storage.remove(REFRESH_TOKEN_KEY),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist refresh token");
        }

        self.state = SessionState {
            is_signed_in: access_token.is_some(),
            access_token: access_token.unwrap_or_default(),
            refresh_token: refresh_token.unwrap_or_default(),
            meta,
        };
        debug!(signed_in = self.state.is_signed_in, "Session updated");
    }

    /// Drop all token state, in memory and in storage
    pub(crate) fn clear(&mut self) {
        self.set_tokens(TokenPayload::default());
    }
}
