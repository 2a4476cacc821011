//! Sign-in, sign-up, sign-out and token refresh.
//!
//! `AuthClient` owns the session store and the HTTP wrapper. Operations that
//! change the session take `&mut self`; each checks its precondition before
//! touching the network and leaves the session untouched on failure.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, FetchOptions};

use super::session::{SessionState, SessionStore, TokenPayload};
use super::storage::TokenStorage;
use super::AuthError;

const SIGNIN_ENDPOINT: &str = "users/signin";
const SIGNUP_ENDPOINT: &str = "users/signup";
const SIGNOUT_ENDPOINT: &str = "users/signout";
const REFRESH_ENDPOINT: &str = "users/refresh";

/// Response field holding tokens and meta
const DATA_KEY: &str = "data";

/// Response field holding an application error
const ERROR_KEY: &str = "error";

pub type AuthResult<T> = Result<T, AuthError>;

pub struct AuthClient {
    api: ApiClient,
    session: SessionStore,
}

impl AuthClient {
    /// Create a client, restoring the refresh token from `storage`
    pub fn new(api: ApiClient, storage: Box<dyn TokenStorage>) -> Self {
        Self {
            api,
            session: SessionStore::load(storage),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionState {
        self.session.state()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.session.refresh_token().is_some()
    }

    /// Send a request, attaching the current access token when signed in
    pub async fn fetch(&self, options: FetchOptions) -> AuthResult<Value> {
        Ok(self.api.fetch(options, self.session.bearer()).await?)
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, options: FetchOptions) -> AuthResult<T> {
        Ok(self.api.fetch_as(options, self.session.bearer()).await?)
    }

    /// Post to an auth endpoint and feed the `data` object into the session.
    /// A response without a `data` object is rejected before the session is
    /// touched.
    async fn exchange(&mut self, endpoint: &str, body: Value, authorize: bool) -> AuthResult<()> {
        let options = FetchOptions::post(endpoint)
            .body(body)
            .data_key(DATA_KEY)
            .error_key(ERROR_KEY)
            .authorize(authorize);

        let data = self.api.fetch(options, self.session.bearer()).await?;
        if !data.is_object() {
            return Err(ApiError::InvalidResponse(format!(
                "Expected a `{}` object in response from {}",
                DATA_KEY, endpoint
            ))
            .into());
        }

        let payload = TokenPayload::from_response(data)
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed token payload: {}", e)))?;

        self.session.set_tokens(payload);
        Ok(())
    }

    /// Sign in with email and password. Returns whether the session is now
    /// signed in.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> AuthResult<bool> {
        if self.session.is_signed_in() {
            return Err(AuthError::AlreadySignedIn);
        }

        self.exchange(SIGNIN_ENDPOINT, json!({ "email": email, "password": password }), false)
            .await?;

        info!(signed_in = self.session.is_signed_in(), "Signed in");
        Ok(self.session.is_signed_in())
    }

    /// Create an account and sign in with it
    pub async fn sign_up(&mut self, email: &str, password: &str) -> AuthResult<bool> {
        if self.session.is_signed_in() {
            return Err(AuthError::AlreadySignedIn);
        }

        self.exchange(
            SIGNUP_ENDPOINT,
            json!({ "user": { "email": email, "password": password } }),
            false,
        )
        .await?;

        info!(signed_in = self.session.is_signed_in(), "Signed up");
        Ok(self.session.is_signed_in())
    }

    /// Revoke the refresh token server-side and clear the session.
    /// Returns the server's `success` flag.
    pub async fn sign_out(&mut self) -> AuthResult<bool> {
        if !self.session.is_signed_in() {
            return Err(AuthError::NotSignedIn);
        }

        let options = FetchOptions::post(SIGNOUT_ENDPOINT)
            .body(json!({ "refresh_token": self.session.state().refresh_token }))
            .error_key(ERROR_KEY);

        let response = self.fetch(options).await?;
        self.session.clear();

        info!("Signed out");
        Ok(response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh_access_token(&mut self) -> AuthResult<String> {
        let refresh_token = match self.session.refresh_token() {
            Some(token) => token.to_string(),
            None => return Err(AuthError::NotLoggedIn),
        };

        debug!("Refreshing access token");
        self.exchange(REFRESH_ENDPOINT, json!({ "refresh_token": refresh_token }), true)
            .await?;

        Ok(self.session.state().access_token.clone())
    }
}
