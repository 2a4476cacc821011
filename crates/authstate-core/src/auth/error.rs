use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("already logged in")]
    AlreadySignedIn,

    #[error("not signed in")]
    NotSignedIn,

    /// No refresh token is stored
    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Api(#[from] ApiError),
}
