//! HTTP API client module.
//!
//! This module provides the `ApiClient` request wrapper used by every
//! authentication operation. Requests target named endpoints relative to a
//! base URL and speak JSON in both directions.
//!
//! Authorized requests carry an `Authorization: Bearer <token>` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, FetchOptions};
pub use reqwest::Method;
pub use error::ApiError;
