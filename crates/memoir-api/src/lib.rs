//! # memoir-api
//!
//! REST client for the Memoir backend. `ApiClient` implements
//! `memoir_core::Authenticator` and `memoir_core::CredentialBackend`, adds
//! the bearer token from the shared `TokenStore`, and refreshes an expired
//! token once per burst of 401 responses.

mod auth;
mod client;
mod credentials;
pub mod error;
mod single_flight;
pub mod types;

pub use client::{ApiClient, DEFAULT_TIMEOUT_SECS};
pub use error::{ApiError, ApiResult};
pub use single_flight::SingleFlight;
