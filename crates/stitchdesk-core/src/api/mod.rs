//! REST API client module for the dashboard backend.
//!
//! This module provides the `ApiClient`, the API layer of the session core:
//! it attaches the stored bearer token to requests, refuses to send a token
//! that is already past its expiry buffer, refreshes once on a 401, and
//! raises the `TokenExpiredSignal` when the session cannot be recovered.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
