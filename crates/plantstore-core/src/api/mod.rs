//! REST API client module for the plant storefront.
//!
//! This module provides the `ApiClient` for listing and managing plant
//! records. Requests carry the session's bearer token; an expired token
//! is refreshed and the request replayed once.

pub mod client;
pub mod error;
pub mod plants;

pub use client::{ApiClient, RequestDescriptor};
pub use error::ApiError;
pub use reqwest::{Method, StatusCode};
