//! Plantstore core library.
//!
//! Authenticated client for the plant storefront API: session handling,
//! token persistence, transparent refresh-on-401, and typed plant
//! operations.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, CredentialStore, Session, SignedOut};
pub use config::Config;
pub use models::{Plant, PlantDraft};
