//! Authentication module for managing the user session and its token.
//!
//! This module provides:
//! - `Session`: login, registration, logout and token refresh
//! - `CredentialStore`: persistence for the single access token, with
//!   keychain, file, in-memory and no-op backends
//!
//! The token is opaque to the client; expiry is only discovered when the
//! server answers 401.

pub mod credentials;
pub mod session;
pub mod token_file;

pub use credentials::{
    CredentialStore, KeyringCredentialStore, MemoryCredentialStore, NoopCredentialStore, TOKEN_SLOT,
};
pub use session::{AuthState, Session, SignedOut, SIGN_IN_ROUTE};
pub use token_file::FileCredentialStore;
