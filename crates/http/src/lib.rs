//! AMS HTTP module providing the authenticated dashboard client
//!
//! All requests go through a single [`client::gateway::AuthGateway`] that
//! attaches the stored bearer token and transparently refreshes it when the
//! backend denies authorization.

#[macro_use]
extern crate tracing;

pub mod client;

pub use client::credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, StoreError,
};
pub use client::error::ClientError;
pub use client::{AmsClient, AmsClientBuilder};
