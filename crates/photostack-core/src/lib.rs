//! Shared configuration and error types for PhotoStack.
//!
//! This crate holds the pieces every other PhotoStack crate agrees on: the
//! object store connection settings ([`StoreConfig`]) that are built once at
//! startup and handed by reference to the signer and the store client, and
//! the core error type used while loading them.

mod config;
mod error;

pub use config::StoreConfig;
pub use error::{PhotoStackError, PhotoStackResult};
