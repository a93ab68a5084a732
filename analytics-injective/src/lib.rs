//! Injective integration for the Injective Market Analytics service
//!
//! This crate provides a REST client for the Injective chain LCD and the
//! exchange indexer. Both are public and need no authentication.
//!
//! Endpoints default to the configured network and can be overridden with
//! `LCD_ENDPOINT` and `INDEXER_ENDPOINT`.

pub mod client;
pub mod error;
pub mod types;

pub use client::InjectiveClient;
pub use error::InjectiveError;
pub use types::Scaling;
