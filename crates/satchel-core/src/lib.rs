//! # satchel-core
//!
//! Shared building blocks for the satchel workspace:
//! - [`BagIdentifier`], the natural key of every package
//! - the [`Error`] taxonomy used across crates
//! - configuration types loaded from `satchel.yaml`
//! - the retry engine wrapped around every network call

pub mod config;
pub mod error;
pub mod identifier;
pub mod retry;

pub use config::{RetryPolicy, RetryStrategy, SatchelConfig, TransportConfig};
pub use error::{Error, ErrorKind, Result};
pub use identifier::BagIdentifier;
