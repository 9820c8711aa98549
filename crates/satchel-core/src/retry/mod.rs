//! Bounded retry for network calls
//!
//! Transports and the ingest API client run every remote call through a
//! [`RetryExecutor`] built from the configured [`RetryPolicy`](crate::config::RetryPolicy).
//! Only transient failures are retried; exhausted attempts surface as a
//! [`RetryError`] which callers fold back into the domain [`Error`](crate::Error).
//!
//! ```rust,no_run
//! use satchel_core::config::RetryPolicy;
//! use satchel_core::retry::{RetryExecutor, TracingObserver, TransientOnly};
//!
//! async fn example() -> satchel_core::Result<()> {
//!     let executor = RetryExecutor::new(RetryPolicy::default())
//!         .with_predicate(TransientOnly)
//!         .with_observer(TracingObserver::new("upload"));
//!
//!     executor
//!         .execute(|| async { Ok::<_, satchel_core::Error>(()) })
//!         .await
//!         .map_err(|e| e.into_error("upload"))
//! }
//! ```

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::RetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, RetryPredicate, TransientOnly};
