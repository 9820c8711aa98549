//! Status log for satchel
//!
//! Every step of a delivery appends a [`StatusEvent`] keyed by the bag
//! identifier. Events are never updated; the current state of a bag is its
//! most recent event.
//!
//! Two stores implement [`StatusLog`]:
//!
//! - [`JsonlStatusLog`] keeps one append-only JSONL shard per identifier
//! - [`MemoryStatusLog`] keeps events in process, for tests and dry runs

pub mod events;
pub mod ledger;
pub mod memory;
pub mod store;

pub use events::{BagStatus, StatusEvent};
pub use ledger::JsonlStatusLog;
pub use memory::MemoryStatusLog;
pub use store::{latest, latest_per_identifier, StatusLog};
