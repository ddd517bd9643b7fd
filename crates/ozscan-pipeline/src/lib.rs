//! OzScan Lookup Orchestration
//!
//! Ties the extraction, cache, breaker, and client crates together into
//! the two user-facing flows:
//!
//! - **Passive**: a debounced page scan extracts candidate addresses,
//!   queues them with per-page quota and seen-set deduplication, and
//!   drains the queue through cache → breaker → auth → remote lookup.
//! - **Explicit**: a user-initiated detection chain produces one address
//!   for confirmation, with server-side re-normalization on edit, then
//!   the same per-address lookup path.
//!
//! The orchestrator runs as a single task behind a typed message channel;
//! [`PipelineHandle`] is the caller-facing surface, with every reply
//! raced against a timeout whose default answer is "absent".

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod debounce;
mod messages;
mod orchestrator;
mod queue;

pub use debounce::DebouncedTrigger;
pub use messages::{
    AddressResult, DetectOutcome, EditOutcome, ExplicitOutcome, Message, PipelineHandle,
    ScanReport,
};
pub use orchestrator::Orchestrator;
pub use queue::{Dequeue, LookupQueue, QueueState, QueuedLookup};
