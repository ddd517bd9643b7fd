//! OzScan Remote Client
//!
//! Everything that talks to the Opportunity Zone lookup service: the HTTP
//! client ([`OzClient`]), bearer-token lifecycle ([`TokenManager`]),
//! in-flight de-duplication ([`Inflight`]), and the [`LookupBackend`] seam
//! the pipeline consumes.
//!
//! The error taxonomy keeps rate limiting structurally separate from
//! service failure: a 429 pauses the queue upstream, while network errors
//! and 5xx responses feed the circuit breaker.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod api;
mod backend;
mod dedupe;
mod error;
mod token;

pub use api::{IssuedKey, OzClient, VERSION_HEADER};
pub use backend::{LookupBackend, RemoteBackend};
pub use dedupe::Inflight;
pub use error::{LookupError, Result};
pub use token::TokenManager;
