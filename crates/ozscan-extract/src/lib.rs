//! OzScan Address Extraction
//!
//! Multi-strategy street address extraction from listing pages. Site-aware
//! selector fan-out runs first when the registry knows the host; the
//! layered page-level strategies (listing URL, JSON-LD, meta tags,
//! visible-text regex) cover unknown sites and selector drift.
//!
//! Every candidate passes the same structural validation before it leaves
//! this crate, and duplicates collapse on their normalized form, so
//! downstream consumers only ever see plausible, distinct addresses in
//! document order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod address;
mod fanout;
mod strategies;

pub use address::{normalize_address, validate_address};
pub use fanout::extract_with_registry;
pub use strategies::{
    extract, extract_best, extract_from_json_ld, extract_from_meta_tags, extract_from_url,
    extract_from_visible_text, extract_with_ceiling, scan_visible_text,
    DEFAULT_TEXT_NODE_CEILING,
};
