//! Error handling foundation for lingochat.
//!
//! Library crates return their own plain error enums so callers can match on
//! the failure kind. Boundary code (process startup, request handling) wraps
//! them in a rootcause [`Report`] through this alias.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
