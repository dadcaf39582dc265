//! Matching rules
//!
//! The crossing predicate (consumed by the side books' `iter_crossing`)
//! and command-boundary validation. The match loop itself lives in
//! `engine`.

pub mod crossing;
pub mod validate;

pub use crossing::crosses;
pub use validate::validate_request;
