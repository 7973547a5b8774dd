//! Useful metrics that the coordinator tracks.

/// The metrics namespace prefix. All metric names will start with
/// `{NAMESPACE}_`.
pub const NAMESPACE: &str = "colony";

mod core;
pub use self::core::*;
