//! Command-line entry points.

pub mod check;
pub mod convert;
pub mod schema;
