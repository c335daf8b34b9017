//! # drover-id
//!
//! Identity types shared by the SLA engine and the rolling-operation
//! controller.
//!
//! ## Design Principles
//!
//! - A job is identified by the tuple `(cluster, role, environment, name)`
//! - Identity values are immutable and ordered by that tuple
//! - Every identifier has a canonical string form with strict parsing
//! - Parsing roundtrips (parse → format → parse)
//!
//! ## Job Key Format
//!
//! Job keys render as a path: `{cluster}/{role}/{env}/{name}`
//!
//! Examples:
//! - `west/www-data/prod/hello`
//! - `east/mesos/test/labrat`
//!
//! Role, environment and name must match `^[\w\-\.]+$`. The cluster only
//! has to be non-empty and free of `/`.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
