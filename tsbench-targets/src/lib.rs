//! Backends tsbench can load
//!
//! Each target bundles a point format, a batch type, data sources (file
//! replay and simulation) and a writer, and registers itself by name in the
//! [`TargetRegistry`].

pub mod common;
pub mod error;
pub mod influx;
pub mod prometheus;
pub mod registry;
pub mod victoriametrics;

pub use error::{TargetError, TargetResult};
pub use registry::{Target, TargetRegistry};
