//! Typed facades over guest contracts.

pub mod wasi_ce;

pub use wasi_ce::{Attribute, CeError, Cloudevent, WasiCe};
