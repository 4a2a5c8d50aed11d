//! # Station packing solver
//!
//! Checks whether broadcast stations can share a band without interfering. The library part of
//! this crate re-exports [`stationpack_core`]; the `stationpack-solver` binary wraps it in a
//! command line interface which reads the station data from CSV files and instances from JSON
//! files, and prints one result per instance.
//!
//! ## Feature Flags
//! - `ipasir`: Link against a native SAT solver implementing the IPASIR interface and offer it as
//!   a backend.
//! - `debug-checks`: Enable expensive assertions in the pipeline and the in-process SAT solver.
pub use stationpack_core::*;
