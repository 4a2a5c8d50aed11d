//! The reduction of station packing to propositional satisfiability.
//!
//! [`SatEncoder`] turns an instance into a [`Cnf`] over one variable per (station, channel) pair
//! and decodes models back into witness assignments. [`VariableCompressor`] optionally renames
//! the variables to a dense range before they reach a [`backend`].
pub mod backend;
mod cnf;
mod compression;
pub mod dimacs;
mod encoder;

pub use cnf::Clause;
pub use cnf::Cnf;
pub use cnf::Literal;
pub use compression::Compression;
pub use compression::VariableCompressor;
pub use encoder::pair_variable;
pub use encoder::unpair_variable;
pub use encoder::DecodeError;
pub use encoder::Encoding;
pub use encoder::SatEncoder;
