//! # Station packing
//!
//! Decides whether a set of broadcast stations can be assigned channels such that every station
//! gets a channel from its domain and no two stations interfere.
//!
//! An instance is checked with a [`solvers::SolverPipeline`]: a chain of certifiers which may
//! settle it cheaply, followed by a decomposition into independent components which are encoded
//! to CNF and handed to a [`sat::backend::SatSolver`]. Conclusive answers can be kept in a
//! [`cache::ContainmentCache`] shared between calls.
//!
//! ```rust
//! # use std::collections::BTreeMap;
//! # use std::collections::BTreeSet;
//! # use std::sync::Arc;
//! # use stationpack_core::data::ChannelSpecificConstraintManager;
//! # use stationpack_core::data::ConstraintKey;
//! # use stationpack_core::data::DomainStationManager;
//! # use stationpack_core::sat::backend::CdclBackend;
//! # use stationpack_core::solvers::InstanceSolver;
//! # use stationpack_core::solvers::SolverPipeline;
//! # use stationpack_core::termination::Indefinite;
//! # use stationpack_core::SatResult;
//! # use stationpack_core::Station;
//! # use stationpack_core::StationPackingInstance;
//! let domains = BTreeMap::from([
//!     (Station::new(1), BTreeSet::from([14, 15])),
//!     (Station::new(2), BTreeSet::from([14, 15])),
//! ]);
//! let stations = Arc::new(DomainStationManager::new(domains.clone()).unwrap());
//!
//! let mut constraints = ChannelSpecificConstraintManager::new();
//! constraints.add_constraint(Station::new(1), Station::new(2), 14, ConstraintKey::Co);
//! constraints.add_constraint(Station::new(1), Station::new(2), 15, ConstraintKey::Co);
//!
//! let pipeline =
//!     SolverPipeline::builder(stations, Arc::new(constraints), Arc::new(CdclBackend::default()))
//!         .build();
//!
//! let instance = StationPackingInstance::from_domains(domains).unwrap();
//! let result = pipeline.solve(&instance, &Indefinite, 42).unwrap();
//!
//! assert_eq!(result.result(), SatResult::Sat);
//! assert_ne!(
//!     result.assignment().channel_of(Station::new(1)),
//!     result.assignment().channel_of(Station::new(2))
//! );
//! ```
pub mod asserts;
pub(crate) mod containers;

pub mod cache;
pub mod data;
pub mod grouping;
pub mod sat;
pub mod solvers;
pub mod termination;

pub use rand;

// The basic types are exported from the crate root.
mod basic_types;

pub use basic_types::*;
