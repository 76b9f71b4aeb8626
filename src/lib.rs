//! Event-driven molecular dynamics core.
//!
//! Systems of hard and stepped particles evolve from collision event to
//! collision event in continuous time: the next encounter of every pair is
//! solved analytically, the earliest pending event executes as an impulse,
//! and only the affected particles are re-predicted. The moving parts:
//!
//! - [`dynamics`]: the Liouvillean (lazy free streaming, intersection
//!   kernels, impulsive collision rules);
//! - [`interaction`]: hard spheres, square wells and stepped potentials
//!   with sparse capture state;
//! - [`globals`]: the neighbour-cell global bounding pair candidates and
//!   emitting (shearing-aware) cell-crossing events;
//! - [`sorter`]: the bounded bucket queue over per-particle event lists,
//!   with counter-based lazy invalidation;
//! - [`scheduler`] and [`simulation`]: prediction strategies and the
//!   event loop driver;
//! - [`config`]: XML configuration load/store.

pub mod boundary;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod globals;
pub mod interaction;
pub mod lattice;
pub mod locals;
pub mod math;
pub mod output;
pub mod ranges;
pub mod scheduler;
pub mod simulation;
pub mod sorter;
pub mod systems;

pub use crate::core::{Event, EventKind, EventPartner, Particle, ParticleId, SimTime, Species};
pub use boundary::BoundaryCondition;
pub use dynamics::{Dynamics, NEventData, PairEventData, ParticleEventData};
pub use error::{Error, Result};
pub use math::{Mat3, Vec3};
pub use output::{Misc, OutputPlugin, SimView};
pub use ranges::{IdPairRange, IdRange};
pub use scheduler::Strategy;
pub use simulation::{Simulation, Status};
