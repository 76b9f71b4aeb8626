//! Globals: system-spanning virtual event producers. The neighbour-cell
//! list is the canonical one.

pub mod cells;

pub use cells::{CellGlobal, CrossingOutcome};
