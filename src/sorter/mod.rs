//! The event sorter: a bounded bucket queue (`FelBoundedPq`) over small
//! per-particle min lists (`Pel`). Amortised O(1) insert and pop;
//! invalidation is lazy via the per-particle event counters.

pub mod fel;
pub mod pel;

pub use fel::FelBoundedPq;
pub use pel::{Pel, PEL_SIZE};
