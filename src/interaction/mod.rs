//! Pair interactions: discontinuous potentials mapping predicted
//! intersection roots to event kinds.
//!
//! Interactions form an open set behind a capability trait; which ordered
//! pairs each one governs is decided by its [`IdPairRange`], first declared
//! match winning.

pub mod hardsphere;
pub mod null;
pub mod squarewell;
pub mod stepped;

pub use hardsphere::HardSphere;
pub use null::Null;
pub use squarewell::SquareWell;
pub use stepped::{Step, Stepped};

use crate::core::{EventKind, Particle, ParticleId};
use crate::dynamics::{DynContext, PairEventData};
use crate::error::Result;
use crate::ranges::IdPairRange;

/// Unordered pair key for capture-state maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(ParticleId, ParticleId);

impl PairKey {
    pub fn new(a: ParticleId, b: ParticleId) -> Self {
        if a < b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// A discontinuous pair potential.
pub trait Interaction {
    fn name(&self) -> &str;

    fn pair_range(&self) -> &IdPairRange;

    /// Maximum capture distance; bounds the neighbour-cell edge.
    fn range(&self) -> f64;

    /// Hard-core contact distance, if any (packing-fraction estimates).
    fn core_diameter(&self) -> f64 {
        0.0
    }

    /// Time to the next event for a pair already streamed to `ctx.time`,
    /// as an interval from now, with its kind. `None` if the pair never
    /// meets.
    fn get_event(
        &self,
        p1: &Particle,
        p2: &Particle,
        ctx: &DynContext<'_>,
    ) -> Option<(f64, EventKind)>;

    /// Execute a predicted event on a pair streamed to `ctx.time`. The
    /// returned record carries the kind that actually happened (a blocked
    /// shell crossing executes as `BounceBack`).
    fn run_event(
        &mut self,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        kind: EventKind,
        ctx: &DynContext<'_>,
    ) -> Result<PairEventData>;

    /// Current capture state of a pair from geometry alone (0 = unbound;
    /// for stepped potentials, the shell index).
    fn capture_test(&self, _p1: &Particle, _p2: &Particle, _ctx: &DynContext<'_>) -> usize {
        0
    }

    /// Rebuild the capture map by scanning all governed pairs. Called at
    /// initialise.
    fn rebuild_captures(&mut self, _particles: &[Particle], _ctx: &DynContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Audit one pair for illegal states (core overlap). Used by the
    /// whole-system checks, never in the hot loop.
    fn validate_state(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> Result<()>;

    /// Potential energy currently stored in captured pairs.
    fn internal_energy(&self) -> f64 {
        0.0
    }

    /// Serialisable description (the closed set the XML layer speaks).
    fn spec(&self) -> InteractionSpec;
}

/// Data mirror of the concrete interactions, shared with the XML layer.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionSpec {
    HardSphere {
        name: String,
        diameter: f64,
        elasticity: f64,
        range: IdPairRange,
    },
    SquareWell {
        name: String,
        diameter: f64,
        lambda: f64,
        well_depth: f64,
        elasticity: f64,
        range: IdPairRange,
    },
    Stepped {
        name: String,
        steps: Vec<(f64, f64)>,
        elasticity: f64,
        range: IdPairRange,
    },
    Null {
        name: String,
        range: IdPairRange,
    },
}

impl InteractionSpec {
    pub fn build(self) -> Result<Box<dyn Interaction>> {
        Ok(match self {
            InteractionSpec::HardSphere {
                name,
                diameter,
                elasticity,
                range,
            } => Box::new(HardSphere::new(name, diameter, elasticity, range)?),
            InteractionSpec::SquareWell {
                name,
                diameter,
                lambda,
                well_depth,
                elasticity,
                range,
            } => Box::new(SquareWell::new(
                name, diameter, lambda, well_depth, elasticity, range,
            )?),
            InteractionSpec::Stepped {
                name,
                steps,
                elasticity,
                range,
            } => Box::new(Stepped::new(
                name,
                steps
                    .into_iter()
                    .map(|(radius, energy)| Step { radius, energy })
                    .collect(),
                elasticity,
                range,
            )?),
            InteractionSpec::Null { name, range } => Box::new(Null::new(name, range)),
        })
    }
}

/// Index of the first interaction governing the pair `(i, j)`.
pub fn interaction_for(
    interactions: &[Box<dyn Interaction>],
    i: ParticleId,
    j: ParticleId,
) -> Option<usize> {
    interactions.iter().position(|x| x.pair_range().contains(i, j))
}

/// Longest capture distance over all interactions.
pub fn longest_range(interactions: &[Box<dyn Interaction>]) -> f64 {
    interactions.iter().fold(0.0, |m, x| m.max(x.range()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::IdRange;

    #[test]
    fn pair_key_is_unordered() {
        assert_eq!(PairKey::new(3, 7), PairKey::new(7, 3));
        assert_ne!(PairKey::new(3, 7), PairKey::new(3, 8));
    }

    #[test]
    fn first_matching_interaction_wins() -> Result<()> {
        let interactions: Vec<Box<dyn Interaction>> = vec![
            InteractionSpec::Null {
                name: "masked".into(),
                range: IdPairRange::Single(IdRange::Ranged { start: 0, end: 1 }),
            }
            .build()?,
            InteractionSpec::HardSphere {
                name: "bulk".into(),
                diameter: 1.0,
                elasticity: 1.0,
                range: IdPairRange::All,
            }
            .build()?,
        ];
        assert_eq!(interaction_for(&interactions, 0, 1), Some(0));
        assert_eq!(interaction_for(&interactions, 0, 2), Some(1));
        assert_eq!(interaction_for(&interactions, 5, 5), None);
        assert!((longest_range(&interactions) - 1.0).abs() < 1e-15);
        Ok(())
    }
}
