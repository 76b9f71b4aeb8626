use crate::core::{EventKind, Particle};
use crate::dynamics::{DynContext, PairEventData};
use crate::error::{Error, Result};
use crate::interaction::{Interaction, InteractionSpec};
use crate::ranges::IdPairRange;

/// Matches pairs and produces no events. Declared ahead of broader
/// interactions it masks its pairs from them.
#[derive(Debug, Clone)]
pub struct Null {
    name: String,
    range: IdPairRange,
}

impl Null {
    pub fn new(name: impl Into<String>, range: IdPairRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

impl Interaction for Null {
    fn name(&self) -> &str {
        &self.name
    }

    fn pair_range(&self) -> &IdPairRange {
        &self.range
    }

    fn range(&self) -> f64 {
        0.0
    }

    fn get_event(
        &self,
        _p1: &Particle,
        _p2: &Particle,
        _ctx: &DynContext<'_>,
    ) -> Option<(f64, EventKind)> {
        None
    }

    fn run_event(
        &mut self,
        p1: &mut Particle,
        p2: &mut Particle,
        _m1: f64,
        _m2: f64,
        kind: EventKind,
        _ctx: &DynContext<'_>,
    ) -> Result<PairEventData> {
        Err(Error::Physical(format!(
            "null interaction \"{}\" asked to run a {} event for ({}, {})",
            self.name,
            kind.label(),
            p1.id,
            p2.id
        )))
    }

    fn validate_state(&self, _p1: &Particle, _p2: &Particle, _ctx: &DynContext<'_>) -> Result<()> {
        Ok(())
    }

    fn spec(&self) -> InteractionSpec {
        InteractionSpec::Null {
            name: self.name.clone(),
            range: self.range.clone(),
        }
    }
}
