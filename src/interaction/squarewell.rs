use crate::core::{EventKind, Particle};
use crate::dynamics::{intersection, DynContext, PairEventData};
use crate::error::{Error, Result};
use crate::interaction::{Interaction, InteractionSpec, PairKey};
use crate::ranges::IdPairRange;
use std::collections::HashSet;

/// A hard core of diameter σ surrounded by an attractive well out to λσ.
///
/// The capture set records which pairs currently sit inside the well; it is
/// rebuilt from geometry at initialise and updated by WellIn/WellOut
/// events. A positive `well_depth` is attractive; a negative one is a
/// repulsive shoulder (entry can then bounce back).
#[derive(Debug, Clone)]
pub struct SquareWell {
    name: String,
    diameter: f64,
    lambda: f64,
    well_depth: f64,
    elasticity: f64,
    range: IdPairRange,
    captured: HashSet<PairKey>,
}

impl SquareWell {
    pub fn new(
        name: impl Into<String>,
        diameter: f64,
        lambda: f64,
        well_depth: f64,
        elasticity: f64,
        range: IdPairRange,
    ) -> Result<Self> {
        if !diameter.is_finite() || diameter <= 0.0 {
            return Err(Error::InvalidParam(
                "square-well diameter must be finite and > 0".into(),
            ));
        }
        if !lambda.is_finite() || lambda <= 1.0 {
            return Err(Error::InvalidParam(
                "square-well lambda must be finite and > 1".into(),
            ));
        }
        if !well_depth.is_finite() {
            return Err(Error::InvalidParam(
                "square-well depth must be finite".into(),
            ));
        }
        if !(0.0..=1.0).contains(&elasticity) {
            return Err(Error::InvalidParam(
                "square-well elasticity must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            diameter,
            lambda,
            well_depth,
            elasticity,
            range,
            captured: HashSet::new(),
        })
    }

    #[inline]
    fn well_diameter(&self) -> f64 {
        self.lambda * self.diameter
    }

    pub fn is_captured(&self, i: usize, j: usize) -> bool {
        self.captured.contains(&PairKey::new(i, j))
    }
}

impl Interaction for SquareWell {
    fn name(&self) -> &str {
        &self.name
    }

    fn pair_range(&self) -> &IdPairRange {
        &self.range
    }

    fn range(&self) -> f64 {
        self.well_diameter()
    }

    fn core_diameter(&self) -> f64 {
        self.diameter
    }

    fn get_event(
        &self,
        p1: &Particle,
        p2: &Particle,
        ctx: &DynContext<'_>,
    ) -> Option<(f64, EventKind)> {
        let (dr, dv) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        if self.captured.contains(&PairKey::new(p1.id, p2.id)) {
            let core =
                intersection::ray_sphere(dr, dv, self.diameter).map(|dt| (dt, EventKind::Core));
            let exit = intersection::ray_sphere_exit(dr, dv, self.well_diameter())
                .map(|dt| (dt, EventKind::WellOut));
            match (core, exit) {
                (Some(c), Some(e)) => Some(if c.0 <= e.0 { c } else { e }),
                (c, e) => c.or(e),
            }
        } else {
            intersection::ray_sphere(dr, dv, self.well_diameter())
                .map(|dt| (dt, EventKind::WellIn))
        }
    }

    fn run_event(
        &mut self,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        kind: EventKind,
        ctx: &DynContext<'_>,
    ) -> Result<PairEventData> {
        let key = PairKey::new(p1.id, p2.id);
        match kind {
            EventKind::Core => ctx
                .dynamics
                .run_core(p1, p2, m1, m2, self.elasticity, ctx.bc, ctx.time),
            EventKind::WellIn => {
                let (data, crossed) = ctx.dynamics.run_shell_transition(
                    p1,
                    p2,
                    m1,
                    m2,
                    -self.well_depth,
                    EventKind::WellIn,
                    ctx.bc,
                    ctx.time,
                )?;
                if crossed {
                    self.captured.insert(key);
                }
                Ok(data)
            }
            EventKind::WellOut => {
                let (data, crossed) = ctx.dynamics.run_shell_transition(
                    p1,
                    p2,
                    m1,
                    m2,
                    self.well_depth,
                    EventKind::WellOut,
                    ctx.bc,
                    ctx.time,
                )?;
                if crossed {
                    self.captured.remove(&key);
                }
                Ok(data)
            }
            other => Err(Error::Physical(format!(
                "square well \"{}\" cannot run a {} event",
                self.name,
                other.label()
            ))),
        }
    }

    fn capture_test(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> usize {
        let (dr, _) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        usize::from(dr.nrm2() < self.well_diameter() * self.well_diameter())
    }

    fn rebuild_captures(&mut self, particles: &[Particle], ctx: &DynContext<'_>) -> Result<()> {
        self.captured.clear();
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                if self.range.contains(i, j)
                    && self.capture_test(&particles[i], &particles[j], ctx) != 0
                {
                    self.captured.insert(PairKey::new(i, j));
                }
            }
        }
        Ok(())
    }

    fn validate_state(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> Result<()> {
        let (dr, _) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        let dist = dr.nrm();
        if dist < self.diameter * (1.0 - 1e-9) {
            return Err(Error::Physical(format!(
                "particles {} and {} overlap the well core: separation {dist:.17e} < {:.17e}",
                p1.id, p2.id, self.diameter
            )));
        }
        Ok(())
    }

    fn internal_energy(&self) -> f64 {
        -self.well_depth * self.captured.len() as f64
    }

    fn spec(&self) -> InteractionSpec {
        InteractionSpec::SquareWell {
            name: self.name.clone(),
            diameter: self.diameter,
            lambda: self.lambda,
            well_depth: self.well_depth,
            elasticity: self.elasticity,
            range: self.range.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryCondition;
    use crate::dynamics::Dynamics;
    use crate::math::Vec3;

    fn fixture() -> (Dynamics, BoundaryCondition) {
        (
            Dynamics::default(),
            BoundaryCondition::periodic(Vec3::new(50.0, 50.0, 50.0)).unwrap(),
        )
    }

    fn ctx<'a>(d: &'a Dynamics, bc: &'a BoundaryCondition) -> DynContext<'a> {
        DynContext {
            dynamics: d,
            bc,
            time: 0.0,
        }
    }

    #[test]
    fn unbound_pair_sees_the_outer_shell_first() -> Result<()> {
        let (d, bc) = fixture();
        let sw = SquareWell::new("well", 1.0, 1.5, 1.0, 1.0, IdPairRange::All)?;
        let p1 = Particle::new(0, Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))?;
        let p2 = Particle::new(1, Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?;
        let (dt, kind) = sw.get_event(&p1, &p2, &ctx(&d, &bc)).unwrap();
        assert_eq!(kind, EventKind::WellIn);
        // Gap 4 - 1.5 closes at relative speed 2.
        assert!((dt - 1.25).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn capture_then_core_then_release() -> Result<()> {
        let (d, bc) = fixture();
        let mut sw = SquareWell::new("well", 1.0, 1.5, 1.0, 1.0, IdPairRange::All)?;
        let mut p1 = Particle::new(0, Vec3::new(-0.75, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))?;
        let mut p2 = Particle::new(1, Vec3::new(0.75, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?;
        let c = ctx(&d, &bc);

        let data = sw.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::WellIn, &c)?;
        assert_eq!(data.kind, EventKind::WellIn);
        assert!(sw.is_captured(0, 1));
        assert!((sw.internal_energy() - (-1.0)).abs() < 1e-12);

        // Bound pair now predicts the core and the exit shell.
        let (_, kind) = sw.get_event(&p1, &p2, &c).unwrap();
        assert_eq!(kind, EventKind::Core);

        // Move the pair to the exit shell separating and release it.
        p1.pos = Vec3::new(-0.75, 0.0, 0.0);
        p2.pos = Vec3::new(0.75, 0.0, 0.0);
        p1.vel = Vec3::new(-1.5, 0.0, 0.0);
        p2.vel = Vec3::new(1.5, 0.0, 0.0);
        let (dt, kind) = sw.get_event(&p1, &p2, &c).unwrap();
        assert_eq!(kind, EventKind::WellOut);
        assert!(dt >= 0.0);
        let data = sw.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::WellOut, &c)?;
        assert_eq!(data.kind, EventKind::WellOut);
        assert!(!sw.is_captured(0, 1));
        Ok(())
    }

    #[test]
    fn trapped_pair_bounces_back_at_the_shell() -> Result<()> {
        let (d, bc) = fixture();
        let mut sw = SquareWell::new("well", 1.0, 1.5, 8.0, 1.0, IdPairRange::All)?;
        // Deep well: a slow bound pair cannot escape.
        let mut p1 = Particle::new(0, Vec3::new(-0.7, 0.0, 0.0), Vec3::new(-0.5, 0.0, 0.0))?;
        let mut p2 = Particle::new(1, Vec3::new(0.7, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0))?;
        let c = ctx(&d, &bc);
        sw.captured.insert(PairKey::new(0, 1));
        let data = sw.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::WellOut, &c)?;
        assert_eq!(data.kind, EventKind::BounceBack);
        assert!(sw.is_captured(0, 1));
        // Reflected inward.
        assert!(p1.vel.x > 0.0 && p2.vel.x < 0.0);
        Ok(())
    }

    #[test]
    fn rebuild_captures_scans_geometry() -> Result<()> {
        let (d, bc) = fixture();
        let mut sw = SquareWell::new("well", 1.0, 1.5, 1.0, 1.0, IdPairRange::All)?;
        let particles = vec![
            Particle::new(0, Vec3::ZERO, Vec3::ZERO)?,
            Particle::new(1, Vec3::new(1.2, 0.0, 0.0), Vec3::ZERO)?,
            Particle::new(2, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO)?,
        ];
        sw.rebuild_captures(&particles, &ctx(&d, &bc))?;
        assert!(sw.is_captured(0, 1));
        assert!(!sw.is_captured(0, 2));
        assert!(!sw.is_captured(1, 2));
        Ok(())
    }
}
