use crate::core::{EventKind, Particle};
use crate::dynamics::{intersection, DynContext, PairEventData};
use crate::error::{Error, Result};
use crate::interaction::{Interaction, InteractionSpec};
use crate::ranges::IdPairRange;

/// Smooth hard spheres of a fixed contact diameter.
#[derive(Debug, Clone)]
pub struct HardSphere {
    name: String,
    diameter: f64,
    elasticity: f64,
    range: IdPairRange,
}

impl HardSphere {
    pub fn new(
        name: impl Into<String>,
        diameter: f64,
        elasticity: f64,
        range: IdPairRange,
    ) -> Result<Self> {
        if !diameter.is_finite() || diameter <= 0.0 {
            return Err(Error::InvalidParam(
                "hard-sphere diameter must be finite and > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&elasticity) {
            return Err(Error::InvalidParam(
                "hard-sphere elasticity must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            diameter,
            elasticity,
            range,
        })
    }
}

impl Interaction for HardSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn pair_range(&self) -> &IdPairRange {
        &self.range
    }

    fn range(&self) -> f64 {
        self.diameter
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
        intersection::ray_sphere(dr, dv, self.diameter).map(|dt| (dt, EventKind::Core))
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
        if kind != EventKind::Core {
            return Err(Error::Physical(format!(
                "hard sphere \"{}\" cannot run a {} event",
                self.name,
                kind.label()
            )));
        }
        ctx.dynamics
            .run_core(p1, p2, m1, m2, self.elasticity, ctx.bc, ctx.time)
    }

    fn validate_state(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> Result<()> {
        let (dr, _) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        let dist = dr.nrm();
        if dist < self.diameter * (1.0 - 1e-9) {
            return Err(Error::Physical(format!(
                "particles {} and {} overlap: separation {dist:.17e} < diameter {:.17e}",
                p1.id, p2.id, self.diameter
            )));
        }
        Ok(())
    }

    fn spec(&self) -> InteractionSpec {
        InteractionSpec::HardSphere {
            name: self.name.clone(),
            diameter: self.diameter,
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

    fn ctx<'a>(dynamics: &'a Dynamics, bc: &'a BoundaryCondition) -> DynContext<'a> {
        DynContext {
            dynamics,
            bc,
            time: 0.0,
        }
    }

    #[test]
    fn predicts_head_on_contact() -> Result<()> {
        let dynamics = Dynamics::default();
        let bc = BoundaryCondition::periodic(Vec3::new(50.0, 50.0, 50.0))?;
        let hs = HardSphere::new("bulk", 1.0, 1.0, IdPairRange::All)?;
        let p1 = Particle::new(0, Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))?;
        let p2 = Particle::new(1, Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?;
        let (dt, kind) = hs.get_event(&p1, &p2, &ctx(&dynamics, &bc)).unwrap();
        assert_eq!(kind, EventKind::Core);
        assert!((dt - 1.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn overlap_detected_by_validate() -> Result<()> {
        let dynamics = Dynamics::default();
        let bc = BoundaryCondition::periodic(Vec3::new(50.0, 50.0, 50.0))?;
        let hs = HardSphere::new("bulk", 1.0, 1.0, IdPairRange::All)?;
        let p1 = Particle::new(0, Vec3::ZERO, Vec3::ZERO)?;
        let p2 = Particle::new(1, Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO)?;
        assert!(hs.validate_state(&p1, &p2, &ctx(&dynamics, &bc)).is_err());
        let p3 = Particle::new(2, Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO)?;
        assert!(hs.validate_state(&p1, &p3, &ctx(&dynamics, &bc)).is_ok());
        Ok(())
    }

    #[test]
    fn bad_parameters_rejected() {
        assert!(HardSphere::new("x", 0.0, 1.0, IdPairRange::All).is_err());
        assert!(HardSphere::new("x", 1.0, 1.5, IdPairRange::All).is_err());
    }
}
