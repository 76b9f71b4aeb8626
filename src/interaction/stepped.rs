use crate::core::{EventKind, Particle};
use crate::dynamics::{intersection, DynContext, PairEventData};
use crate::error::{Error, Result};
use crate::interaction::{Interaction, InteractionSpec, PairKey};
use crate::ranges::IdPairRange;
use std::collections::HashMap;

/// One shell of a stepped potential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Shell radius.
    pub radius: f64,
    /// Potential energy inside this shell (relative to zero outside the
    /// outermost).
    pub energy: f64,
}

/// A staircase of concentric potential shells.
///
/// Steps are ordered outermost first. The sparse state map records, per
/// pair, how many shells it currently sits inside; pairs outside the
/// outermost shell are absent. A sufficiently high step is an effective
/// hard core; no implicit core exists below the innermost step.
#[derive(Debug, Clone)]
pub struct Stepped {
    name: String,
    steps: Vec<Step>,
    elasticity: f64,
    range: IdPairRange,
    state: HashMap<PairKey, usize>,
}

impl Stepped {
    pub fn new(
        name: impl Into<String>,
        steps: Vec<Step>,
        elasticity: f64,
        range: IdPairRange,
    ) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::InvalidParam(
                "stepped potential needs at least one step".into(),
            ));
        }
        for w in steps.windows(2) {
            if w[1].radius >= w[0].radius {
                return Err(Error::InvalidParam(
                    "stepped potential radii must strictly decrease outermost-first".into(),
                ));
            }
        }
        for s in &steps {
            if !s.radius.is_finite() || s.radius <= 0.0 || !s.energy.is_finite() {
                return Err(Error::InvalidParam(
                    "stepped potential radii must be > 0 and energies finite".into(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&elasticity) {
            return Err(Error::InvalidParam(
                "stepped elasticity must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            steps,
            elasticity,
            range,
            state: HashMap::new(),
        })
    }

    /// Potential energy of a pair that is inside `k` shells.
    fn energy_of(&self, k: usize) -> f64 {
        if k == 0 {
            0.0
        } else {
            self.steps[k - 1].energy
        }
    }

    pub fn step_index(&self, i: usize, j: usize) -> usize {
        self.state.get(&PairKey::new(i, j)).copied().unwrap_or(0)
    }

    fn set_step_index(&mut self, key: PairKey, k: usize) {
        if k == 0 {
            self.state.remove(&key);
        } else {
            self.state.insert(key, k);
        }
    }

    fn geometric_index(&self, dist2: f64) -> usize {
        self.steps
            .iter()
            .take_while(|s| dist2 < s.radius * s.radius)
            .count()
    }
}

impl Interaction for Stepped {
    fn name(&self) -> &str {
        &self.name
    }

    fn pair_range(&self) -> &IdPairRange {
        &self.range
    }

    fn range(&self) -> f64 {
        self.steps[0].radius
    }

    fn core_diameter(&self) -> f64 {
        self.steps[self.steps.len() - 1].radius
    }

    fn get_event(
        &self,
        p1: &Particle,
        p2: &Particle,
        ctx: &DynContext<'_>,
    ) -> Option<(f64, EventKind)> {
        let (dr, dv) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        let k = self.step_index(p1.id, p2.id);
        let inward = if k < self.steps.len() {
            intersection::ray_sphere(dr, dv, self.steps[k].radius)
                .map(|dt| (dt, EventKind::StepIn))
        } else {
            None
        };
        let outward = if k > 0 {
            intersection::ray_sphere_exit(dr, dv, self.steps[k - 1].radius)
                .map(|dt| (dt, EventKind::StepOut))
        } else {
            None
        };
        match (inward, outward) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (a, b) => a.or(b),
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
        let k = self.step_index(p1.id, p2.id);
        match kind {
            EventKind::StepIn => {
                if k >= self.steps.len() {
                    return Err(Error::Physical(format!(
                        "stepped \"{}\": pair ({}, {}) is already at the innermost shell",
                        self.name, p1.id, p2.id
                    )));
                }
                let delta_u = self.energy_of(k + 1) - self.energy_of(k);
                let (data, crossed) = ctx.dynamics.run_shell_transition(
                    p1,
                    p2,
                    m1,
                    m2,
                    delta_u,
                    EventKind::StepIn,
                    ctx.bc,
                    ctx.time,
                )?;
                if crossed {
                    self.set_step_index(key, k + 1);
                }
                Ok(data)
            }
            EventKind::StepOut => {
                if k == 0 {
                    return Err(Error::Physical(format!(
                        "stepped \"{}\": pair ({}, {}) is already outside every shell",
                        self.name, p1.id, p2.id
                    )));
                }
                let delta_u = self.energy_of(k - 1) - self.energy_of(k);
                let (data, crossed) = ctx.dynamics.run_shell_transition(
                    p1,
                    p2,
                    m1,
                    m2,
                    delta_u,
                    EventKind::StepOut,
                    ctx.bc,
                    ctx.time,
                )?;
                if crossed {
                    self.set_step_index(key, k - 1);
                }
                Ok(data)
            }
            other => Err(Error::Physical(format!(
                "stepped \"{}\" cannot run a {} event",
                self.name,
                other.label()
            ))),
        }
    }

    fn capture_test(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> usize {
        let (dr, _) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        self.geometric_index(dr.nrm2())
    }

    fn rebuild_captures(&mut self, particles: &[Particle], ctx: &DynContext<'_>) -> Result<()> {
        self.state.clear();
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                if self.range.contains(i, j) {
                    let k = self.capture_test(&particles[i], &particles[j], ctx);
                    if k > 0 {
                        self.state.insert(PairKey::new(i, j), k);
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_state(&self, p1: &Particle, p2: &Particle, ctx: &DynContext<'_>) -> Result<()> {
        // The recorded index may legitimately disagree with raw geometry
        // only within tolerance of a shell radius.
        let (dr, _) = ctx.dynamics.pair_separation(p1, p2, ctx.bc, ctx.time);
        let dist = dr.nrm();
        let k = self.step_index(p1.id, p2.id);
        let inner_ok = k >= self.steps.len() || dist > self.steps[k].radius * (1.0 - 1e-9);
        let outer_ok = k == 0 || dist < self.steps[k - 1].radius * (1.0 + 1e-9);
        if !inner_ok || !outer_ok {
            return Err(Error::Physical(format!(
                "particles {} and {}: separation {dist:.17e} inconsistent with step index {k}",
                p1.id, p2.id
            )));
        }
        Ok(())
    }

    fn internal_energy(&self) -> f64 {
        self.state.values().map(|&k| self.energy_of(k)).sum()
    }

    fn spec(&self) -> InteractionSpec {
        InteractionSpec::Stepped {
            name: self.name.clone(),
            steps: self.steps.iter().map(|s| (s.radius, s.energy)).collect(),
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

    fn shoulder() -> Stepped {
        // Repulsive staircase: 0.2 inside r=2, then 1.0 inside r=1.
        Stepped::new(
            "staircase",
            vec![
                Step {
                    radius: 2.0,
                    energy: 0.2,
                },
                Step {
                    radius: 1.0,
                    energy: 1.0,
                },
            ],
            1.0,
            IdPairRange::All,
        )
        .unwrap()
    }

    #[test]
    fn radii_must_decrease() {
        let err = Stepped::new(
            "bad",
            vec![
                Step {
                    radius: 1.0,
                    energy: 0.0,
                },
                Step {
                    radius: 2.0,
                    energy: 0.0,
                },
            ],
            1.0,
            IdPairRange::All,
        );
        assert!(err.is_err());
    }

    #[test]
    fn fast_pair_climbs_both_steps() -> Result<()> {
        let (d, bc) = fixture();
        let mut st = shoulder();
        let c = ctx(&d, &bc);
        let mut p1 = Particle::new(0, Vec3::new(-1.5, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0))?;
        let mut p2 = Particle::new(1, Vec3::new(1.5, 0.0, 0.0), Vec3::new(-3.0, 0.0, 0.0))?;

        let (dt, kind) = st.get_event(&p1, &p2, &c).unwrap();
        assert_eq!(kind, EventKind::StepIn);
        // Gap 3 - 2 closes at relative speed 6.
        assert!((dt - 1.0 / 6.0).abs() < 1e-12);

        let data = st.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::StepIn, &c)?;
        assert_eq!(data.kind, EventKind::StepIn);
        assert_eq!(st.step_index(0, 1), 1);
        assert!((st.internal_energy() - 0.2).abs() < 1e-12);

        let data = st.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::StepIn, &c)?;
        assert_eq!(data.kind, EventKind::StepIn);
        assert_eq!(st.step_index(0, 1), 2);
        assert!((st.internal_energy() - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn slow_pair_bounces_off_a_step() -> Result<()> {
        let (d, bc) = fixture();
        let mut st = shoulder();
        let c = ctx(&d, &bc);
        // Relative KE = mu vn^2 / 2 = 0.25 * 0.36... below the 1.0 - 0.2
        // barrier of the inner step.
        let mut p1 = Particle::new(0, Vec3::new(-0.75, 0.0, 0.0), Vec3::new(0.3, 0.0, 0.0))?;
        let mut p2 = Particle::new(1, Vec3::new(0.75, 0.0, 0.0), Vec3::new(-0.3, 0.0, 0.0))?;
        st.state.insert(PairKey::new(0, 1), 1);
        let data = st.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::StepIn, &c)?;
        assert_eq!(data.kind, EventKind::BounceBack);
        assert_eq!(st.step_index(0, 1), 1);
        assert!(p1.vel.x < 0.0);
        Ok(())
    }

    #[test]
    fn descending_releases_the_stored_energy() -> Result<()> {
        let (d, bc) = fixture();
        let mut st = shoulder();
        let c = ctx(&d, &bc);
        let mut p1 = Particle::new(0, Vec3::new(-0.75, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?;
        let mut p2 = Particle::new(1, Vec3::new(0.75, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))?;
        st.state.insert(PairKey::new(0, 1), 1);
        let ke0 = p1.kinetic_energy(1.0) + p2.kinetic_energy(1.0);
        let data = st.run_event(&mut p1, &mut p2, 1.0, 1.0, EventKind::StepOut, &c)?;
        assert_eq!(data.kind, EventKind::StepOut);
        assert_eq!(st.step_index(0, 1), 0);
        let ke1 = p1.kinetic_energy(1.0) + p2.kinetic_energy(1.0);
        assert!((ke1 - ke0 - 0.2).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn rebuild_recovers_indices_from_geometry() -> Result<()> {
        let (d, bc) = fixture();
        let mut st = shoulder();
        let particles = vec![
            Particle::new(0, Vec3::ZERO, Vec3::ZERO)?,
            Particle::new(1, Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO)?,
            Particle::new(2, Vec3::new(0.0, 0.5, 0.0), Vec3::ZERO)?,
            Particle::new(3, Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO)?,
        ];
        st.rebuild_captures(&particles, &ctx(&d, &bc))?;
        assert_eq!(st.step_index(0, 1), 1);
        assert_eq!(st.step_index(0, 2), 2);
        assert_eq!(st.step_index(0, 3), 0);
        Ok(())
    }
}
