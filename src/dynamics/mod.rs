//! The Liouvillean: free streaming, analytic pair/local event prediction
//! and impulsive event execution.
//!
//! Streaming is lazy and per particle (`Particle::last_sync`); it is exact
//! under ballistic or uniformly accelerated motion and never bumps the
//! event counter. Pair predictions are always ballistic because a uniform
//! gravitational field cancels in relative coordinates; local predictions
//! pick up the quartic parabola kernels when gravity is on.

pub mod intersection;

pub use intersection::EPS_TIME;

use crate::boundary::BoundaryCondition;
use crate::core::{EventKind, Particle, ParticleId};
use crate::error::{Error, Result};
use crate::math::Vec3;

/// Newtonian dynamics with an optional uniform external field.
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamics {
    pub gravity: Vec3,
}

impl Default for Dynamics {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
        }
    }
}

/// Read-only call context handed to interactions, locals and systems.
pub struct DynContext<'a> {
    pub dynamics: &'a Dynamics,
    pub bc: &'a BoundaryCondition,
    /// Absolute time of the event being predicted or executed.
    pub time: f64,
}

/// Record of a two-particle event, for invalidation and output plugins.
#[derive(Debug, Clone)]
pub struct PairEventData {
    pub p1: ParticleId,
    pub p2: ParticleId,
    pub kind: EventKind,
    pub old_vel1: Vec3,
    pub old_vel2: Vec3,
    /// Momentum transferred to `p1`.
    pub impulse: Vec3,
    /// Minimum-image separation `r1 - r2` at contact.
    pub separation: Vec3,
    /// Change in pair potential energy.
    pub delta_u: f64,
    /// Change in total kinetic energy.
    pub delta_ke: f64,
}

/// Record of a single-particle event (local or system).
#[derive(Debug, Clone)]
pub struct ParticleEventData {
    pub id: ParticleId,
    pub kind: EventKind,
    pub old_vel: Vec3,
    pub delta_u: f64,
    pub delta_ke: f64,
}

/// The set of particles mutated by one event.
#[derive(Debug, Clone)]
pub enum NEventData {
    Pair(PairEventData),
    Single(ParticleEventData),
    Multi(Vec<ParticleEventData>),
}

impl NEventData {
    /// IDs of every particle whose trajectory changed.
    pub fn touched(&self) -> Vec<ParticleId> {
        match self {
            NEventData::Pair(d) => vec![d.p1, d.p2],
            NEventData::Single(d) => vec![d.id],
            NEventData::Multi(ds) => ds.iter().map(|d| d.id).collect(),
        }
    }

    /// Total kinetic energy change of the event.
    pub fn delta_ke(&self) -> f64 {
        match self {
            NEventData::Pair(d) => d.delta_ke,
            NEventData::Single(d) => d.delta_ke,
            NEventData::Multi(ds) => ds.iter().map(|d| d.delta_ke).sum(),
        }
    }
}

impl Dynamics {
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }

    #[inline]
    pub fn is_ballistic(&self) -> bool {
        self.gravity.is_zero()
    }

    /// Free-stream a particle to the absolute time `t`. Exact, lazy, and
    /// counter-preserving; positions wrap through the boundary condition
    /// (except the deferred Lees-Edwards y-wrap).
    pub fn update_particle(&self, p: &mut Particle, t: f64, bc: &BoundaryCondition) {
        let dt = t - p.last_sync;
        if dt <= 0.0 {
            return;
        }
        p.pos += p.vel * dt + self.gravity * (0.5 * dt * dt);
        p.vel += self.gravity * dt;
        bc.wrap_stream(&mut p.pos);
        p.last_sync = t;
    }

    /// Minimum-image separation `r1 - r2` and relative velocity `v1 - v2`
    /// of a pair already streamed to `time`.
    pub fn pair_separation(
        &self,
        p1: &Particle,
        p2: &Particle,
        bc: &BoundaryCondition,
        time: f64,
    ) -> (Vec3, Vec3) {
        let mut dv = p1.vel - p2.vel;
        let dr = bc.min_image(p1.pos - p2.pos, &mut dv, time);
        (dr, dv)
    }

    /// Local wall prediction: approach of the signed plane distance to the
    /// contact offset.
    pub fn predict_plane(&self, p: &Particle, normal: Vec3, origin: Vec3, offset: f64) -> Option<f64> {
        let s0 = normal.dot(&(p.pos - origin)) - offset;
        let sv = normal.dot(&p.vel);
        let sa = normal.dot(&self.gravity);
        intersection::time_to_plane(s0, sv, sa)
    }

    /// Local sphere-obstacle prediction. `inverse` selects the inner face
    /// (a spherical container rather than an obstacle).
    pub fn predict_fixed_sphere(
        &self,
        p: &Particle,
        center: Vec3,
        radius: f64,
        inverse: bool,
    ) -> Option<f64> {
        let r0 = p.pos - center;
        if inverse {
            intersection::parabola_sphere_exit(r0, p.vel, self.gravity, radius)
        } else {
            intersection::parabola_sphere(r0, p.vel, self.gravity, radius)
        }
    }

    /// Execute a hard-core collision between a streamed pair.
    pub fn run_core(
        &self,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        elasticity: f64,
        bc: &BoundaryCondition,
        time: f64,
    ) -> Result<PairEventData> {
        let (dr, dv) = self.pair_separation(p1, p2, bc, time);
        let rhat = dr.unit().ok_or_else(|| {
            Error::Physical(format!(
                "degenerate contact normal between particles {} and {} at t={time}",
                p1.id, p2.id
            ))
        })?;
        let vn = dv.dot(&rhat);
        let mu = m1 * m2 / (m1 + m2);
        let old_vel1 = p1.vel;
        let old_vel2 = p2.vel;
        // Impulse on p1 along +rhat reverses the normal closing motion.
        let j = -(1.0 + elasticity) * mu * vn;
        p1.vel += rhat * (j / m1);
        p2.vel -= rhat * (j / m2);
        Ok(PairEventData {
            p1: p1.id,
            p2: p2.id,
            kind: EventKind::Core,
            old_vel1,
            old_vel2,
            impulse: rhat * j,
            separation: dr,
            delta_u: 0.0,
            delta_ke: -0.5 * mu * (1.0 - elasticity * elasticity) * vn * vn,
        })
    }

    /// Execute a potential-shell crossing for a streamed pair. `delta_u`
    /// is the potential change on crossing (KE changes by `-delta_u`); if
    /// the pair lacks the kinetic energy to cross, the shell reflects
    /// elastically instead. Returns the event record and whether the
    /// crossing happened.
    pub fn run_shell_transition(
        &self,
        p1: &mut Particle,
        p2: &mut Particle,
        m1: f64,
        m2: f64,
        delta_u: f64,
        kind: EventKind,
        bc: &BoundaryCondition,
        time: f64,
    ) -> Result<(PairEventData, bool)> {
        let (dr, dv) = self.pair_separation(p1, p2, bc, time);
        let rhat = dr.unit().ok_or_else(|| {
            Error::Physical(format!(
                "degenerate shell normal between particles {} and {} at t={time}",
                p1.id, p2.id
            ))
        })?;
        let vn = dv.dot(&rhat);
        let mu = m1 * m2 / (m1 + m2);
        let old_vel1 = p1.vel;
        let old_vel2 = p2.vel;

        let arg = vn * vn - 2.0 * delta_u / mu;
        let (new_vn, crossed, kind, delta_u, delta_ke) = if arg < 0.0 {
            // Not enough normal kinetic energy: elastic bounce off the shell.
            (-vn, false, EventKind::BounceBack, 0.0, 0.0)
        } else {
            (vn.signum() * arg.sqrt(), true, kind, delta_u, -delta_u)
        };

        let dvn = new_vn - vn;
        p1.vel += rhat * (mu * dvn / m1);
        p2.vel -= rhat * (mu * dvn / m2);
        Ok((
            PairEventData {
                p1: p1.id,
                p2: p2.id,
                kind,
                old_vel1,
                old_vel2,
                impulse: rhat * (mu * dvn),
                separation: dr,
                delta_u,
                delta_ke,
            },
            crossed,
        ))
    }

    /// Reflect a particle off a fixed surface with the given outward
    /// normal.
    pub fn run_local_reflection(
        &self,
        p: &mut Particle,
        mass: f64,
        normal: Vec3,
        elasticity: f64,
    ) -> Result<ParticleEventData> {
        let vn = normal.dot(&p.vel);
        let old_vel = p.vel;
        p.vel -= normal * ((1.0 + elasticity) * vn);
        Ok(ParticleEventData {
            id: p.id,
            kind: EventKind::Core,
            old_vel,
            delta_u: 0.0,
            delta_ke: -0.5 * mass * (1.0 - elasticity * elasticity) * vn * vn,
        })
    }
}
