use crate::error::{Error, Result};
use crate::math::Vec3;
use crate::ranges::IdRange;

/// Index of a particle in the flat store.
pub type ParticleId = usize;

/// A point particle.
///
/// Positions live in the primary cell, centred on the origin. Position and
/// velocity mutate only through the dynamics; `event_counter` increments
/// whenever the trajectory changes and is the invalidation key for pending
/// events. `last_sync` is the absolute time at which `pos`/`vel` are valid:
/// free streaming is lazy and per-particle.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Stable identifier, equal to the index in the store.
    pub id: ParticleId,
    /// Position at `last_sync`.
    pub pos: Vec3,
    /// Velocity at `last_sync`.
    pub vel: Vec3,
    /// Monotonic trajectory version (for event invalidation).
    pub event_counter: u64,
    /// Absolute simulation time of the stored phase-space point.
    pub last_sync: f64,
}

impl Particle {
    /// Create a particle after validating finiteness.
    pub fn new(id: ParticleId, pos: Vec3, vel: Vec3) -> Result<Self> {
        if !pos.is_finite() {
            return Err(Error::InvalidParam(format!(
                "particle {id}: position must be finite"
            )));
        }
        if !vel.is_finite() {
            return Err(Error::InvalidParam(format!(
                "particle {id}: velocity must be finite"
            )));
        }
        Ok(Self {
            id,
            pos,
            vel,
            event_counter: 0,
            last_sync: 0.0,
        })
    }

    /// Increment the trajectory version.
    #[inline]
    pub fn bump_event_counter(&mut self) {
        self.event_counter = self.event_counter.wrapping_add(1);
    }

    /// Kinetic energy for the given mass: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self, mass: f64) -> f64 {
        0.5 * mass * self.vel.nrm2()
    }
}

/// Simultaneous mutable access to two distinct particles.
pub fn pair_mut(particles: &mut [Particle], i: usize, j: usize) -> (&mut Particle, &mut Particle) {
    debug_assert_ne!(i, j);
    if i < j {
        let (lo, hi) = particles.split_at_mut(j);
        (&mut lo[i], &mut hi[0])
    } else {
        let (lo, hi) = particles.split_at_mut(i);
        let (a, b) = (&mut hi[0], &mut lo[j]);
        (a, b)
    }
}

/// A species assigns a mass to a set of particle IDs. The first declared
/// species containing an ID wins.
#[derive(Debug, Clone)]
pub struct Species {
    pub name: String,
    pub mass: f64,
    pub range: IdRange,
}

impl Species {
    pub fn new(name: impl Into<String>, mass: f64, range: IdRange) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam(
                "species mass must be finite and > 0".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            mass,
            range,
        })
    }
}

/// Resolve the per-particle mass table from a species list.
pub fn mass_table(species: &[Species], n_particles: usize) -> Result<Vec<f64>> {
    let mut masses = Vec::with_capacity(n_particles);
    for id in 0..n_particles {
        let sp = species
            .iter()
            .find(|s| s.range.contains(id))
            .ok_or_else(|| {
                Error::Config(format!("particle {id} is not covered by any species"))
            })?;
        masses.push(sp.mass);
    }
    Ok(masses)
}
