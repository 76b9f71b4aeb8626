//! System events: scheduled happenings not tied to one particle. They
//! occupy dedicated sorter slots past the particle range and re-arm
//! themselves after each firing.

use crate::core::{EventKind, Particle, ParticleId};
use crate::dynamics::{DynContext, NEventData, ParticleEventData};
use crate::error::{Error, Result};
use crate::ranges::IdRange;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// A scheduled global event source.
pub trait System {
    fn name(&self) -> &str;

    /// Absolute time of the next firing.
    fn next_time(&self) -> f64;

    /// Arm the first firing.
    fn initialise(&mut self, time: f64, n_particles: usize, rng: &mut StdRng);

    /// Fire at `ctx.time`, mutate state, and re-arm.
    fn run(
        &mut self,
        particles: &mut [Particle],
        masses: &[f64],
        rng: &mut StdRng,
        ctx: &DynContext<'_>,
    ) -> Result<NEventData>;

    /// Whether this event drives the periodic output ticker.
    fn is_ticker(&self) -> bool {
        false
    }

    /// Serialisable description.
    fn spec(&self) -> SystemSpec;
}

/// Data mirror of the concrete systems, shared with the XML layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemSpec {
    Ticker {
        name: String,
        period: f64,
    },
    Andersen {
        name: String,
        rate: f64,
        temperature: f64,
        range: IdRange,
    },
    Rescale {
        name: String,
        period: f64,
        temperature: f64,
        range: IdRange,
    },
}

impl SystemSpec {
    pub fn build(self) -> Result<Box<dyn System>> {
        Ok(match self {
            SystemSpec::Ticker { name, period } => Box::new(Ticker::new(name, period)?),
            SystemSpec::Andersen {
                name,
                rate,
                temperature,
                range,
            } => Box::new(AndersenThermostat::new(name, rate, temperature, range)?),
            SystemSpec::Rescale {
                name,
                period,
                temperature,
                range,
            } => Box::new(RescaleThermostat::new(name, period, temperature, range)?),
        })
    }
}

fn check_period(period: f64) -> Result<()> {
    if !period.is_finite() || period <= 0.0 {
        return Err(Error::InvalidParam(
            "system event period must be finite and > 0".into(),
        ));
    }
    Ok(())
}

/// Fires the output-plugin ticker at a fixed period. Mutates nothing.
#[derive(Debug, Clone)]
pub struct Ticker {
    name: String,
    period: f64,
    next: f64,
}

impl Ticker {
    pub fn new(name: impl Into<String>, period: f64) -> Result<Self> {
        check_period(period)?;
        Ok(Self {
            name: name.into(),
            period,
            next: f64::INFINITY,
        })
    }
}

impl System for Ticker {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_time(&self) -> f64 {
        self.next
    }

    fn initialise(&mut self, time: f64, _n_particles: usize, _rng: &mut StdRng) {
        self.next = time + self.period;
    }

    fn run(
        &mut self,
        _particles: &mut [Particle],
        _masses: &[f64],
        _rng: &mut StdRng,
        ctx: &DynContext<'_>,
    ) -> Result<NEventData> {
        self.next = ctx.time + self.period;
        Ok(NEventData::Multi(Vec::new()))
    }

    fn is_ticker(&self) -> bool {
        true
    }

    fn spec(&self) -> SystemSpec {
        SystemSpec::Ticker {
            name: self.name.clone(),
            period: self.period,
        }
    }
}

/// Andersen thermostat: exponentially distributed waiting times, one
/// random particle per firing gets a fresh Maxwell-Boltzmann velocity.
#[derive(Debug, Clone)]
pub struct AndersenThermostat {
    name: String,
    /// Per-particle collision frequency with the heat bath.
    rate: f64,
    temperature: f64,
    range: IdRange,
    next: f64,
    targets: Vec<ParticleId>,
}

impl AndersenThermostat {
    pub fn new(
        name: impl Into<String>,
        rate: f64,
        temperature: f64,
        range: IdRange,
    ) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidParam(
                "thermostat rate must be finite and > 0".into(),
            ));
        }
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(Error::InvalidParam(
                "thermostat temperature must be finite and > 0".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            rate,
            temperature,
            range,
            next: f64::INFINITY,
            targets: Vec::new(),
        })
    }

    fn draw_interval(&self, rng: &mut StdRng) -> f64 {
        let total_rate = self.rate * self.targets.len() as f64;
        let u: f64 = rng.random();
        -(1.0 - u).ln() / total_rate
    }
}

impl System for AndersenThermostat {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_time(&self) -> f64 {
        self.next
    }

    fn initialise(&mut self, time: f64, n_particles: usize, rng: &mut StdRng) {
        // The target list is bound at initialise; the driver re-initialises
        // systems whenever the population changes.
        self.targets = self.range.iter(n_particles).collect();
        self.next = if self.targets.is_empty() {
            f64::INFINITY
        } else {
            time + self.draw_interval(rng)
        };
    }

    fn run(
        &mut self,
        particles: &mut [Particle],
        masses: &[f64],
        rng: &mut StdRng,
        ctx: &DynContext<'_>,
    ) -> Result<NEventData> {
        let pick = self.targets[rng.random_range(0..self.targets.len())];
        let p = particles.get_mut(pick).ok_or_else(|| {
            Error::Physical(format!(
                "thermostat \"{}\" targets missing particle {pick}",
                self.name
            ))
        })?;
        ctx.dynamics.update_particle(p, ctx.time, ctx.bc);
        let mass = masses[pick];
        let sigma = (self.temperature / mass).sqrt();
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| Error::InvalidParam(format!("thermostat distribution: {e}")))?;
        let old_vel = p.vel;
        let ke_before = p.kinetic_energy(mass);
        p.vel.x = normal.sample(rng);
        p.vel.y = normal.sample(rng);
        p.vel.z = normal.sample(rng);
        let delta_ke = p.kinetic_energy(mass) - ke_before;

        self.next = ctx.time + self.draw_interval(rng);
        Ok(NEventData::Single(ParticleEventData {
            id: pick,
            kind: EventKind::SysTicker,
            old_vel,
            delta_u: 0.0,
            delta_ke,
        }))
    }

    fn spec(&self) -> SystemSpec {
        SystemSpec::Andersen {
            name: self.name.clone(),
            rate: self.rate,
            temperature: self.temperature,
            range: self.range.clone(),
        }
    }
}

/// Periodic velocity rescale to a target temperature.
#[derive(Debug, Clone)]
pub struct RescaleThermostat {
    name: String,
    period: f64,
    temperature: f64,
    range: IdRange,
    next: f64,
}

impl RescaleThermostat {
    pub fn new(
        name: impl Into<String>,
        period: f64,
        temperature: f64,
        range: IdRange,
    ) -> Result<Self> {
        check_period(period)?;
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(Error::InvalidParam(
                "rescale temperature must be finite and > 0".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            period,
            temperature,
            range,
            next: f64::INFINITY,
        })
    }
}

impl System for RescaleThermostat {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_time(&self) -> f64 {
        self.next
    }

    fn initialise(&mut self, time: f64, _n_particles: usize, _rng: &mut StdRng) {
        self.next = time + self.period;
    }

    fn run(
        &mut self,
        particles: &mut [Particle],
        masses: &[f64],
        _rng: &mut StdRng,
        ctx: &DynContext<'_>,
    ) -> Result<NEventData> {
        self.next = ctx.time + self.period;
        let ids: Vec<ParticleId> = (0..particles.len())
            .filter(|&id| self.range.contains(id))
            .collect();
        if ids.is_empty() {
            return Ok(NEventData::Multi(Vec::new()));
        }
        let mut ke = 0.0;
        for &id in &ids {
            ctx.dynamics
                .update_particle(&mut particles[id], ctx.time, ctx.bc);
            ke += particles[id].kinetic_energy(masses[id]);
        }
        let current_kt = 2.0 * ke / (3.0 * ids.len() as f64);
        if current_kt <= 0.0 {
            return Ok(NEventData::Multi(Vec::new()));
        }
        let factor = (self.temperature / current_kt).sqrt();
        let mut data = Vec::with_capacity(ids.len());
        for &id in &ids {
            let p = &mut particles[id];
            let old_vel = p.vel;
            let ke_before = p.kinetic_energy(masses[id]);
            p.vel = p.vel * factor;
            data.push(ParticleEventData {
                id,
                kind: EventKind::SysTicker,
                old_vel,
                delta_u: 0.0,
                delta_ke: p.kinetic_energy(masses[id]) - ke_before,
            });
        }
        Ok(NEventData::Multi(data))
    }

    fn spec(&self) -> SystemSpec {
        SystemSpec::Rescale {
            name: self.name.clone(),
            period: self.period,
            temperature: self.temperature,
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
    use rand::SeedableRng;

    fn fixture() -> (Dynamics, BoundaryCondition, StdRng) {
        (
            Dynamics::default(),
            BoundaryCondition::periodic(Vec3::new(10.0, 10.0, 10.0)).unwrap(),
            StdRng::seed_from_u64(99),
        )
    }

    #[test]
    fn ticker_rearms_itself() -> Result<()> {
        let (d, bc, mut rng) = fixture();
        let mut t = Ticker::new("sampler", 0.5)?;
        t.initialise(1.0, 0, &mut rng);
        assert!((t.next_time() - 1.5).abs() < 1e-15);
        let ctx = DynContext {
            dynamics: &d,
            bc: &bc,
            time: 1.5,
        };
        let nd = t.run(&mut [], &[], &mut rng, &ctx)?;
        assert!(nd.touched().is_empty());
        assert!((t.next_time() - 2.0).abs() < 1e-15);
        assert!(t.is_ticker());
        Ok(())
    }

    #[test]
    fn andersen_redraws_one_velocity() -> Result<()> {
        let (d, bc, mut rng) = fixture();
        let mut sys = AndersenThermostat::new(
            "bath",
            1.0,
            1.0,
            IdRange::Ranged { start: 0, end: 1 },
        )?;
        sys.initialise(0.0, 2, &mut rng);
        let mut particles = vec![
            Particle::new(0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0))?,
            Particle::new(1, Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?,
        ];
        let masses = vec![1.0, 1.0];
        let ctx = DynContext {
            dynamics: &d,
            bc: &bc,
            time: 0.25,
        };
        let nd = sys.run(&mut particles, &masses, &mut rng, &ctx)?;
        let touched = nd.touched();
        assert_eq!(touched.len(), 1);
        assert!(touched[0] < 2);
        assert!(sys.next_time() > 0.25);
        // The untouched particle kept its velocity.
        let other = 1 - touched[0];
        assert_eq!(particles[other].vel.x.abs(), 1.0);
        Ok(())
    }

    #[test]
    fn rescale_hits_the_target_temperature() -> Result<()> {
        let (d, bc, mut rng) = fixture();
        let mut sys = RescaleThermostat::new("rescale", 1.0, 1.0, IdRange::All)?;
        sys.initialise(0.0, 2, &mut rng);
        let mut particles = vec![
            Particle::new(0, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0))?,
            Particle::new(1, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, -2.0, 0.0))?,
        ];
        let masses = vec![1.0, 1.0];
        let ctx = DynContext {
            dynamics: &d,
            bc: &bc,
            time: 1.0,
        };
        let nd = sys.run(&mut particles, &masses, &mut rng, &ctx)?;
        assert_eq!(nd.touched().len(), 2);
        let ke: f64 = particles
            .iter()
            .zip(&masses)
            .map(|(p, &m)| p.kinetic_energy(m))
            .sum();
        let kt = 2.0 * ke / (3.0 * 2.0);
        assert!((kt - 1.0).abs() < 1e-12);
        Ok(())
    }
}
