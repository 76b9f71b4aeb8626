//! Output plugins: synchronous subscribers to executed events. The
//! broadcast fires in-process after each physical event; plugins must not
//! block.

use crate::core::{Event, EventKind, Particle};
use crate::dynamics::NEventData;
use crate::math::{Mat3, Vec3};
use std::any::Any;
use tracing::info;

/// Read-only snapshot handed to plugins.
pub struct SimView<'a> {
    pub particles: &'a [Particle],
    pub masses: &'a [f64],
    pub time: f64,
    pub event_count: u64,
}

impl SimView<'_> {
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .zip(self.masses)
            .map(|(p, &m)| p.kinetic_energy(m))
            .sum()
    }

    pub fn momentum(&self) -> Vec3 {
        self.particles
            .iter()
            .zip(self.masses)
            .fold(Vec3::ZERO, |acc, (p, &m)| acc + p.vel * m)
    }

    pub fn current_kt(&self) -> f64 {
        if self.particles.is_empty() {
            return 0.0;
        }
        2.0 * self.kinetic_energy() / (3.0 * self.particles.len() as f64)
    }
}

/// A synchronous event subscriber.
pub trait OutputPlugin {
    fn name(&self) -> &str;

    fn initialise(&mut self, view: &SimView<'_>);

    /// Called after every executed physical event.
    fn on_event(&mut self, ev: &Event, data: &NEventData, view: &SimView<'_>);

    /// Called when a `Ticker` system event fires.
    fn on_ticker(&mut self, _view: &SimView<'_>) {}

    /// Downcast hook for driver-side plugin lookup.
    fn as_any(&self) -> &dyn Any;
}

/// Running tallies: per-kind event counts, mean free time, energy
/// bookkeeping and the impulsive stress sum.
#[derive(Debug, Default)]
pub struct Misc {
    start_time: f64,
    last_time: f64,
    n_particles: usize,
    dual_events: u64,
    single_events: u64,
    counts: [u64; EventKind::COUNT],
    stress: Mat3,
    delta_u_total: f64,
    initial_ke: f64,
}

impl Misc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean free time: elapsed time per particle-event, counting a pair
    /// event for both members.
    pub fn mft(&self) -> f64 {
        let particle_events = 2 * self.dual_events + self.single_events;
        if particle_events == 0 {
            return 0.0;
        }
        (self.last_time - self.start_time) * self.n_particles as f64 / particle_events as f64
    }

    pub fn events_of(&self, kind: EventKind) -> u64 {
        self.counts[kind.index()]
    }

    pub fn pair_events(&self) -> u64 {
        self.dual_events
    }

    pub fn single_events(&self) -> u64 {
        self.single_events
    }

    /// Accumulated potential-energy change since initialise.
    pub fn total_delta_u(&self) -> f64 {
        self.delta_u_total
    }

    pub fn initial_kinetic_energy(&self) -> f64 {
        self.initial_ke
    }

    /// Time-averaged impulsive stress sum `Σ J ⊗ r / elapsed`.
    pub fn collisional_stress(&self) -> Mat3 {
        let elapsed = self.last_time - self.start_time;
        if elapsed <= 0.0 {
            return Mat3::ZERO;
        }
        self.stress.scale(1.0 / elapsed)
    }
}

impl OutputPlugin for Misc {
    fn name(&self) -> &str {
        "Misc"
    }

    fn initialise(&mut self, view: &SimView<'_>) {
        self.start_time = view.time;
        self.last_time = view.time;
        self.n_particles = view.particles.len();
        self.initial_ke = view.kinetic_energy();
        self.dual_events = 0;
        self.single_events = 0;
        self.counts = [0; EventKind::COUNT];
        self.stress = Mat3::ZERO;
        self.delta_u_total = 0.0;
    }

    fn on_event(&mut self, _ev: &Event, data: &NEventData, view: &SimView<'_>) {
        self.last_time = view.time;
        match data {
            NEventData::Pair(d) => {
                self.dual_events += 1;
                self.counts[d.kind.index()] += 1;
                self.stress += Mat3::outer(&d.impulse, &d.separation);
                self.delta_u_total += d.delta_u;
            }
            NEventData::Single(d) => {
                self.single_events += 1;
                self.counts[d.kind.index()] += 1;
                self.delta_u_total += d.delta_u;
            }
            NEventData::Multi(ds) => {
                for d in ds {
                    self.single_events += 1;
                    self.counts[d.kind.index()] += 1;
                    self.delta_u_total += d.delta_u;
                }
            }
        }
    }

    fn on_ticker(&mut self, view: &SimView<'_>) {
        info!(
            events = view.event_count,
            time = view.time,
            kt = view.current_kt(),
            momentum = view.momentum().nrm(),
            mft = self.mft(),
            "periodic sample"
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
