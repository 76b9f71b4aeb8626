//! The simulation driver: owns every component, runs the event loop, and
//! keeps the invalidation discipline honest.
//!
//! One `run_step` call delivers one event: pop the earliest candidate,
//! discard it if stale, stream the affected particles to the event time,
//! execute, then re-predict every mutated particle. Virtual cell
//! crossings advance time and extend predictions but do not count as
//! events.

use crate::boundary::BoundaryCondition;
use crate::core::{
    mass_table, pair_mut, Event, EventKind, EventPartner, Particle, ParticleId, SimTime, Species,
};
use crate::dynamics::{DynContext, Dynamics, NEventData, EPS_TIME};
use crate::error::{Error, Result};
use crate::globals::CellGlobal;
use crate::interaction::{interaction_for, longest_range, Interaction};
use crate::locals::Local;
use crate::math::Vec3;
use crate::output::{OutputPlugin, SimView};
use crate::scheduler::{
    predict_after_crossing, predict_full, push_system_event, Scheduler, Strategy,
};
use crate::systems::System;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

/// Lifecycle phase of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Components are still being assembled.
    Start,
    /// Configuration complete; `initialise` has not run.
    ConfigLoaded,
    /// Ready to run.
    Initialised,
    /// At least one event has been executed.
    Production,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("particles", &self.particles)
            .field("species", &self.species)
            .field("dynamics", &self.dynamics)
            .field("bc", &self.bc)
            .field(
                "interactions",
                &self.interactions.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field(
                "locals",
                &self.locals.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .field("cells", &self.cells)
            .field(
                "systems",
                &self.systems.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("scheduler", &self.scheduler)
            .field("system_time", &self.system_time)
            .field("event_count", &self.event_count)
            .field("virtual_event_count", &self.virtual_event_count)
            .field("end_event_count", &self.end_event_count)
            .field("event_print_interval", &self.event_print_interval)
            .field("status", &self.status)
            .field("shutdown_requested", &self.shutdown_requested)
            .field("rng_seed", &self.rng_seed)
            .finish()
    }
}

pub struct Simulation {
    pub particles: Vec<Particle>,
    pub species: Vec<Species>,
    pub dynamics: Dynamics,
    pub bc: BoundaryCondition,
    pub interactions: Vec<Box<dyn Interaction>>,
    pub locals: Vec<Box<dyn Local>>,
    pub cells: Option<CellGlobal>,
    pub systems: Vec<Box<dyn System>>,
    pub scheduler: Scheduler,
    pub system_time: SimTime,
    pub event_count: u64,
    /// Executed virtual events (cell crossings); not part of the budget.
    pub virtual_event_count: u64,
    pub end_event_count: u64,
    /// Events between periodic progress reports; 0 disables them.
    pub event_print_interval: u64,
    pub rng: StdRng,
    status: Status,
    shutdown_requested: bool,
    rng_seed: u64,
    masses: Vec<f64>,
    output_plugins: Vec<Box<dyn OutputPlugin>>,
}

impl Simulation {
    pub fn new(bc: BoundaryCondition, dynamics: Dynamics, strategy: Strategy, seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            species: Vec::new(),
            dynamics,
            bc,
            interactions: Vec::new(),
            locals: Vec::new(),
            cells: None,
            systems: Vec::new(),
            scheduler: Scheduler::new(strategy),
            system_time: SimTime::zero(),
            event_count: 0,
            virtual_event_count: 0,
            end_event_count: u64::MAX,
            event_print_interval: 0,
            rng: StdRng::seed_from_u64(seed),
            status: Status::Start,
            shutdown_requested: false,
            rng_seed: seed,
            masses: Vec::new(),
            output_plugins: Vec::new(),
        }
    }

    pub fn n(&self) -> usize {
        self.particles.len()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn add_particle(&mut self, pos: Vec3, vel: Vec3) -> Result<ParticleId> {
        let id = self.particles.len();
        let mut p = Particle::new(id, pos, vel)?;
        p.last_sync = self.system_time.current();
        self.particles.push(p);
        self.status = Status::Start;
        Ok(id)
    }

    pub fn add_species(&mut self, species: Species) {
        self.species.push(species);
        self.status = Status::Start;
    }

    pub fn add_interaction(&mut self, interaction: Box<dyn Interaction>) {
        self.interactions.push(interaction);
        self.status = Status::Start;
    }

    pub fn add_local(&mut self, local: Box<dyn Local>) {
        self.locals.push(local);
        self.status = Status::Start;
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
        self.status = Status::Start;
    }

    pub fn add_output_plugin(&mut self, plugin: Box<dyn OutputPlugin>) {
        self.output_plugins.push(plugin);
    }

    /// First registered plugin of the given concrete type.
    pub fn get_plugin<T: OutputPlugin + 'static>(&self) -> Option<&T> {
        self.output_plugins
            .iter()
            .find_map(|p| p.as_any().downcast_ref::<T>())
    }

    /// Ask the event loop to return after the current event.
    pub fn shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    /// Build every derived structure and fill the sorter. Idempotent:
    /// callable again after `reset` or state edits.
    pub fn initialise(&mut self) -> Result<()> {
        if self.particles.is_empty() {
            return Err(Error::InvalidParam(
                "cannot initialise a simulation without particles".into(),
            ));
        }
        self.masses = mass_table(&self.species, self.particles.len())?;
        let now = self.system_time.current();
        let n = self.particles.len();

        // Cell global, with graceful fallback for boxes too small to cut.
        self.cells = None;
        if self.scheduler.strategy == Strategy::NeighbourList {
            let range = longest_range(&self.interactions);
            if range > 0.0 {
                match CellGlobal::new("SchedulerNBList", &self.bc, range, n) {
                    Ok(cells) => self.cells = Some(cells),
                    Err(e) if !self.bc.is_shearing() => {
                        info!("cell global unavailable ({e}); falling back to all-pairs prediction");
                        self.scheduler.strategy = Strategy::Dumb;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if self.bc.is_shearing() && self.cells.is_none() {
            return Err(Error::InvalidParam(
                "Lees-Edwards boundaries require the neighbour-cell global".into(),
            ));
        }
        if let Some(cells) = self.cells.as_mut() {
            cells.rebuild(&self.particles, &self.bc);
        }

        // Capture maps from geometry, then an overlap audit.
        {
            let ctx = DynContext {
                dynamics: &self.dynamics,
                bc: &self.bc,
                time: now,
            };
            for interaction in &mut self.interactions {
                interaction.rebuild_captures(&self.particles, &ctx)?;
            }
        }
        self.check_system()?;

        // Sorter and predictions.
        self.scheduler.initialise(n, self.systems.len());
        for (k, system) in self.systems.iter_mut().enumerate() {
            system.initialise(now, n, &mut self.rng);
            push_system_event(&mut self.scheduler.sorter, n, k, system.as_ref())?;
        }
        for id in 0..n {
            predict_full(
                &mut self.scheduler,
                id,
                &[],
                &mut self.particles,
                &self.interactions,
                &self.locals,
                self.cells.as_mut(),
                &self.dynamics,
                &self.bc,
                now,
            )?;
        }

        let view = SimView {
            particles: &self.particles,
            masses: &self.masses,
            time: now,
            event_count: self.event_count,
        };
        let mut plugins = std::mem::take(&mut self.output_plugins);
        for plugin in &mut plugins {
            plugin.initialise(&view);
        }
        self.output_plugins = plugins;

        self.status = Status::Initialised;
        debug!(
            n,
            interactions = self.interactions.len(),
            cells = self.cells.is_some(),
            "simulation initialised"
        );
        Ok(())
    }

    /// Return to the as-loaded state: event counters zeroed, plugins
    /// dropped, RNG re-seeded, sorter emptied. Particle state and the
    /// clock are kept, exactly as if this state had just been read from a
    /// configuration file.
    pub fn reset(&mut self) {
        self.event_count = 0;
        self.virtual_event_count = 0;
        self.shutdown_requested = false;
        self.rng = StdRng::seed_from_u64(self.rng_seed);
        self.output_plugins.clear();
        self.scheduler.sorter.reset(0);
        self.cells = None;
        // Normalise the clock's compensation term: a freshly loaded state
        // carries none, and a resumed run must match one bit for bit.
        self.system_time = SimTime::from_value(self.system_time.current());
        self.status = Status::ConfigLoaded;
    }

    /// Execute events until the event budget is spent or `shutdown` is
    /// called.
    pub fn run(&mut self) -> Result<()> {
        while self.run_step()? {}
        Ok(())
    }

    /// Deliver one event. Returns whether the loop should continue. A
    /// sorter overflow triggers one rebuild with a retuned window before
    /// becoming fatal.
    pub fn run_step(&mut self) -> Result<bool> {
        match self.step_inner() {
            Err(Error::SorterOverflow(msg)) => {
                info!("sorter overflow ({msg}); rebuilding the event queue");
                self.rebuild_scheduler()?;
                self.step_inner()
            }
            other => other,
        }
    }

    fn step_inner(&mut self) -> Result<bool> {
        if self.shutdown_requested || self.event_count >= self.end_event_count {
            return Ok(false);
        }
        match self.status {
            Status::Initialised | Status::Production => {}
            _ => {
                return Err(Error::InvalidParam(
                    "simulation must be initialised before running".into(),
                ))
            }
        }
        self.status = Status::Production;
        let n = self.particles.len();

        // Pop until a valid event surfaces. Stale entries are the expected
        // case and die silently here.
        let (slot, ev) = loop {
            let (slot, ev) = self.scheduler.sorter.top()?;
            if ev.time_f64().is_infinite() {
                return Err(Error::Physical(format!(
                    "no future events pending at t={:.17e} after {} events",
                    self.system_time.current(),
                    self.event_count
                )));
            }
            if ev.kind == EventKind::NonEvent {
                // An overflowed event list drained: rebuild that slot.
                if slot >= n {
                    return Err(Error::Physical(format!(
                        "system slot {slot} lost its event"
                    )));
                }
                predict_full(
                    &mut self.scheduler,
                    slot,
                    &[],
                    &mut self.particles,
                    &self.interactions,
                    &self.locals,
                    self.cells.as_mut(),
                    &self.dynamics,
                    &self.bc,
                    self.system_time.current(),
                )?;
                continue;
            }
            let valid = match ev.partner {
                EventPartner::Particle(j) => ev.is_valid(self.particles[j].event_counter),
                _ => true,
            };
            if !valid {
                self.scheduler.sorter.pop_discard(slot)?;
                continue;
            }
            break (slot, ev);
        };

        let t_now = self.system_time.current();
        let t_ev = ev.time_f64();
        if t_ev < t_now - EPS_TIME {
            return Err(Error::PredictionMiss(format!(
                "{} event for particle {} at t={t_ev:.17e} lies in the past of \
                 t={t_now:.17e} (event count {})",
                ev.kind.label(),
                ev.particle,
                self.event_count
            )));
        }
        self.scheduler.sorter.pop_discard(slot)?;
        self.system_time.advance_to(t_ev);
        let t = self.system_time.current();

        let data: NEventData = match ev.partner {
            EventPartner::Particle(j) => {
                let i = ev.particle;
                self.dynamics
                    .update_particle(&mut self.particles[i], t, &self.bc);
                self.dynamics
                    .update_particle(&mut self.particles[j], t, &self.bc);
                let which = interaction_for(&self.interactions, i, j).ok_or_else(|| {
                    Error::Physical(format!(
                        "no interaction governs the predicted pair ({i}, {j}) at t={t:.17e}"
                    ))
                })?;
                let ctx = DynContext {
                    dynamics: &self.dynamics,
                    bc: &self.bc,
                    time: t,
                };
                let (m1, m2) = (self.masses[i], self.masses[j]);
                let (p1, p2) = pair_mut(&mut self.particles, i, j);
                NEventData::Pair(self.interactions[which].run_event(p1, p2, m1, m2, ev.kind, &ctx)?)
            }
            EventPartner::Local(l) => {
                let i = ev.particle;
                self.dynamics
                    .update_particle(&mut self.particles[i], t, &self.bc);
                let ctx = DynContext {
                    dynamics: &self.dynamics,
                    bc: &self.bc,
                    time: t,
                };
                let mass = self.masses[i];
                NEventData::Single(self.locals[l].run_event(
                    &mut self.particles[i],
                    mass,
                    ev.kind,
                    &ctx,
                )?)
            }
            EventPartner::Global(_) => {
                // Virtual: update occupancy and predictions; only the
                // virtual tally moves.
                self.virtual_event_count += 1;
                let i = ev.particle;
                self.dynamics
                    .update_particle(&mut self.particles[i], t, &self.bc);
                let outcome = match self.cells.as_mut() {
                    Some(cells) => cells.execute_crossing(&mut self.particles[i], &self.bc, t)?,
                    None => {
                        return Err(Error::Physical(format!(
                            "cell crossing for particle {i} without a cell global"
                        )))
                    }
                };
                if outcome.shear_wrapped {
                    self.particles[i].bump_event_counter();
                    predict_full(
                        &mut self.scheduler,
                        i,
                        &[],
                        &mut self.particles,
                        &self.interactions,
                        &self.locals,
                        self.cells.as_mut(),
                        &self.dynamics,
                        &self.bc,
                        t,
                    )?;
                } else if let Some(cells) = self.cells.as_mut() {
                    predict_after_crossing(
                        &mut self.scheduler,
                        i,
                        &outcome.added_partners,
                        &mut self.particles,
                        &self.interactions,
                        cells,
                        &self.dynamics,
                        &self.bc,
                        t,
                    )?;
                }
                return Ok(!self.shutdown_requested);
            }
            EventPartner::System(k) => {
                let ctx = DynContext {
                    dynamics: &self.dynamics,
                    bc: &self.bc,
                    time: t,
                };
                let data =
                    self.systems[k].run(&mut self.particles, &self.masses, &mut self.rng, &ctx)?;
                push_system_event(&mut self.scheduler.sorter, n, k, self.systems[k].as_ref())?;
                if self.systems[k].is_ticker() {
                    self.dispatch_ticker(t);
                }
                data
            }
            EventPartner::NoPartner => {
                return Err(Error::Physical(
                    "a partnerless event escaped the validation loop".into(),
                ))
            }
        };

        self.event_count += 1;

        let touched = data.touched();
        for &q in &touched {
            self.particles[q].bump_event_counter();
        }
        for &q in &touched {
            predict_full(
                &mut self.scheduler,
                q,
                &touched,
                &mut self.particles,
                &self.interactions,
                &self.locals,
                self.cells.as_mut(),
                &self.dynamics,
                &self.bc,
                t,
            )?;
        }

        self.dispatch_event(&ev, &data, t);

        if self.event_print_interval > 0 && self.event_count % self.event_print_interval == 0 {
            info!(
                events = self.event_count,
                time = t,
                kt = self.current_kt(),
                "progress"
            );
        }

        Ok(self.event_count < self.end_event_count && !self.shutdown_requested)
    }

    /// Repopulate the sorter from scratch without touching particle state
    /// or system schedules.
    fn rebuild_scheduler(&mut self) -> Result<()> {
        let n = self.particles.len();
        let now = self.system_time.current();
        self.scheduler.initialise(n, self.systems.len());
        for (k, system) in self.systems.iter().enumerate() {
            push_system_event(&mut self.scheduler.sorter, n, k, system.as_ref())?;
        }
        for id in 0..n {
            predict_full(
                &mut self.scheduler,
                id,
                &[],
                &mut self.particles,
                &self.interactions,
                &self.locals,
                self.cells.as_mut(),
                &self.dynamics,
                &self.bc,
                now,
            )?;
        }
        Ok(())
    }

    fn dispatch_event(&mut self, ev: &Event, data: &NEventData, time: f64) {
        let mut plugins = std::mem::take(&mut self.output_plugins);
        {
            let view = SimView {
                particles: &self.particles,
                masses: &self.masses,
                time,
                event_count: self.event_count,
            };
            for plugin in &mut plugins {
                plugin.on_event(ev, data, &view);
            }
        }
        self.output_plugins = plugins;
    }

    fn dispatch_ticker(&mut self, time: f64) {
        let mut plugins = std::mem::take(&mut self.output_plugins);
        {
            let view = SimView {
                particles: &self.particles,
                masses: &self.masses,
                time,
                event_count: self.event_count,
            };
            for plugin in &mut plugins {
                plugin.on_ticker(&view);
            }
        }
        self.output_plugins = plugins;
    }

    /// Stream every particle to the current system time. Free streaming
    /// only: counters stay put and pending predictions remain valid. Used
    /// before serialising state.
    pub fn sync_particles(&mut self) {
        let t = self.system_time.current();
        for p in &mut self.particles {
            self.dynamics.update_particle(p, t, &self.bc);
        }
    }

    // ---- diagnostics and initial-condition helpers ----

    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .zip(&self.masses)
            .map(|(p, &m)| p.kinetic_energy(m))
            .sum()
    }

    /// Potential energy stored in captured pairs.
    pub fn internal_energy(&self) -> f64 {
        self.interactions.iter().map(|x| x.internal_energy()).sum()
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.internal_energy()
    }

    pub fn momentum(&self) -> Vec3 {
        self.particles
            .iter()
            .zip(&self.masses)
            .fold(Vec3::ZERO, |acc, (p, &m)| acc + p.vel * m)
    }

    pub fn current_kt(&self) -> f64 {
        if self.particles.is_empty() {
            return 0.0;
        }
        2.0 * self.kinetic_energy() / (3.0 * self.particles.len() as f64)
    }

    pub fn number_density(&self) -> f64 {
        self.particles.len() as f64 / self.bc.volume()
    }

    /// Packing fraction from the largest hard-core diameter.
    pub fn packing_fraction(&self) -> f64 {
        let sigma = self
            .interactions
            .iter()
            .fold(0.0f64, |m, x| m.max(x.core_diameter()));
        self.number_density() * std::f64::consts::PI / 6.0 * sigma * sigma * sigma
    }

    /// Shift every velocity so the centre-of-mass momentum matches the
    /// target. Invalidates any previous `initialise`.
    pub fn set_com_velocity(&mut self, target: Vec3) -> Result<()> {
        if self.masses.len() != self.particles.len() {
            self.masses = mass_table(&self.species, self.particles.len())?;
        }
        let total_mass: f64 = self.masses.iter().sum();
        let com = self.momentum() / total_mass;
        for p in &mut self.particles {
            p.vel = p.vel - com + target;
        }
        self.status = Status::ConfigLoaded;
        Ok(())
    }

    pub fn zero_momentum(&mut self) -> Result<()> {
        self.set_com_velocity(Vec3::ZERO)
    }

    /// Rescale every velocity to the target temperature. Invalidates any
    /// previous `initialise`.
    pub fn rescale_velocities(&mut self, target_kt: f64) -> Result<()> {
        if !target_kt.is_finite() || target_kt <= 0.0 {
            return Err(Error::InvalidParam(
                "target temperature must be finite and > 0".into(),
            ));
        }
        if self.masses.len() != self.particles.len() {
            self.masses = mass_table(&self.species, self.particles.len())?;
        }
        let current = self.current_kt();
        if current <= 0.0 {
            return Err(Error::InvalidParam(
                "cannot rescale a motionless system".into(),
            ));
        }
        let factor = (target_kt / current).sqrt();
        for p in &mut self.particles {
            p.vel = p.vel * factor;
        }
        self.status = Status::ConfigLoaded;
        Ok(())
    }

    /// Audit every governed pair for illegal states. O(N^2); test and
    /// initialise use only.
    pub fn check_system(&self) -> Result<()> {
        let ctx = DynContext {
            dynamics: &self.dynamics,
            bc: &self.bc,
            time: self.system_time.current(),
        };
        for i in 0..self.particles.len() {
            for j in (i + 1)..self.particles.len() {
                if let Some(which) = interaction_for(&self.interactions, i, j) {
                    self.interactions[which].validate_state(
                        &self.particles[i],
                        &self.particles[j],
                        &ctx,
                    )?;
                }
            }
        }
        for p in &self.particles {
            if !p.vel.is_finite() || !p.pos.is_finite() {
                return Err(Error::Physical(format!(
                    "particle {} has non-finite state at t={:.17e} (event count {})",
                    p.id,
                    self.system_time.current(),
                    self.event_count
                )));
            }
        }
        Ok(())
    }

    /// Verify the cell-list invariant `current_cell == cell_of(position)`.
    pub fn audit_cells(&self) -> Result<()> {
        match &self.cells {
            Some(cells) => cells.audit(&self.particles, &self.bc),
            None => Ok(()),
        }
    }
}
