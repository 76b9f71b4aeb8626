//! The scheduler couples the Liouvillean to the sorter: it owns the
//! prediction strategy and (re)fills per-particle event lists.
//!
//! The `NeighbourList` strategy bounds pair candidates by the cell global;
//! `Dumb` predicts against everyone and suits few-body scenes. Popping,
//! validation and execution live in the simulation driver's event loop.

use crate::boundary::BoundaryCondition;
use crate::core::{Event, EventPartner, Particle, ParticleId};
use crate::dynamics::{DynContext, Dynamics};
use crate::error::Result;
use crate::globals::CellGlobal;
use crate::interaction::{interaction_for, Interaction};
use crate::locals::Local;
use crate::sorter::FelBoundedPq;
use crate::systems::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Predict against every other particle.
    Dumb,
    /// Predict against the cell neighbourhood.
    NeighbourList,
}

#[derive(Debug)]
pub struct Scheduler {
    pub strategy: Strategy,
    pub sorter: FelBoundedPq,
}

impl Scheduler {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            sorter: FelBoundedPq::new(0),
        }
    }

    /// Size the sorter: one slot per particle plus one per system event.
    pub fn initialise(&mut self, n_particles: usize, n_systems: usize) {
        self.sorter.reset(n_particles + n_systems);
    }

    #[inline]
    pub fn system_slot(n_particles: usize, k: usize) -> usize {
        n_particles + k
    }
}

/// Predict pair events of `id` against `partners` and push them into its
/// slot. Partners are streamed to `time` first; each event snapshots the
/// partner's counter.
#[allow(clippy::too_many_arguments)]
pub fn push_pair_events(
    sorter: &mut FelBoundedPq,
    id: ParticleId,
    partners: &[ParticleId],
    particles: &mut [Particle],
    interactions: &[Box<dyn Interaction>],
    dynamics: &Dynamics,
    bc: &BoundaryCondition,
    time: f64,
) -> Result<()> {
    for &q in partners {
        let Some(which) = interaction_for(interactions, id, q) else {
            continue;
        };
        dynamics.update_particle(&mut particles[q], time, bc);
        let ctx = DynContext { dynamics, bc, time };
        if let Some((dt, kind)) = interactions[which].get_event(&particles[id], &particles[q], &ctx)
        {
            let ev = Event::new(
                time + dt,
                id,
                EventPartner::Particle(q),
                kind,
                particles[q].event_counter,
            )?;
            sorter.push(id, ev)?;
        }
    }
    Ok(())
}

/// Full re-prediction of one particle: clear its slot, then push pair
/// events against the strategy's candidate set (plus `extra_partners`,
/// the co-mutated particles of the current event), local events, and the
/// next cell crossing.
#[allow(clippy::too_many_arguments)]
pub fn predict_full(
    scheduler: &mut Scheduler,
    id: ParticleId,
    extra_partners: &[ParticleId],
    particles: &mut [Particle],
    interactions: &[Box<dyn Interaction>],
    locals: &[Box<dyn Local>],
    mut cells: Option<&mut CellGlobal>,
    dynamics: &Dynamics,
    bc: &BoundaryCondition,
    time: f64,
) -> Result<()> {
    scheduler.sorter.clear_slot(id)?;
    dynamics.update_particle(&mut particles[id], time, bc);

    let mut partners: Vec<ParticleId> = match (scheduler.strategy, cells.as_deref()) {
        (Strategy::NeighbourList, Some(cells)) => cells.neighbourhood(id, time, bc),
        _ => (0..particles.len()).filter(|&q| q != id).collect(),
    };
    partners.extend(extra_partners.iter().copied().filter(|&q| q != id));
    partners.sort_unstable();
    partners.dedup();
    push_pair_events(
        &mut scheduler.sorter,
        id,
        &partners,
        particles,
        interactions,
        dynamics,
        bc,
        time,
    )?;

    for (li, local) in locals.iter().enumerate() {
        if local.id_range().contains(id) {
            let ctx = DynContext { dynamics, bc, time };
            if let Some((dt, kind)) = local.get_event(&particles[id], &ctx) {
                let ev = Event::new(time + dt, id, EventPartner::Local(li), kind, 0)?;
                scheduler.sorter.push(id, ev)?;
            }
        }
    }

    if let Some(cells) = cells.as_deref_mut() {
        if let Some((dt, kind)) = cells.next_crossing(&particles[id], dynamics, bc) {
            let ev = Event::new(time + dt, id, EventPartner::Global(0), kind, 0)?;
            scheduler.sorter.push(id, ev)?;
        }
    }
    Ok(())
}

/// After a plain cell crossing: extend the crossing particle's predictions
/// to the newly visible partners and schedule the next crossing. Nothing
/// is invalidated; the trajectory did not change.
#[allow(clippy::too_many_arguments)]
pub fn predict_after_crossing(
    scheduler: &mut Scheduler,
    id: ParticleId,
    new_partners: &[ParticleId],
    particles: &mut [Particle],
    interactions: &[Box<dyn Interaction>],
    cells: &mut CellGlobal,
    dynamics: &Dynamics,
    bc: &BoundaryCondition,
    time: f64,
) -> Result<()> {
    push_pair_events(
        &mut scheduler.sorter,
        id,
        new_partners,
        particles,
        interactions,
        dynamics,
        bc,
        time,
    )?;
    if let Some((dt, kind)) = cells.next_crossing(&particles[id], dynamics, bc) {
        let ev = Event::new(time + dt, id, EventPartner::Global(0), kind, 0)?;
        scheduler.sorter.push(id, ev)?;
    }
    Ok(())
}

/// (Re)arm a system event's sorter entry from its own schedule.
pub fn push_system_event(
    sorter: &mut FelBoundedPq,
    n_particles: usize,
    k: usize,
    system: &dyn System,
) -> Result<()> {
    let slot = Scheduler::system_slot(n_particles, k);
    sorter.clear_slot(slot)?;
    let ev = Event::new(
        system.next_time(),
        slot,
        EventPartner::System(k),
        crate::core::EventKind::SysTicker,
        0,
    )?;
    sorter.push(slot, ev)
}
