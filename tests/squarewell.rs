//! Square-well scenarios: the capture/core/release sequence, total-energy
//! conservation with bound pairs, and the NVT thermostat.

use edmd::error::Result;
use edmd::interaction::InteractionSpec;
use edmd::lattice;
use edmd::output::{OutputPlugin, SimView};
use edmd::systems::SystemSpec;
use edmd::{
    BoundaryCondition, Dynamics, Event, EventKind, IdPairRange, IdRange, NEventData, Simulation,
    Species, Strategy, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;

/// Records the kind of every executed event.
#[derive(Default)]
struct KindLog {
    kinds: Vec<EventKind>,
}

impl OutputPlugin for KindLog {
    fn name(&self) -> &str {
        "KindLog"
    }

    fn initialise(&mut self, _view: &SimView<'_>) {
        self.kinds.clear();
    }

    fn on_event(&mut self, _ev: &Event, data: &NEventData, _view: &SimView<'_>) {
        match data {
            NEventData::Pair(d) => self.kinds.push(d.kind),
            NEventData::Single(d) => self.kinds.push(d.kind),
            NEventData::Multi(_) => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn well_interaction(diameter: f64) -> Result<Box<dyn edmd::interaction::Interaction>> {
    InteractionSpec::SquareWell {
        name: "well".into(),
        diameter,
        lambda: 1.5,
        well_depth: 1.0,
        elasticity: 1.0,
        range: IdPairRange::All,
    }
    .build()
}

#[test]
fn capture_core_release_sequence() -> Result<()> {
    let bc = BoundaryCondition::periodic(Vec3::new(20.0, 20.0, 20.0))?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::Dumb, 3);
    sim.add_particle(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))?;
    sim.add_particle(Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))?;
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(well_interaction(1.0)?);
    sim.add_output_plugin(Box::new(KindLog::default()));
    sim.end_event_count = 3;
    sim.initialise()?;

    let e_total0 = sim.total_energy();
    let ke0 = sim.kinetic_energy();

    // First event: capture at the outer shell, gap (4 - 1.5)/2 closes.
    assert!(sim.run_step()?);
    assert!((sim.system_time.current() - 1.25).abs() < 1e-12);
    // KE rose by the well depth.
    assert!((sim.kinetic_energy() - (ke0 + 1.0)).abs() < 1e-12);
    assert!((sim.internal_energy() - (-1.0)).abs() < 1e-12);
    assert!((sim.total_energy() - e_total0).abs() < 1e-12);

    // Second event: elastic core reflection inside the well.
    assert!(sim.run_step()?);
    assert!((sim.kinetic_energy() - (ke0 + 1.0)).abs() < 1e-12);

    // Third event: release through the outer shell restores the energy.
    assert!(!sim.run_step()?);
    assert!((sim.kinetic_energy() - ke0).abs() < 1e-12);
    assert!(sim.internal_energy().abs() < 1e-15);
    assert!((sim.particles[0].vel.x - (-1.0)).abs() < 1e-12);
    assert!((sim.particles[1].vel.x - 1.0).abs() < 1e-12);

    let log = sim.get_plugin::<KindLog>().unwrap();
    assert_eq!(
        log.kinds,
        vec![EventKind::WellIn, EventKind::Core, EventKind::WellOut]
    );
    assert!(sim.momentum().nrm() < 1e-14);
    Ok(())
}

#[test]
fn initial_captures_are_rebuilt_from_geometry() -> Result<()> {
    let bc = BoundaryCondition::periodic(Vec3::new(20.0, 20.0, 20.0))?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::Dumb, 3);
    // Inside the well (1.0 < 1.2 < 1.5) but clear of the core.
    sim.add_particle(Vec3::new(-0.6, 0.0, 0.0), Vec3::ZERO)?;
    sim.add_particle(Vec3::new(0.6, 0.0, 0.0), Vec3::ZERO)?;
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(well_interaction(1.0)?);
    sim.initialise()?;
    assert!((sim.internal_energy() - (-1.0)).abs() < 1e-15);
    Ok(())
}

#[test]
fn nve_fluid_conserves_total_energy() -> Result<()> {
    let box_cell = Vec3::new(1.0, 1.0, 1.0);
    let sites = lattice::fcc_sites([3, 3, 3], box_cell);
    let n = sites.len();
    let density = 0.3;
    let diameter = (density / n as f64).cbrt();

    let bc = BoundaryCondition::periodic(box_cell)?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::NeighbourList, 9001);
    let mut rng = StdRng::seed_from_u64(9001);
    let vels = lattice::maxwell_velocities(n, 1.0, 1.0, &mut rng)?;
    for (pos, vel) in sites.into_iter().zip(vels) {
        sim.add_particle(pos, vel)?;
    }
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(well_interaction(diameter)?);
    sim.zero_momentum()?;
    sim.rescale_velocities(1.0)?;
    sim.end_event_count = 5_000;
    sim.initialise()?;

    let e0 = sim.total_energy();
    sim.run()?;
    assert_eq!(sim.event_count, 5_000);
    let drift = ((sim.total_energy() - e0) / e0.abs().max(1.0)).abs();
    assert!(drift < 1e-9, "total energy drift {drift}");
    assert!(sim.momentum().nrm() < 1e-10);
    sim.sync_particles();
    sim.check_system()?;
    sim.audit_cells()?;
    Ok(())
}

#[test]
fn andersen_thermostat_holds_the_temperature() -> Result<()> {
    let box_cell = Vec3::new(1.0, 1.0, 1.0);
    let sites = lattice::fcc_sites([3, 3, 3], box_cell);
    let n = sites.len();
    let diameter = (0.3 / n as f64).cbrt();

    let bc = BoundaryCondition::periodic(box_cell)?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::NeighbourList, 1234);
    let mut rng = StdRng::seed_from_u64(1234);
    // Start cold: the bath must heat the fluid towards kT = 1.
    let vels = lattice::maxwell_velocities(n, 0.2, 1.0, &mut rng)?;
    for (pos, vel) in sites.into_iter().zip(vels) {
        sim.add_particle(pos, vel)?;
    }
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(well_interaction(diameter)?);
    sim.add_system(
        SystemSpec::Andersen {
            name: "thermostat".into(),
            rate: 50.0,
            temperature: 1.0,
            range: IdRange::All,
        }
        .build()?,
    );
    sim.end_event_count = 20_000;
    sim.initialise()?;
    sim.run()?;

    // Loose band: stochastic, but far from the cold start.
    let kt = sim.current_kt();
    assert!(kt > 0.5 && kt < 1.6, "kT = {kt}");
    sim.sync_particles();
    sim.check_system()?;
    Ok(())
}
