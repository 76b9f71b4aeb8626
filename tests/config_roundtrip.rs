//! Configuration round trips: every component survives write-then-load,
//! and a saved mid-run state resumes identically to the original.

use edmd::config;
use edmd::error::Result;
use edmd::interaction::InteractionSpec;
use edmd::lattice;
use edmd::locals::LocalSpec;
use edmd::systems::SystemSpec;
use edmd::{
    BoundaryCondition, Dynamics, IdPairRange, IdRange, Simulation, Species, Strategy, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn kitchen_sink() -> Result<Simulation> {
    let bc = BoundaryCondition::lees_edwards(Vec3::new(4.0, 4.0, 4.0), 0.25)?;
    let mut sim = Simulation::new(
        bc,
        Dynamics::new(Vec3::new(0.0, -0.5, 0.0)),
        Strategy::NeighbourList,
        98765,
    );
    for i in 0..6 {
        sim.add_particle(
            Vec3::new(-1.5 + 0.6 * i as f64, 0.1 * i as f64, 0.0),
            Vec3::new(0.1, -0.2, 0.3 * i as f64),
        )?;
    }
    sim.add_species(Species::new(
        "heavy",
        2.0,
        IdRange::Ranged { start: 0, end: 1 },
    )?);
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(
        InteractionSpec::Null {
            name: "masked".into(),
            range: IdPairRange::Chain { start: 0, end: 2 },
        }
        .build()?,
    );
    sim.add_interaction(
        InteractionSpec::SquareWell {
            name: "bonds".into(),
            diameter: 0.3,
            lambda: 1.5,
            well_depth: 0.8,
            elasticity: 1.0,
            range: IdPairRange::Single(IdRange::Ranged { start: 0, end: 3 }),
        }
        .build()?,
    );
    sim.add_interaction(
        InteractionSpec::Stepped {
            name: "shoulder".into(),
            steps: vec![(0.5, 0.2), (0.3, 1.0)],
            elasticity: 1.0,
            range: IdPairRange::All,
        }
        .build()?,
    );
    sim.add_local(
        LocalSpec::Wall {
            name: "plate".into(),
            normal: Vec3::new(0.0, 1.0, 0.0),
            origin: Vec3::new(0.0, -2.0, 0.0),
            offset: 0.15,
            elasticity: 0.9,
            range: IdRange::List(vec![0, 2, 4]),
        }
        .build()?,
    );
    sim.add_system(
        SystemSpec::Andersen {
            name: "bath".into(),
            rate: 0.5,
            temperature: 1.0,
            range: IdRange::All,
        }
        .build()?,
    );
    sim.add_system(
        SystemSpec::Ticker {
            name: "sampler".into(),
            period: 0.5,
        }
        .build()?,
    );
    sim.end_event_count = 4242;
    sim.event_print_interval = 100;
    Ok(sim)
}

#[test]
fn every_component_survives_the_round_trip() -> Result<()> {
    let sim = kitchen_sink()?;
    let xml = config::to_xml_string(&sim)?;
    let loaded = config::from_xml_str(&xml)?;

    assert_eq!(loaded.n(), sim.n());
    assert_eq!(loaded.rng_seed(), sim.rng_seed());
    assert_eq!(loaded.end_event_count, sim.end_event_count);
    assert_eq!(loaded.event_print_interval, sim.event_print_interval);
    assert_eq!(loaded.bc, sim.bc);
    assert_eq!(loaded.dynamics, sim.dynamics);
    assert_eq!(loaded.scheduler.strategy, Strategy::NeighbourList);

    assert_eq!(loaded.species.len(), sim.species.len());
    for (a, b) in loaded.species.iter().zip(&sim.species) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.mass, b.mass);
        assert_eq!(a.range, b.range);
    }
    assert_eq!(loaded.interactions.len(), sim.interactions.len());
    for (a, b) in loaded.interactions.iter().zip(&sim.interactions) {
        assert_eq!(a.spec(), b.spec());
    }
    assert_eq!(loaded.locals.len(), sim.locals.len());
    for (a, b) in loaded.locals.iter().zip(&sim.locals) {
        assert_eq!(a.spec(), b.spec());
    }
    assert_eq!(loaded.systems.len(), sim.systems.len());
    for (a, b) in loaded.systems.iter().zip(&sim.systems) {
        assert_eq!(a.spec(), b.spec());
    }
    for (a, b) in loaded.particles.iter().zip(&sim.particles) {
        assert_eq!(a.pos, b.pos);
        assert_eq!(a.vel, b.vel);
    }

    // Serialisation is a fixed point.
    assert_eq!(xml, config::to_xml_string(&loaded)?);
    Ok(())
}

#[test]
fn file_round_trip() -> Result<()> {
    let mut sim = kitchen_sink()?;
    let dir = std::env::temp_dir().join("edmd-config-roundtrip");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("state.xml");
    config::write_xml_file(&mut sim, &path)?;
    let loaded = config::load_xml_file(&path)?;
    assert_eq!(loaded.n(), sim.n());
    assert_eq!(loaded.bc, sim.bc);
    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn saved_state_resumes_identically() -> Result<()> {
    // A hard-sphere fluid, run part way, saved, reloaded: both copies must
    // produce the identical continuation.
    let box_cell = Vec3::new(1.0, 1.0, 1.0);
    let sites = lattice::fcc_sites([3, 3, 3], box_cell);
    let n = sites.len();
    let diameter = (0.4 / n as f64).cbrt();

    let bc = BoundaryCondition::periodic(box_cell)?;
    let mut original = Simulation::new(bc, Dynamics::default(), Strategy::NeighbourList, 2718);
    let mut rng = StdRng::seed_from_u64(2718);
    let vels = lattice::maxwell_velocities(n, 1.0, 1.0, &mut rng)?;
    for (pos, vel) in sites.into_iter().zip(vels) {
        original.add_particle(pos, vel)?;
    }
    original.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    original.add_interaction(
        InteractionSpec::HardSphere {
            name: "bulk".into(),
            diameter,
            elasticity: 1.0,
            range: IdPairRange::All,
        }
        .build()?,
    );
    original.end_event_count = 500;
    original.initialise()?;
    original.run()?;

    original.sync_particles();
    let xml = config::to_xml_string(&original)?;
    let mut restored = config::from_xml_str(&xml)?;

    for sim in [&mut original, &mut restored] {
        sim.end_event_count = 1_000;
        // The restored copy needs its first initialise; re-initialising
        // the original from the same state is equivalent.
        sim.reset();
        sim.end_event_count = 1_000;
        sim.initialise()?;
        sim.run()?;
    }

    assert_eq!(original.event_count, restored.event_count);
    assert_eq!(
        original.system_time.current().to_bits(),
        restored.system_time.current().to_bits()
    );
    for (a, b) in original.particles.iter().zip(&restored.particles) {
        assert_eq!(a.pos.x.to_bits(), b.pos.x.to_bits());
        assert_eq!(a.pos.y.to_bits(), b.pos.y.to_bits());
        assert_eq!(a.pos.z.to_bits(), b.pos.z.to_bits());
        assert_eq!(a.vel.x.to_bits(), b.vel.x.to_bits());
        assert_eq!(a.vel.y.to_bits(), b.vel.y.to_bits());
        assert_eq!(a.vel.z.to_bits(), b.vel.z.to_bits());
    }
    Ok(())
}
