//! Lees-Edwards shear flow: the run must stay numerically sane, keep the
//! cell invariant through sliding-image wraps, and actually shear.

use edmd::error::Result;
use edmd::interaction::InteractionSpec;
use edmd::lattice;
use edmd::{
    BoundaryCondition, Dynamics, IdPairRange, IdRange, Simulation, Species, Strategy, Vec3,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sheared_fluid(rate: f64, seed: u64) -> Result<Simulation> {
    let box_cell = Vec3::new(1.0, 1.0, 1.0);
    let sites = lattice::fcc_sites([3, 3, 3], box_cell);
    let n = sites.len();
    let diameter = (0.3 / n as f64).cbrt();

    let bc = BoundaryCondition::lees_edwards(box_cell, rate)?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::NeighbourList, seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let vels = lattice::maxwell_velocities(n, 1.0, 1.0, &mut rng)?;
    for (pos, vel) in sites.into_iter().zip(vels) {
        // Seed the linear shear profile on top of the thermal motion.
        let vel = vel + Vec3::new(rate * pos.y, 0.0, 0.0);
        sim.add_particle(pos, vel)?;
    }
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    sim.add_interaction(
        InteractionSpec::HardSphere {
            name: "bulk".into(),
            diameter,
            elasticity: 1.0,
            range: IdPairRange::All,
        }
        .build()?,
    );
    Ok(sim)
}

#[test]
fn sheared_fluid_stays_consistent() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut sim = sheared_fluid(0.5, 42)?;
    sim.end_event_count = 3_000;
    sim.initialise()?;
    let ke0 = sim.kinetic_energy();
    sim.run()?;
    assert_eq!(sim.event_count, 3_000);

    // Shear pumps energy through the images, but the run stays bounded
    // and finite over this window.
    let ke1 = sim.kinetic_energy();
    assert!(ke1.is_finite() && ke1 > 0.0);
    assert!(ke1 < 100.0 * ke0, "runaway heating: {ke0} -> {ke1}");

    // Image crossings must actually have happened for this to test shear.
    assert!(sim.virtual_event_count > 0);

    sim.sync_particles();
    sim.check_system()?;
    sim.audit_cells()?;
    for p in &sim.particles {
        assert!(p.pos.is_finite() && p.vel.is_finite());
        // The deferred y-wrap never lets a particle leave the primary
        // cell between events.
        assert!(p.pos.y.abs() <= 0.5 + 1e-9);
    }
    Ok(())
}

#[test]
fn lees_edwards_without_cells_is_rejected() -> Result<()> {
    let bc = BoundaryCondition::lees_edwards(Vec3::new(1.0, 1.0, 1.0), 0.5)?;
    let mut sim = Simulation::new(bc, Dynamics::default(), Strategy::Dumb, 1);
    sim.add_particle(Vec3::ZERO, Vec3::new(0.1, 0.2, 0.0))?;
    sim.add_species(Species::new("bulk", 1.0, IdRange::All)?);
    assert!(sim.initialise().is_err());
    Ok(())
}

#[test]
fn zero_rate_shear_matches_periodic_behaviour() -> Result<()> {
    // A Lees-Edwards boundary with zero rate behaves like plain PBC:
    // energy is conserved exactly.
    let mut sim = sheared_fluid(0.0, 7)?;
    sim.end_event_count = 2_000;
    sim.initialise()?;
    let ke0 = sim.kinetic_energy();
    sim.run()?;
    let drift = ((sim.kinetic_energy() - ke0) / ke0).abs();
    assert!(drift < 1e-10, "energy drift {drift} at zero shear rate");
    sim.sync_particles();
    sim.audit_cells()?;
    Ok(())
}
