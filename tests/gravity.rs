//! Accelerated-motion scenarios: the quartic parabola-sphere drop and
//! repeated wall bounces under gravity.

use edmd::error::Result;
use edmd::locals::LocalSpec;
use edmd::{BoundaryCondition, Dynamics, IdRange, Simulation, Species, Strategy, Vec3};

fn open_box() -> Result<BoundaryCondition> {
    BoundaryCondition::periodic(Vec3::new(100.0, 100.0, 100.0))
}

#[test]
fn ball_dropped_onto_a_sphere_obstacle() -> Result<()> {
    let mut sim = Simulation::new(
        open_box()?,
        Dynamics::new(Vec3::new(0.0, -1.0, 0.0)),
        Strategy::Dumb,
        5,
    );
    sim.add_particle(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO)?;
    sim.add_species(Species::new("ball", 1.0, IdRange::All)?);
    sim.add_local(
        LocalSpec::FixedSphere {
            name: "boulder".into(),
            center: Vec3::ZERO,
            radius: 1.0,
            inverse: false,
            elasticity: 1.0,
            range: IdRange::All,
        }
        .build()?,
    );
    sim.end_event_count = 1;
    sim.initialise()?;
    sim.run()?;

    // Free fall from rest at 5 onto the unit sphere: t = sqrt(2 * (5-1)).
    let expected = 8.0f64.sqrt();
    assert!((sim.system_time.current() - expected).abs() < 1e-9);
    // Head-on reflection off the top of the sphere: moving up at the
    // impact speed g*t.
    assert!((sim.particles[0].vel.y - expected).abs() < 1e-9);
    assert!((sim.particles[0].pos.y - 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn elastic_bouncing_ball_keeps_its_period() -> Result<()> {
    let mut sim = Simulation::new(
        open_box()?,
        Dynamics::new(Vec3::new(0.0, -1.0, 0.0)),
        Strategy::Dumb,
        5,
    );
    sim.add_particle(Vec3::new(0.0, 3.0, 0.0), Vec3::ZERO)?;
    sim.add_species(Species::new("ball", 1.0, IdRange::All)?);
    sim.add_local(
        LocalSpec::Wall {
            name: "floor".into(),
            normal: Vec3::new(0.0, 1.0, 0.0),
            origin: Vec3::ZERO,
            offset: 0.5,
            elasticity: 1.0,
            range: IdRange::All,
        }
        .build()?,
    );
    sim.end_event_count = 1;
    sim.initialise()?;
    sim.run()?;

    // First contact: drop of 2.5 under g = 1.
    let t1 = 5.0f64.sqrt();
    assert!((sim.system_time.current() - t1).abs() < 1e-9);
    let impact_speed = t1;
    assert!((sim.particles[0].vel.y - impact_speed).abs() < 1e-9);

    // Second bounce after a full ballistic arc: period 2 v / g.
    sim.end_event_count = 2;
    sim.run()?;
    assert!((sim.system_time.current() - 3.0 * t1).abs() < 1e-9);

    // Energy (kinetic + potential above the contact plane) is conserved.
    sim.sync_particles();
    let p = &sim.particles[0];
    let energy = 0.5 * p.vel.nrm2() + (p.pos.y - 0.5);
    assert!((energy - 2.5).abs() < 1e-9, "energy {energy}");
    Ok(())
}

#[test]
fn inelastic_wall_loses_energy_each_bounce() -> Result<()> {
    let mut sim = Simulation::new(
        open_box()?,
        Dynamics::new(Vec3::new(0.0, -1.0, 0.0)),
        Strategy::Dumb,
        5,
    );
    sim.add_particle(Vec3::new(0.0, 2.5, 0.0), Vec3::ZERO)?;
    sim.add_species(Species::new("ball", 1.0, IdRange::All)?);
    sim.add_local(
        LocalSpec::Wall {
            name: "floor".into(),
            normal: Vec3::new(0.0, 1.0, 0.0),
            origin: Vec3::ZERO,
            offset: 0.5,
            elasticity: 0.5,
            range: IdRange::All,
        }
        .build()?,
    );
    sim.end_event_count = 1;
    sim.initialise()?;
    sim.run()?;

    // Impact at speed 2; rebound at elasticity * 2 = 1.
    assert!((sim.particles[0].vel.y - 1.0).abs() < 1e-9);
    Ok(())
}
