//! Initial-condition builders: FCC lattice sites and Maxwell-Boltzmann
//! velocity draws.

use crate::error::{Error, Result};
use crate::math::Vec3;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// FCC basis, in units of the unit-cell edge.
const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.5, 0.5, 0.0],
    [0.5, 0.0, 0.5],
    [0.0, 0.5, 0.5],
];

/// Sites of an FCC lattice of `cells` unit cells filling the primary cell
/// (4 sites per unit cell), centred on the origin. Sites are inset by a
/// quarter cell so none sits exactly on a boundary face.
pub fn fcc_sites(cells: [usize; 3], primary_cell: Vec3) -> Vec<Vec3> {
    let a = Vec3::new(
        primary_cell.x / cells[0] as f64,
        primary_cell.y / cells[1] as f64,
        primary_cell.z / cells[2] as f64,
    );
    let mut sites = Vec::with_capacity(4 * cells[0] * cells[1] * cells[2]);
    for ix in 0..cells[0] {
        for iy in 0..cells[1] {
            for iz in 0..cells[2] {
                for basis in &FCC_BASIS {
                    sites.push(Vec3::new(
                        (ix as f64 + basis[0] + 0.25) * a.x - primary_cell.x / 2.0,
                        (iy as f64 + basis[1] + 0.25) * a.y - primary_cell.y / 2.0,
                        (iz as f64 + basis[2] + 0.25) * a.z - primary_cell.z / 2.0,
                    ));
                }
            }
        }
    }
    sites
}

/// Draw `n` velocities from the Maxwell-Boltzmann distribution at the
/// given temperature and mass.
pub fn maxwell_velocities(n: usize, kt: f64, mass: f64, rng: &mut StdRng) -> Result<Vec<Vec3>> {
    if !kt.is_finite() || kt <= 0.0 || !mass.is_finite() || mass <= 0.0 {
        return Err(Error::InvalidParam(
            "temperature and mass must be finite and > 0".into(),
        ));
    }
    let sigma = (kt / mass).sqrt();
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| Error::InvalidParam(format!("velocity distribution: {e}")))?;
    Ok((0..n)
        .map(|_| {
            Vec3::new(
                normal.sample(rng),
                normal.sample(rng),
                normal.sample(rng),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn fcc_site_count_and_bounds() {
        let cell = Vec3::new(1.0, 1.0, 1.0);
        let sites = fcc_sites([3, 3, 3], cell);
        assert_eq!(sites.len(), 4 * 27);
        for s in &sites {
            assert!(s.x > -0.5 && s.x < 0.5);
            assert!(s.y > -0.5 && s.y < 0.5);
            assert!(s.z > -0.5 && s.z < 0.5);
        }
    }

    #[test]
    fn fcc_nearest_neighbour_distance() {
        let sites = fcc_sites([2, 2, 2], Vec3::new(1.0, 1.0, 1.0));
        let a = 0.5;
        let expected = a / 2.0f64.sqrt();
        let mut min_d2 = f64::INFINITY;
        for i in 0..sites.len() {
            for j in (i + 1)..sites.len() {
                min_d2 = min_d2.min((sites[i] - sites[j]).nrm2());
            }
        }
        assert!((min_d2.sqrt() - expected).abs() < 1e-12);
    }

    #[test]
    fn maxwell_velocities_have_the_right_scale() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(4);
        let kt = 2.0;
        let n = 20_000;
        let vels = maxwell_velocities(n, kt, 1.0, &mut rng)?;
        let mean_sq: f64 = vels.iter().map(Vec3::nrm2).sum::<f64>() / n as f64;
        // <v^2> = 3 kT / m.
        assert!((mean_sq - 3.0 * kt).abs() < 0.1);
        Ok(())
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(maxwell_velocities(1, -1.0, 1.0, &mut rng).is_err());
        assert!(maxwell_velocities(1, 1.0, 0.0, &mut rng).is_err());
    }
}
