//! Uniform neighbour-cell decomposition of the primary cell.
//!
//! Cell edges are at least the longest interaction range, so pair events
//! only ever involve particles in the same or adjacent cells. Crossings of
//! cell faces are virtual events: they update occupancy and extend the
//! crossing particle's predictions to the newly visible neighbourhood,
//! without touching its trajectory. Under Lees-Edwards, crossing the
//! sheared y-image is the exception: the particle's velocity image changes
//! (`VirtualCell`), its counter is bumped and its predictions are rebuilt.

use crate::boundary::BoundaryCondition;
use crate::core::{EventKind, Particle, ParticleId};
use crate::dynamics::{intersection, Dynamics};
use crate::error::{Error, Result};
use crate::math::Vec3;
use std::collections::HashSet;

/// Result of executing a cell crossing.
#[derive(Debug, Clone)]
pub struct CrossingOutcome {
    /// The particle wrapped through the shearing image; its velocity
    /// changed and full re-prediction is required.
    pub shear_wrapped: bool,
    /// Occupants of cells that just became visible (empty when
    /// `shear_wrapped`, where everything is re-predicted anyway).
    pub added_partners: Vec<ParticleId>,
}

#[derive(Debug, Clone)]
pub struct CellGlobal {
    pub name: String,
    n: [usize; 3],
    width: Vec3,
    occupants: Vec<Vec<ParticleId>>,
    cell_of_particle: Vec<usize>,
    next_face: Vec<(usize, i8)>,
    shearing: bool,
}

impl CellGlobal {
    /// Build the grid for the given boundary and interaction range. Needs
    /// at least 3 cells per axis to make the 27-cell neighbourhood sound.
    pub fn new(
        name: impl Into<String>,
        bc: &BoundaryCondition,
        longest_range: f64,
        n_particles: usize,
    ) -> Result<Self> {
        if !longest_range.is_finite() || longest_range <= 0.0 {
            return Err(Error::InvalidParam(
                "cell list needs a positive interaction range".into(),
            ));
        }
        let cell = bc.primary_cell();
        let mut n = [0usize; 3];
        for k in 0..3 {
            let nk = (cell[k] / longest_range).floor() as usize;
            if nk < 3 {
                return Err(Error::InvalidParam(format!(
                    "cell list needs >= 3 cells per axis; axis {k} fits only {nk} \
                     (cell {}, range {longest_range})",
                    cell[k]
                )));
            }
            n[k] = nk;
        }
        let width = Vec3::new(
            cell.x / n[0] as f64,
            cell.y / n[1] as f64,
            cell.z / n[2] as f64,
        );
        Ok(Self {
            name: name.into(),
            n,
            width,
            occupants: vec![Vec::new(); n[0] * n[1] * n[2]],
            cell_of_particle: vec![0; n_particles],
            next_face: vec![(0, 0); n_particles],
            shearing: bc.is_shearing(),
        })
    }

    pub fn grid(&self) -> [usize; 3] {
        self.n
    }

    pub fn cell_width(&self) -> Vec3 {
        self.width
    }

    #[inline]
    fn compose(&self, c: [usize; 3]) -> usize {
        c[0] + self.n[0] * (c[1] + self.n[1] * c[2])
    }

    #[inline]
    fn decompose(&self, idx: usize) -> [usize; 3] {
        let x = idx % self.n[0];
        let y = (idx / self.n[0]) % self.n[1];
        let z = idx / (self.n[0] * self.n[1]);
        [x, y, z]
    }

    /// Cell containing a primary-cell position.
    pub fn cell_index(&self, pos: Vec3, bc: &BoundaryCondition) -> usize {
        let cell = bc.primary_cell();
        let mut c = [0usize; 3];
        for k in 0..3 {
            let shifted = pos[k] + cell[k] / 2.0;
            let idx = (shifted / self.width[k]).floor();
            c[k] = (idx.max(0.0) as usize).min(self.n[k] - 1);
        }
        self.compose(c)
    }

    pub fn current_cell(&self, id: ParticleId) -> usize {
        self.cell_of_particle[id]
    }

    /// Reassign every particle from scratch.
    pub fn rebuild(&mut self, particles: &[Particle], bc: &BoundaryCondition) {
        for bucket in &mut self.occupants {
            bucket.clear();
        }
        self.cell_of_particle.resize(particles.len(), 0);
        self.next_face.resize(particles.len(), (0, 0));
        for p in particles {
            let idx = self.cell_index(p.pos, bc);
            self.cell_of_particle[p.id] = idx;
            self.occupants[idx].push(p.id);
        }
    }

    /// Cells adjacent to `cell` (inclusive), with the x-window across a
    /// sheared y-face widened to cover the strain offset.
    fn neighbour_cells(&self, cell: usize, time: f64, bc: &BoundaryCondition) -> Vec<usize> {
        let c = self.decompose(cell);
        let (nx, ny, nz) = (self.n[0] as i64, self.n[1] as i64, self.n[2] as i64);
        let mut out = Vec::with_capacity(27);
        for dy in -1i64..=1 {
            let raw_y = c[1] as i64 + dy;
            let wrap = if raw_y < 0 {
                -1
            } else if raw_y >= ny {
                1
            } else {
                0
            };
            let iy = raw_y.rem_euclid(ny) as usize;
            let xs: Vec<i64> = if self.shearing && wrap != 0 {
                // The neighbouring image row is displaced along x; take a
                // four-cell window around the shifted centre.
                let shift = f64::from(wrap) * bc.strain_offset(time) / self.width.x;
                let base = (c[0] as f64 - shift).floor() as i64;
                (base - 1..=base + 2).collect()
            } else {
                (c[0] as i64 - 1..=c[0] as i64 + 1).collect()
            };
            for dz in -1i64..=1 {
                let iz = (c[2] as i64 + dz).rem_euclid(nz) as usize;
                for &rx in &xs {
                    let ix = rx.rem_euclid(nx) as usize;
                    out.push(self.compose([ix, iy, iz]));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// All candidate partners of a particle: occupants of its cell and the
    /// adjacent cells.
    pub fn neighbourhood(
        &self,
        id: ParticleId,
        time: f64,
        bc: &BoundaryCondition,
    ) -> Vec<ParticleId> {
        let mut out = Vec::new();
        for cell in self.neighbour_cells(self.cell_of_particle[id], time, bc) {
            out.extend(self.occupants[cell].iter().copied().filter(|&q| q != id));
        }
        out
    }

    /// Predict the next cell-face crossing of a streamed particle and
    /// remember which face it is. The stored face stays consistent until
    /// the particle's trajectory changes, at which point this is called
    /// again.
    pub fn next_crossing(
        &mut self,
        p: &Particle,
        dynamics: &Dynamics,
        bc: &BoundaryCondition,
    ) -> Option<(f64, EventKind)> {
        let cell = bc.primary_cell();
        let c = self.decompose(self.cell_of_particle[p.id]);
        let mut best: Option<(f64, usize, i8)> = None;
        for k in 0..3 {
            let lo = c[k] as f64 * self.width[k] - cell[k] / 2.0;
            let hi = lo + self.width[k];
            for (target, dir) in [(lo, -1i8), (hi, 1i8)] {
                if let Some(dt) = intersection::time_to_face(
                    target - p.pos[k],
                    p.vel[k],
                    dynamics.gravity[k],
                    f64::from(dir),
                ) {
                    if best.map_or(true, |(t, _, _)| dt < t) {
                        best = Some((dt, k, dir));
                    }
                }
            }
        }
        let (dt, axis, dir) = best?;
        self.next_face[p.id] = (axis, dir);
        let through_shear_image = self.shearing
            && axis == 1
            && ((dir > 0 && c[1] == self.n[1] - 1) || (dir < 0 && c[1] == 0));
        let kind = if through_shear_image {
            EventKind::VirtualCell
        } else {
            EventKind::CellCrossing
        };
        Some((dt, kind))
    }

    /// Execute the stored crossing for a particle already streamed to
    /// `time`.
    pub fn execute_crossing(
        &mut self,
        p: &mut Particle,
        bc: &BoundaryCondition,
        time: f64,
    ) -> Result<CrossingOutcome> {
        let id = p.id;
        let (axis, dir) = self.next_face[id];
        if dir == 0 {
            return Err(Error::Physical(format!(
                "cell crossing for particle {id} executed without a prediction"
            )));
        }
        let old_cell = self.cell_of_particle[id];
        let mut c = self.decompose(old_cell);
        let nk = self.n[axis] as i64;
        let raw = c[axis] as i64 + i64::from(dir);
        let wrapped = raw < 0 || raw >= nk;
        c[axis] = raw.rem_euclid(nk) as usize;

        let shear_wrapped = self.shearing && axis == 1 && wrapped;
        let new_cell = if shear_wrapped {
            // The image shift moves x by the strain offset; re-bin from
            // the wrapped position rather than face arithmetic.
            bc.apply_shear_wrap(&mut p.pos, &mut p.vel, i32::from(dir), time);
            self.cell_index(p.pos, bc)
        } else {
            self.compose(c)
        };

        let slot = self.occupants[old_cell]
            .iter()
            .position(|&q| q == id)
            .ok_or_else(|| {
                Error::Physical(format!(
                    "particle {id} missing from its recorded cell {old_cell}"
                ))
            })?;
        self.occupants[old_cell].swap_remove(slot);
        self.occupants[new_cell].push(id);
        self.cell_of_particle[id] = new_cell;

        let added_partners = if shear_wrapped {
            Vec::new()
        } else {
            let old_set: HashSet<usize> =
                self.neighbour_cells(old_cell, time, bc).into_iter().collect();
            let mut partners = Vec::new();
            for cell in self.neighbour_cells(new_cell, time, bc) {
                if !old_set.contains(&cell) {
                    partners.extend(self.occupants[cell].iter().copied().filter(|&q| q != id));
                }
            }
            partners
        };

        Ok(CrossingOutcome {
            shear_wrapped,
            added_partners,
        })
    }

    /// Verify that every recorded cell matches the particle's position,
    /// within face tolerance.
    pub fn audit(&self, particles: &[Particle], bc: &BoundaryCondition) -> Result<()> {
        let cell = bc.primary_cell();
        for p in particles {
            let c = self.decompose(self.cell_of_particle[p.id]);
            for k in 0..3 {
                let lo = c[k] as f64 * self.width[k] - cell[k] / 2.0;
                let hi = lo + self.width[k];
                let eps = 1e-9 * self.width[k];
                let x = p.pos[k];
                // Positions exactly on a wrapped face may sit a full cell
                // away on the other side of the box.
                let wrapped_ok =
                    (x - cell[k] / 2.0).abs() < eps || (x + cell[k] / 2.0).abs() < eps;
                if !(x >= lo - eps && x <= hi + eps) && !wrapped_ok {
                    return Err(Error::Physical(format!(
                        "particle {} at {x:.17e} (axis {k}) outside its recorded cell [{lo:.6}, {hi:.6}]",
                        p.id
                    )));
                }
            }
        }
        Ok(())
    }
}
