//! Boundary conditions: plain periodic wrapping and Lees-Edwards sliding
//! images for homogeneous shear.
//!
//! Positions live in the primary cell centred on the origin, `[-L/2, L/2)`
//! per axis. Under Lees-Edwards the image row above the y-boundary is
//! displaced along x by `γ̇·L_y·t` and moves with an extra x-velocity
//! `γ̇·L_y`; the y-wrap itself is deferred to the shearing cell global so
//! the velocity image change is always an explicit event.

use crate::error::{Error, Result};
use crate::math::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCondition {
    /// Minimum-image periodic wrapping in all three axes.
    Periodic { cell: Vec3 },
    /// Sliding-image periodic wrapping for shear flow `v_x = γ̇·y`.
    LeesEdwards { cell: Vec3, shear_rate: f64 },
}

impl BoundaryCondition {
    pub fn periodic(cell: Vec3) -> Result<Self> {
        validate_cell(&cell)?;
        Ok(BoundaryCondition::Periodic { cell })
    }

    pub fn lees_edwards(cell: Vec3, shear_rate: f64) -> Result<Self> {
        validate_cell(&cell)?;
        if !shear_rate.is_finite() {
            return Err(Error::InvalidParam("shear rate must be finite".into()));
        }
        Ok(BoundaryCondition::LeesEdwards { cell, shear_rate })
    }

    /// Edge lengths of the primary cell.
    #[inline]
    pub fn primary_cell(&self) -> Vec3 {
        match self {
            BoundaryCondition::Periodic { cell } => *cell,
            BoundaryCondition::LeesEdwards { cell, .. } => *cell,
        }
    }

    #[inline]
    pub fn shear_rate(&self) -> f64 {
        match self {
            BoundaryCondition::Periodic { .. } => 0.0,
            BoundaryCondition::LeesEdwards { shear_rate, .. } => *shear_rate,
        }
    }

    pub fn is_shearing(&self) -> bool {
        matches!(self, BoundaryCondition::LeesEdwards { .. })
    }

    pub fn volume(&self) -> f64 {
        let c = self.primary_cell();
        c.x * c.y * c.z
    }

    /// Displacement of the image row above the +y boundary at time `t`,
    /// folded into `[0, L_x)`.
    #[inline]
    pub fn strain_offset(&self, time: f64) -> f64 {
        match self {
            BoundaryCondition::Periodic { .. } => 0.0,
            BoundaryCondition::LeesEdwards { cell, shear_rate } => {
                (shear_rate * cell.y * time).rem_euclid(cell.x)
            }
        }
    }

    /// Minimum-image separation correction. `dr` is `r1 - r2`; `dv` is
    /// `v1 - v2` and receives the image velocity offset under shear.
    pub fn min_image(&self, mut dr: Vec3, dv: &mut Vec3, time: f64) -> Vec3 {
        let cell = self.primary_cell();
        if let BoundaryCondition::LeesEdwards { shear_rate, .. } = self {
            let n = (dr.y / cell.y).round();
            if n != 0.0 {
                dr.y -= n * cell.y;
                dr.x -= n * self.strain_offset(time);
                dv.x -= n * shear_rate * cell.y;
            }
            dr.x -= cell.x * (dr.x / cell.x).round();
            dr.z -= cell.z * (dr.z / cell.z).round();
        } else {
            dr.x -= cell.x * (dr.x / cell.x).round();
            dr.y -= cell.y * (dr.y / cell.y).round();
            dr.z -= cell.z * (dr.z / cell.z).round();
        }
        dr
    }

    /// Wrap a streamed position into the primary cell. Under Lees-Edwards
    /// the y axis is left alone (the shearing cell global wraps it).
    pub fn wrap_stream(&self, pos: &mut Vec3) {
        let cell = self.primary_cell();
        pos.x -= cell.x * (pos.x / cell.x).round();
        pos.z -= cell.z * (pos.z / cell.z).round();
        if !self.is_shearing() {
            pos.y -= cell.y * (pos.y / cell.y).round();
        }
    }

    /// Apply the Lees-Edwards image shift for a particle leaving through
    /// the y boundary. `dir = +1` exits through the +y face. No-op for
    /// plain periodic boundaries (the stream wrap already covers them).
    pub fn apply_shear_wrap(&self, pos: &mut Vec3, vel: &mut Vec3, dir: i32, time: f64) {
        if let BoundaryCondition::LeesEdwards { cell, shear_rate } = self {
            let n = f64::from(dir);
            pos.y -= n * cell.y;
            pos.x -= n * self.strain_offset(time);
            vel.x -= n * shear_rate * cell.y;
            pos.x -= cell.x * (pos.x / cell.x).round();
        }
    }
}

fn validate_cell(cell: &Vec3) -> Result<()> {
    if !cell.is_finite() || cell.x <= 0.0 || cell.y <= 0.0 || cell.z <= 0.0 {
        return Err(Error::InvalidParam(
            "primary cell lengths must be finite and > 0".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cell() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn periodic_min_image_picks_nearest() -> Result<()> {
        let bc = BoundaryCondition::periodic(unit_cell())?;
        let mut dv = Vec3::ZERO;
        let dr = bc.min_image(Vec3::new(0.9, -0.6, 0.2), &mut dv, 0.0);
        assert!((dr.x - (-0.1)).abs() < 1e-12);
        assert!((dr.y - 0.4).abs() < 1e-12);
        assert!((dr.z - 0.2).abs() < 1e-12);
        assert!(dv.is_zero());
        Ok(())
    }

    #[test]
    fn periodic_wrap_stream_recentres() -> Result<()> {
        let bc = BoundaryCondition::periodic(unit_cell())?;
        let mut pos = Vec3::new(0.75, -1.3, 0.0);
        bc.wrap_stream(&mut pos);
        assert!((pos.x - (-0.25)).abs() < 1e-12);
        assert!((pos.y - (-0.3)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn shear_min_image_offsets_velocity() -> Result<()> {
        let rate = 0.5;
        let bc = BoundaryCondition::lees_edwards(unit_cell(), rate)?;
        // At t=0.4 the upper image has slid by 0.2.
        let t = 0.4;
        let mut dv = Vec3::ZERO;
        let dr = bc.min_image(Vec3::new(0.0, 0.9, 0.0), &mut dv, t);
        assert!((dr.y - (-0.1)).abs() < 1e-12);
        assert!((dr.x - (-0.2)).abs() < 1e-12);
        assert!((dv.x - (-rate)).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn shear_wrap_stream_leaves_y_alone() -> Result<()> {
        let bc = BoundaryCondition::lees_edwards(unit_cell(), 1.0)?;
        let mut pos = Vec3::new(0.8, 0.7, -0.9);
        bc.wrap_stream(&mut pos);
        assert!((pos.x - (-0.2)).abs() < 1e-12);
        assert!((pos.y - 0.7).abs() < 1e-12);
        assert!((pos.z - 0.1).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn shear_wrap_applies_image_shift() -> Result<()> {
        let rate = 0.5;
        let bc = BoundaryCondition::lees_edwards(unit_cell(), rate)?;
        let t = 0.4; // offset = 0.2
        let mut pos = Vec3::new(0.1, 0.5, 0.0);
        let mut vel = Vec3::new(0.3, 1.0, 0.0);
        bc.apply_shear_wrap(&mut pos, &mut vel, 1, t);
        assert!((pos.y - (-0.5)).abs() < 1e-12);
        assert!((pos.x - (-0.1)).abs() < 1e-12);
        assert!((vel.x - (0.3 - rate)).abs() < 1e-12);
        // Exit through the bottom undoes the shift.
        bc.apply_shear_wrap(&mut pos, &mut vel, -1, t);
        assert!((vel.x - 0.3).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn strain_offset_folds_into_cell() -> Result<()> {
        let bc = BoundaryCondition::lees_edwards(unit_cell(), 0.5)?;
        assert!((bc.strain_offset(2.0) - 0.0).abs() < 1e-12);
        assert!((bc.strain_offset(2.6) - 0.3).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn degenerate_cell_rejected() {
        assert!(BoundaryCondition::periodic(Vec3::new(1.0, 0.0, 1.0)).is_err());
    }
}
