//! Locals: fixed geometry a subset of particles collides with. Wall
//! planes and sphere obstacles; both support the gravitational (quartic)
//! kernels.
//!
//! Locals live in the primary cell without images; they pair naturally
//! with non-wrapping axes or few-body scenes.

use crate::core::{EventKind, Particle};
use crate::dynamics::{DynContext, ParticleEventData};
use crate::error::{Error, Result};
use crate::math::Vec3;
use crate::ranges::IdRange;

/// A fixed surface for single-particle events.
pub trait Local {
    fn name(&self) -> &str;

    fn id_range(&self) -> &IdRange;

    /// Time from `ctx.time` to the next contact of a streamed particle,
    /// with its kind.
    fn get_event(&self, p: &Particle, ctx: &DynContext<'_>) -> Option<(f64, EventKind)>;

    /// Execute a predicted contact for a streamed particle.
    fn run_event(
        &self,
        p: &mut Particle,
        mass: f64,
        kind: EventKind,
        ctx: &DynContext<'_>,
    ) -> Result<ParticleEventData>;

    /// Serialisable description.
    fn spec(&self) -> LocalSpec;
}

/// Data mirror of the concrete locals, shared with the XML layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalSpec {
    Wall {
        name: String,
        normal: Vec3,
        origin: Vec3,
        offset: f64,
        elasticity: f64,
        range: IdRange,
    },
    FixedSphere {
        name: String,
        center: Vec3,
        radius: f64,
        inverse: bool,
        elasticity: f64,
        range: IdRange,
    },
}

impl LocalSpec {
    pub fn build(self) -> Result<Box<dyn Local>> {
        Ok(match self {
            LocalSpec::Wall {
                name,
                normal,
                origin,
                offset,
                elasticity,
                range,
            } => Box::new(Wall::new(name, normal, origin, offset, elasticity, range)?),
            LocalSpec::FixedSphere {
                name,
                center,
                radius,
                inverse,
                elasticity,
                range,
            } => Box::new(FixedSphere::new(
                name, center, radius, inverse, elasticity, range,
            )?),
        })
    }
}

/// An infinite plane wall. The normal points into the allowed half-space;
/// contact happens at `offset` above the plane (a particle radius, or zero
/// for point contact).
#[derive(Debug, Clone)]
pub struct Wall {
    name: String,
    normal: Vec3,
    origin: Vec3,
    offset: f64,
    elasticity: f64,
    range: IdRange,
}

impl Wall {
    pub fn new(
        name: impl Into<String>,
        normal: Vec3,
        origin: Vec3,
        offset: f64,
        elasticity: f64,
        range: IdRange,
    ) -> Result<Self> {
        let normal = normal.unit().ok_or_else(|| {
            Error::InvalidParam("wall normal must be a non-zero vector".into())
        })?;
        if !origin.is_finite() || !offset.is_finite() || offset < 0.0 {
            return Err(Error::InvalidParam(
                "wall origin must be finite and offset non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&elasticity) {
            return Err(Error::InvalidParam(
                "wall elasticity must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            normal,
            origin,
            offset,
            elasticity,
            range,
        })
    }
}

impl Local for Wall {
    fn name(&self) -> &str {
        &self.name
    }

    fn id_range(&self) -> &IdRange {
        &self.range
    }

    fn get_event(&self, p: &Particle, ctx: &DynContext<'_>) -> Option<(f64, EventKind)> {
        ctx.dynamics
            .predict_plane(p, self.normal, self.origin, self.offset)
            .map(|dt| (dt, EventKind::Core))
    }

    fn run_event(
        &self,
        p: &mut Particle,
        mass: f64,
        kind: EventKind,
        ctx: &DynContext<'_>,
    ) -> Result<ParticleEventData> {
        if kind != EventKind::Core {
            return Err(Error::Physical(format!(
                "wall \"{}\" cannot run a {} event",
                self.name,
                kind.label()
            )));
        }
        ctx.dynamics
            .run_local_reflection(p, mass, self.normal, self.elasticity)
    }

    fn spec(&self) -> LocalSpec {
        LocalSpec::Wall {
            name: self.name.clone(),
            normal: self.normal,
            origin: self.origin,
            offset: self.offset,
            elasticity: self.elasticity,
            range: self.range.clone(),
        }
    }
}

/// A fixed sphere. `inverse = false` is an obstacle hit from outside;
/// `inverse = true` is a spherical container hit from inside.
#[derive(Debug, Clone)]
pub struct FixedSphere {
    name: String,
    center: Vec3,
    radius: f64,
    inverse: bool,
    elasticity: f64,
    range: IdRange,
}

impl FixedSphere {
    pub fn new(
        name: impl Into<String>,
        center: Vec3,
        radius: f64,
        inverse: bool,
        elasticity: f64,
        range: IdRange,
    ) -> Result<Self> {
        if !center.is_finite() || !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam(
                "sphere center must be finite and radius > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&elasticity) {
            return Err(Error::InvalidParam(
                "sphere elasticity must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            center,
            radius,
            inverse,
            elasticity,
            range,
        })
    }
}

impl Local for FixedSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn id_range(&self) -> &IdRange {
        &self.range
    }

    fn get_event(&self, p: &Particle, ctx: &DynContext<'_>) -> Option<(f64, EventKind)> {
        ctx.dynamics
            .predict_fixed_sphere(p, self.center, self.radius, self.inverse)
            .map(|dt| (dt, EventKind::Core))
    }

    fn run_event(
        &self,
        p: &mut Particle,
        mass: f64,
        kind: EventKind,
        ctx: &DynContext<'_>,
    ) -> Result<ParticleEventData> {
        if kind != EventKind::Core {
            return Err(Error::Physical(format!(
                "sphere \"{}\" cannot run a {} event",
                self.name,
                kind.label()
            )));
        }
        let mut normal = (p.pos - self.center).unit().ok_or_else(|| {
            Error::Physical(format!(
                "particle {} sits at the centre of sphere \"{}\"",
                p.id, self.name
            ))
        })?;
        if self.inverse {
            normal = -normal;
        }
        ctx.dynamics
            .run_local_reflection(p, mass, normal, self.elasticity)
    }

    fn spec(&self) -> LocalSpec {
        LocalSpec::FixedSphere {
            name: self.name.clone(),
            center: self.center,
            radius: self.radius,
            inverse: self.inverse,
            elasticity: self.elasticity,
            range: self.range.clone(),
        }
    }
}
