//! Analytic time-of-flight kernels.
//!
//! Every kernel answers: given a relative trajectory, when does a signed
//! distance function next cross zero in the approaching direction? Roots
//! are filtered to `t > ε_t` with a negative time derivative, with one
//! exception: a state already past contact (`f(0) < 0`) and still closing
//! (`f'(0) < 0`) collides *now*, which keeps overlapping states from
//! tunnelling.

use crate::math::{poly, Vec3};

/// Numeric slack applied to all event-time comparisons.
pub const EPS_TIME: f64 = 1e-12;

/// Smallest admissible root of `f` crossed downward, or 0 for the
/// overlapped-and-closing state.
fn next_downward_root(coeffs: &[f64]) -> Option<f64> {
    if poly::eval(coeffs, 0.0) < 0.0 && poly::eval_deriv(coeffs, 0.0) < 0.0 {
        return Some(0.0);
    }
    poly::real_roots(coeffs)
        .into_iter()
        .find(|&t| t > EPS_TIME && poly::eval_deriv(coeffs, t) < 0.0)
}

/// Ballistic approach to a sphere: earliest `t` with `|R + V t| = radius`,
/// approaching.
pub fn ray_sphere(r0: Vec3, v: Vec3, radius: f64) -> Option<f64> {
    let a = v.nrm2();
    let b = r0.dot(&v);
    let c = r0.nrm2() - radius * radius;
    if c < 0.0 {
        // Already inside the contact distance.
        return (b < 0.0).then_some(0.0);
    }
    if b >= 0.0 || a == 0.0 {
        return None;
    }
    let disc = b * b - a * c;
    if disc <= 0.0 {
        return None;
    }
    Some((-b - disc.sqrt()) / a)
}

/// Ballistic exit through a shell: earliest `t ≥ 0` with `|R + V t| =
/// radius`, leaving. From inside the shell this always has a root; a state
/// marginally outside and separating exits immediately.
pub fn ray_sphere_exit(r0: Vec3, v: Vec3, radius: f64) -> Option<f64> {
    let a = v.nrm2();
    if a == 0.0 {
        return None;
    }
    let b = r0.dot(&v);
    let c = r0.nrm2() - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b + disc.sqrt()) / a;
    Some(t.max(0.0))
}

/// Quartic coefficients of `|R + V t + A t²/2|² - r²` in ascending order.
fn parabola_coeffs(r0: Vec3, v: Vec3, a: Vec3, radius: f64) -> [f64; 5] {
    [
        r0.nrm2() - radius * radius,
        2.0 * v.dot(&r0),
        v.nrm2() + a.dot(&r0),
        a.dot(&v),
        a.nrm2() / 4.0,
    ]
}

/// Accelerated approach to a sphere (outer contact).
pub fn parabola_sphere(r0: Vec3, v: Vec3, a: Vec3, radius: f64) -> Option<f64> {
    next_downward_root(&parabola_coeffs(r0, v, a, radius))
}

/// Accelerated exit through a shell (inner contact): the sign-flipped
/// polynomial selects the outward crossings.
pub fn parabola_sphere_exit(r0: Vec3, v: Vec3, a: Vec3, radius: f64) -> Option<f64> {
    let mut coeffs = parabola_coeffs(r0, v, a, radius);
    for c in &mut coeffs {
        *c = -*c;
    }
    next_downward_root(&coeffs)
}

/// Approach of a signed plane distance `s(t) = s0 + v t + a t²/2` to zero.
pub fn time_to_plane(s0: f64, v: f64, a: f64) -> Option<f64> {
    next_downward_root(&[s0, v, 0.5 * a])
}

/// Earliest `t ≥ 0` at which a coordinate reaches the face displacement
/// `dx` while moving in the `outward` direction (±1). The outward-velocity
/// condition is what rejects the face a particle just entered through, so
/// a crossing landing exactly on a face still schedules its exit instead
/// of silently losing it.
pub fn time_to_face(dx: f64, v: f64, a: f64, outward: f64) -> Option<f64> {
    poly::real_roots(&[-dx, v, 0.5 * a])
        .into_iter()
        .find(|&t| t >= -EPS_TIME && (v + a * t) * outward > 0.0)
        .map(|t| t.max(0.0))
}
