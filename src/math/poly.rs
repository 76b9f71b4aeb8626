//! Real-root finders for the low-order polynomials produced by the
//! intersection kernels: quadratics for ballistic encounters, quartics for
//! parabolic (accelerated) ones.
//!
//! Coefficients are ascending: `coeffs[i]` multiplies `t^i`. Quartic roots
//! come from Ferrari's factorisation through the resolvent cubic and are
//! polished with a few Newton steps on the original polynomial.

/// Evaluate `sum coeffs[i] * t^i` by Horner's rule.
pub fn eval(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

/// Evaluate the first derivative at `t`.
pub fn eval_deriv(coeffs: &[f64], t: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (i, &c)| acc * t + c * i as f64)
}

/// Real roots of `c2 t^2 + c1 t + c0`, numerically stable form.
pub fn quadratic_roots(c0: f64, c1: f64, c2: f64) -> Vec<f64> {
    if c2 == 0.0 {
        if c1 == 0.0 {
            return Vec::new();
        }
        return vec![-c0 / c1];
    }
    let disc = c1 * c1 - 4.0 * c2 * c0;
    if disc < 0.0 {
        return Vec::new();
    }
    let sq = disc.sqrt();
    // q = -(c1 + sign(c1)*sqrt(disc)) / 2 avoids cancellation.
    let q = if c1 >= 0.0 {
        -(c1 + sq) / 2.0
    } else {
        -(c1 - sq) / 2.0
    };
    let mut roots = if q == 0.0 {
        vec![0.0, 0.0]
    } else {
        vec![q / c2, c0 / q]
    };
    roots.sort_by(|a, b| a.total_cmp(b));
    roots
}

/// Real roots of `c3 t^3 + c2 t^2 + c1 t + c0`.
pub fn cubic_roots(c0: f64, c1: f64, c2: f64, c3: f64) -> Vec<f64> {
    if c3 == 0.0 {
        return quadratic_roots(c0, c1, c2);
    }
    // Normalise and depress: t = u - a/3.
    let a = c2 / c3;
    let b = c1 / c3;
    let c = c0 / c3;
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let shift = -a / 3.0;

    let half_q = q / 2.0;
    let third_p = p / 3.0;
    let disc = half_q * half_q + third_p * third_p * third_p;

    let mut roots = if disc > 0.0 {
        // One real root.
        let sq = disc.sqrt();
        let u = (-half_q + sq).cbrt() + (-half_q - sq).cbrt();
        vec![u + shift]
    } else if p == 0.0 {
        // Triple root.
        vec![(-q).cbrt() + shift]
    } else {
        // Three real roots, trigonometric form.
        let m = 2.0 * (-third_p).sqrt();
        let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
        let theta = arg.acos() / 3.0;
        let tau = 2.0 * std::f64::consts::PI / 3.0;
        vec![
            m * theta.cos() + shift,
            m * (theta - tau).cos() + shift,
            m * (theta + tau).cos() + shift,
        ]
    };
    roots.sort_by(|a, b| a.total_cmp(b));
    roots
}

/// Real roots of `c4 t^4 + ... + c0` via Ferrari's method.
pub fn quartic_roots(c0: f64, c1: f64, c2: f64, c3: f64, c4: f64) -> Vec<f64> {
    if c4 == 0.0 {
        return cubic_roots(c0, c1, c2, c3);
    }
    let coeffs = [c0, c1, c2, c3, c4];
    // Normalise and depress: t = y - A/4.
    let a3 = c3 / c4;
    let a2 = c2 / c4;
    let a1 = c1 / c4;
    let a0 = c0 / c4;
    let p = a2 - 3.0 * a3 * a3 / 8.0;
    let q = a1 - a3 * a2 / 2.0 + a3 * a3 * a3 / 8.0;
    let r = a0 - a3 * a1 / 4.0 + a3 * a3 * a2 / 16.0 - 3.0 * a3 * a3 * a3 * a3 / 256.0;
    let shift = -a3 / 4.0;

    let scale = 1.0 + p.abs() + q.abs() + r.abs();
    let mut ys: Vec<f64> = Vec::with_capacity(4);

    if q.abs() <= 1e-14 * scale {
        // Biquadratic in y^2.
        for u in quadratic_roots(r, p, 1.0) {
            if u >= 0.0 {
                let s = u.sqrt();
                ys.push(s);
                ys.push(-s);
            }
        }
    } else {
        // Resolvent cubic: m^3 + p m^2 + (p^2/4 - r) m - q^2/8 = 0; the
        // largest real root is positive when q != 0.
        let res = cubic_roots(-q * q / 8.0, p * p / 4.0 - r, p, 1.0);
        let m = match res.last() {
            Some(&m) if m > 0.0 => m,
            _ => return Vec::new(),
        };
        let alpha = (2.0 * m).sqrt();
        let beta = (p + 2.0 * m - q / alpha) / 2.0;
        let gamma = (p + 2.0 * m + q / alpha) / 2.0;
        ys.extend(quadratic_roots(beta, alpha, 1.0));
        ys.extend(quadratic_roots(gamma, -alpha, 1.0));
    }

    let mut roots: Vec<f64> = ys
        .into_iter()
        .map(|y| newton_polish(&coeffs, y + shift))
        .collect();
    roots.sort_by(|a, b| a.total_cmp(b));
    roots.dedup_by(|a, b| (*a - *b).abs() <= 1e-12 * (1.0 + a.abs()));
    roots
}

/// Real roots of an arbitrary polynomial up to degree 4. Leading
/// coefficients that are negligible against the largest one are trimmed.
pub fn real_roots(coeffs: &[f64]) -> Vec<f64> {
    let scale = coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs()));
    if scale == 0.0 {
        return Vec::new();
    }
    let mut deg = coeffs.len().saturating_sub(1);
    while deg > 0 && coeffs[deg].abs() <= 1e-14 * scale {
        deg -= 1;
    }
    let c = |i: usize| if i <= deg { coeffs[i] } else { 0.0 };
    match deg {
        0 => Vec::new(),
        1 => vec![-c(0) / c(1)],
        2 => quadratic_roots(c(0), c(1), c(2)),
        3 => cubic_roots(c(0), c(1), c(2), c(3)),
        _ => quartic_roots(c(0), c(1), c(2), c(3), c(4)),
    }
}

fn newton_polish(coeffs: &[f64], mut t: f64) -> f64 {
    for _ in 0..3 {
        let f = eval(coeffs, t);
        let df = eval_deriv(coeffs, t);
        if df == 0.0 {
            break;
        }
        let step = f / df;
        if !step.is_finite() {
            break;
        }
        t -= step;
    }
    t
}
