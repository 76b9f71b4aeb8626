/// Compensated (Kahan) running sum for the absolute simulation time.
///
/// `system_time` grows by millions of small event intervals; a plain f64
/// accumulator loses the low bits long before the run ends. Event `Δt`
/// values themselves stay f64.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimTime {
    value: f64,
    comp: f64,
}

impl SimTime {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_value(t: f64) -> Self {
        Self {
            value: t,
            comp: 0.0,
        }
    }

    /// The current absolute time.
    #[inline]
    pub fn current(&self) -> f64 {
        self.value
    }

    /// Advance by a non-negative interval.
    #[inline]
    pub fn advance(&mut self, dt: f64) {
        let y = dt - self.comp;
        let t = self.value + y;
        self.comp = (t - self.value) - y;
        self.value = t;
    }

    /// Advance to an absolute time; a target marginally in the past (from
    /// the event-time tolerance) is treated as "now".
    #[inline]
    pub fn advance_to(&mut self, t: f64) {
        let dt = t - self.value;
        if dt > 0.0 {
            self.advance(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(SimTime::zero().current(), 0.0);
    }

    #[test]
    fn compensation_beats_plain_sum() {
        let mut kahan = SimTime::zero();
        let mut plain = 0.0f64;
        let dt = 1e-10;
        for _ in 0..10_000_000 {
            kahan.advance(dt);
            plain += dt;
        }
        let exact = 1e-10 * 1e7;
        assert!((kahan.current() - exact).abs() <= (plain - exact).abs());
        assert!((kahan.current() - exact).abs() < 1e-12);
    }

    #[test]
    fn advance_to_ignores_past_targets() {
        let mut t = SimTime::from_value(5.0);
        t.advance_to(5.0 - 1e-13);
        assert_eq!(t.current(), 5.0);
        t.advance_to(6.0);
        assert!((t.current() - 6.0).abs() < 1e-15);
    }
}
