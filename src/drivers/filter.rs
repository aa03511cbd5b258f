/// Smoothing coefficient applied to the differential capacitance.
pub const CAPACITANCE_ALPHA: f64 = 0.99333;

/// First-order IIR low-pass for the differential capacitance (pF).
///
/// `current = alpha * previous + (1 - alpha) * raw`. The state starts at
/// zero and is kept across re-initialisation of the channel.
#[derive(Debug, Clone, Copy)]
pub struct CapacitanceFilter {
    alpha: f64,
    current: f64,
    previous: f64,
}

impl CapacitanceFilter {
    pub const fn new() -> Self {
        Self::with_alpha(CAPACITANCE_ALPHA)
    }

    pub const fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            current: 0.0,
            previous: 0.0,
        }
    }

    /// Starts the filter from `value` instead of zero.
    pub fn seeded(value: f64) -> Self {
        Self {
            current: value,
            previous: value,
            ..Self::new()
        }
    }

    pub fn filter(&mut self, raw: f64) -> f64 {
        self.current = self.alpha * self.previous + (1.0 - self.alpha) * raw;
        self.previous = self.current;
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
        self.previous = 0.0;
    }
}

impl Default for CapacitanceFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_step_matches_the_update_rule() {
        let mut f = CapacitanceFilter::seeded(1.0);
        let out = f.filter(2.0);
        assert!((out - (0.99333 + 0.00667 * 2.0)).abs() < 1e-12);
        assert_eq!(f.current(), out);
    }

    #[test]
    fn decay_after_100_steps() {
        let mut f = CapacitanceFilter::new();
        let target = 1.5;
        for _ in 0..100 {
            f.filter(target);
        }
        let decay = (f.current() - target).abs() / target;
        assert!((decay - CAPACITANCE_ALPHA.powi(100)).abs() < 1e-9);
        assert!((decay - 0.513).abs() < 1e-3);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut f = CapacitanceFilter::new();
        f.filter(3.0);
        f.reset();
        assert_eq!(f.current(), 0.0);
    }
}
