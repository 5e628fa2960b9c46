use super::config::Shape;
use super::Float;

/// Phase advance per sample for the given shape.
///
/// Only the sine recurrence can run backwards; the other kernels compare the
/// phase against fixed thresholds and need it to grow.
pub fn delta_phase(frequency: Float, sample_interval: Float, shape: Shape) -> Float {
    let delta = frequency * sample_interval;
    if delta < 0.0 && shape != Shape::Sine {
        -delta
    } else {
        delta
    }
}

/// Fractional cycle position carried from one buffer to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Phase {
    value: Float, // always in [0, 1)
}

impl Phase {
    pub fn new() -> Self {
        Phase { value: 0.0 }
    }

    pub fn value(&self) -> Float {
        self.value
    }

    /// Moves the phase on by `num_samples` steps of `delta` and wraps it
    /// back into [0, 1).
    pub fn advance(&mut self, delta: Float, num_samples: usize) {
        self.value += delta * num_samples as Float;
        self.value -= self.value.floor();
        // floor() of a tiny negative value leaves exactly 1.0 behind, and an
        // overflowed step leaves NaN
        if !(self.value >= 0.0 && self.value < 1.0) {
            self.value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_overflowed_step_resets_phase() {
        let mut phase = Phase::new();
        phase.advance(0.3, 1);
        phase.advance(Float::INFINITY, 1);
        assert_eq!(phase.value(), 0.0);
        phase.advance(Float::NAN, 10);
        assert_eq!(phase.value(), 0.0);
        phase.advance(0.25, 1);
        assert_eq!(phase.value(), 0.25);
    }

    #[test]
    fn test_phase_stays_in_unit_interval() {
        let mut rng = rand::thread_rng();
        let mut phase = Phase::new();
        for _ in 0..10000 {
            let delta = rng.gen_range(-3.0..3.0);
            let len = rng.gen_range(0..5000);
            phase.advance(delta, len);
            assert!(phase.value() >= 0.0 && phase.value() < 1.0, "phase {}", phase.value());
        }
    }

    #[test]
    fn test_phase_wraps() {
        let mut phase = Phase::new();
        phase.advance(0.4, 1000);
        assert!(phase.value().abs() < 1e-9);
        phase.advance(0.3, 3);
        assert!((phase.value() - 0.9).abs() < 1e-9);
        phase.advance(-0.2, 1);
        assert!((phase.value() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_negative_step_stays_below_one() {
        let mut phase = Phase::new();
        phase.advance(-1e-20, 1);
        assert!(phase.value() < 1.0);
    }

    #[test]
    fn test_delta_phase_sign() {
        let dt = 1.0 / 4.0;
        assert_eq!(delta_phase(-0.5, dt, Shape::Sine), -0.125);
        assert_eq!(delta_phase(-0.5, dt, Shape::Square), 0.125);
        assert_eq!(delta_phase(-0.5, dt, Shape::Lrs), 0.125);
        assert_eq!(delta_phase(0.5, dt, Shape::Triangle), 0.125);
    }
}
