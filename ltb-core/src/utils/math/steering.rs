//! Proportional steering from a line-position estimate.
//!
//! A single gain maps the position error into a rotational speed command.
//! There is no integral or derivative term and no internal state; tracking
//! accuracy is traded for simplicity.

/// Position value when the line sits under the middle of the array.
const CENTER_POSITION: f32 = 2000.0;

/// Proportional line-position-to-rotation controller.
pub struct SteeringLaw {
    /// Motor units of rotation per position count of error
    gain: f32,
}

impl SteeringLaw {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    /// Rotational speed command for the given line position.
    ///
    /// Line position grows to the right while positive rotation is
    /// counter-clockwise, so the error is negated: a line drifting right
    /// under the array yields a correction that steers back toward it.
    /// A centered position yields zero.
    pub fn correction(&self, position: u16) -> f32 {
        self.gain * -(position as f32 - CENTER_POSITION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_line_needs_no_correction() {
        assert_eq!(SteeringLaw::new(0.1).correction(2000), 0.0);
        assert_eq!(SteeringLaw::new(2.5).correction(2000), 0.0);
    }

    #[test]
    fn test_correction_opposes_position_error() {
        let steering = SteeringLaw::new(0.1);
        assert_eq!(steering.correction(0), 200.0);
        assert_eq!(steering.correction(4000), -200.0);
    }

    #[test]
    fn test_correction_scales_with_gain() {
        assert_eq!(SteeringLaw::new(0.2).correction(1000), 200.0);
    }
}
