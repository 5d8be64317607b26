//! The sensor-to-motor control loop.
//!
//! `LineFollower` owns the four hardware seams and runs one calibration
//! sub-protocol followed by an unbounded sequence of `tick` cycles driven
//! by the caller. Each cycle polls the operator buttons, reads the sensor
//! array, turns the position error into a velocity command, allocates it
//! onto the wheels, and refreshes the display.

use crate::utils::{
    controllers::{
        sensors::SENSOR_COUNT, ButtonEvents, ButtonPad, LineReading, LineSensor, MotorDriver,
        Panel, PanelStatus, PanelView,
    },
    math::{
        drive::{DifferentialDrive, MAX_WHEEL_SPEED},
        steering::SteeringLaw,
    },
};

/// Target linear speed loaded at power-on, in motor units.
pub const DEFAULT_TARGET_SPEED: f32 = 200.0;
/// Default proportional steering gain, in motor units per position count.
pub const DEFAULT_STEERING_GAIN: f32 = 0.1;

/// Tuning knobs for a `LineFollower`.
#[derive(Debug, Clone, Copy)]
pub struct FollowerConfig {
    pub initial_speed: f32,
    pub steering_gain: f32,
    pub max_wheel_speed: f32,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            initial_speed: DEFAULT_TARGET_SPEED,
            steering_gain: DEFAULT_STEERING_GAIN,
            max_wheel_speed: MAX_WHEEL_SPEED,
        }
    }
}

/// Operator-visible run state, mutated only by button events.
#[derive(Debug, Clone, Copy)]
pub struct OperatorState {
    pub paused: bool,
    pub target_speed: f32,
}

impl OperatorState {
    /// Power-on state: paused, at the configured default speed.
    pub fn new(initial_speed: f32) -> Self {
        Self {
            paused: true,
            target_speed: initial_speed,
        }
    }

    /// Apply one cycle's button events.
    pub fn apply(
        &mut self,
        events: &ButtonEvents,
    ) {
        if events.toggle_run {
            self.paused = !self.paused;
            tracing::info!(paused = self.paused, "run state toggled");
        }
        if events.slower {
            self.target_speed *= 0.9;
            tracing::info!(target_speed = ?self.target_speed, "speed decreased");
        }
        if events.faster {
            self.target_speed *= 1.1;
            tracing::info!(target_speed = ?self.target_speed, "speed increased");
        }
    }
}

/// Snapshot of one control cycle, for telemetry and tests.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub reading: LineReading,
    /// Velocity command fed to the allocator, as (linear, rotational).
    pub command: (f32, f32),
    /// Wheel speeds sent to the motors, as (left, right).
    pub wheels: (f32, f32),
    pub paused: bool,
}

/// Sensor-to-motor control loop with operator pause and speed control.
pub struct LineFollower<S, M, B, P> {
    sensors: S,
    motors: M,
    buttons: B,
    panel: P,
    state: OperatorState,
    steering: SteeringLaw,
    drive: DifferentialDrive,
}

impl<S, M, B, P> LineFollower<S, M, B, P>
where
    S: LineSensor,
    M: MotorDriver,
    B: ButtonPad,
    P: Panel,
{
    pub fn new(
        sensors: S,
        motors: M,
        buttons: B,
        panel: P,
        config: FollowerConfig,
    ) -> Self {
        Self {
            sensors,
            motors,
            buttons,
            panel,
            state: OperatorState::new(config.initial_speed),
            steering: SteeringLaw::new(config.steering_gain),
            drive: DifferentialDrive::new(config.max_wheel_speed),
        }
    }

    /// Run the calibration sub-protocol until the operator confirms.
    ///
    /// Each pass feeds one raw sample into the sensor calibration and
    /// refreshes the panel; the toggle-run button ends the protocol. The
    /// motors stay unpowered throughout, so the operator can drag the
    /// array across the line by hand.
    pub fn calibrate(&mut self) {
        tracing::info!("calibration started");
        loop {
            if self.buttons.poll().toggle_run {
                break;
            }
            self.sensors.accumulate();
            let reading = self.sensors.read();
            self.panel.draw(&PanelView {
                bars: bar_heights(&reading.values),
                status: PanelStatus::Calibrating,
            });
        }
        tracing::info!("calibration confirmed");
    }

    /// Execute one control cycle and report what happened.
    ///
    /// While paused, the velocity command is forced to (0, 0) no matter
    /// where the line is.
    pub fn tick(&mut self) -> CycleReport {
        let events = self.buttons.poll();
        self.state.apply(&events);

        let reading = self.sensors.read();
        let command = if self.state.paused {
            (0.0, 0.0)
        } else {
            (
                self.state.target_speed,
                self.steering.correction(reading.position),
            )
        };
        let wheels = self.drive.allocate(command.0, command.1);
        self.motors.set_speeds(wheels.0, wheels.1);

        let status = if self.state.paused {
            PanelStatus::Paused
        } else {
            PanelStatus::Speeds {
                lin: command.0 as i16,
                rot: command.1 as i16,
            }
        };
        self.panel.draw(&PanelView {
            bars: bar_heights(&reading.values),
            status,
        });

        CycleReport {
            reading,
            command,
            wheels,
            paused: self.state.paused,
        }
    }

    /// Current operator state.
    pub fn state(&self) -> &OperatorState {
        &self.state
    }
}

/// Display bar height for each calibrated sensor value.
///
/// A fully dark sensor (1000) fills the whole 8-row character cell.
pub fn bar_heights(values: &[u16; SENSOR_COUNT]) -> [u8; SENSOR_COUNT] {
    values.map(|v| (v / 125).min(8) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_heights_span_the_cell() {
        assert_eq!(bar_heights(&[0, 125, 250, 500, 1000]), [0, 1, 2, 4, 8]);
    }

    #[test]
    fn test_operator_starts_paused() {
        let state = OperatorState::new(200.0);
        assert!(state.paused);
        assert_eq!(state.target_speed, 200.0);
    }

    #[test]
    fn test_toggle_flips_pause() {
        let mut state = OperatorState::new(200.0);
        state.apply(&ButtonEvents {
            toggle_run: true,
            ..Default::default()
        });
        assert!(!state.paused);
        state.apply(&ButtonEvents {
            toggle_run: true,
            ..Default::default()
        });
        assert!(state.paused);
    }

    #[test]
    fn test_speed_buttons_scale_by_ten_percent() {
        let mut state = OperatorState::new(200.0);
        state.apply(&ButtonEvents {
            faster: true,
            ..Default::default()
        });
        assert!((state.target_speed - 220.0).abs() < 1e-3);
        state.apply(&ButtonEvents {
            slower: true,
            ..Default::default()
        });
        assert!((state.target_speed - 198.0).abs() < 1e-3);
    }
}
