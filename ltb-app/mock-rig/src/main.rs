//! Host-side rig running the real control loop against a simulated track.
//!
//! The rig drags the sensor array across the line for calibration, starts
//! the robot, and integrates a small differential-drive pose model for a
//! configurable number of control cycles, reporting how far the robot
//! strayed from the line.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::rc::Rc;

use clap::Parser;
use ltb_core::utils::controllers::follower::{FollowerConfig, LineFollower};
use ltb_core::utils::controllers::sensors::{CalibratedArray, ReflectanceSource, SENSOR_COUNT};
use ltb_core::utils::controllers::{ButtonEvents, ButtonPad, MotorDriver, Panel, PanelView};
use ltb_core::utils::math::drive::MAX_WHEEL_SPEED;
use tracing::{debug, info, warn};

/// Control cycle period (s).
const TICK_SECONDS: f32 = 0.01;
/// Spacing between neighboring sensors (m).
const SENSOR_PITCH: f32 = 0.0095;
/// Sensor array distance ahead of the axle (m).
const SENSOR_FORWARD: f32 = 0.03;
/// Distance between the wheels (m).
const WHEEL_BASE: f32 = 0.09;
/// Wheel surface speed at a full-scale command (m/s).
const FULL_SCALE_SPEED: f32 = 0.35;
/// Gaussian half-width of the painted line (m).
const LINE_SIGMA: f32 = 0.006;
/// Raw ADC level over bare floor and over the line center.
const RAW_FLOOR: f32 = 25.0;
const RAW_LINE: f32 = 230.0;
/// Calibration polls before the scripted operator confirms.
const CALIBRATION_POLLS: u32 = 120;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// control cycles to run after calibration
    #[clap(long, default_value_t = 3000)]
    ticks: u32,
    /// lateral amplitude of the track centerline (m)
    #[clap(long, default_value_t = 0.04)]
    amplitude: f32,
    /// wavelength of the track centerline (m)
    #[clap(long, default_value_t = 1.5)]
    wavelength: f32,
    /// proportional steering gain
    #[clap(long, default_value_t = 0.1)]
    gain: f32,
    /// speed-up button presses issued after the start
    #[clap(long, default_value_t = 0)]
    faster: u32,
}

/// Robot pose and track model shared by the fake devices.
struct World {
    x: f32,
    y: f32,
    heading: f32,
    left_cmd: f32,
    right_cmd: f32,
    amplitude: f32,
    wavelength: f32,
    /// While true, samples come from a lateral drag instead of the pose.
    calibrating: bool,
    sweep_step: u32,
}

impl World {
    fn new(opts: &Opts) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            heading: 0.0,
            left_cmd: 0.0,
            right_cmd: 0.0,
            amplitude: opts.amplitude,
            wavelength: opts.wavelength,
            calibrating: true,
            sweep_step: 0,
        }
    }

    /// Track centerline offset at a given distance along the course.
    fn centerline(&self, x: f32) -> f32 {
        self.amplitude * (2.0 * PI * x / self.wavelength).sin()
    }

    /// Reflectance of each sensor at the current pose (or drag position).
    fn sample_sensors(&mut self) -> [u16; SENSOR_COUNT] {
        let (x, y, heading) = if self.calibrating {
            self.sweep_step += 1;
            // ±3 cm drag across the line, one step per sample
            (0.0, 0.03 * (self.sweep_step as f32 * PI / 40.0).sin(), 0.0)
        } else {
            (self.x, self.y, self.heading)
        };

        let mut raw = [0u16; SENSOR_COUNT];
        for (i, slot) in raw.iter_mut().enumerate() {
            // +y is left; index 0 is the leftmost sensor
            let lateral = (2.0 - i as f32) * SENSOR_PITCH;
            let sx = x + heading.cos() * SENSOR_FORWARD - heading.sin() * lateral;
            let sy = y + heading.sin() * SENSOR_FORWARD + heading.cos() * lateral;
            let distance = sy - self.centerline(sx);
            let level =
                RAW_FLOOR + (RAW_LINE - RAW_FLOOR) * (-(distance / LINE_SIGMA).powi(2) / 2.0).exp();
            *slot = level as u16;
        }
        raw
    }

    /// Advance the pose by one control period.
    fn step(&mut self) {
        let left = self.left_cmd / MAX_WHEEL_SPEED * FULL_SCALE_SPEED;
        let right = self.right_cmd / MAX_WHEEL_SPEED * FULL_SCALE_SPEED;
        let v = (left + right) / 2.0;
        let omega = (right - left) / WHEEL_BASE;
        self.x += v * self.heading.cos() * TICK_SECONDS;
        self.y += v * self.heading.sin() * TICK_SECONDS;
        self.heading += omega * TICK_SECONDS;
    }

    /// Lateral distance between the axle and the line.
    fn offset(&self) -> f32 {
        self.y - self.centerline(self.x)
    }
}

struct SimReflectance(Rc<RefCell<World>>);

impl ReflectanceSource for SimReflectance {
    fn sample(&mut self) -> [u16; SENSOR_COUNT] {
        self.0.borrow_mut().sample_sensors()
    }
}

struct SimMotors(Rc<RefCell<World>>);

impl MotorDriver for SimMotors {
    fn set_speeds(&mut self, left: f32, right: f32) {
        let mut world = self.0.borrow_mut();
        world.left_cmd = left;
        world.right_cmd = right;
    }
}

/// Scripted operator: one queued event per poll, idle afterwards.
struct ScriptedPad {
    script: VecDeque<ButtonEvents>,
}

impl ButtonPad for ScriptedPad {
    fn poll(&mut self) -> ButtonEvents {
        self.script.pop_front().unwrap_or_default()
    }
}

/// Panel that logs an occasional frame instead of driving an LCD.
struct ConsolePanel {
    frames: u32,
}

impl Panel for ConsolePanel {
    fn draw(&mut self, view: &PanelView) {
        self.frames += 1;
        if self.frames % 50 == 0 {
            debug!(bars = ?view.bars, status = ?view.status, "panel frame");
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts: Opts = Opts::parse();

    let world = Rc::new(RefCell::new(World::new(&opts)));

    // Operator script: drag the array across the line, confirm calibration,
    // start the robot, then issue any requested speed-up presses.
    let mut script = VecDeque::new();
    for _ in 0..CALIBRATION_POLLS {
        script.push_back(ButtonEvents::default());
    }
    script.push_back(ButtonEvents {
        toggle_run: true,
        ..Default::default()
    });
    script.push_back(ButtonEvents {
        toggle_run: true,
        ..Default::default()
    });
    for _ in 0..opts.faster {
        script.push_back(ButtonEvents {
            faster: true,
            ..Default::default()
        });
    }

    let sensors = CalibratedArray::new(SimReflectance(world.clone()));
    let motors = SimMotors(world.clone());
    let pad = ScriptedPad { script };
    let panel = ConsolePanel { frames: 0 };

    let mut bot = LineFollower::new(
        sensors,
        motors,
        pad,
        panel,
        FollowerConfig {
            steering_gain: opts.gain,
            ..Default::default()
        },
    );

    info!("dragging the sensor array across the line");
    bot.calibrate();
    world.borrow_mut().calibrating = false;

    info!(ticks = opts.ticks, "following");
    let mut max_offset: f32 = 0.0;
    for tick in 0..opts.ticks {
        let report = bot.tick();
        world.borrow_mut().step();

        let offset = world.borrow().offset();
        // Skip the initial transient before scoring tracking error
        if tick > 200 {
            max_offset = max_offset.max(offset.abs());
        }
        if tick % 250 == 0 {
            debug!(
                tick,
                offset = offset as f64,
                position = report.reading.position,
                wheels = ?report.wheels,
                "cycle"
            );
        }
    }

    let final_offset = world.borrow().offset();
    info!(
        final_offset = final_offset as f64,
        max_offset = max_offset as f64,
        "run complete"
    );
    if max_offset > 0.02 {
        warn!("robot strayed more than 2 cm from the line");
    }
}
