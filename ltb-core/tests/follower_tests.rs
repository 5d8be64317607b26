use std::cell::RefCell;
use std::rc::Rc;

use ltb_core::utils::controllers::follower::{FollowerConfig, LineFollower};
use ltb_core::utils::controllers::{
    ButtonEvents, ButtonPad, LineReading, LineSensor, MotorDriver, Panel, PanelStatus, PanelView,
};

const TOGGLE: ButtonEvents = ButtonEvents {
    toggle_run: true,
    slower: false,
    faster: false,
};
const FASTER: ButtonEvents = ButtonEvents {
    toggle_run: false,
    slower: false,
    faster: true,
};
const SLOWER: ButtonEvents = ButtonEvents {
    toggle_run: false,
    slower: true,
    faster: false,
};

/// Everything the fakes record during a run.
#[derive(Default)]
struct Recorded {
    wheels: Vec<(f32, f32)>,
    frames: Vec<PanelView>,
    accumulated: u32,
}

struct FakeSensor {
    log: Rc<RefCell<Recorded>>,
    readings: Vec<LineReading>,
    cursor: usize,
}

impl LineSensor for FakeSensor {
    fn accumulate(&mut self) {
        self.log.borrow_mut().accumulated += 1;
    }

    fn read(&mut self) -> LineReading {
        let reading = self.readings[self.cursor.min(self.readings.len() - 1)];
        self.cursor += 1;
        reading
    }
}

struct FakeMotors(Rc<RefCell<Recorded>>);

impl MotorDriver for FakeMotors {
    fn set_speeds(&mut self, left: f32, right: f32) {
        self.0.borrow_mut().wheels.push((left, right));
    }
}

struct ScriptedPad {
    script: Vec<ButtonEvents>,
    cursor: usize,
}

impl ButtonPad for ScriptedPad {
    fn poll(&mut self) -> ButtonEvents {
        let events = self.script.get(self.cursor).copied().unwrap_or_default();
        self.cursor += 1;
        events
    }
}

struct FakePanel(Rc<RefCell<Recorded>>);

impl Panel for FakePanel {
    fn draw(&mut self, view: &PanelView) {
        self.0.borrow_mut().frames.push(*view);
    }
}

fn reading(position: u16) -> LineReading {
    LineReading {
        values: [0, 0, 1000, 0, 0],
        position,
    }
}

type TestFollower = LineFollower<FakeSensor, FakeMotors, ScriptedPad, FakePanel>;

fn follower(
    script: Vec<ButtonEvents>,
    readings: Vec<LineReading>,
) -> (TestFollower, Rc<RefCell<Recorded>>) {
    let log = Rc::new(RefCell::new(Recorded::default()));
    let bot = LineFollower::new(
        FakeSensor {
            log: log.clone(),
            readings,
            cursor: 0,
        },
        FakeMotors(log.clone()),
        ScriptedPad { script, cursor: 0 },
        FakePanel(log.clone()),
        FollowerConfig::default(),
    );
    (bot, log)
}

#[test]
fn test_starts_paused_with_stopped_wheels() {
    let (mut bot, log) = follower(vec![], vec![reading(2000)]);
    let report = bot.tick();

    assert!(report.paused);
    assert_eq!(report.command, (0.0, 0.0));
    assert_eq!(log.borrow().wheels, vec![(0.0, 0.0)]);
    assert_eq!(log.borrow().frames[0].status, PanelStatus::Paused);
}

#[test]
fn test_toggle_starts_the_run() {
    let (mut bot, log) = follower(vec![TOGGLE], vec![reading(2000)]);
    let report = bot.tick();

    assert!(!report.paused);
    assert_eq!(report.command, (200.0, 0.0));
    assert_eq!(log.borrow().wheels, vec![(200.0, 200.0)]);
}

#[test]
fn test_steering_flows_through_allocation() {
    // Line all the way left: full positive correction saturates the right
    // wheel and the allocator strips the forward component from the left
    let (mut bot, log) = follower(vec![TOGGLE], vec![reading(0)]);
    let report = bot.tick();

    assert_eq!(report.command, (200.0, 200.0));
    assert_eq!(log.borrow().wheels, vec![(0.0, 400.0)]);

    let (mut bot, log) = follower(vec![TOGGLE], vec![reading(4000)]);
    bot.tick();
    assert_eq!(log.borrow().wheels, vec![(400.0, 0.0)]);
}

#[test]
fn test_pause_forces_zero_command_anywhere() {
    let script = vec![TOGGLE, ButtonEvents::default(), TOGGLE];
    let (mut bot, log) = follower(script, vec![reading(0)]);

    bot.tick();
    bot.tick();
    let report = bot.tick();

    assert!(report.paused);
    assert_eq!(report.command, (0.0, 0.0));
    assert_eq!(
        log.borrow().wheels,
        vec![(0.0, 400.0), (0.0, 400.0), (0.0, 0.0)]
    );
}

#[test]
fn test_speed_buttons_adjust_the_target() {
    let (mut bot, _log) = follower(vec![TOGGLE, FASTER, SLOWER], vec![reading(2000)]);

    bot.tick();
    let report = bot.tick();
    assert!((report.command.0 - 220.0).abs() < 1e-3);
    let report = bot.tick();
    assert!((report.command.0 - 198.0).abs() < 1e-3);
}

#[test]
fn test_panel_shows_bars_and_speeds() {
    let readings = vec![LineReading {
        values: [1000, 500, 250, 125, 0],
        position: 2000,
    }];
    let (mut bot, log) = follower(vec![TOGGLE], readings);
    bot.tick();

    let frames = &log.borrow().frames;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bars, [8, 4, 2, 1, 0]);
    assert_eq!(frames[0].status, PanelStatus::Speeds { lin: 200, rot: 0 });
}

#[test]
fn test_calibration_runs_until_confirmed() {
    let script = vec![
        ButtonEvents::default(),
        ButtonEvents::default(),
        ButtonEvents::default(),
        TOGGLE,
    ];
    let (mut bot, log) = follower(script, vec![reading(2000)]);
    bot.calibrate();

    let log = log.borrow();
    assert_eq!(log.accumulated, 3);
    assert_eq!(log.frames.len(), 3);
    assert!(log
        .frames
        .iter()
        .all(|frame| frame.status == PanelStatus::Calibrating));
    // Calibration never powers the motors
    assert!(log.wheels.is_empty());
}
