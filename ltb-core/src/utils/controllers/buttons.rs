//! Operator buttons with edge detection and debouncing.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;

use crate::utils::controllers::{ButtonEvents, ButtonPad};

/// Window within which level changes are ignored after an accepted edge.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(10);

/// Single active-low push button reporting one event per physical press.
pub struct DebouncedButton<P> {
    pin: P,
    pressed: bool,
    last_edge: Instant,
}

impl<P: InputPin> DebouncedButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            pressed: false,
            last_edge: Instant::from_ticks(0),
        }
    }

    /// True exactly once per press; releases never report.
    pub fn was_pressed(&mut self) -> bool {
        let level = self.pin.is_low().unwrap_or(false);
        if level == self.pressed {
            return false;
        }
        let now = Instant::now();
        if now.duration_since(self.last_edge) < DEBOUNCE_WINDOW {
            // Contact bounce shortly after an accepted edge.
            return false;
        }
        self.pressed = level;
        self.last_edge = now;
        level
    }
}

/// Three-button operator pad: run/pause, slower, faster.
pub struct ButtonBoard<A, B, C> {
    toggle_run: DebouncedButton<A>,
    slower: DebouncedButton<B>,
    faster: DebouncedButton<C>,
}

impl<A, B, C> ButtonBoard<A, B, C>
where
    A: InputPin,
    B: InputPin,
    C: InputPin,
{
    pub fn new(
        toggle_run: A,
        slower: B,
        faster: C,
    ) -> Self {
        Self {
            toggle_run: DebouncedButton::new(toggle_run),
            slower: DebouncedButton::new(slower),
            faster: DebouncedButton::new(faster),
        }
    }
}

impl<A, B, C> ButtonPad for ButtonBoard<A, B, C>
where
    A: InputPin,
    B: InputPin,
    C: InputPin,
{
    fn poll(&mut self) -> ButtonEvents {
        ButtonEvents {
            toggle_run: self.toggle_run.was_pressed(),
            slower: self.slower.was_pressed(),
            faster: self.faster.was_pressed(),
        }
    }
}
