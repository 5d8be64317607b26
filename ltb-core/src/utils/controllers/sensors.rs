//! Reflectance sensor array with min/max calibration and line-position
//! estimation.
//!
//! Raw acquisition is split from the estimation math: anything that
//! implements `ReflectanceSource` (the ADS7830 front-end here, or a
//! simulated array on a workstation) can sit under a `CalibratedArray`.
//! Calibration is a per-sensor min/max normalization learned by sampling
//! while the array is dragged across the line.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;

use crate::utils::controllers::{LineReading, LineSensor};

/// Number of sensors in the array, left to right.
pub const SENSOR_COUNT: usize = 5;

/// Line position when the line sits under the middle sensor.
const CENTER: u16 = 2000;
/// Calibrated values at or below this are treated as noise.
const NOISE_FLOOR: u16 = 50;
/// At least one sensor must exceed this for the line to count as seen.
const ON_LINE_THRESHOLD: u16 = 200;

/// Uncalibrated access to the raw sensor array.
pub trait ReflectanceSource {
    /// Sample all sensors once, in device units.
    fn sample(&mut self) -> [u16; SENSOR_COUNT];
}

/// Per-sensor min/max bounds learned during the calibration sub-protocol.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    min: [u16; SENSOR_COUNT],
    max: [u16; SENSOR_COUNT],
}

impl Calibration {
    pub fn new() -> Self {
        Self {
            min: [u16::MAX; SENSOR_COUNT],
            max: [0; SENSOR_COUNT],
        }
    }

    /// Widen the per-sensor bounds with one raw sample.
    pub fn update(
        &mut self,
        raw: &[u16; SENSOR_COUNT],
    ) {
        for (i, &value) in raw.iter().enumerate() {
            if value < self.min[i] {
                self.min[i] = value;
            }
            if value > self.max[i] {
                self.max[i] = value;
            }
        }
    }

    /// Map a raw value onto the calibrated [0, 1000] range.
    ///
    /// Values beyond the learned bounds saturate. A sensor whose bounds
    /// never separated (uncalibrated, or a dead channel) reads 0.
    pub fn normalize(
        &self,
        index: usize,
        raw: u16,
    ) -> u16 {
        let (min, max) = (self.min[index], self.max[index]);
        if max <= min {
            return 0;
        }
        let clamped = raw.clamp(min, max);
        ((clamped - min) as u32 * 1000 / (max - min) as u32) as u16
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibrated sensor array deriving a line position in [0, 4000].
pub struct CalibratedArray<S> {
    source: S,
    calibration: Calibration,
    last_position: u16,
}

impl<S: ReflectanceSource> CalibratedArray<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            calibration: Calibration::new(),
            last_position: CENTER,
        }
    }

    /// Weighted average of sensor indices, each worth 1000 position counts.
    ///
    /// When no sensor clears the on-line threshold the line has been lost;
    /// the estimate snaps to whichever edge the line was last seen toward,
    /// so steering keeps turning back to it.
    fn line_position(
        &mut self,
        values: &[u16; SENSOR_COUNT],
    ) -> u16 {
        let mut on_line = false;
        let mut weighted: u32 = 0;
        let mut sum: u32 = 0;
        for (i, &value) in values.iter().enumerate() {
            if value > ON_LINE_THRESHOLD {
                on_line = true;
            }
            if value > NOISE_FLOOR {
                weighted += value as u32 * (i as u32 * 1000);
                sum += value as u32;
            }
        }

        if !on_line {
            return if self.last_position < CENTER { 0 } else { 4000 };
        }

        let position = (weighted / sum) as u16;
        self.last_position = position;
        position
    }
}

impl<S: ReflectanceSource> LineSensor for CalibratedArray<S> {
    fn accumulate(&mut self) {
        let raw = self.source.sample();
        self.calibration.update(&raw);
    }

    fn read(&mut self) -> LineReading {
        let raw = self.source.sample();
        let mut values = [0u16; SENSOR_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.calibration.normalize(i, raw[i]);
        }
        let position = self.line_position(&values);
        LineReading { values, position }
    }
}

/// Default bus address of the ADC front-end.
pub const ADC_ADDRESS: u8 = 0x48;

/// Single-ended channel-select bits for array channels 0 through 4.
///
/// The ADS7830 interleaves even and odd inputs in its select encoding, so
/// consecutive array indices do not map to consecutive bit patterns.
const CHANNEL_SELECT: [u8; SENSOR_COUNT] = [0b000, 0b100, 0b001, 0b101, 0b010];

/// Command base: single-ended mode, internal reference off, converter on.
const ADC_COMMAND_BASE: u8 = 0x84;

/// ADS7830 8-bit I2C ADC reading the reflectance array.
///
/// Shares the I2C bus with the other peripherals through a `RefCellDevice`.
/// A failed bus transaction is logged and the previous sample is held, so
/// the control loop never observes an error.
pub struct Ads7830<'a, I2C> {
    i2c: RefCellDevice<'a, I2C>,
    last_sample: [u16; SENSOR_COUNT],
}

impl<'a, I2C, E> Ads7830<'a, I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(bus: &'a RefCell<I2C>) -> Self {
        Self {
            i2c: RefCellDevice::new(bus),
            last_sample: [0; SENSOR_COUNT],
        }
    }

    fn read_channel(
        &mut self,
        index: usize,
    ) -> Result<u8, E> {
        let command = ADC_COMMAND_BASE | (CHANNEL_SELECT[index] << 4);
        let mut buffer = [0u8; 1];
        self.i2c.write_read(ADC_ADDRESS, &[command], &mut buffer)?;
        Ok(buffer[0])
    }

    /// Sample every channel, failing on the first bus error.
    pub fn try_sample(&mut self) -> Result<[u16; SENSOR_COUNT], E> {
        let mut raw = [0u16; SENSOR_COUNT];
        for (index, slot) in raw.iter_mut().enumerate() {
            *slot = self.read_channel(index)? as u16;
        }
        Ok(raw)
    }
}

impl<'a, I2C, E> ReflectanceSource for Ads7830<'a, I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    fn sample(&mut self) -> [u16; SENSOR_COUNT] {
        match self.try_sample() {
            Ok(raw) => {
                self.last_sample = raw;
                raw
            }
            Err(error) => {
                tracing::error!(?error, "sensor read failed, holding last sample");
                self.last_sample
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSource {
        frames: [[u16; SENSOR_COUNT]; 8],
        cursor: usize,
    }

    impl ScriptedSource {
        fn new(frames: [[u16; SENSOR_COUNT]; 8]) -> Self {
            Self { frames, cursor: 0 }
        }
    }

    impl ReflectanceSource for ScriptedSource {
        fn sample(&mut self) -> [u16; SENSOR_COUNT] {
            let frame = self.frames[self.cursor];
            self.cursor = (self.cursor + 1).min(self.frames.len() - 1);
            frame
        }
    }

    /// Array calibrated to [20, 220] on every channel, then fed `frames`.
    fn calibrated_with(frames: [[u16; SENSOR_COUNT]; 6]) -> CalibratedArray<ScriptedSource> {
        let mut all = [[0u16; SENSOR_COUNT]; 8];
        all[0] = [20; SENSOR_COUNT];
        all[1] = [220; SENSOR_COUNT];
        all[2..].copy_from_slice(&frames);
        let mut array = CalibratedArray::new(ScriptedSource::new(all));
        array.accumulate();
        array.accumulate();
        array
    }

    #[test]
    fn test_normalize_maps_bounds_to_full_scale() {
        let mut cal = Calibration::new();
        cal.update(&[20; SENSOR_COUNT]);
        cal.update(&[220; SENSOR_COUNT]);
        assert_eq!(cal.normalize(0, 20), 0);
        assert_eq!(cal.normalize(0, 220), 1000);
        assert_eq!(cal.normalize(0, 120), 500);
        assert_eq!(cal.normalize(0, 250), 1000);
        assert_eq!(cal.normalize(0, 5), 0);
    }

    #[test]
    fn test_uncalibrated_channel_reads_zero() {
        let cal = Calibration::new();
        assert_eq!(cal.normalize(2, 140), 0);
    }

    #[test]
    fn test_centered_line_reads_2000() {
        let mut array = calibrated_with([[20, 20, 220, 20, 20]; 6]);
        let reading = array.read();
        assert_eq!(reading.values, [0, 0, 1000, 0, 0]);
        assert_eq!(reading.position, 2000);
    }

    #[test]
    fn test_line_between_sensors_interpolates() {
        let mut array = calibrated_with([[20, 220, 220, 20, 20]; 6]);
        assert_eq!(array.read().position, 1500);
    }

    #[test]
    fn test_lost_line_snaps_to_last_side() {
        let mut array = calibrated_with([
            [20, 220, 20, 20, 20],
            [20, 20, 20, 20, 20],
            [20, 20, 20, 220, 20],
            [20, 20, 20, 20, 20],
            [20, 20, 20, 20, 20],
            [20, 20, 20, 20, 20],
        ]);
        assert_eq!(array.read().position, 1000);
        assert_eq!(array.read().position, 0);
        assert_eq!(array.read().position, 3000);
        assert_eq!(array.read().position, 4000);
    }
}
