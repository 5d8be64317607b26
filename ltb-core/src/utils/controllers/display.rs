//! 8x2 character LCD behind a PCF8574 I2C backpack.
//!
//! The HD44780 controller runs in 4-bit mode; each byte goes out as two
//! enable-pulsed nibble writes through the expander. Seven custom glyphs
//! hold the partial bar-graph columns used for the sensor view; height 0
//! is a blank and height 8 is the character set's full block.

use core::cell::RefCell;
use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use heapless::String;

use crate::utils::controllers::{Panel, PanelStatus, PanelView};

/// Default bus address of the PCF8574 backpack.
pub const LCD_ADDRESS: u8 = 0x27;

/// Characters per display row.
pub const LCD_COLUMNS: u8 = 8;

// PCF8574 bit assignments.
const RS: u8 = 0x01;
const ENABLE: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

// HD44780 commands.
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_CGRAM: u8 = 0x40;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM offset of the second row.
const ROW_OFFSET: u8 = 0x40;

/// Character LCD rendering the sensor bars and the status line.
pub struct CharacterLcd<'a, I2C, D> {
    i2c: RefCellDevice<'a, I2C>,
    delay: D,
}

impl<'a, I2C, D, E> CharacterLcd<'a, I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    pub fn new(
        bus: &'a RefCell<I2C>,
        delay: D,
    ) -> Self {
        Self {
            i2c: RefCellDevice::new(bus),
            delay,
        }
    }

    /// Bring the controller into 4-bit mode and load the bar glyphs.
    pub fn init(&mut self) -> Result<(), E> {
        self.delay.delay_ms(50);
        // 8-bit reset sequence, then the switch to 4-bit mode.
        self.write_nibble(0x03, false)?;
        self.delay.delay_ms(5);
        self.write_nibble(0x03, false)?;
        self.delay.delay_us(150);
        self.write_nibble(0x03, false)?;
        self.write_nibble(0x02, false)?;

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_CLEAR)?;
        self.delay.delay_ms(2);
        self.command(CMD_ENTRY_MODE)?;
        self.load_bar_glyphs()?;
        tracing::info!("display initialized");
        Ok(())
    }

    pub fn set_cursor(
        &mut self,
        column: u8,
        row: u8,
    ) -> Result<(), E> {
        self.command(CMD_SET_DDRAM | (column + row * ROW_OFFSET))
    }

    fn command(
        &mut self,
        byte: u8,
    ) -> Result<(), E> {
        self.write_byte(byte, false)
    }

    fn data(
        &mut self,
        byte: u8,
    ) -> Result<(), E> {
        self.write_byte(byte, true)
    }

    fn write_byte(
        &mut self,
        byte: u8,
        is_data: bool,
    ) -> Result<(), E> {
        self.write_nibble(byte >> 4, is_data)?;
        self.write_nibble(byte & 0x0F, is_data)
    }

    /// One expander write with the enable line pulsed high, then low.
    fn write_nibble(
        &mut self,
        nibble: u8,
        is_data: bool,
    ) -> Result<(), E> {
        let mut bits = (nibble << 4) | BACKLIGHT;
        if is_data {
            bits |= RS;
        }
        self.i2c.write(LCD_ADDRESS, &[bits | ENABLE])?;
        self.i2c.write(LCD_ADDRESS, &[bits])?;
        self.delay.delay_us(50);
        Ok(())
    }

    /// Fill CGRAM slots 0 through 6 with bars of height 1 through 7.
    fn load_bar_glyphs(&mut self) -> Result<(), E> {
        for height in 1..8u8 {
            self.command(CMD_SET_CGRAM | ((height - 1) << 3))?;
            for row in 0..8u8 {
                let filled = 8 - row <= height;
                self.data(if filled { 0x1F } else { 0x00 })?;
            }
        }
        Ok(())
    }

    fn try_draw(
        &mut self,
        view: &PanelView,
    ) -> Result<(), E> {
        self.set_cursor(0, 0)?;
        for &height in view.bars.iter() {
            self.data(bar_glyph(height))?;
        }
        for _ in view.bars.len() as u8..LCD_COLUMNS {
            self.data(b' ')?;
        }

        self.set_cursor(0, 1)?;
        for &byte in status_line(&view.status).as_bytes() {
            self.data(byte)?;
        }
        Ok(())
    }
}

impl<'a, I2C, D, E> Panel for CharacterLcd<'a, I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    fn draw(&mut self, view: &PanelView) {
        if let Err(error) = self.try_draw(view) {
            tracing::error!(?error, "display write failed");
        }
    }
}

/// Character code rendering the given bar height.
pub fn bar_glyph(height: u8) -> u8 {
    match height {
        0 => b' ',
        h if h >= 8 => 0xFF,
        h => h - 1,
    }
}

/// Fixed-width second-row text for the given status.
pub fn status_line(status: &PanelStatus) -> String<8> {
    let mut line = String::new();
    match status {
        PanelStatus::Calibrating => {
            let _ = line.push_str("CAL     ");
        }
        PanelStatus::Paused => {
            let _ = line.push_str("PAUSED  ");
        }
        PanelStatus::Speeds { lin, rot } => {
            let _ = write!(line, "{:>4}{:>4}", lin, rot);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_glyphs_cover_all_heights() {
        assert_eq!(bar_glyph(0), b' ');
        assert_eq!(bar_glyph(1), 0);
        assert_eq!(bar_glyph(7), 6);
        assert_eq!(bar_glyph(8), 0xFF);
    }

    #[test]
    fn test_status_lines_are_fixed_width() {
        assert_eq!(status_line(&PanelStatus::Paused).as_str(), "PAUSED  ");
        assert_eq!(status_line(&PanelStatus::Calibrating).as_str(), "CAL     ");
        assert_eq!(
            status_line(&PanelStatus::Speeds { lin: 200, rot: -150 }).as_str(),
            " 200-150"
        );
        assert_eq!(
            status_line(&PanelStatus::Speeds { lin: 0, rot: 0 }).as_str(),
            "   0   0"
        );
    }
}
