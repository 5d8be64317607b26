//! PWM motor board for the two drive wheels.
//!
//! Both motors hang off a PCA9685: one (phase, enable) channel pair each,
//! phase selecting the direction and enable carrying the duty cycle. The
//! wheel-speed range [-400, 400] maps linearly onto the duty range.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use pwm_pca9685::{Address as PwmAddress, Channel, Error as PwmError, Pca9685};

use crate::utils::controllers::MotorDriver;
use crate::utils::math::drive::MAX_WHEEL_SPEED;

/// Default bus address of the motor board.
pub const MOTOR_PWM_ADDRESS: u8 = 0x40;

const MAX_DUTY: u16 = 4095;

/// Two-motor PWM driver implementing the actuation interface.
pub struct MotorBoard<'a, I2C> {
    pwm: Pca9685<RefCellDevice<'a, I2C>>,
    /// (phase, enable) channel pair per motor, left then right.
    motor_channels: [(Channel, Channel); 2],
    max_speed: f32,
}

impl<'a, I2C, E> MotorBoard<'a, I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(bus: &'a RefCell<I2C>) -> Result<Self, PwmError<E>> {
        let pwm = Pca9685::new(RefCellDevice::new(bus), PwmAddress::from(MOTOR_PWM_ADDRESS))?;
        Ok(Self {
            pwm,
            motor_channels: [(Channel::C0, Channel::C1), (Channel::C2, Channel::C3)],
            max_speed: MAX_WHEEL_SPEED,
        })
    }

    /// Enable the chip and set the PWM prescaler.
    pub fn configure(&mut self) -> Result<(), PwmError<E>> {
        self.pwm.enable()?;
        self.pwm.set_prescale(100)?;
        tracing::info!("motor PWM configured");
        Ok(())
    }

    fn try_set_speeds(
        &mut self,
        left: f32,
        right: f32,
    ) -> Result<(), PwmError<E>> {
        for (&(phase, enable), speed) in self.motor_channels.iter().zip([left, right]) {
            let duty = (speed.abs().min(self.max_speed) / self.max_speed * MAX_DUTY as f32) as u16;
            let forward = speed >= 0.0;

            self.pwm
                .set_channel_on_off(phase, 0, if forward { 0 } else { MAX_DUTY })?;
            self.pwm.set_channel_on_off(enable, 0, duty)?;
        }
        Ok(())
    }
}

impl<'a, I2C, E> MotorDriver for MotorBoard<'a, I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    fn set_speeds(&mut self, left: f32, right: f32) {
        if let Err(error) = self.try_set_speeds(left, right) {
            tracing::error!(?error, "motor update failed");
        }
    }
}
