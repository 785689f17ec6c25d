//! BEMF turnout bridge using ESP32 LEDC PWM and ADC sensing.
//!
//! The bridge is controlled via two PWM signals:
//! - PWM_FWD (GPIO2): drives toward position 1
//! - PWM_REV (GPIO3): drives toward position 2
//!
//! Control logic:
//! - Forward: FWD = duty%, REV = 0%
//! - Reverse: FWD = 0%, REV = duty%
//! - Stopped: Both = 0%
//!
//! # Sensing
//!
//! Only one direction is ever active, so both sense outputs are wired
//! together to GPIO4 (ADC1). GPIO5 is on ADC2, which is unusable while
//! WiFi is up on the C3.

use crate::traits::Direction;
use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::Gpio4;
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;

/// PWM bridge plus BEMF sense channel for BEMF turnouts.
///
/// Uses the LEDC peripheral at 20kHz with 10-bit resolution.
///
/// # Example
///
/// ```ignore
/// use rs_turnouts::hal::esp32::Esp32Bemf;
///
/// let peripherals = Peripherals::take()?;
/// let adc = AdcDriver::new(peripherals.adc1)?;
/// let bridge = Esp32Bemf::new(
///     peripherals.pins.gpio2,
///     peripherals.pins.gpio3,
///     peripherals.ledc.timer0,
///     peripherals.ledc.channel0,
///     peripherals.ledc.channel1,
///     &adc,
///     peripherals.pins.gpio4,
/// )?;
/// ```
pub struct Esp32Bemf<'d> {
    fwd_pwm: LedcDriver<'d>,
    rev_pwm: LedcDriver<'d>,
    sense: AdcChannelDriver<'d, Gpio4, &'d AdcDriver<'d, ADC1>>,
    duty: f32,
    direction: Direction,
}

impl<'d> Esp32Bemf<'d> {
    /// PWM frequency in Hz (20kHz is above audible range)
    const PWM_FREQ_HZ: u32 = 20_000;

    /// PWM resolution (10-bit = 1024 steps)
    const PWM_RESOLUTION: Resolution = Resolution::Bits10;

    /// Maximum duty value for 10-bit resolution
    const MAX_DUTY: u32 = 1023;

    /// Creates the bridge, initially stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if PWM or ADC initialization fails.
    #[allow(clippy::too_many_arguments)]
    pub fn new<T, TI, FC, FCI, RC, RCI, FP, FPI, RP, RPI>(
        fwd_pwm_pin: FP,
        rev_pwm_pin: RP,
        timer: T,
        fwd_channel: FC,
        rev_channel: RC,
        adc: &'d AdcDriver<'d, ADC1>,
        sense_pin: impl Peripheral<P = Gpio4> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError>
    where
        TI: esp_idf_hal::ledc::LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        FCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        FC: Peripheral<P = FCI> + 'd,
        RCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        RC: Peripheral<P = RCI> + 'd,
        FPI: esp_idf_hal::gpio::OutputPin + 'd,
        FP: Peripheral<P = FPI> + 'd,
        RPI: esp_idf_hal::gpio::OutputPin + 'd,
        RP: Peripheral<P = RPI> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(Self::PWM_FREQ_HZ.Hz())
            .resolution(Self::PWM_RESOLUTION);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;

        let fwd_pwm = LedcDriver::new(fwd_channel, &timer_driver, fwd_pwm_pin)?;
        let rev_pwm = LedcDriver::new(rev_channel, &timer_driver, rev_pwm_pin)?;

        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let sense = AdcChannelDriver::new(adc, sense_pin, &config)?;

        let mut bridge = Self {
            fwd_pwm,
            rev_pwm,
            sense,
            duty: 0.0,
            direction: Direction::Stopped,
        };

        // Ensure the bridge starts off
        bridge.apply_pwm()?;

        Ok(bridge)
    }

    fn apply_pwm(&mut self) -> Result<(), esp_idf_hal::sys::EspError> {
        let duty = (self.duty * Self::MAX_DUTY as f32) as u32;

        match self.direction {
            Direction::Forward => {
                self.fwd_pwm.set_duty(duty)?;
                self.rev_pwm.set_duty(0)?;
            }
            Direction::Reverse => {
                self.fwd_pwm.set_duty(0)?;
                self.rev_pwm.set_duty(duty)?;
            }
            Direction::Stopped => {
                self.fwd_pwm.set_duty(0)?;
                self.rev_pwm.set_duty(0)?;
            }
        }

        Ok(())
    }

    /// Set duty (0.0 to 1.0) and direction.
    pub fn drive(&mut self, duty: f32, direction: Direction) -> Result<(), esp_idf_hal::sys::EspError> {
        self.duty = duty.clamp(0.0, 1.0);
        self.direction = direction;
        self.apply_pwm()
    }

    /// Take one raw BEMF sample (0-4095).
    pub fn sample(&mut self) -> Result<u16, esp_idf_hal::sys::EspError> {
        self.sense.read()
    }

    /// Returns true while the bridge is energized.
    #[inline]
    pub fn is_driven(&self) -> bool {
        self.direction != Direction::Stopped && self.duty > 0.0
    }
}
