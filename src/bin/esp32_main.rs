//! ESP32-C3 SuperMini turnout controller.
//!
//! This is the main entry point for the physical hardware controller.
//! It runs a 200Hz control loop that:
//! - Samples the BEMF channel into the stall detector
//! - Updates every turnout state machine
//! - Prints turnout events to the serial console
//! - Toggles all turnouts every 7 seconds as a field test
//!
//! # Hardware Setup
//!
//! See [`rs_turnouts::hal::esp32::pins`] for the wiring.
//!
//! # Build
//!
//! ```bash
//! cargo build --release --features esp32 --bin esp32_main
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_hal::adc::oneshot::AdcDriver;
use esp_idf_hal::gpio::{IOPin, OutputPin};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use rs_turnouts::hal::esp32::{pins, Esp32Bemf, Esp32Board, Esp32Clock};
use rs_turnouts::traits::Clock;
use rs_turnouts::{
    BemfArbiter, BemfPins, Config, ConsoleSink, Layout, Position, TurnoutActuator,
};

/// Interval between target toggles, as on the bench layout
const TOGGLE_INTERVAL_MS: u64 = 7000;

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();

    println!();
    println!("================================");
    println!("  rs-turnouts SuperMini Decoder");
    println!("================================");
    println!();

    let config = Config::default();
    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Initialize BEMF Bridge (GPIO2/3 PWM, GPIO4 ADC)
    // =========================================================================
    let adc1 = AdcDriver::new(peripherals.adc1)?;
    let bridge = Esp32Bemf::new(
        peripherals.pins.gpio2,
        peripherals.pins.gpio3,
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        peripherals.ledc.channel1,
        &adc1,
        peripherals.pins.gpio4,
    )?;
    let mut board = Esp32Board::new().with_bemf(bridge);
    println!("[OK] BEMF bridge initialized (GPIO2/3 PWM, GPIO4 ADC)");

    // =========================================================================
    // Initialize Servo (LEDC 50Hz on GPIO10)
    // =========================================================================
    let servo_timer = LedcTimerDriver::new(
        peripherals.ledc.timer1,
        &TimerConfig::default()
            .frequency(50.Hz())
            .resolution(Resolution::Bits14),
    )?;
    let servo = LedcDriver::new(peripherals.ledc.channel2, &servo_timer, peripherals.pins.gpio10)?;
    board.add_servo(pins::SERVO, servo);
    board.add_input(pins::SERVO_SENSOR_1, peripherals.pins.gpio0.downgrade())?;
    board.add_input(pins::SERVO_SENSOR_2, peripherals.pins.gpio1.downgrade())?;
    println!("[OK] Servo initialized (GPIO10, sensors GPIO0/1)");

    // =========================================================================
    // Initialize Coil Outputs (GPIO6/7, sensors GPIO8/9)
    // =========================================================================
    board.add_output(pins::COIL_FWD, peripherals.pins.gpio6.downgrade_output())?;
    board.add_output(pins::COIL_REV, peripherals.pins.gpio7.downgrade_output())?;
    board.add_input(pins::COIL_SENSOR_1, peripherals.pins.gpio8.downgrade())?;
    board.add_input(pins::COIL_SENSOR_2, peripherals.pins.gpio9.downgrade())?;
    println!("[OK] Coil outputs initialized (GPIO6/7, sensors GPIO8/9)");

    // =========================================================================
    // Turnouts
    // =========================================================================
    let arbiter = Arc::new(BemfArbiter::new());
    let mut layout = Layout::new(config.layout);

    layout.add_turnout(
        1,
        TurnoutActuator::new_servo(
            1,
            "Weiche 1 (Servo)",
            pins::SERVO,
            pins::SERVO_SENSOR_1,
            pins::SERVO_SENSOR_2,
            config.servo,
        )
        .with_timing(config.timing),
    )?;
    layout.add_turnout(
        2,
        TurnoutActuator::new_coil(
            2,
            "Weiche 2 (Spule)",
            pins::COIL_FWD,
            pins::COIL_REV,
            pins::COIL_SENSOR_1,
            pins::COIL_SENSOR_2,
        )
        .with_timing(config.timing),
    )?;
    layout.add_turnout(
        3,
        TurnoutActuator::new_bemf(
            3,
            "Weiche 3 (BEMF)",
            BemfPins::new(
                pins::BEMF_PWM_FWD,
                pins::BEMF_PWM_REV,
                pins::BEMF_SENSE_FWD,
                pins::BEMF_SENSE_REV,
            ),
            arbiter,
        )
        .with_timing(config.timing)
        .with_stall(config.stall),
    )?;

    layout.begin(&mut board)?;
    println!("[OK] {} turnouts ready", layout.len());

    let clock = Esp32Clock::new();
    let mut sink = ConsoleSink::new();
    let tick = Duration::from_millis(u64::from(config.layout.tick_ms));

    println!();
    println!("Starting control loop ({}ms tick)...", config.layout.tick_ms);
    println!();

    let mut target = Position::Pos1;
    let mut last_toggle = clock.now_ms();

    // =========================================================================
    // Main Control Loop
    // =========================================================================
    loop {
        let now = clock.now_ms();

        if let Err(e) = board.poll_bemf() {
            println!("[WARN] BEMF sample failed: {}", e);
        }

        if let Err(e) = layout.update(&mut board, now, &mut sink) {
            println!("[WARN] Turnout update failed: {}", e);
        }

        if now.saturating_sub(last_toggle) > TOGGLE_INTERVAL_MS {
            println!("Setting target to {}", target.as_u8());
            for address in 1..=3 {
                if let Err(e) = layout.set_position(address, target.as_u8()) {
                    println!("[WARN] Address {} rejected target: {}", address, e);
                }
            }
            target = target.opposite();
            last_toggle = now;
        }

        thread::sleep(tick);
    }
}
