//! Desktop simulation of a small turnout layout.
//!
//! Runs the same layout as the ESP32 firmware against [`MockHal`], with a
//! crude model of the mechanics closing the end sensors:
//! - Servo: sensor closes when the servo reaches its end angle
//! - Coil: sensor closes on the first pulse
//! - BEMF: motor stalls 600ms after the bridge is energized
//!
//! A fourth servo turnout has no working sensors and times out.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin desktop_demo -- 30   # simulate 30 seconds
//! ```

use std::sync::Arc;

use anyhow::anyhow;
use rs_turnouts::hal::{MockClock, MockHal};
use rs_turnouts::traits::Clock;
use rs_turnouts::{
    BemfArbiter, BemfPins, CoilPins, Config, ConsoleSink, Layout, Level, Position, Route,
    ThreeWayActuator, TurnoutActuator,
};

/// Interval between target toggles
const TOGGLE_INTERVAL_MS: u64 = 7000;

/// How long the BEMF motor runs before hitting the end stop
const BEMF_TRAVEL_MS: u64 = 600;

const SERVO_PIN: u8 = 9;
const SERVO_SENSORS: (u8, u8) = (2, 3);
const COIL_PINS: CoilPins = CoilPins::new(4, 5, 6, 7);
const BEMF_PINS: BemfPins = BemfPins::new(25, 26, 34, 35);
const THREE_WAY_A: CoilPins = CoilPins::new(20, 21, 22, 23);
const THREE_WAY_B: CoilPins = CoilPins::new(16, 17, 18, 19);

/// Mechanical model of the bench layout.
struct Bench {
    angle_min: u8,
    angle_max: u8,
    bemf_since: Option<u64>,
}

impl Bench {
    fn coil(hal: &mut MockHal, pins: CoilPins) {
        if hal.output_level(pins.forward) == Level::High {
            hal.set_sensor(pins.sensors.pos1, true);
            hal.set_sensor(pins.sensors.pos2, false);
        } else if hal.output_level(pins.reverse) == Level::High {
            hal.set_sensor(pins.sensors.pos1, false);
            hal.set_sensor(pins.sensors.pos2, true);
        }
    }

    fn settle(&mut self, hal: &mut MockHal, now_ms: u64) {
        if let Some(angle) = hal.servo_angle(SERVO_PIN) {
            hal.set_sensor(SERVO_SENSORS.0, angle <= self.angle_min);
            hal.set_sensor(SERVO_SENSORS.1, angle >= self.angle_max);
        }

        Self::coil(hal, COIL_PINS);
        Self::coil(hal, THREE_WAY_A);
        Self::coil(hal, THREE_WAY_B);

        if hal.bemf_driven() {
            let since = *self.bemf_since.get_or_insert(now_ms);
            let raw = if now_ms.saturating_sub(since) >= BEMF_TRAVEL_MS {
                0
            } else {
                800
            };
            hal.feed_bemf(&[raw]);
        } else {
            self.bemf_since = None;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let seconds: u64 = std::env::args()
        .nth(1)
        .map(|s| s.parse::<u64>())
        .transpose()?
        .unwrap_or(30);

    println!("Turnout Control System Initializing");

    let config = Config::default();
    let arbiter = Arc::new(BemfArbiter::new());
    let mut layout = Layout::new(config.layout);

    layout.add_turnout(
        1,
        TurnoutActuator::new_servo(
            1,
            "Weiche 1 (Servo)",
            SERVO_PIN,
            SERVO_SENSORS.0,
            SERVO_SENSORS.1,
            config.servo,
        ),
    )?;
    layout.add_turnout(
        2,
        TurnoutActuator::new_coil(
            2,
            "Weiche 2 (Spule)",
            COIL_PINS.forward,
            COIL_PINS.reverse,
            COIL_PINS.sensors.pos1,
            COIL_PINS.sensors.pos2,
        ),
    )?;
    layout.add_turnout(
        3,
        TurnoutActuator::new_bemf(3, "Weiche 3 (BEMF)", BEMF_PINS, arbiter)
            .with_stall(config.stall),
    )?;
    // Sensors 12/13 are never closed by the bench
    layout.add_turnout(
        4,
        TurnoutActuator::new_servo(4, "Weiche 4 (Servo, defekt)", 11, 12, 13, config.servo),
    )?;
    layout.add_three_way(
        10,
        ThreeWayActuator::new(5, "Dreiwegweiche", THREE_WAY_A, THREE_WAY_B),
    )?;

    let mut hal = MockHal::new();
    let mut clock = MockClock::new();
    let mut sink = ConsoleSink::new().with_faults_to_stderr();
    let mut bench = Bench {
        angle_min: config.servo.angle_min,
        angle_max: config.servo.angle_max,
        bemf_since: None,
    };

    layout
        .begin(&mut hal)
        .map_err(|()| anyhow!("mock hardware refused setup"))?;
    println!("[OK] {} turnouts ready", layout.len());

    let routes = [Route::Straight, Route::Left, Route::Right];
    let mut route_index = 0;
    let mut target = Position::Pos1;
    let mut last_toggle: Option<u64> = None;
    let end_ms = seconds * 1000;

    while clock.now_ms() < end_ms {
        let now = clock.now_ms();

        bench.settle(&mut hal, now);
        layout
            .update(&mut hal, now, &mut sink)
            .map_err(|()| anyhow!("mock hardware failed at {}ms", now))?;

        if last_toggle.map_or(true, |t| now.saturating_sub(t) > TOGGLE_INTERVAL_MS) {
            println!("[{:>6}ms] Setting target to {}", now, target.as_u8());
            for address in 1..=4 {
                layout.set_position(address, target.as_u8())?;
            }
            let route = routes[route_index % routes.len()];
            println!("[{:>6}ms] Setting route to {:?}", now, route);
            layout.set_position(10, route.as_u8())?;

            target = target.opposite();
            route_index += 1;
            last_toggle = Some(now);
        }

        clock.advance(u64::from(config.layout.tick_ms));
    }

    println!("Simulated {}s, done.", seconds);
    Ok(())
}
