//! Integration tests for the three-way turnout

use rs_turnouts::{
    config::TimingConfig,
    hal::{MockEvents, MockHal},
    traits::EventSink,
    CoilPins, EventKind, Level, Position, RejectReason, Route, State, ThreeWayActuator,
};

const LEG_A: CoilPins = CoilPins::new(10, 11, 12, 13);
const LEG_B: CoilPins = CoilPins::new(14, 15, 16, 17);

fn setup() -> (MockHal, MockEvents, ThreeWayActuator) {
    let mut hal = MockHal::new();
    let mut three_way = ThreeWayActuator::new(3, "Yard", LEG_A, LEG_B);
    three_way.begin(&mut hal).unwrap();
    (hal, MockEvents::new(), three_way)
}

fn tick(three_way: &mut ThreeWayActuator, hal: &mut MockHal, events: &mut MockEvents, now: u64) {
    for result in three_way.update(hal, now) {
        events.emit_opt(result.unwrap().as_ref());
    }
}

fn run(
    three_way: &mut ThreeWayActuator,
    hal: &mut MockHal,
    events: &mut MockEvents,
    from: u64,
    to: u64,
) {
    let mut now = from;
    while now < to {
        tick(three_way, hal, events, now);
        now += 5;
    }
}

/// Close the sensors for a route as the mechanics would.
fn settle(hal: &mut MockHal, route: Route) {
    let (a, b) = route.leg_positions();
    for (pins, position) in [(LEG_A, a), (LEG_B, b)] {
        hal.set_sensor(pins.sensors.pos1, position == Position::Pos1);
        hal.set_sensor(pins.sensors.pos2, position == Position::Pos2);
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn legs_are_named_and_numbered_after_turnout() {
    let (hal, _, three_way) = setup();

    assert_eq!(three_way.id(), 3);
    assert_eq!(three_way.name(), "Yard");
    assert_eq!(three_way.leg_a().id(), 31);
    assert_eq!(three_way.leg_b().id(), 32);
    assert_eq!(three_way.leg_a().name(), "Yard A");
    assert_eq!(three_way.leg_b().name(), "Yard B");

    for pin in [10, 11, 14, 15] {
        assert_eq!(hal.output_level(pin), Level::Low);
    }
    assert_eq!(three_way.route(), None);
    assert!(!three_way.is_moving());
}

// ============================================================================
// Routes
// ============================================================================

#[test]
fn route_sets_both_leg_targets() {
    let (_, _, mut three_way) = setup();

    let cases = [
        (0, Route::Straight, Position::Pos1, Position::Pos1),
        (1, Route::Left, Position::Pos2, Position::Pos1),
        (2, Route::Right, Position::Pos1, Position::Pos2),
    ];
    for (raw, route, a, b) in cases {
        assert_eq!(three_way.set_position(raw), Ok(route));
        assert_eq!(three_way.target(), Some(route));
        assert_eq!(three_way.leg_a().target(), Some(a));
        assert_eq!(three_way.leg_b().target(), Some(b));
    }
}

#[test]
fn invalid_route_touches_neither_leg() {
    let (_, _, mut three_way) = setup();
    three_way.set_route(Route::Left);

    assert_eq!(three_way.set_position(3), Err(RejectReason::InvalidRoute(3)));
    assert_eq!(three_way.target(), Some(Route::Left));
    assert_eq!(three_way.leg_a().target(), Some(Position::Pos2));
    assert_eq!(three_way.leg_b().target(), Some(Position::Pos1));
}

#[test]
fn straight_to_left_moves_only_leg_a() {
    let (mut hal, mut events, mut three_way) = setup();
    settle(&mut hal, Route::Straight);
    three_way.set_route(Route::Straight);
    run(&mut three_way, &mut hal, &mut events, 0, 20);
    assert!(events.is_empty());
    assert_eq!(three_way.route(), Some(Route::Straight));

    three_way.set_route(Route::Left);
    tick(&mut three_way, &mut hal, &mut events, 20);
    assert_eq!(three_way.leg_a().state(), State::MovingToPos2);
    assert_eq!(three_way.leg_b().state(), State::Idle);
    assert_eq!(events.count_for(31), 1);
    assert_eq!(events.count_for(32), 0);

    tick(&mut three_way, &mut hal, &mut events, 25);
    assert_eq!(hal.output_level(11), Level::High);

    settle(&mut hal, Route::Left);
    tick(&mut three_way, &mut hal, &mut events, 30);
    assert_eq!(three_way.route(), Some(Route::Left));
    assert_eq!(
        events.last().unwrap().kind,
        EventKind::Arrived {
            position: Position::Pos2
        }
    );
    assert_eq!(hal.high_writes(14), 0);
    assert_eq!(hal.high_writes(15), 0);
}

#[test]
fn both_legs_start_on_same_tick() {
    let (mut hal, mut events, mut three_way) = setup();

    three_way.set_route(Route::Right);
    let [a, b] = three_way.update(&mut hal, 0);

    assert_eq!(a.unwrap().unwrap().id, 31);
    assert_eq!(b.unwrap().unwrap().id, 32);
    assert!(three_way.is_moving());

    tick(&mut three_way, &mut hal, &mut events, 5);
    assert_eq!(hal.output_level(10), Level::High);
    assert_eq!(hal.output_level(15), Level::High);
}

#[test]
fn legs_time_out_independently() {
    let mut hal = MockHal::new();
    let mut events = MockEvents::new();
    let mut three_way = ThreeWayActuator::new(3, "Yard", LEG_A, LEG_B)
        .with_timing(TimingConfig::default().with_timeout_ms(500));
    three_way.begin(&mut hal).unwrap();

    three_way.set_route(Route::Right);
    run(&mut three_way, &mut hal, &mut events, 0, 100);

    // Only leg A reaches its end
    hal.set_sensor(LEG_A.sensors.pos1, true);
    run(&mut three_way, &mut hal, &mut events, 100, 1000);

    assert_eq!(events.count("arrived"), 1);
    assert_eq!(events.count("timeout"), 1);
    assert!(events.last().unwrap().is_fault());
    assert_eq!(events.last().unwrap().id, 32);
    assert_eq!(three_way.leg_a().position(), Some(Position::Pos1));
    assert_eq!(three_way.route(), None);
    assert!(!three_way.is_moving());
}

#[test]
fn thrown_legs_are_driven_back_for_straight() {
    let (mut hal, mut events, mut three_way) = setup();
    hal.set_sensor(LEG_A.sensors.pos2, true);
    hal.set_sensor(LEG_B.sensors.pos2, true);

    three_way.set_route(Route::Straight);
    run(&mut three_way, &mut hal, &mut events, 0, 10);
    assert_eq!(events.count("move_started"), 2);
    assert_eq!(three_way.route(), None);

    settle(&mut hal, Route::Straight);
    run(&mut three_way, &mut hal, &mut events, 10, 15);
    assert_eq!(events.count("arrived"), 2);
    assert_eq!(three_way.route(), Some(Route::Straight));
}

#[test]
fn hardware_error_is_reported() {
    let (mut hal, _, mut three_way) = setup();
    three_way.set_route(Route::Left);
    hal.fail = true;
    assert!(three_way.update(&mut hal, 0).iter().all(Result::is_err));
    assert!(!three_way.is_moving());
}

#[test]
fn arrival_on_one_leg_survives_fault_on_other() {
    let (mut hal, mut events, mut three_way) = setup();
    three_way.set_route(Route::Right);
    run(&mut three_way, &mut hal, &mut events, 0, 20);
    assert_eq!(events.count("move_started"), 2);

    // Leg A's sensor input breaks just as leg B reaches its end
    hal.fail_pin(LEG_A.sensors.pos1);
    hal.set_sensor(LEG_B.sensors.pos2, true);

    let [a, b] = three_way.update(&mut hal, 20);
    assert!(a.is_err());
    let arrived = b.unwrap().expect("leg B arrival");
    assert_eq!(arrived.id, 32);
    assert_eq!(
        arrived.kind,
        EventKind::Arrived {
            position: Position::Pos2
        }
    );
    assert_eq!(three_way.leg_b().state(), State::Idle);
    assert_eq!(three_way.leg_a().state(), State::MovingToPos1);

    // Leg A carries on once its input recovers
    hal.repair_pin(LEG_A.sensors.pos1);
    hal.set_sensor(LEG_A.sensors.pos1, true);
    tick(&mut three_way, &mut hal, &mut events, 25);
    assert_eq!(three_way.route(), Some(Route::Right));
}
