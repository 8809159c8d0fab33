//! Tests that involve the simulation of a whole road by a single worker.

use ca_traffic_sim::{ArrivalProcess, Config, LocalNetwork, Partition, Simulation};

fn config(lanes: usize, length: usize) -> Config {
    Config {
        lanes,
        length,
        initial_occupancy: 0.0,
        max_speed: 5,
        prob_slow_down: 0.0,
        prob_change: 1.0,
        max_time: 100,
        step_size: 1.0,
        warmup_time: 0,
        ..Config::default()
    }
}

fn simulation(config: &Config) -> Simulation {
    // Spawns are far enough apart not to interfere.
    let arrivals = ArrivalProcess::from_pairs(&[(1000.0, 1.0)]).unwrap();
    Simulation::new(config, arrivals, Partition::whole(config.length, config.lanes))
}

/// Test that a lone vehicle accelerates from rest by one site per step.
#[test]
fn vehicle_accelerates_from_rest() {
    let config = config(1, 10);
    let mut sim = simulation(&config);
    let net = LocalNetwork::create(1).remove(0);
    let key = sim.add_vehicle(0, 0, 0).unwrap();
    let id = sim.get_vehicle(key).unwrap().id();

    sim.step(&net).unwrap();
    let veh = sim.find_vehicle(id).unwrap();
    assert_eq!(veh.gap_forward(), 9);
    assert_eq!(veh.speed(), 1);
    assert_eq!(veh.pos(), 1);
}

/// Test that a vehicle never reaches the site of the vehicle ahead.
#[test]
fn vehicle_stops_behind_leader() {
    let config = config(1, 10);
    let mut sim = simulation(&config);
    let net = LocalNetwork::create(1).remove(0);
    let rear = sim.add_vehicle(0, 0, 5).unwrap();
    let rear = sim.get_vehicle(rear).unwrap().id();
    sim.add_vehicle(0, 2, 0).unwrap();

    sim.step(&net).unwrap();
    let veh = sim.find_vehicle(rear).unwrap();
    assert_eq!(veh.gap_forward(), 1);
    assert!(veh.speed() <= 1);
    assert!(veh.pos() <= 1);
}

/// Test that a vehicle's position increases monotonically until it leaves the road.
#[test]
fn vehicle_drives_forward_and_exits() {
    let config = config(1, 100);
    let mut sim = simulation(&config);
    let net = LocalNetwork::create(1).remove(0);
    let key = sim.add_vehicle(0, 0, 0).unwrap();
    let id = sim.get_vehicle(key).unwrap().id();

    let mut pos = 0;
    let mut steps = 0;
    while sim.find_vehicle(id).is_some() {
        assert!(steps < 100, "vehicle never left the road");
        sim.step(&net).unwrap();
        steps += 1;
        if let Some(veh) = sim.find_vehicle(id) {
            assert!(veh.pos() > pos);
            pos = veh.pos();
        }
    }
    // 1 + 2 + 3 + 4 + 5 * 18 = 100
    assert_eq!(steps, 22);
    assert_eq!(sim.travel_time().count(), 1);
    assert_eq!(sim.travel_time().average(), 22.0);
}

/// Test that a vehicle stuck behind a slow leader moves into a free lane.
#[test]
fn vehicle_overtakes_in_free_lane() {
    let config = config(2, 50);
    let mut sim = simulation(&config);
    let net = LocalNetwork::create(1).remove(0);
    let key = sim.add_vehicle(0, 10, 3).unwrap();
    let id = sim.get_vehicle(key).unwrap().id();
    sim.add_vehicle(0, 12, 0).unwrap();

    let report = sim.step(&net).unwrap();
    assert!(report.lane_switches >= 1);
    assert_eq!(sim.find_vehicle(id).unwrap().lane(), 1);
}

/// Test that a single worker reproduces its results exactly given the same seed.
#[test]
fn seeded_runs_are_reproducible() {
    let config = Config {
        initial_occupancy: 0.25,
        prob_slow_down: 0.3,
        prob_change: 0.6,
        seed: 1234,
        ..config(2, 200)
    };
    let arrivals = ArrivalProcess::from_pairs(&[(1.0, 0.3), (2.0, 0.7), (5.0, 1.0)]).unwrap();
    let run = || {
        let mut sim = Simulation::new(&config, arrivals.clone(), Partition::whole(200, 2));
        let net = LocalNetwork::create(1).remove(0);
        let mut reports = vec![];
        for _ in 0..config.max_time {
            reports.push(sim.step(&net).unwrap());
        }
        let mut state = sim
            .iter_vehicles()
            .map(|veh| (veh.id(), veh.lane(), veh.pos(), veh.speed(), veh.time_on_road()))
            .collect::<Vec<_>>();
        state.sort_unstable();
        (reports, state, *sim.travel_time())
    };
    assert_eq!(run(), run());
}
