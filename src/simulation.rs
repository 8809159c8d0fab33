use crate::arrival::ArrivalProcess;
use crate::config::Config;
use crate::debug::render_lane;
use crate::network::{Communicator, ProtocolError};
use crate::partition::Partition;
use crate::road::Road;
use crate::statistic::Statistic;
use crate::vehicle::wire::RECORD_LEN;
use crate::vehicle::{StepOutcome, Vehicle, VehicleAttributes};
use crate::{VehicleKey, VehicleSet};
use log::{debug, info, log_enabled, trace, warn, Level};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;

/// What happened during one step of a worker's simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Vehicles that entered the road.
    pub spawned: usize,
    /// Vehicles that drove off the end of the road.
    pub exited: usize,
    /// Vehicles sent to the next partition.
    pub migrated_out: usize,
    /// Vehicles received from the previous partition.
    pub migrated_in: usize,
    /// Vehicles that changed lanes.
    pub lane_switches: usize,
}

/// The simulation of one partition of the road.
pub struct Simulation {
    /// The simulation inputs.
    config: Config,
    /// The attributes of newly created vehicles.
    attributes: VehicleAttributes,
    /// The lanes of this partition.
    road: Road,
    /// The vehicles currently in this partition.
    vehicles: VehicleSet,
    /// The number of completed steps.
    time: usize,
    /// The ID of the next vehicle to spawn. Only used by the partition owning the entry.
    next_id: u64,
    /// Travel times of vehicles that left the road after the warm-up period, in seconds.
    travel_time: Statistic,
    /// The random number generator behind every random decision in this partition.
    rng: XorShiftRng,
    /// The thread pool used to compute gaps, if more than one gap thread is configured.
    pool: Option<rayon::ThreadPool>,
}

impl Simulation {
    /// Creates the simulation of the given partition of the road, populating it according
    /// to the configured initial occupancy.
    ///
    /// The random number generator is seeded with the configured seed plus the worker rank.
    pub fn new(config: &Config, arrivals: ArrivalProcess, partition: Partition) -> Self {
        let rng = XorShiftRng::seed_from_u64(config.seed.wrapping_add(partition.rank() as u64));
        let pool = (config.gap_threads > 1)
            .then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.gap_threads)
                    .build()
                    .map_err(|err| warn!("computing gaps serially: {}", err))
                    .ok()
            })
            .flatten();

        let mut sim = Self {
            config: config.clone(),
            attributes: VehicleAttributes::from(config),
            road: Road::new(partition, config.lanes, arrivals),
            vehicles: VehicleSet::with_key(),
            time: 0,
            next_id: (config.lanes * config.length) as u64,
            travel_time: Statistic::new(),
            rng,
            pool,
        };

        if config.initial_occupancy > 0.0 {
            let length = config.length;
            let placed = sim.road.populate(
                &mut sim.vehicles,
                &sim.attributes,
                config.initial_occupancy,
                |lane, site| (lane * length + site) as u64,
                &mut sim.rng,
            );
            debug!("rank {}: placed {} initial vehicles", sim.rank(), placed);
        }
        sim
    }

    /// The rank of the worker simulating this partition.
    pub fn rank(&self) -> usize {
        self.road.partition().rank()
    }

    /// The number of completed steps.
    pub fn time(&self) -> usize {
        self.time
    }

    /// The simulation inputs.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The lanes of this partition.
    pub fn road(&self) -> &Road {
        &self.road
    }

    /// Travel times of vehicles that left the road after the warm-up period, in seconds.
    pub fn travel_time(&self) -> &Statistic {
        &self.travel_time
    }

    /// Returns an iterator over the vehicles in this partition.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given key.
    pub fn get_vehicle(&self, key: VehicleKey) -> Option<&Vehicle> {
        self.vehicles.get(key)
    }

    /// Finds a vehicle by ID.
    pub fn find_vehicle(&self, id: u64) -> Option<&Vehicle> {
        self.vehicles.values().find(|veh| veh.id() == id)
    }

    /// The number of vehicles in this partition.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Places a vehicle in `lane` at the local `site` with the given speed.
    /// Its ID is derived from its global site, as for vehicles placed at start-up.
    /// Returns `None` if the site is already occupied.
    pub fn add_vehicle(&mut self, lane: usize, site: usize, speed: usize) -> Option<VehicleKey> {
        if self.road.lane(lane).occupied(site) {
            return None;
        }
        let global = self.road.partition().to_global(site);
        let id = (lane * self.config.length + global) as u64;
        let vehicle = Vehicle::new(VehicleKey::default(), id, lane, site, speed, &self.attributes);
        Some(self.road.insert_vehicle(&mut self.vehicles, vehicle))
    }

    /// Runs the simulation until the configured number of steps have been completed.
    pub fn run<C: Communicator + ?Sized>(&mut self, comm: &C) -> Result<(), ProtocolError> {
        info!(
            "rank {}: simulating sites {:?} for {} steps",
            self.rank(),
            self.road.partition().span(),
            self.config.max_time
        );
        while self.time < self.config.max_time {
            self.step(comm)?;
        }
        info!(
            "rank {}: finished with {} vehicles on the road, {} travel times recorded",
            self.rank(),
            self.vehicles.len(),
            self.travel_time.count()
        );
        Ok(())
    }

    /// Advances the simulation by one step. Every worker must call this in lock-step.
    pub fn step<C: Communicator + ?Sized>(&mut self, comm: &C) -> Result<StepReport, ProtocolError> {
        let mut report = StepReport::default();

        self.exchange_gaps(comm)?;
        self.compute_gaps();
        report.lane_switches = self.switch_lanes();
        comm.barrier();

        // Lane changes alter what the vehicles behind see.
        self.exchange_gaps(comm)?;
        self.compute_gaps();
        let (migrating, exited) = self.move_vehicles();
        comm.barrier();

        report.migrated_out = migrating.len();
        report.migrated_in = self.transfer_vehicles(comm, migrating)?;
        report.exited = self.remove_exited(exited);

        if self.road.partition().is_first() {
            report.spawned = self.road.attempt_spawn(
                &mut self.vehicles,
                &mut self.next_id,
                &self.attributes,
                self.config.step_size,
                &mut self.rng,
            );
        }

        self.time += 1;
        self.trace_road();
        comm.barrier();
        Ok(report)
    }

    /// Swaps edge gaps with the neighbouring partitions.
    fn exchange_gaps<C: Communicator + ?Sized>(&mut self, comm: &C) -> Result<(), ProtocolError> {
        let neighbors = comm.exchange_gaps(&self.road.edge_gaps())?;
        self.road.apply_neighbor_gaps(&neighbors);
        comm.barrier();
        Ok(())
    }

    /// Updates the gaps of every vehicle.
    fn compute_gaps(&mut self) {
        let road = &self.road;
        match &self.pool {
            Some(pool) => pool.install(|| {
                self.vehicles
                    .values_mut()
                    .par_bridge()
                    .for_each(|veh| veh.compute_gaps(road))
            }),
            None => {
                for veh in self.vehicles.values_mut() {
                    veh.compute_gaps(road);
                }
            }
        }
    }

    /// Lets every vehicle decide whether to change lanes. Returns the number that did.
    fn switch_lanes(&mut self) -> usize {
        let mut switches = 0;
        for veh in self.vehicles.values_mut() {
            if veh.decide_lane_switch(&mut self.road, &mut self.rng) {
                switches += 1;
            }
        }
        switches
    }

    /// Moves every vehicle. Returns the vehicles that left the partition for the next one,
    /// and those that left the road along with their number of steps on it.
    fn move_vehicles(&mut self) -> (Vec<VehicleKey>, Vec<(VehicleKey, usize)>) {
        let mut migrating = vec![];
        let mut exited = vec![];
        for (key, veh) in &mut self.vehicles {
            match veh.step(&mut self.road, &mut self.rng) {
                StepOutcome::Stayed => {}
                StepOutcome::Migrated { pos } => {
                    debug!("vehicle {} leaving rank {} for site {}", veh.id(), self.road.partition().rank(), pos);
                    migrating.push(key);
                }
                StepOutcome::Exited { steps } => {
                    debug!("vehicle {} exited after {} steps", veh.id(), steps);
                    exited.push((key, steps));
                }
            }
        }
        (migrating, exited)
    }

    /// Sends migrating vehicles to the next partition and adopts those arriving from the
    /// previous one. Returns the number of vehicles adopted.
    fn transfer_vehicles<C: Communicator + ?Sized>(
        &mut self,
        comm: &C,
        migrating: Vec<VehicleKey>,
    ) -> Result<usize, ProtocolError> {
        let mut outgoing = vec![vec![]; self.road.num_lanes()];
        for key in migrating {
            if let Some(veh) = self.vehicles.remove(key) {
                veh.encode(&mut outgoing[veh.lane()]);
            }
        }

        let incoming = comm.exchange_vehicles(outgoing)?;
        let mut adopted = 0;
        for (lane, buffer) in incoming.iter().enumerate() {
            if lane >= self.road.num_lanes() {
                warn!("rank {}: dropping vehicles for unknown lane {}", self.rank(), lane);
                continue;
            }
            if buffer.len() % RECORD_LEN != 0 {
                warn!(
                    "rank {}: dropping {} trailing values in lane {} transfer",
                    self.rank(),
                    buffer.len() % RECORD_LEN,
                    lane
                );
            }
            for record in buffer.chunks_exact(RECORD_LEN) {
                if self.adopt_vehicle(record, lane) {
                    adopted += 1;
                }
            }
        }
        Ok(adopted)
    }

    /// Adds a vehicle received from the previous partition.
    /// Logs and drops the vehicle if the record is unusable.
    fn adopt_vehicle(&mut self, record: &[f64], lane: usize) -> bool {
        let veh = match Vehicle::decode(record, lane) {
            Ok(veh) => veh,
            Err(err) => {
                warn!("rank {}: dropping migrating vehicle: {}", self.rank(), err);
                return false;
            }
        };
        let size = self.road.lane(lane).size();
        if veh.pos() >= size {
            warn!(
                "rank {}: dropping vehicle {} at site {} beyond lane of {} sites",
                self.rank(),
                veh.id(),
                veh.pos(),
                size
            );
            return false;
        }
        if self.road.lane(lane).occupied(veh.pos()) {
            warn!(
                "rank {}: dropping vehicle {} arriving at occupied site {}",
                self.rank(),
                veh.id(),
                veh.pos()
            );
            return false;
        }
        debug!("vehicle {} arrived at rank {} site {}", veh.id(), self.rank(), veh.pos());
        self.road.insert_vehicle(&mut self.vehicles, veh);
        true
    }

    /// Removes vehicles that left the road, recording their travel times once the warm-up
    /// period is over. Returns the number removed.
    fn remove_exited(&mut self, exited: Vec<(VehicleKey, usize)>) -> usize {
        let record = self.time >= self.config.warmup_time;
        let mut removed = 0;
        for (key, steps) in exited {
            if self.vehicles.remove(key).is_some() {
                removed += 1;
                if record {
                    self.travel_time.add_value(steps as f64 * self.config.step_size);
                }
            }
        }
        removed
    }

    /// Logs the contents of every lane, top lane first.
    fn trace_road(&self) {
        if !log_enabled!(Level::Trace) {
            return;
        }
        for lane in self.road.lanes().rev() {
            trace!(
                "rank {} t={} lane {}: {}",
                self.rank(),
                self.time,
                lane.index(),
                render_lane(lane, &self.vehicles)
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{EdgeGaps, LocalNetwork, NeighborGaps};

    fn config() -> Config {
        Config {
            lanes: 2,
            length: 50,
            initial_occupancy: 0.3,
            max_time: 40,
            warmup_time: 0,
            prob_slow_down: 0.2,
            prob_change: 0.5,
            ..Config::default()
        }
    }

    fn arrivals() -> ArrivalProcess {
        ArrivalProcess::from_pairs(&[(1.0, 0.5), (3.0, 1.0)]).unwrap()
    }

    #[test]
    fn ids_do_not_collide() {
        let config = config();
        let sim = Simulation::new(&config, arrivals(), Partition::whole(config.length, config.lanes));
        assert!(sim.iter_vehicles().all(|veh| veh.id() < sim.next_id));
    }

    #[test]
    fn occupancy_and_conservation() {
        let config = config();
        let mut sim = Simulation::new(&config, arrivals(), Partition::whole(config.length, config.lanes));
        let net = LocalNetwork::create(1).remove(0);

        for _ in 0..config.max_time {
            let before = sim.vehicle_count();
            let report = sim.step(&net).unwrap();
            assert_eq!(sim.vehicle_count(), before + report.spawned - report.exited);
            assert_eq!((report.migrated_in, report.migrated_out), (0, 0));
            for lane in sim.road().lanes() {
                assert!((0..lane.size()).all(|site| lane.occupancy(site) <= 1));
                assert_eq!(lane.iter().count(), sim.iter_vehicles().filter(|v| v.lane() == lane.index()).count());
            }
            for veh in sim.iter_vehicles() {
                assert!(veh.speed() <= veh.max_speed());
                assert!(veh.gap_forward() < config.length);
                let lane = sim.road().lane(veh.lane());
                assert_eq!(lane.vehicle_at(veh.pos()), Some(veh.key()));
            }
        }
        assert_eq!(sim.time(), config.max_time);
    }

    #[test]
    fn speed_never_exceeds_gap() {
        let config = config();
        let mut sim = Simulation::new(&config, arrivals(), Partition::whole(config.length, config.lanes));
        let net = LocalNetwork::create(1).remove(0);
        for _ in 0..config.max_time {
            sim.step(&net).unwrap();
            // Vehicles spawned this step have not measured their gaps yet.
            for veh in sim.iter_vehicles().filter(|veh| veh.time_on_road() > 0) {
                assert!(veh.speed() <= veh.gap_forward());
            }
        }
    }

    #[test]
    fn travel_time_after_warmup() {
        let config = Config {
            lanes: 1,
            length: 10,
            initial_occupancy: 0.0,
            max_speed: 5,
            prob_slow_down: 0.0,
            max_time: 30,
            step_size: 2.0,
            warmup_time: 0,
            ..Config::default()
        };
        let arrivals = ArrivalProcess::from_pairs(&[(100.0, 1.0)]).unwrap();
        let mut sim = Simulation::new(&config, arrivals, Partition::whole(10, 1));
        let net = LocalNetwork::create(1).remove(0);
        sim.run(&net).unwrap();

        // One vehicle spawns at full speed: 0 -> 5 -> exits on its second step.
        assert_eq!(sim.travel_time().count(), 1);
        assert_eq!(sim.travel_time().average(), 4.0);
    }

    #[test]
    fn parallel_gaps_match_serial() {
        let serial = config();
        let parallel = Config {
            gap_threads: 3,
            ..config()
        };
        let run = |config: &Config| {
            let mut sim = Simulation::new(config, arrivals(), Partition::whole(config.length, config.lanes));
            let net = LocalNetwork::create(1).remove(0);
            sim.run(&net).unwrap();
            let mut state = sim
                .iter_vehicles()
                .map(|veh| (veh.id(), veh.lane(), veh.pos(), veh.speed()))
                .collect::<Vec<_>>();
            state.sort_unstable();
            state
        };
        assert_eq!(run(&serial), run(&parallel));
    }

    /// A previous worker that reports empty lanes and delivers fixed vehicle buffers.
    struct Upstream {
        incoming: Vec<Vec<f64>>,
    }

    impl Communicator for Upstream {
        fn rank(&self) -> usize {
            1
        }

        fn size(&self) -> usize {
            2
        }

        fn barrier(&self) {}

        fn exchange_gaps(&self, _edges: &EdgeGaps) -> Result<NeighborGaps, ProtocolError> {
            Ok(NeighborGaps {
                previous: Some([10, 10].into_iter().collect()),
                next: None,
            })
        }

        fn exchange_vehicles(&self, _outgoing: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>, ProtocolError> {
            Ok(self.incoming.clone())
        }
    }

    #[test]
    fn unusable_arrivals_are_dropped() {
        let config = Config {
            lanes: 2,
            length: 20,
            initial_occupancy: 0.0,
            prob_slow_down: 0.0,
            prob_change: 0.0,
            ..Config::default()
        };
        let attributes = VehicleAttributes::from(&config);
        let record = |id: u64, pos: usize, speed: usize| {
            let mut buf = vec![];
            Vehicle::new(VehicleKey::default(), id, 0, pos, speed, &attributes).encode(&mut buf);
            buf
        };

        let mut lane0 = record(100, 50, 3);
        lane0.extend(record(101, 1, 2));
        let mut too_fast = record(102, 6, 2);
        too_fast[2] = 9.0;
        lane0.extend(too_fast);
        lane0.extend([1.0, 2.0]);
        let upstream = Upstream {
            incoming: vec![lane0, record(103, 2, 4), record(104, 0, 1)],
        };

        let mut sim = Simulation::new(&config, arrivals(), Partition::new(1, 2, 20, 2));
        // Site 1 stays occupied: its vehicle is blocked by the one at site 2.
        sim.add_vehicle(0, 1, 0).unwrap();
        sim.add_vehicle(0, 2, 0).unwrap();

        let report = sim.step(&upstream).unwrap();
        assert_eq!(report.migrated_in, 1);
        assert_eq!(report.spawned, 0);
        assert_eq!(sim.vehicle_count(), 3);

        let adopted = sim.find_vehicle(103).unwrap();
        assert_eq!((adopted.lane(), adopted.pos(), adopted.speed()), (1, 2, 4));
        for id in [100, 101, 102, 104] {
            assert!(sim.find_vehicle(id).is_none());
        }
        assert_eq!(sim.road().lane(0).occupancy(1), 1);
    }
}
