use crate::arrival::ArrivalProcess;
use crate::lane::Lane;
use crate::network::{EdgeGaps, NeighborGaps};
use crate::partition::Partition;
use crate::util::chance;
use crate::vehicle::{Vehicle, VehicleAttributes};
use crate::{VehicleKey, VehicleSet, MAX_LANES};
use arrayvec::ArrayVec;
use log::debug;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};

/// The lanes of one partition of the road, and the arrival process feeding its entry.
#[derive(Clone, Debug)]
pub struct Road {
    /// The lanes, indexed by lane number.
    lanes: ArrayVec<Lane, MAX_LANES>,
    /// The span of the road these lanes cover.
    partition: Partition,
    /// The distribution of time between vehicles entering a lane.
    arrivals: ArrivalProcess,
}

impl Road {
    /// Creates an empty road with `lanes` lanes covering the given partition.
    pub fn new(partition: Partition, lanes: usize, arrivals: ArrivalProcess) -> Self {
        debug_assert!(lanes >= 1 && lanes <= MAX_LANES);
        Self {
            lanes: (0..lanes.min(MAX_LANES))
                .map(|idx| Lane::new(idx, partition.len()))
                .collect(),
            partition,
            arrivals,
        }
    }

    /// The number of lanes.
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Gets a lane by index.
    pub fn lane(&self, idx: usize) -> &Lane {
        &self.lanes[idx]
    }

    pub(crate) fn lane_mut(&mut self, idx: usize) -> &mut Lane {
        &mut self.lanes[idx]
    }

    /// Returns an iterator over the lanes.
    pub fn lanes(&self) -> impl DoubleEndedIterator<Item = &Lane> {
        self.lanes.iter()
    }

    /// The span of the road covered by this partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The gaps at each end of each lane, to be reported to the neighbouring partitions.
    pub fn edge_gaps(&self) -> EdgeGaps {
        EdgeGaps {
            from_start: self.lanes.iter().map(Lane::gap_from_start).collect(),
            from_end: self.lanes.iter().map(Lane::gap_from_end).collect(),
        }
    }

    /// Records the gaps reported by the neighbouring partitions.
    pub fn apply_neighbor_gaps(&mut self, gaps: &NeighborGaps) {
        if let Some(previous) = &gaps.previous {
            for (lane, gap) in previous.iter().enumerate().take(self.num_lanes()) {
                self.partition.set_gap_from_previous(lane, *gap);
            }
        }
        if let Some(next) = &gaps.next {
            for (lane, gap) in next.iter().enumerate().take(self.num_lanes()) {
                self.partition.set_gap_from_next(lane, *gap);
            }
        }
    }

    /// Adds an existing vehicle to the lane it is in.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &mut VehicleSet, vehicle: Vehicle) -> VehicleKey {
        let (lane, pos) = (vehicle.lane(), vehicle.pos());
        let key = vehicles.insert_with_key(|key| vehicle.with_key(key));
        self.lanes[lane].add(pos, key);
        key
    }

    /// Spawns a vehicle at the entry of each lane whose spawn countdown has run out,
    /// provided the entry site is free. Returns the number of vehicles spawned.
    ///
    /// Spawned vehicles start at their maximum speed, or at rest with the slow down probability.
    /// The next spawn is scheduled by sampling the arrival process.
    pub(crate) fn attempt_spawn<R: Rng + ?Sized>(
        &mut self,
        vehicles: &mut VehicleSet,
        next_id: &mut u64,
        attributes: &VehicleAttributes,
        step_size: f64,
        rng: &mut R,
    ) -> usize {
        let mut spawned = 0;
        for idx in 0..self.lanes.len() {
            if !self.lanes[idx].spawn_due() || self.lanes[idx].occupied(0) {
                continue;
            }

            let speed = if chance(rng, attributes.prob_slow_down) {
                0
            } else {
                attributes.max_speed
            };
            let id = *next_id;
            *next_id += 1;
            debug!("spawning vehicle {} in lane {} at speed {}", id, idx, speed);
            let key = vehicles.insert_with_key(|key| Vehicle::new(key, id, idx, 0, speed, attributes));
            self.lanes[idx].add(0, key);
            spawned += 1;

            let steps = self.arrivals.sample(rng) / step_size;
            self.lanes[idx].schedule_spawn(steps as usize);
        }
        spawned
    }

    /// Fills each site independently with probability `occupancy`, giving each new vehicle
    /// a uniformly random speed. `id_for` maps a lane and global site to a vehicle ID.
    /// Returns the number of vehicles placed.
    pub(crate) fn populate<R: Rng + ?Sized>(
        &mut self,
        vehicles: &mut VehicleSet,
        attributes: &VehicleAttributes,
        occupancy: f64,
        id_for: impl Fn(usize, usize) -> u64,
        rng: &mut R,
    ) -> usize {
        let occupied = match Bernoulli::new(occupancy) {
            Ok(distr) => distr,
            Err(err) => {
                log::warn!("not populating road: {}", err);
                return 0;
            }
        };
        let speeds = Uniform::new_inclusive(0, attributes.max_speed);

        let mut placed = 0;
        for idx in 0..self.lanes.len() {
            for site in 0..self.partition.len() {
                if !occupied.sample(rng) {
                    continue;
                }
                let id = id_for(idx, self.partition.to_global(site));
                let speed = speeds.sample(rng);
                let key = vehicles
                    .insert_with_key(|key| Vehicle::new(key, id, idx, site, speed, attributes));
                self.lanes[idx].add(site, key);
                placed += 1;
            }
        }
        placed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn attributes() -> VehicleAttributes {
        VehicleAttributes {
            max_speed: 5,
            look_forward: 6,
            look_other_forward: 6,
            look_other_backward: 2,
            prob_slow_down: 0.0,
            prob_change: 1.0,
        }
    }

    #[test]
    fn spawn_schedule() {
        let arrivals = ArrivalProcess::from_pairs(&[(3.0, 1.0)]).unwrap();
        let mut road = Road::new(Partition::whole(10, 2), 2, arrivals);
        let mut vehicles = VehicleSet::with_key();
        let mut rng = XorShiftRng::seed_from_u64(0);
        let mut next_id = 100;

        // Countdown starts at zero, so both lanes spawn immediately.
        let spawned = road.attempt_spawn(&mut vehicles, &mut next_id, &attributes(), 1.0, &mut rng);
        assert_eq!(spawned, 2);
        assert_eq!(next_id, 102);
        assert!(road.lane(0).occupied(0) && road.lane(1).occupied(0));
        assert!(vehicles.values().all(|veh| veh.speed() == 5 && veh.pos() == 0));

        // Vacate the entry; the countdown of 3 steps must run out first.
        for idx in 0..2 {
            road.lane_mut(idx).remove(0);
        }
        for _ in 0..3 {
            let spawned =
                road.attempt_spawn(&mut vehicles, &mut next_id, &attributes(), 1.0, &mut rng);
            assert_eq!(spawned, 0);
        }
        let spawned = road.attempt_spawn(&mut vehicles, &mut next_id, &attributes(), 1.0, &mut rng);
        assert_eq!(spawned, 2);
    }

    #[test]
    fn spawn_waits_for_free_entry() {
        let arrivals = ArrivalProcess::from_pairs(&[(0.0, 1.0)]).unwrap();
        let mut road = Road::new(Partition::whole(10, 1), 1, arrivals);
        let mut vehicles = VehicleSet::with_key();
        let mut rng = XorShiftRng::seed_from_u64(0);
        let mut next_id = 0;

        assert_eq!(road.attempt_spawn(&mut vehicles, &mut next_id, &attributes(), 1.0, &mut rng), 1);
        assert_eq!(road.attempt_spawn(&mut vehicles, &mut next_id, &attributes(), 1.0, &mut rng), 0);
        assert_eq!(road.lane(0).occupancy(0), 1);
        assert_eq!(vehicles.len(), 1);
    }

    #[test]
    fn edge_gaps_and_neighbors() {
        let arrivals = ArrivalProcess::from_pairs(&[(1.0, 1.0)]).unwrap();
        let mut road = Road::new(Partition::new(1, 3, 30, 2), 2, arrivals);
        let mut vehicles = VehicleSet::with_key();
        let attributes = attributes();
        road.insert_vehicle(&mut vehicles, Vehicle::new(Default::default(), 0, 0, 3, 0, &attributes));

        let gaps = road.edge_gaps();
        assert_eq!(gaps.from_start.as_slice(), &[3, 10]);
        assert_eq!(gaps.from_end.as_slice(), &[6, 10]);

        road.apply_neighbor_gaps(&NeighborGaps {
            previous: Some([4, 7].into_iter().collect()),
            next: Some([1, 2].into_iter().collect()),
        });
        assert_eq!(road.partition().gap_from_previous(1), Some(7));
        assert_eq!(road.partition().gap_from_next(0), Some(1));
    }

    #[test]
    fn populate_full_and_empty() {
        let arrivals = ArrivalProcess::from_pairs(&[(1.0, 1.0)]).unwrap();
        let mut road = Road::new(Partition::new(1, 2, 20, 2), 2, arrivals);
        let mut vehicles = VehicleSet::with_key();
        let mut rng = XorShiftRng::seed_from_u64(3);
        let id_for = |lane: usize, site: usize| (lane * 20 + site) as u64;

        assert_eq!(road.populate(&mut vehicles, &attributes(), 0.0, id_for, &mut rng), 0);
        assert_eq!(road.populate(&mut vehicles, &attributes(), 1.0, id_for, &mut rng), 20);
        assert!(vehicles.values().all(|veh| veh.speed() <= 5));
        let mut ids = vehicles.values().map(Vehicle::id).collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids.first(), Some(&10));
        assert_eq!(ids.last(), Some(&39));
    }
}
