use crate::config::Config;
use crate::road::Road;
use crate::util::{chance, other_lane};
use crate::VehicleKey;
use log::debug;
use rand::Rng;

pub(crate) mod wire;

/// A simulated vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    /// The key of the vehicle within its current worker.
    pub(crate) key: VehicleKey,
    /// The vehicle's ID, unique across all workers.
    id: u64,
    /// The index of the lane the vehicle is in.
    lane: usize,
    /// The vehicle's site, in the local numbering of its current partition.
    pos: usize,
    /// The speed in sites per step.
    speed: usize,
    /// The maximum speed in sites per step.
    max_speed: usize,
    /// The empty sites ahead in the vehicle's own lane.
    gap_forward: usize,
    /// The empty sites ahead in the other lane.
    gap_other_forward: usize,
    /// The empty sites behind in the other lane.
    gap_other_backward: usize,
    /// The gap ahead the vehicle would like to have in its own lane.
    look_forward: usize,
    /// The gap ahead needed in the other lane before changing lanes.
    look_other_forward: usize,
    /// The gap behind needed in the other lane before changing lanes.
    look_other_backward: usize,
    /// The probability of randomly slowing down each step.
    prob_slow_down: f64,
    /// The probability of changing lanes when it is desirable and safe.
    prob_change: f64,
    /// The number of steps spent on the road.
    time_on_road: usize,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleAttributes {
    /// The maximum speed in sites per step.
    pub max_speed: usize,
    /// The initial gap ahead the vehicle would like to have in its own lane.
    pub look_forward: usize,
    /// The initial gap ahead needed in the other lane before changing lanes.
    pub look_other_forward: usize,
    /// The gap behind needed in the other lane before changing lanes.
    pub look_other_backward: usize,
    /// The probability of randomly slowing down each step.
    pub prob_slow_down: f64,
    /// The probability of changing lanes when it is desirable and safe.
    pub prob_change: f64,
}

impl From<&Config> for VehicleAttributes {
    fn from(config: &Config) -> Self {
        Self {
            max_speed: config.max_speed,
            look_forward: config.look_forward,
            look_other_forward: config.look_other_forward,
            look_other_backward: config.look_other_backward,
            prob_slow_down: config.prob_slow_down,
            prob_change: config.prob_change,
        }
    }
}

/// The result of moving a vehicle for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The vehicle is still within its partition.
    Stayed,
    /// The vehicle crossed into the next partition.
    /// Its position is now in the next partition's local numbering.
    Migrated { pos: usize },
    /// The vehicle drove off the end of the road after `steps` steps on it.
    Exited { steps: usize },
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(
        key: VehicleKey,
        id: u64,
        lane: usize,
        pos: usize,
        speed: usize,
        attributes: &VehicleAttributes,
    ) -> Self {
        Self {
            key,
            id,
            lane,
            pos,
            speed: usize::min(speed, attributes.max_speed),
            max_speed: attributes.max_speed,
            gap_forward: 0,
            gap_other_forward: 0,
            gap_other_backward: 0,
            look_forward: attributes.look_forward,
            look_other_forward: attributes.look_other_forward,
            look_other_backward: attributes.look_other_backward,
            prob_slow_down: attributes.prob_slow_down,
            prob_change: attributes.prob_change,
            time_on_road: 0,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the vehicle's key within its current worker.
    pub fn key(&self) -> VehicleKey {
        self.key
    }

    /// The index of the lane the vehicle is in.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// The vehicle's site, in the local numbering of its current partition.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The speed in sites per step.
    pub fn speed(&self) -> usize {
        self.speed
    }

    /// The maximum speed in sites per step.
    pub fn max_speed(&self) -> usize {
        self.max_speed
    }

    /// The empty sites ahead in the vehicle's own lane, as of the last gap computation.
    pub fn gap_forward(&self) -> usize {
        self.gap_forward
    }

    /// The empty sites ahead in the other lane, as of the last gap computation.
    pub fn gap_other_forward(&self) -> usize {
        self.gap_other_forward
    }

    /// The empty sites behind in the other lane, as of the last gap computation.
    pub fn gap_other_backward(&self) -> usize {
        self.gap_other_backward
    }

    /// The gap ahead the vehicle would like to have in its own lane.
    pub fn look_forward(&self) -> usize {
        self.look_forward
    }

    /// The number of steps spent on the road.
    pub fn time_on_road(&self) -> usize {
        self.time_on_road
    }

    /// Sets the vehicle's key after it is inserted into a worker.
    pub(crate) fn with_key(mut self, key: VehicleKey) -> Self {
        self.key = key;
        self
    }

    /// Measures the gaps around the vehicle.
    ///
    /// Scans stop at the edge of the partition. If no vehicle is found locally, the gap is
    /// extended by the gap reported by the neighbouring partition, or treated as open road
    /// at the ends of the road.
    pub(crate) fn compute_gaps(&mut self, road: &Road) {
        let lane = road.lane(self.lane);
        let partition = road.partition();
        let size = lane.size();

        self.look_forward = self.speed + 1;
        self.look_other_forward = self.look_forward;

        self.gap_forward = match lane.next_occupied(self.pos + 1) {
            Some(site) => site - self.pos - 1,
            None => partition.extend_forward(self.lane, size - self.pos - 1),
        };

        let other = match other_lane(self.lane, road.num_lanes()) {
            Some(other) => other,
            None => {
                self.gap_other_forward = 0;
                self.gap_other_backward = 0;
                return;
            }
        };
        let other_lane = road.lane(other);

        if other_lane.occupied(self.pos) {
            self.gap_other_forward = 0;
            self.gap_other_backward = 0;
            return;
        }

        self.gap_other_forward = match other_lane.next_occupied(self.pos + 1) {
            Some(site) => site - self.pos - 1,
            None => partition.extend_forward(other, size - self.pos - 1),
        };

        let behind = self.pos.checked_sub(1).and_then(|from| other_lane.prev_occupied(from));
        self.gap_other_backward = match behind {
            Some(site) => self.pos - site - 1,
            None => partition.extend_backward(other, self.pos),
        };
    }

    /// Moves the vehicle into the other lane if its own lane is congested, the other lane is
    /// clear both ahead and behind, and a random draw allows it.
    /// Returns `true` if the vehicle changed lanes.
    pub(crate) fn decide_lane_switch<R: Rng + ?Sized>(
        &mut self,
        road: &mut Road,
        rng: &mut R,
    ) -> bool {
        let other = match other_lane(self.lane, road.num_lanes()) {
            Some(other) => other,
            None => return false,
        };

        let wants_switch = self.gap_forward < self.look_forward
            && self.gap_other_forward > self.look_other_forward
            && self.gap_other_backward > self.look_other_backward;
        if !wants_switch || !chance(rng, self.prob_change) {
            return false;
        }

        debug!("vehicle {} switched lane {} -> {}", self.id, self.lane, other);
        road.lane_mut(other).add(self.pos, self.key);
        road.lane_mut(self.lane).remove(self.pos);
        self.lane = other;
        true
    }

    /// Updates the vehicle's speed and advances it.
    ///
    /// The speed is increased by one up to the maximum, capped at the gap ahead, and then
    /// randomly reduced by one. If the vehicle leaves its partition, it is removed from its lane.
    pub(crate) fn step<R: Rng + ?Sized>(&mut self, road: &mut Road, rng: &mut R) -> StepOutcome {
        self.time_on_road += 1;

        self.speed = usize::min(self.speed + 1, self.max_speed);
        self.speed = usize::min(self.speed, self.gap_forward);
        if self.speed > 0 && chance(rng, self.prob_slow_down) {
            self.speed -= 1;
        }

        let new_pos = self.pos + self.speed;
        let size = road.lane(self.lane).size();

        if new_pos < size {
            if new_pos != self.pos {
                let lane = road.lane_mut(self.lane);
                lane.add(new_pos, self.key);
                lane.remove(self.pos);
                self.pos = new_pos;
            }
            return StepOutcome::Stayed;
        }

        road.lane_mut(self.lane).remove(self.pos);
        if road.partition().is_last() {
            self.pos = new_pos;
            StepOutcome::Exited {
                steps: self.time_on_road,
            }
        } else {
            self.pos = new_pos - size;
            StepOutcome::Migrated { pos: self.pos }
        }
    }
}
