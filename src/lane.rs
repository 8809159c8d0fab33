use crate::VehicleKey;
use log::error;
use smallvec::SmallVec;

/// The vehicles in one site. Normally holds at most one vehicle, but briefly holds two
/// while a vehicle is being moved into a site before leaving its old one.
type Site = SmallVec<[VehicleKey; 2]>;

/// A lane represents one row of sites within a worker's span of the road.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The index of the lane on the road.
    index: usize,
    /// The sites, in local numbering.
    sites: Vec<Site>,
    /// The number of steps until the next spawn attempt.
    steps_to_spawn: usize,
}

impl Lane {
    /// Creates an empty lane with `size` sites.
    pub fn new(index: usize, size: usize) -> Self {
        Self {
            index,
            sites: vec![Site::new(); size],
            steps_to_spawn: 0,
        }
    }

    /// The index of the lane on the road.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The number of sites in the lane.
    pub fn size(&self) -> usize {
        self.sites.len()
    }

    /// Whether there is a vehicle in the given site.
    pub fn occupied(&self, site: usize) -> bool {
        !self.sites[site].is_empty()
    }

    /// The number of vehicles in the given site.
    pub fn occupancy(&self, site: usize) -> usize {
        self.sites[site].len()
    }

    /// The vehicle at the front of the given site, if any.
    pub fn vehicle_at(&self, site: usize) -> Option<VehicleKey> {
        self.sites[site].first().copied()
    }

    /// Appends a vehicle to a site. Never displaces a vehicle already there.
    pub(crate) fn add(&mut self, site: usize, vehicle: VehicleKey) {
        self.sites[site].push(vehicle);
    }

    /// Removes the vehicle that has been in a site the longest.
    pub(crate) fn remove(&mut self, site: usize) -> Option<VehicleKey> {
        if self.sites[site].is_empty() {
            debug_assert!(false, "remove from empty site {} of lane {}", site, self.index);
            error!("remove from empty site {} of lane {}", site, self.index);
            None
        } else {
            Some(self.sites[site].remove(0))
        }
    }

    /// The first occupied site at or after `from`, if any.
    pub fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.size()).find(|site| self.occupied(*site))
    }

    /// The last occupied site at or before `from`, if any.
    pub fn prev_occupied(&self, from: usize) -> Option<usize> {
        (0..=from.min(self.size().saturating_sub(1)))
            .rev()
            .find(|site| self.occupied(*site))
    }

    /// The number of empty sites before the first vehicle, or the lane size if it is empty.
    pub fn gap_from_start(&self) -> usize {
        self.next_occupied(0).unwrap_or(self.size())
    }

    /// The number of empty sites after the last vehicle, or the lane size if it is empty.
    pub fn gap_from_end(&self) -> usize {
        match self.size().checked_sub(1).and_then(|last| self.prev_occupied(last)) {
            Some(site) => self.size() - 1 - site,
            None => self.size(),
        }
    }

    /// Counts down to the next spawn attempt.
    /// Returns `true` if the countdown has run out and a spawn should be attempted.
    pub(crate) fn spawn_due(&mut self) -> bool {
        if self.steps_to_spawn == 0 {
            true
        } else {
            self.steps_to_spawn -= 1;
            false
        }
    }

    /// Schedules the next spawn attempt.
    pub(crate) fn schedule_spawn(&mut self, steps: usize) {
        self.steps_to_spawn = steps;
    }

    /// Iterates over the vehicles in the lane along with their sites.
    pub fn iter(&self) -> impl Iterator<Item = (usize, VehicleKey)> + '_ {
        self.sites
            .iter()
            .enumerate()
            .flat_map(|(site, vehs)| vehs.iter().map(move |veh| (site, *veh)))
    }
}
