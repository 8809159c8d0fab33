//! Miscellaneous utility structs and functions.

use rand::distributions::{Distribution, OpenClosed01};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open span `[min, max)` of road sites.
#[derive(Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl Interval<usize> {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Whether `site` lies within the span.
    pub fn contains(&self, site: usize) -> bool {
        (self.min..self.max).contains(&site)
    }

    /// The number of sites in the span.
    pub fn length(&self) -> usize {
        self.max.saturating_sub(self.min)
    }
}

impl<T: fmt::Display> fmt::Debug for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// The other lane of a two lane road, if there is one.
pub fn other_lane(lane: usize, num_lanes: usize) -> Option<usize> {
    match (num_lanes, lane) {
        (2, 0) => Some(1),
        (2, 1) => Some(0),
        _ => None,
    }
}

/// Returns `true` with probability `prob`.
/// The draw lies in `(0, 1]`, so a probability of 0 never fires and 1 always does.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    let draw: f64 = OpenClosed01.sample(rng);
    draw <= prob
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn half_open() {
        let span = Interval::new(5, 10);
        assert!(span.contains(5));
        assert!(span.contains(9));
        assert!(!span.contains(10));
        assert!(!span.contains(4));
        assert_eq!(span.length(), 5);
        assert_eq!(format!("{:?}", span), "5..10");
    }

    #[test]
    fn certain_and_impossible() {
        use rand::SeedableRng;
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(chance(&mut rng, 1.0));
            assert!(!chance(&mut rng, 0.0));
        }
    }

    #[test]
    fn other_lanes() {
        assert_eq!(other_lane(0, 2), Some(1));
        assert_eq!(other_lane(1, 2), Some(0));
        assert_eq!(other_lane(0, 1), None);
    }
}
