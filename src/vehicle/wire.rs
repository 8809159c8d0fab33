//! The flat record used to move a vehicle between partitions.
//!
//! Each vehicle is encoded as [RECORD_LEN] numbers in the order: id, position, speed,
//! max speed, the three gaps, the three look distances, the two probabilities and the
//! time on the road. The lane is implied by which buffer the record is in.

use super::Vehicle;
use crate::VehicleKey;
use thiserror::Error;

/// The number of values in one encoded vehicle.
pub const RECORD_LEN: usize = 13;

/// A record that cannot be turned back into a vehicle.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("record has {0} values, expected {}", RECORD_LEN)]
    Length(usize),
    #[error("field `{field}` is {value}, expected a non-negative whole number")]
    NotWhole { field: &'static str, value: f64 },
    #[error("field `{field}` is {value}, expected a probability")]
    NotProbability { field: &'static str, value: f64 },
    #[error("speed {speed} exceeds the maximum speed {max_speed}")]
    SpeedAboveMax { speed: usize, max_speed: usize },
}

impl Vehicle {
    /// Appends the vehicle's record to `out`.
    pub(crate) fn encode(&self, out: &mut Vec<f64>) {
        out.extend_from_slice(&[
            self.id as f64,
            self.pos as f64,
            self.speed as f64,
            self.max_speed as f64,
            self.gap_forward as f64,
            self.gap_other_forward as f64,
            self.gap_other_backward as f64,
            self.look_forward as f64,
            self.look_other_forward as f64,
            self.look_other_backward as f64,
            self.prob_slow_down,
            self.prob_change,
            self.time_on_road as f64,
        ]);
    }

    /// Rebuilds a vehicle in `lane` from its record. The key must be set before use.
    pub(crate) fn decode(record: &[f64], lane: usize) -> Result<Self, DecodeError> {
        if record.len() != RECORD_LEN {
            return Err(DecodeError::Length(record.len()));
        }
        let whole = |idx: usize, field: &'static str| {
            let value = record[idx];
            if value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
                Ok(value as u64)
            } else {
                Err(DecodeError::NotWhole { field, value })
            }
        };
        let prob = |idx: usize, field: &'static str| {
            let value = record[idx];
            if (0.0..=1.0).contains(&value) {
                Ok(value)
            } else {
                Err(DecodeError::NotProbability { field, value })
            }
        };

        let speed = whole(2, "speed")? as usize;
        let max_speed = whole(3, "max_speed")? as usize;
        if speed > max_speed {
            return Err(DecodeError::SpeedAboveMax { speed, max_speed });
        }

        Ok(Self {
            key: VehicleKey::default(),
            id: whole(0, "id")?,
            lane,
            pos: whole(1, "position")? as usize,
            speed,
            max_speed,
            gap_forward: whole(4, "gap_forward")? as usize,
            gap_other_forward: whole(5, "gap_other_forward")? as usize,
            gap_other_backward: whole(6, "gap_other_backward")? as usize,
            look_forward: whole(7, "look_forward")? as usize,
            look_other_forward: whole(8, "look_other_forward")? as usize,
            look_other_backward: whole(9, "look_other_backward")? as usize,
            prob_slow_down: prob(10, "prob_slow_down")?,
            prob_change: prob(11, "prob_change")?,
            time_on_road: whole(12, "time_on_road")? as usize,
        })
    }
}
