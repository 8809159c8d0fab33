//! A discrete-time cellular automaton traffic simulation on a straight, multi-lane road.
//!
//! The road can be split into contiguous spans of sites, each owned by one worker.
//! Workers only influence each other through exchanged boundary gaps and migrated vehicles.

pub use arrival::{ArrivalError, ArrivalProcess};
pub use config::{Config, ConfigError};
pub use lane::Lane;
pub use network::{Communicator, EdgeGaps, LocalNetwork, NeighborGaps, ProtocolError};
pub use partition::Partition;
pub use road::Road;
pub use runner::{run_partitioned, RunReport, WorkerReport};
pub use simulation::{Simulation, StepReport};
use slotmap::{new_key_type, SlotMap};
pub use statistic::Statistic;
pub use util::Interval;
pub use vehicle::{StepOutcome, Vehicle, VehicleAttributes};

mod arrival;
mod config;
mod debug;
mod lane;
mod network;
mod partition;
mod road;
mod runner;
mod simulation;
mod statistic;
mod util;
mod vehicle;

/// The maximum number of lanes on a road.
pub const MAX_LANES: usize = 2;

new_key_type! {
    /// Key of a [Vehicle] within the worker that currently holds it.
    /// Unlike [Vehicle::id], it does not survive migration.
    pub struct VehicleKey;
}

type VehicleSet = SlotMap<VehicleKey, Vehicle>;
