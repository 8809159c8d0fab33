//! Running a simulation split across several workers.

use crate::arrival::ArrivalProcess;
use crate::config::Config;
use crate::network::{Communicator, LocalNetwork, ProtocolError};
use crate::partition::Partition;
use crate::simulation::Simulation;
use crate::statistic::Statistic;
use crate::util::Interval;
use serde::Serialize;
use std::time::Instant;

/// The outcome of one worker's simulation.
#[derive(Clone, Debug, Serialize)]
pub struct WorkerReport {
    /// The worker's rank.
    pub rank: usize,
    /// The global sites the worker simulated.
    pub span: Interval<usize>,
    /// Travel times of vehicles that left the road from this worker, in seconds.
    pub travel_time: Statistic,
    /// The vehicles still in the worker's partition at the end.
    pub vehicles_remaining: usize,
    /// Wall clock time spent simulating, in seconds.
    pub elapsed_secs: f64,
}

/// The outcome of a whole simulation.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// The number of steps simulated.
    pub steps: usize,
    /// Wall clock time of the whole run, in seconds.
    pub elapsed_secs: f64,
    /// Travel times of every vehicle that left the road after the warm-up period, in seconds.
    pub travel_time: Statistic,
    /// Per worker results, ordered by rank.
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// The average wall clock time per step, in seconds.
    pub fn secs_per_step(&self) -> f64 {
        self.elapsed_secs / self.steps as f64
    }

    /// The average number of steps per second of wall clock time.
    pub fn steps_per_sec(&self) -> f64 {
        self.steps as f64 / self.elapsed_secs
    }
}

/// Simulates the road split evenly across `workers` workers, each on its own thread.
///
/// The configuration is assumed to be valid for this number of workers.
pub fn run_partitioned(
    config: &Config,
    arrivals: &ArrivalProcess,
    workers: usize,
) -> Result<RunReport, ProtocolError> {
    let start = Instant::now();
    let endpoints = LocalNetwork::create(workers);

    let results = std::thread::scope(|scope| {
        let handles = endpoints
            .into_iter()
            .map(|net| {
                let arrivals = arrivals.clone();
                scope.spawn(move || -> Result<WorkerReport, ProtocolError> {
                    let started = Instant::now();
                    let partition = Partition::new(net.rank(), workers, config.length, config.lanes);
                    let mut sim = Simulation::new(config, arrivals, partition);
                    sim.run(&net)?;
                    Ok(WorkerReport {
                        rank: sim.rank(),
                        span: sim.road().partition().span(),
                        travel_time: *sim.travel_time(),
                        vehicles_remaining: sim.vehicle_count(),
                        elapsed_secs: started.elapsed().as_secs_f64(),
                    })
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect::<Vec<Result<WorkerReport, ProtocolError>>>()
    });

    let workers = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    let mut travel_time = Statistic::new();
    for worker in &workers {
        travel_time.merge(&worker.travel_time);
    }

    Ok(RunReport {
        steps: config.max_time,
        elapsed_secs: start.elapsed().as_secs_f64(),
        travel_time,
        workers,
    })
}
