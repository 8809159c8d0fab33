//! Communication between the workers simulating neighbouring partitions of the road.
//!
//! Workers exchange two kinds of message: the gaps at the edges of their lanes, and the
//! vehicles crossing from one partition into the next. Nothing else crosses a partition
//! boundary.

use crate::MAX_LANES;
use arrayvec::ArrayVec;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Barrier};
use thiserror::Error;

/// Per lane gap values.
pub type LaneGaps = ArrayVec<usize, MAX_LANES>;

/// A failure to communicate with a neighbouring worker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("worker {0} disconnected")]
    Disconnected(usize),
    #[error("expected {expected} from worker {from}, received {received}")]
    Unexpected {
        from: usize,
        expected: &'static str,
        received: &'static str,
    },
}

/// The gaps at the edges of a partition's lanes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeGaps {
    /// Per lane, the empty sites before the first vehicle.
    pub from_start: LaneGaps,
    /// Per lane, the empty sites after the last vehicle.
    pub from_end: LaneGaps,
}

/// The edge gaps received from a partition's neighbours.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NeighborGaps {
    /// The previous partition's gaps from the end of its lanes, if there is one.
    pub previous: Option<LaneGaps>,
    /// The next partition's gaps from the start of its lanes, if there is one.
    pub next: Option<LaneGaps>,
}

/// The operations a worker needs to coordinate with the others.
pub trait Communicator {
    /// The index of this worker, counting from the road's entry.
    fn rank(&self) -> usize;

    /// The number of workers.
    fn size(&self) -> usize;

    /// Blocks until every worker has reached the barrier.
    fn barrier(&self);

    /// Sends this partition's edge gaps to both neighbours and receives theirs.
    fn exchange_gaps(&self, edges: &EdgeGaps) -> Result<NeighborGaps, ProtocolError>;

    /// Sends the encoded vehicles leaving this partition, one buffer per lane, to the next
    /// worker, and receives those arriving from the previous one.
    fn exchange_vehicles(&self, outgoing: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>, ProtocolError>;
}

#[derive(Debug)]
enum Message {
    Gaps(LaneGaps),
    Vehicles(Vec<Vec<f64>>),
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Gaps(_) => "gaps",
            Message::Vehicles(_) => "vehicles",
        }
    }
}

/// A link to one neighbouring worker.
#[derive(Debug)]
struct Link {
    rank: usize,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Link {
    fn send(&self, msg: Message) -> Result<(), ProtocolError> {
        self.tx
            .send(msg)
            .map_err(|_| ProtocolError::Disconnected(self.rank))
    }

    fn recv(&self) -> Result<Message, ProtocolError> {
        self.rx
            .recv()
            .map_err(|_| ProtocolError::Disconnected(self.rank))
    }

    fn recv_gaps(&self) -> Result<LaneGaps, ProtocolError> {
        match self.recv()? {
            Message::Gaps(gaps) => Ok(gaps),
            other => Err(self.unexpected("gaps", &other)),
        }
    }

    fn recv_vehicles(&self) -> Result<Vec<Vec<f64>>, ProtocolError> {
        match self.recv()? {
            Message::Vehicles(buffers) => Ok(buffers),
            other => Err(self.unexpected("vehicles", &other)),
        }
    }

    fn unexpected(&self, expected: &'static str, received: &Message) -> ProtocolError {
        ProtocolError::Unexpected {
            from: self.rank,
            expected,
            received: received.kind(),
        }
    }
}

/// A worker's endpoint of an in-process network of workers running on separate threads.
/// Neighbours are connected by unbounded channels, so sends never block.
#[derive(Debug)]
pub struct LocalNetwork {
    rank: usize,
    size: usize,
    previous: Option<Link>,
    next: Option<Link>,
    barrier: Arc<Barrier>,
}

impl LocalNetwork {
    /// Creates a connected endpoint for each of `workers` workers, ordered by rank.
    pub fn create(workers: usize) -> Vec<LocalNetwork> {
        let barrier = Arc::new(Barrier::new(workers));
        let mut endpoints = (0..workers)
            .map(|rank| LocalNetwork {
                rank,
                size: workers,
                previous: None,
                next: None,
                barrier: barrier.clone(),
            })
            .collect::<Vec<_>>();

        for rank in 1..workers {
            let (forward_tx, forward_rx) = unbounded();
            let (backward_tx, backward_rx) = unbounded();
            endpoints[rank - 1].next = Some(Link {
                rank,
                tx: forward_tx,
                rx: backward_rx,
            });
            endpoints[rank].previous = Some(Link {
                rank: rank - 1,
                tx: backward_tx,
                rx: forward_rx,
            });
        }
        endpoints
    }
}

impl Communicator for LocalNetwork {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    fn exchange_gaps(&self, edges: &EdgeGaps) -> Result<NeighborGaps, ProtocolError> {
        if let Some(link) = &self.previous {
            link.send(Message::Gaps(edges.from_start.clone()))?;
        }
        if let Some(link) = &self.next {
            link.send(Message::Gaps(edges.from_end.clone()))?;
        }
        Ok(NeighborGaps {
            previous: self.previous.as_ref().map(Link::recv_gaps).transpose()?,
            next: self.next.as_ref().map(Link::recv_gaps).transpose()?,
        })
    }

    fn exchange_vehicles(&self, outgoing: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>, ProtocolError> {
        if let Some(link) = &self.next {
            link.send(Message::Vehicles(outgoing))?;
        }
        match &self.previous {
            Some(link) => link.recv_vehicles(),
            None => Ok(vec![]),
        }
    }
}
