use crate::util::Interval;
use crate::MAX_LANES;
use arrayvec::ArrayVec;

/// The span of the road owned by one worker, along with the boundary gaps
/// most recently reported by its neighbours.
#[derive(Clone, Debug)]
pub struct Partition {
    /// The rank of the owning worker.
    rank: usize,
    /// The number of workers.
    workers: usize,
    /// The length of the whole road in sites.
    total_length: usize,
    /// The global sites owned by this partition.
    span: Interval<usize>,
    /// Per lane, the empty sites after the last vehicle of the previous partition.
    gap_from_previous: ArrayVec<usize, MAX_LANES>,
    /// Per lane, the empty sites before the first vehicle of the next partition.
    gap_from_next: ArrayVec<usize, MAX_LANES>,
}

impl Partition {
    /// Computes the partition of a road of `total_length` sites owned by worker `rank`.
    /// The last worker also owns any sites left over by the division.
    pub fn new(rank: usize, workers: usize, total_length: usize, lanes: usize) -> Self {
        debug_assert!(rank < workers && workers <= total_length);
        let per_worker = total_length / workers;
        let start = rank * per_worker;
        let end = if rank + 1 == workers {
            total_length
        } else {
            start + per_worker
        };
        Self {
            rank,
            workers,
            total_length,
            span: Interval::new(start, end),
            gap_from_previous: (0..lanes).map(|_| 0).collect(),
            gap_from_next: (0..lanes).map(|_| 0).collect(),
        }
    }

    /// A single partition covering the whole road.
    pub fn whole(total_length: usize, lanes: usize) -> Self {
        Self::new(0, 1, total_length, lanes)
    }

    /// The rank of the owning worker.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The length of the whole road in sites.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// The global sites owned by this partition.
    pub fn span(&self) -> Interval<usize> {
        self.span
    }

    /// The first global site owned by this partition.
    pub fn start_site(&self) -> usize {
        self.span.min
    }

    /// One past the last global site owned by this partition.
    pub fn end_site(&self) -> usize {
        self.span.max
    }

    /// The number of sites owned by this partition.
    pub fn len(&self) -> usize {
        self.span.length()
    }

    /// Whether the partition owns the entry of the road, where vehicles spawn.
    pub fn is_first(&self) -> bool {
        self.rank == 0
    }

    /// Whether the partition owns the exit of the road.
    pub fn is_last(&self) -> bool {
        self.rank + 1 == self.workers
    }

    /// Converts a local site to a global site.
    pub fn to_global(&self, site: usize) -> usize {
        self.span.min + site
    }

    /// Converts a global site to a local site, if this partition owns it.
    pub fn to_local(&self, site: usize) -> Option<usize> {
        self.span.contains(site).then(|| site - self.span.min)
    }

    /// The largest gap that can occur on the road, used when nothing lies beyond the road's ends.
    pub fn open_gap(&self) -> usize {
        self.total_length.saturating_sub(1)
    }

    /// The empty sites after the last vehicle of the previous partition in `lane`,
    /// or `None` if this partition owns the road's entry.
    pub fn gap_from_previous(&self, lane: usize) -> Option<usize> {
        (!self.is_first()).then(|| self.gap_from_previous[lane])
    }

    /// The empty sites before the first vehicle of the next partition in `lane`,
    /// or `None` if this partition owns the road's exit.
    pub fn gap_from_next(&self, lane: usize) -> Option<usize> {
        (!self.is_last()).then(|| self.gap_from_next[lane])
    }

    /// Records the gap reported by the previous partition.
    pub fn set_gap_from_previous(&mut self, lane: usize, gap: usize) {
        self.gap_from_previous[lane] = gap;
    }

    /// Records the gap reported by the next partition.
    pub fn set_gap_from_next(&mut self, lane: usize, gap: usize) {
        self.gap_from_next[lane] = gap;
    }

    /// Extends a forward scan that found no vehicle locally.
    /// `residual` is the number of empty local sites ahead of the scan's origin.
    pub fn extend_forward(&self, lane: usize, residual: usize) -> usize {
        match self.gap_from_next(lane) {
            Some(gap) => usize::min(residual + gap, self.open_gap()),
            None => self.open_gap(),
        }
    }

    /// Extends a backward scan that found no vehicle locally.
    /// `residual` is the number of empty local sites behind the scan's origin.
    pub fn extend_backward(&self, lane: usize, residual: usize) -> usize {
        match self.gap_from_previous(lane) {
            Some(gap) => usize::min(residual + gap, self.open_gap()),
            None => self.open_gap(),
        }
    }
}
