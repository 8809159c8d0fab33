use serde::Serialize;

/// A running accumulator of scalar samples, such as vehicle travel times.
///
/// Serializes as its summary: average, variance and count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(into = "Summary")]
pub struct Statistic {
    /// The number of samples.
    count: usize,
    /// The running mean.
    mean: f64,
    /// The sum of squared deviations from the mean.
    m2: f64,
}

impl Statistic {
    /// Creates an empty statistic.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a sample.
    pub fn add_value(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Folds the samples of another statistic into this one.
    pub fn merge(&mut self, other: &Statistic) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let (n_a, n_b) = (self.count as f64, other.count as f64);
        self.mean += delta * n_b / count as f64;
        self.m2 += other.m2 + delta * delta * n_a * n_b / count as f64;
        self.count = count;
    }

    /// The mean of the samples, or NaN if there are none.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// The sample variance (`N - 1` denominator), or NaN with fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// The number of samples.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// The reported form of a [Statistic]. Undefined values serialize as `null`.
#[derive(Serialize)]
struct Summary {
    average: Option<f64>,
    variance: Option<f64>,
    count: usize,
}

impl From<Statistic> for Summary {
    fn from(stat: Statistic) -> Self {
        let defined = |value: f64| (!value.is_nan()).then(|| value);
        Summary {
            average: defined(stat.average()),
            variance: defined(stat.variance()),
            count: stat.count(),
        }
    }
}
