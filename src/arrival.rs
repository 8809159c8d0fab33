//! The empirical distribution of vehicle interarrival times.

use rand::Rng;
use std::path::Path;
use thiserror::Error;

/// A failure to load an arrival table.
#[derive(Debug, Error)]
pub enum ArrivalError {
    #[error("failed to read arrival table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("line {line} of the arrival table: {reason}")]
    Parse { line: usize, reason: String },
    #[error("cumulative probability decreases at entry {entry} of the arrival table")]
    Decreasing { entry: usize },
    #[error("the arrival table is empty")]
    Empty,
}

/// An empirical cumulative distribution function, sampled by inversion.
#[derive(Clone, Debug)]
pub struct ArrivalProcess {
    /// The tabulated values, in seconds.
    values: Vec<f64>,
    /// The cumulative probability at each value, ascending.
    cdf: Vec<f64>,
}

impl ArrivalProcess {
    /// Creates an arrival process from `(value, cumulative_probability)` pairs.
    /// A decreasing probability is reported by its 1-based entry number.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, ArrivalError> {
        if pairs.is_empty() {
            return Err(ArrivalError::Empty);
        }
        if let Some(idx) = first_decrease(pairs) {
            return Err(ArrivalError::Decreasing { entry: idx + 1 });
        }
        Ok(Self {
            values: pairs.iter().map(|(value, _)| *value).collect(),
            cdf: pairs.iter().map(|(_, prob)| *prob).collect(),
        })
    }

    /// Reads a two column table, one `value,probability` pair per line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArrivalError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ArrivalError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses the contents of an arrival table.
    pub fn parse(text: &str) -> Result<Self, ArrivalError> {
        let mut pairs = vec![];
        let mut lines = vec![];
        for (idx, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let fields = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ArrivalError::Parse {
                    line: idx + 1,
                    reason: err.to_string(),
                })?;
            match fields[..] {
                [value, prob] => {
                    pairs.push((value, prob));
                    lines.push(idx + 1);
                }
                _ => {
                    return Err(ArrivalError::Parse {
                        line: idx + 1,
                        reason: format!("expected 2 columns, found {}", fields.len()),
                    })
                }
            }
        }
        if let Some(idx) = first_decrease(&pairs) {
            return Err(ArrivalError::Parse {
                line: lines[idx],
                reason: "cumulative probabilities must not decrease".into(),
            });
        }
        Self::from_pairs(&pairs)
    }

    /// Samples an interarrival time.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sample_at(rng.gen::<f64>())
    }

    /// Returns the smallest value whose cumulative probability is at least `u`.
    /// Falls back to the largest tabulated value if the table never reaches `u`.
    pub fn sample_at(&self, u: f64) -> f64 {
        self.cdf
            .iter()
            .position(|prob| *prob >= u)
            .map(|idx| self.values[idx])
            .unwrap_or_else(|| self.values[self.values.len() - 1])
    }
}

/// The index of the first pair whose probability is below its predecessor's.
fn first_decrease(pairs: &[(f64, f64)]) -> Option<usize> {
    pairs
        .windows(2)
        .position(|window| window[1].1 < window[0].1)
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn inverse_sampling() {
        let arrivals = ArrivalProcess::from_pairs(&[(5.0, 0.5), (10.0, 1.0)]).unwrap();
        assert_eq!(arrivals.sample_at(0.3), 5.0);
        assert_eq!(arrivals.sample_at(0.5), 5.0);
        assert_eq!(arrivals.sample_at(0.9), 10.0);
    }

    /// A table that stops short of probability 1 returns its last value.
    /// This hides incomplete tables rather than reporting them.
    #[test]
    fn incomplete_table_falls_back_to_last_value() {
        let arrivals = ArrivalProcess::from_pairs(&[(2.0, 0.2), (3.0, 0.6)]).unwrap();
        assert_eq!(arrivals.sample_at(0.7), 3.0);
        assert_eq!(arrivals.sample_at(0.99), 3.0);
    }

    #[test]
    fn parse_table() {
        let text = "# interarrival times\n1.5,0.25\n\n3.0, 0.75\n6.0 1.0\n";
        let arrivals = ArrivalProcess::parse(text).unwrap();
        assert_eq!(arrivals.sample_at(0.1), 1.5);
        assert_eq!(arrivals.sample_at(0.5), 3.0);
        assert_eq!(arrivals.sample_at(0.8), 6.0);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(ArrivalProcess::parse(""), Err(ArrivalError::Empty)));
        assert!(matches!(
            ArrivalProcess::parse("1.0,0.5\nabc,1.0"),
            Err(ArrivalError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            ArrivalProcess::parse("1.0,0.5,0.2"),
            Err(ArrivalError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            ArrivalProcess::parse("1.0,0.8\n2.0,0.4"),
            Err(ArrivalError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn decreasing_probability_reports_file_line() {
        let text = "# interarrival time, probability\n1.0,0.2\n\n2.0,0.6\n3.0,0.5\n4.0,1.0\n";
        assert!(matches!(
            ArrivalProcess::parse(text),
            Err(ArrivalError::Parse { line: 5, .. })
        ));
        assert!(matches!(
            ArrivalProcess::from_pairs(&[(1.0, 0.2), (2.0, 0.6), (3.0, 0.5)]),
            Err(ArrivalError::Decreasing { entry: 3 })
        ));
    }

    #[test]
    fn samples_are_tabulated_values() {
        use rand::SeedableRng;
        let arrivals = ArrivalProcess::from_pairs(&[(1.0, 0.3), (4.0, 0.9), (9.0, 1.0)]).unwrap();
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(7);
        for _ in 0..100 {
            let value = arrivals.sample(&mut rng);
            assert!([1.0, 4.0, 9.0].contains(&value));
        }
    }
}
