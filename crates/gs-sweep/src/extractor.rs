//! Timing extraction from benchmark output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of output characters kept for diagnosis when no timing is found.
pub const EXCERPT_CHARS: usize = 500;

static AVG_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Cuda Graph Avg Time\s*:\s*((?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*ms")
        .expect("average-time pattern is valid")
});

/// Kernel schedules the benchmark runs, in the order it reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    Cooperative,
    Pingpong,
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cooperative => write!(f, "Cooperative"),
            Self::Pingpong => write!(f, "Pingpong"),
        }
    }
}

/// What could be read from one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Both schedules reported; `millis` is the faster one.
    Selected {
        millis: f64,
        winner: Schedule,
        cooperative: f64,
        pingpong: f64,
    },
    /// Only one schedule reported a time.
    SingleSchedule { millis: f64 },
    /// No timing line at all.
    NoTiming { excerpt: String },
}

impl Extraction {
    pub fn millis(&self) -> Option<f64> {
        match self {
            Self::Selected { millis, .. } | Self::SingleSchedule { millis } => Some(*millis),
            Self::NoTiming { .. } => None,
        }
    }

    pub fn winner(&self) -> Option<Schedule> {
        match self {
            Self::Selected { winner, .. } => Some(*winner),
            _ => None,
        }
    }
}

/// Every average-time value in `output`, in order of appearance.
pub fn parse_timings(output: &str) -> Vec<f64> {
    AVG_TIME
        .captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .collect()
}

/// Pick the faster of the first two reported schedules.
///
/// Cooperative wins ties. Values past the second are ignored.
pub fn extract(output: &str) -> Extraction {
    let timings = parse_timings(output);
    match timings.as_slice() {
        [cooperative, pingpong, ..] => {
            let (millis, winner) = if cooperative <= pingpong {
                (*cooperative, Schedule::Cooperative)
            } else {
                (*pingpong, Schedule::Pingpong)
            };
            Extraction::Selected {
                millis,
                winner,
                cooperative: *cooperative,
                pingpong: *pingpong,
            }
        }
        [only] => Extraction::SingleSchedule { millis: *only },
        [] => Extraction::NoTiming {
            excerpt: output.chars().take(EXCERPT_CHARS).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Running kernel with Cooperative kernel schedule:
  Problem Sizes, Alpha, Beta
    (128,256,256), 4, 4
  Groups      : 64
  Cuda Graph Avg Time : 0.00940153 ms
Running kernel with Pingpong kernel schedule:
  Problem Sizes, Alpha, Beta
    (128,256,256), 4, 4
  Groups      : 64
  Cuda Graph Avg Time : 0.00970194 ms
";

    #[test]
    fn picks_faster_of_two() {
        let text = "Cuda Graph Avg Time : 0.0172 ms\nCuda Graph Avg Time : 0.0091 ms\n";
        let extraction = extract(text);

        assert_eq!(extraction.millis(), Some(0.0091));
        assert_eq!(extraction.winner(), Some(Schedule::Pingpong));
    }

    #[test]
    fn parses_real_benchmark_output() {
        assert_eq!(parse_timings(SAMPLE), vec![0.00940153, 0.00970194]);
        match extract(SAMPLE) {
            Extraction::Selected {
                millis,
                winner,
                cooperative,
                pingpong,
            } => {
                assert_eq!(millis, 0.00940153);
                assert_eq!(winner, Schedule::Cooperative);
                assert_eq!(cooperative, 0.00940153);
                assert_eq!(pingpong, 0.00970194);
            }
            other => panic!("unexpected extraction: {other:?}"),
        }
    }

    #[test]
    fn tie_goes_to_cooperative() {
        let text = "Cuda Graph Avg Time : 0.05 ms\nCuda Graph Avg Time : 0.05 ms";
        assert_eq!(extract(text).winner(), Some(Schedule::Cooperative));
    }

    #[test]
    fn single_timing_is_returned_as_is() {
        let text = "Cuda Graph Avg Time : 0.0123 ms\nPingpong: launch failed";
        assert_eq!(
            extract(text),
            Extraction::SingleSchedule { millis: 0.0123 }
        );
    }

    #[test]
    fn no_timing_keeps_bounded_excerpt() {
        let text = "x".repeat(2000);
        match extract(&text) {
            Extraction::NoTiming { excerpt } => assert_eq!(excerpt.chars().count(), EXCERPT_CHARS),
            other => panic!("unexpected extraction: {other:?}"),
        }
        assert_eq!(extract("").millis(), None);
    }

    #[test]
    fn only_first_two_values_compete() {
        let text = "Cuda Graph Avg Time : 0.3 ms\n\
                    Cuda Graph Avg Time : 0.2 ms\n\
                    Cuda Graph Avg Time : 0.1 ms\n";
        assert_eq!(parse_timings(text).len(), 3);
        assert_eq!(extract(text).millis(), Some(0.2));
    }

    #[test]
    fn accepts_exponent_and_rejects_negative() {
        assert_eq!(parse_timings("Cuda Graph Avg Time : 9.4e-3 ms"), vec![0.0094]);
        assert!(parse_timings("Cuda Graph Avg Time : -1 ms").is_empty());
    }
}
