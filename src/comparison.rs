//! Comparison engine.
//!
//! Derives the pacing baseline for a route from its stored runs: the segment times
//! of the personal-best run (the comparison line), the fastest time ever recorded
//! for each segment (gold), and the figures built from those two.
//!
//! Gold and route-best are kept in separate vectors on purpose. A gold segment is
//! the minimum over *all* runs; a route-best segment is the value from the single
//! fastest run. Mixing them up produces a comparison line nobody ever ran.

use crate::error::{Result, SplitsError};
use crate::model::{HistoricalRun, SegmentName};
use serde::Serialize;
use std::time::Duration;

/// Derived per-route baseline. Every list is either empty (no runs yet) or has one
/// entry per segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonProfile {
    #[serde(with = "humantime_vec")]
    pub route_best: Vec<Duration>,
    #[serde(with = "humantime_vec")]
    pub comparison_cumulative: Vec<Duration>,
    #[serde(with = "humantime_vec")]
    pub gold: Vec<Duration>,
    #[serde(with = "humantime_vec")]
    pub time_save: Vec<Duration>,
    #[serde(with = "humantime_serde")]
    pub sum_of_gold: Option<Duration>,
    /// Total duration of the personal-best run.
    #[serde(with = "humantime_serde")]
    pub personal_best: Option<Duration>,
    pub total_runs: usize,
}

impl ComparisonProfile {
    /// Build the profile for a route with `segments.len()` segments.
    ///
    /// Fails with `InvalidInput` when the route has no segments or when any run does
    /// not carry exactly one record per segment in route order.
    pub fn compute(segments: &[SegmentName], runs: &[HistoricalRun]) -> Result<Self> {
        let n = segments.len();
        if n == 0 {
            return Err(SplitsError::invalid_input("route has no segments"));
        }

        for run in runs {
            if run.segments.len() != n {
                return Err(SplitsError::invalid_input(format!(
                    "run {} has {} segment records, route has {}",
                    run.id,
                    run.segments.len(),
                    n
                )));
            }
            let misordered = run
                .segments
                .iter()
                .zip(segments)
                .position(|(record, name)| record.segment_id != name.id);
            if let Some(pos) = misordered {
                return Err(SplitsError::invalid_input(format!(
                    "run {} records segment {} at position {}, expected {}",
                    run.id,
                    run.segments[pos].segment_id,
                    pos + 1,
                    segments[pos].id
                )));
            }
        }

        let Some(pb) = personal_best_run(runs) else {
            return Ok(Self::default());
        };

        let route_best: Vec<Duration> = pb.segment_durations().collect();

        let comparison_cumulative: Vec<Duration> = route_best
            .iter()
            .scan(Duration::ZERO, |acc, d| {
                *acc += *d;
                Some(*acc)
            })
            .collect();

        let mut gold = route_best.clone();
        for run in runs {
            for (g, d) in gold.iter_mut().zip(run.segment_durations()) {
                if d < *g {
                    *g = d;
                }
            }
        }

        let time_save = route_best
            .iter()
            .zip(&gold)
            .map(|(best, g)| best.saturating_sub(*g))
            .collect();

        Ok(Self {
            sum_of_gold: Some(gold.iter().sum()),
            personal_best: Some(pb.total),
            total_runs: runs.len(),
            route_best,
            comparison_cumulative,
            gold,
            time_save,
        })
    }

    pub fn has_history(&self) -> bool {
        !self.route_best.is_empty()
    }

    pub fn gold(&self, index: usize) -> Option<Duration> {
        self.gold.get(index).copied()
    }

    pub fn route_best(&self, index: usize) -> Option<Duration> {
        self.route_best.get(index).copied()
    }

    /// Cumulative comparison time at the end of segment `index`.
    pub fn comparison_split(&self, index: usize) -> Option<Duration> {
        self.comparison_cumulative.get(index).copied()
    }

    pub fn time_save(&self, index: usize) -> Option<Duration> {
        self.time_save.get(index).copied()
    }

    /// Sum of gold for segments `from..`. Missing entries contribute nothing.
    pub fn gold_remaining(&self, from: usize) -> Duration {
        self.gold.iter().skip(from).sum()
    }

    /// Sum of the personal-best run's segment durations. This is what the
    /// comparison line ends at, which may differ slightly from `personal_best`.
    pub fn route_best_total(&self) -> Option<Duration> {
        self.comparison_cumulative.last().copied()
    }
}

/// Fastest run by total time. Ties go to the earliest run; runs created at the same
/// instant keep their input order.
pub fn personal_best_run(runs: &[HistoricalRun]) -> Option<&HistoricalRun> {
    runs.iter()
        .enumerate()
        .min_by_key(|(i, r)| (r.total, r.created_at, *i))
        .map(|(_, r)| r)
}

mod humantime_vec {
    use serde::ser::{SerializeSeq, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &[Duration], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for d in v {
            seq.serialize_element(&humantime::format_duration(*d).to_string())?;
        }
        seq.end()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::SegmentRecord;
    use proptest::prelude::*;
    use time::macros::datetime;
    use time::OffsetDateTime;

    pub(crate) fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    pub(crate) fn segment_names(n: usize) -> Vec<SegmentName> {
        (0..n)
            .map(|i| SegmentName {
                id: 100 + i as u64,
                position: i as u32 + 1,
                name: format!("Segment {}", i + 1),
            })
            .collect()
    }

    pub(crate) fn run_at(
        id: u64,
        total: Duration,
        segments: &[Duration],
        created_at: OffsetDateTime,
    ) -> HistoricalRun {
        HistoricalRun {
            id,
            route_id: 1,
            total,
            segments: segments
                .iter()
                .enumerate()
                .map(|(i, d)| SegmentRecord {
                    run_id: id,
                    segment_id: 100 + i as u64,
                    duration: *d,
                })
                .collect(),
            created_at,
        }
    }

    pub(crate) fn run(id: u64, total_secs: u64, segment_secs: &[u64]) -> HistoricalRun {
        let segs: Vec<Duration> = segment_secs.iter().map(|s| secs(*s)).collect();
        run_at(
            id,
            secs(total_secs),
            &segs,
            datetime!(2024-01-01 12:00 UTC) + time::Duration::minutes(id as i64),
        )
    }

    /// The two-run example: A = 100s [30,40,30], B = 95s [35,30,30].
    pub(crate) fn two_run_profile() -> ComparisonProfile {
        let runs = vec![run(1, 100, &[30, 40, 30]), run(2, 95, &[35, 30, 30])];
        ComparisonProfile::compute(&segment_names(3), &runs).unwrap()
    }

    #[test]
    fn gold_and_route_best_are_tracked_separately() {
        let p = two_run_profile();
        assert_eq!(p.route_best, vec![secs(35), secs(30), secs(30)]);
        assert_eq!(p.comparison_cumulative, vec![secs(35), secs(65), secs(95)]);
        assert_eq!(p.gold, vec![secs(30), secs(30), secs(30)]);
        assert_eq!(p.sum_of_gold, Some(secs(90)));
        assert_eq!(p.time_save, vec![secs(5), secs(0), secs(0)]);
        assert_eq!(p.personal_best, Some(secs(95)));
        assert_eq!(p.total_runs, 2);
    }

    #[test]
    fn no_runs_is_an_empty_profile() {
        let p = ComparisonProfile::compute(&segment_names(4), &[]).unwrap();
        assert!(!p.has_history());
        assert!(p.gold.is_empty());
        assert!(p.comparison_cumulative.is_empty());
        assert_eq!(p.sum_of_gold, None);
        assert_eq!(p.personal_best, None);
        assert_eq!(p.gold(0), None);
        assert_eq!(p.gold_remaining(0), Duration::ZERO);
    }

    #[test]
    fn wrong_record_count_is_invalid_input() {
        let runs = vec![run(1, 60, &[30, 30])];
        let err = ComparisonProfile::compute(&segment_names(3), &runs).unwrap_err();
        assert!(matches!(err, SplitsError::InvalidInput { .. }));
    }

    #[test]
    fn records_out_of_route_order_are_invalid_input() {
        let mut r = run(1, 60, &[20, 20, 20]);
        r.segments.swap(0, 1);
        let err = ComparisonProfile::compute(&segment_names(3), &[r]).unwrap_err();
        assert!(matches!(err, SplitsError::InvalidInput { .. }));
    }

    #[test]
    fn route_without_segments_is_invalid_input() {
        let err = ComparisonProfile::compute(&[], &[]).unwrap_err();
        assert!(matches!(err, SplitsError::InvalidInput { .. }));
    }

    #[test]
    fn tie_on_total_prefers_earliest_run() {
        let segs_late = [secs(10), secs(20)];
        let segs_early = [secs(20), secs(10)];
        let runs = vec![
            run_at(1, secs(30), &segs_late, datetime!(2024-03-02 0:00 UTC)),
            run_at(2, secs(30), &segs_early, datetime!(2024-03-01 0:00 UTC)),
        ];
        let p = ComparisonProfile::compute(&segment_names(2), &runs).unwrap();
        assert_eq!(p.route_best, segs_early.to_vec());
        assert_eq!(p.gold, vec![secs(10), secs(10)]);
    }

    #[test]
    fn tie_on_total_and_timestamp_keeps_input_order() {
        let at = datetime!(2024-03-01 0:00 UTC);
        let runs = vec![
            run_at(1, secs(30), &[secs(10), secs(20)], at),
            run_at(2, secs(30), &[secs(20), secs(10)], at),
        ];
        assert_eq!(personal_best_run(&runs).map(|r| r.id), Some(1));
    }

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(two_run_profile(), two_run_profile());
    }

    #[test]
    fn accessors_handle_out_of_range() {
        let p = two_run_profile();
        assert_eq!(p.comparison_split(1), Some(secs(65)));
        assert_eq!(p.comparison_split(3), None);
        assert_eq!(p.time_save(0), Some(secs(5)));
        assert_eq!(p.gold_remaining(1), secs(60));
        assert_eq!(p.gold_remaining(9), Duration::ZERO);
        assert_eq!(p.route_best_total(), Some(secs(95)));
    }

    #[test]
    fn profile_serializes_durations_as_text() {
        let json = serde_json::to_value(two_run_profile()).unwrap();
        assert_eq!(json["sum_of_gold"], "1m 30s");
        assert_eq!(json["gold"][0], "30s");
        assert_eq!(json["total_runs"], 2);
    }

    fn arb_runs() -> impl Strategy<Value = (usize, Vec<(Vec<u64>, i64)>)> {
        (1usize..6).prop_flat_map(|n| {
            let run = (prop::collection::vec(1u64..600_000, n), -5i64..5);
            (Just(n), prop::collection::vec(run, 1..8))
        })
    }

    fn build(n: usize, raw: &[(Vec<u64>, i64)]) -> (Vec<SegmentName>, Vec<HistoricalRun>) {
        let runs = raw
            .iter()
            .enumerate()
            .map(|(i, (ms, skew))| {
                let segs: Vec<Duration> = ms.iter().map(|m| Duration::from_millis(*m)).collect();
                let sum: u64 = ms.iter().sum();
                // totals may drift from the segment sum by a few ms of clock skew
                let total = Duration::from_millis(sum.saturating_add_signed(*skew));
                run_at(
                    i as u64 + 1,
                    total,
                    &segs,
                    datetime!(2024-01-01 0:00 UTC) + time::Duration::seconds(i as i64),
                )
            })
            .collect();
        (segment_names(n), runs)
    }

    proptest! {
        #[test]
        fn sum_of_gold_never_exceeds_route_best((n, raw) in arb_runs()) {
            let (names, runs) = build(n, &raw);
            let p = ComparisonProfile::compute(&names, &runs).unwrap();
            let best_total: Duration = p.route_best.iter().sum();
            prop_assert!(p.sum_of_gold.unwrap() <= best_total);
        }

        #[test]
        fn gold_is_at_most_route_best((n, raw) in arb_runs()) {
            let (names, runs) = build(n, &raw);
            let p = ComparisonProfile::compute(&names, &runs).unwrap();
            prop_assert_eq!(p.gold.len(), n);
            for i in 0..n {
                prop_assert!(p.gold[i] <= p.route_best[i]);
                prop_assert_eq!(p.time_save[i], p.route_best[i] - p.gold[i]);
                let min = runs.iter().map(|r| r.segments[i].duration).min().unwrap();
                prop_assert_eq!(p.gold[i], min);
            }
        }

        #[test]
        fn cumulative_is_monotonic_and_ends_at_pb_sum((n, raw) in arb_runs()) {
            let (names, runs) = build(n, &raw);
            let p = ComparisonProfile::compute(&names, &runs).unwrap();
            prop_assert!(p.comparison_cumulative.windows(2).all(|w| w[0] <= w[1]));
            let pb = personal_best_run(&runs).unwrap();
            let pb_sum: Duration = pb.segment_durations().sum();
            prop_assert_eq!(p.route_best_total(), Some(pb_sum));
            prop_assert_eq!(p.personal_best, Some(pb.total));
        }
    }
}
