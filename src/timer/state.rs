use super::signed;
use crate::comparison::ComparisonProfile;
use crate::error::{Result, SplitsError};
use crate::model::{RouteId, RunCommit};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Finished,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not started",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
        }
    }
}

/// One committed split, as reported back to the caller of `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRecord {
    pub index: usize,
    pub segment_time: Duration,
    pub split_time: Duration,
    /// How much faster than gold this segment was, if it was a new gold.
    pub time_save: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Segment committed, timer moved on to the next one.
    Split(SplitRecord),
    /// Last segment committed; the run is over and its total is frozen.
    Finished(SplitRecord),
    /// Advance pressed after the run finished. Route this to the commit prompt.
    ReadyToCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveDelta {
    /// Elapsed total minus the comparison split. Negative means ahead.
    pub delta: time::Duration,
    pub suppress_display: bool,
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub status: RunStatus,
    pub segment_index: usize,
    pub elapsed_total: Duration,
    pub elapsed_in_segment: Duration,
    pub committed_segments: Vec<Option<Duration>>,
    pub is_finished: bool,
    pub sum_of_gold: Option<Duration>,
}

/// State of one in-progress attempt.
///
/// Owned by exactly one event loop. Renderers only ever see `TimerSnapshot`s.
#[derive(Debug, Clone)]
pub struct LiveRun {
    status: RunStatus,
    index: usize,
    run_start: Instant,
    segment_start: Instant,
    segments: Vec<Option<Duration>>,
    // Per-segment improvement over gold, kept so a revert can undo it.
    gold_saves: Vec<Option<Duration>>,
    finalized_total: Option<Duration>,
    base_sum_of_gold: Option<Duration>,
}

impl LiveRun {
    pub fn new(segment_count: usize, profile: &ComparisonProfile) -> Self {
        let now = Instant::now();
        Self {
            status: RunStatus::NotStarted,
            index: 0,
            run_start: now,
            segment_start: now,
            segments: vec![None; segment_count],
            gold_saves: vec![None; segment_count],
            finalized_total: None,
            base_sum_of_gold: profile.sum_of_gold,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn segment_index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.status == RunStatus::Finished
    }

    pub fn finalized_total(&self) -> Option<Duration> {
        self.finalized_total
    }

    pub fn committed(&self) -> &[Option<Duration>] {
        &self.segments
    }

    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.segments.is_empty() {
            return Err(SplitsError::EmptyRoute);
        }
        if self.status != RunStatus::NotStarted {
            return Err(self.invalid("start"));
        }
        self.status = RunStatus::Running;
        self.index = 0;
        self.run_start = now;
        self.segment_start = now;
        Ok(())
    }

    /// Commit the current segment and move to the next one, finishing the run after
    /// the last segment.
    pub fn advance(&mut self, profile: &ComparisonProfile, now: Instant) -> Result<AdvanceOutcome> {
        match self.status {
            RunStatus::NotStarted => return Err(self.invalid("advance")),
            RunStatus::Finished => return Ok(AdvanceOutcome::ReadyToCommit),
            RunStatus::Running => {}
        }

        let segment_time = now.saturating_duration_since(self.segment_start);
        let split_time = now.saturating_duration_since(self.run_start);
        let time_save = profile
            .gold(self.index)
            .filter(|gold| segment_time < *gold)
            .map(|gold| gold - segment_time);

        self.segments[self.index] = Some(segment_time);
        self.gold_saves[self.index] = time_save;

        let record = SplitRecord {
            index: self.index,
            segment_time,
            split_time,
            time_save,
        };

        if self.index + 1 == self.segments.len() {
            self.status = RunStatus::Finished;
            self.finalized_total = Some(split_time);
            return Ok(AdvanceOutcome::Finished(record));
        }

        self.index += 1;
        self.segment_start = now;
        Ok(AdvanceOutcome::Split(record))
    }

    /// Undo the last advance. The re-opened segment keeps running as if it had never
    /// been split, so total elapsed time is unaffected.
    ///
    /// Returns `false` without changing anything on the first segment or when the
    /// timer is not running.
    pub fn revert(&mut self, now: Instant) -> bool {
        if self.status != RunStatus::Running || self.index == 0 {
            return false;
        }

        self.segments[self.index] = None;
        self.gold_saves[self.index] = None;
        self.index -= 1;

        let previous = self.segments[self.index].take().unwrap_or_default();
        self.gold_saves[self.index] = None;
        let since_split = now.saturating_duration_since(self.segment_start);
        self.segment_start = now
            .checked_sub(previous + since_split)
            .unwrap_or(self.run_start);
        true
    }

    /// Throw away every committed segment and start over from the first segment.
    pub fn reset(&mut self, now: Instant) -> Result<()> {
        if self.status == RunStatus::NotStarted {
            return Err(self.invalid("reset"));
        }
        self.segments.iter_mut().for_each(|s| *s = None);
        self.gold_saves.iter_mut().for_each(|s| *s = None);
        self.finalized_total = None;
        self.status = RunStatus::Running;
        self.index = 0;
        self.run_start = now;
        self.segment_start = now;
        Ok(())
    }

    pub fn elapsed_total(&self, now: Instant) -> Duration {
        match self.status {
            RunStatus::NotStarted => Duration::ZERO,
            RunStatus::Running => now.saturating_duration_since(self.run_start),
            RunStatus::Finished => self.finalized_total.unwrap_or_default(),
        }
    }

    pub fn elapsed_in_segment(&self, now: Instant) -> Duration {
        match self.status {
            RunStatus::NotStarted => Duration::ZERO,
            RunStatus::Running => now.saturating_duration_since(self.segment_start),
            RunStatus::Finished => self.segments[self.index].unwrap_or_default(),
        }
    }

    /// Split time at the end of segment `index`, if every segment up to it is committed.
    pub fn split_time(&self, index: usize) -> Option<Duration> {
        self.segments.get(..=index)?.iter().copied().sum()
    }

    /// Delta of a committed split against the comparison line.
    pub fn split_delta(&self, profile: &ComparisonProfile, index: usize) -> Option<time::Duration> {
        let split = self.split_time(index)?;
        let comparison = profile.comparison_split(index)?;
        Some(signed(split) - signed(comparison))
    }

    /// Sum of gold with this run's new golds already applied. Display only.
    pub fn sum_of_gold(&self) -> Option<Duration> {
        let base = self.base_sum_of_gold?;
        let saved: Duration = self.gold_saves.iter().flatten().sum();
        Some(base.saturating_sub(saved))
    }

    /// Best total still achievable: time up to the current segment, then the current
    /// segment at no less than its gold, then gold for everything after it.
    ///
    /// With "elapsed so far" taken as the time up to the last split, this is elapsed
    /// so far plus the sum of gold from the current segment on. It only grows past that
    /// once the current segment runs slower than its gold.
    pub fn project_best_possible_time(
        &self,
        profile: &ComparisonProfile,
        now: Instant,
    ) -> Option<Duration> {
        match self.status {
            RunStatus::NotStarted => profile.sum_of_gold,
            RunStatus::Finished => self.finalized_total,
            RunStatus::Running => {
                let completed = self.segment_start.saturating_duration_since(self.run_start);
                let current = self
                    .elapsed_in_segment(now)
                    .max(profile.gold(self.index).unwrap_or_default());
                Some(completed + current + profile.gold_remaining(self.index + 1))
            }
        }
    }

    /// Live delta of the running total against the comparison split of the current
    /// segment.
    ///
    /// While ahead of pace the delta is hidden once it grows past `threshold`. If the
    /// previous split was already ahead, its lead widens the threshold, so a lead that
    /// was built earlier does not keep flashing on every later segment.
    pub fn live_delta(
        &self,
        profile: &ComparisonProfile,
        threshold: Duration,
        now: Instant,
    ) -> Option<LiveDelta> {
        if self.status == RunStatus::NotStarted {
            return None;
        }
        let comparison = profile.comparison_split(self.index)?;
        let delta = signed(self.elapsed_total(now)) - signed(comparison);

        let last_delta = match self.index.checked_sub(1) {
            Some(prev) => profile
                .comparison_split(prev)
                .map(|c| {
                    signed(self.segment_start.saturating_duration_since(self.run_start)) - signed(c)
                })
                .unwrap_or(time::Duration::ZERO),
            None => time::Duration::ZERO,
        };

        let suppress_display = if delta.is_negative() {
            let mut allowance = signed(threshold);
            if last_delta.is_negative() {
                allowance += last_delta.abs();
            }
            delta.abs() > allowance
        } else {
            false
        };

        Some(LiveDelta {
            delta,
            suppress_display,
        })
    }

    pub fn snapshot(&self, now: Instant) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status,
            segment_index: self.index,
            elapsed_total: self.elapsed_total(now),
            elapsed_in_segment: self.elapsed_in_segment(now),
            committed_segments: self.segments.clone(),
            is_finished: self.is_finished(),
            sum_of_gold: self.sum_of_gold(),
        }
    }

    /// Payload for the store. Only available once the run is finished.
    pub fn commit_payload(&self, route_id: RouteId) -> Option<RunCommit> {
        if !self.is_finished() {
            return None;
        }
        let segment_durations = self.segments.iter().copied().collect::<Option<Vec<_>>>()?;
        Some(RunCommit {
            route_id,
            segment_durations,
            total: self.finalized_total?,
        })
    }

    fn invalid(&self, op: &'static str) -> SplitsError {
        SplitsError::InvalidTransition {
            op,
            status: self.status.as_str(),
        }
    }
}
