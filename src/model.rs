use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

pub type CategoryId = u64;
pub type RouteId = u64;
pub type SegmentId = u64;
pub type RunId = u64;

/// A game or challenge, e.g. "Super Mario 64 16 Star".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Category with aggregated run information for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    #[serde(default, with = "humantime_serde")]
    pub best: Option<Duration>,
    pub total_runs: usize,
}

/// A named leg of a route. Position is 1-based and contiguous within the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentName {
    pub id: SegmentId,
    pub position: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub category_id: CategoryId,
    pub name: String,
    pub segments: Vec<SegmentName>,
}

impl Route {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_name(&self, index: usize) -> &str {
        self.segments
            .get(index)
            .map(|s| s.name.as_str())
            .unwrap_or("-")
    }
}

/// One measured duration for one segment of a stored run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub run_id: RunId,
    pub segment_id: SegmentId,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// A completed, stored run. Records are ordered by segment position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRun {
    pub id: RunId,
    pub route_id: RouteId,
    #[serde(with = "humantime_serde")]
    pub total: Duration,
    pub segments: Vec<SegmentRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl HistoricalRun {
    pub fn segment_durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.segments.iter().map(|s| s.duration)
    }
}

/// Payload handed to the store when the user confirms saving a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommit {
    pub route_id: RouteId,
    pub segment_durations: Vec<Duration>,
    pub total: Duration,
}
