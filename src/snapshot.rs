//! Code for working with snapshots.
//!
//! A snapshot is a single instant of the planning horizon. Each snapshot carries a weighting,
//! which is the number of hours it represents when converting dispatched power into energy and
//! cost.
use crate::units::Hours;
use anyhow::{Result, ensure};
use chrono::{Datelike, NaiveDateTime, TimeDelta};
use itertools::Itertools;

/// Whether the given timestamp falls on 29 February
pub fn is_leap_day(timestamp: &NaiveDateTime) -> bool {
    timestamp.month() == 2 && timestamp.day() == 29
}

/// The ordered set of snapshots which make up the planning horizon
#[derive(PartialEq, Debug, Clone)]
pub struct SnapshotSet {
    timestamps: Vec<NaiveDateTime>,
    weightings: Vec<Hours>,
}

impl SnapshotSet {
    /// Create a new [`SnapshotSet`] where every snapshot has the same weighting.
    ///
    /// The timestamps must be non-empty and strictly increasing.
    pub fn new(timestamps: Vec<NaiveDateTime>, weighting: Hours) -> Result<Self> {
        ensure!(!timestamps.is_empty(), "Snapshots cannot be empty");
        ensure!(
            timestamps.iter().tuple_windows().all(|(a, b)| a < b),
            "Snapshots must be strictly increasing"
        );
        ensure!(
            weighting.is_finite() && weighting > Hours(0.0),
            "Snapshot weighting must be a finite number greater than zero"
        );

        let weightings = vec![weighting; timestamps.len()];
        Ok(Self {
            timestamps,
            weightings,
        })
    }

    /// Generate snapshots at a fixed frequency in the half-open range `[start, end)`.
    ///
    /// If `drop_leap_days` is set, snapshots falling on 29 February are omitted, so a leap year
    /// produces the same number of snapshots as any other year. Each snapshot is weighted by the
    /// frequency in hours.
    pub fn from_range(
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: TimeDelta,
        drop_leap_days: bool,
    ) -> Result<Self> {
        ensure!(start < end, "Snapshot range start must precede its end");
        Self::generate(start, frequency, drop_leap_days, |timestamp, _| *timestamp < end)
    }

    /// Generate `count` snapshots at a fixed frequency, beginning at `start`.
    ///
    /// Leap days are skipped as for [`SnapshotSet::from_range`], without reducing the count.
    pub fn from_count(
        start: NaiveDateTime,
        count: usize,
        frequency: TimeDelta,
        drop_leap_days: bool,
    ) -> Result<Self> {
        Self::generate(start, frequency, drop_leap_days, |_, len| len < count)
    }

    fn generate<F>(
        start: NaiveDateTime,
        frequency: TimeDelta,
        drop_leap_days: bool,
        mut keep_going: F,
    ) -> Result<Self>
    where
        F: FnMut(&NaiveDateTime, usize) -> bool,
    {
        ensure!(
            frequency > TimeDelta::zero(),
            "Snapshot frequency must be positive"
        );

        let mut timestamps = Vec::new();
        let mut current = start;
        while keep_going(&current, timestamps.len()) {
            if !(drop_leap_days && is_leap_day(&current)) {
                timestamps.push(current);
            }
            let Some(next) = current.checked_add_signed(frequency) else {
                ensure!(
                    !keep_going(&NaiveDateTime::MAX, timestamps.len()),
                    "Snapshots extend beyond the latest supported date"
                );
                break;
            };
            current = next;
        }

        let weighting = Hours(frequency.num_seconds() as f64 / 3600.0);
        Self::new(timestamps, weighting)
    }

    /// Replace the weighting of every snapshot
    pub fn with_weighting(self, weighting: Hours) -> Result<Self> {
        Self::new(self.timestamps, weighting)
    }

    /// Number of snapshots
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether there are no snapshots (never true for a validated set)
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Iterate over the timestamps in order
    pub fn iter(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.timestamps.iter()
    }

    /// Iterate over the timestamps along with their weightings
    pub fn iter_with_weightings(&self) -> impl Iterator<Item = (&NaiveDateTime, Hours)> {
        self.timestamps.iter().zip(self.weightings.iter().copied())
    }

    /// Get the timestamp of the snapshot at the given index
    pub fn get(&self, index: usize) -> Option<&NaiveDateTime> {
        self.timestamps.get(index)
    }

    /// Get the weighting of the snapshot at the given index
    pub fn weighting(&self, index: usize) -> Hours {
        self.weightings[index]
    }

    /// Find the index of the snapshot with exactly this timestamp
    pub fn position(&self, timestamp: &NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(timestamp).ok()
    }

    /// The timestamps as a slice
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }
}
