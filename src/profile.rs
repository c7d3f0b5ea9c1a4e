//! Availability profiles: per-snapshot fractions of nameplate capacity which can be delivered.
//!
//! Profiles are derived from a driving time series (e.g. solar irradiance) read from file. If
//! the data cannot be used, a synthetic series is substituted, and if that cannot be generated
//! either, an all-zero series is used. Whichever happens, the resulting profile covers exactly
//! the snapshots of the model.
use crate::id::define_id_type;
use crate::snapshot::{SnapshotSet, is_leap_day};
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::PI;
use std::fmt;
use std::path::PathBuf;

define_id_type! {ProfileID}

/// Clip an availability fraction to the range `[0, 1]`, treating non-finite values as zero
pub fn clip_availability(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Where the values of a [`Profile`] came from
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSource {
    /// Read from the given data file
    File(PathBuf),
    /// Generated synthetically as a substitute for file data
    Synthetic,
    /// All zeros, used when no other source was usable
    Zero,
}

impl ProfileSource {
    /// Whether the profile had to fall back on substitute data
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::File(_))
    }
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Synthetic => write!(f, "synthetic data"),
            Self::Zero => write!(f, "all-zero fallback"),
        }
    }
}

/// A per-snapshot availability series with values in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    values: Vec<f64>,
    /// Where the values came from
    pub source: ProfileSource,
}

impl Profile {
    /// Create a new profile, clipping all values to `[0, 1]`
    pub fn new(values: Vec<f64>, source: ProfileSource) -> Self {
        Self {
            values: values.into_iter().map(clip_availability).collect(),
            source,
        }
    }

    /// An all-zero profile covering `len` snapshots
    pub fn zero(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            source: ProfileSource::Zero,
        }
    }

    /// The availability in each snapshot
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of snapshots covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the profile covers no snapshots
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The mean availability, i.e. the capacity factor over the horizon
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// A synthetic solar availability profile.
///
/// Availability follows a half-sine between sunrise and sunset (in fractional hours of the day),
/// scaled by a seasonal amplitude of `0.75 + 0.25 * cos(2π (day_of_year - 172) / 365)` which peaks
/// at the June solstice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSolar {
    /// Hour of the day at which output begins
    pub sunrise: f64,
    /// Hour of the day at which output ends
    pub sunset: f64,
}

impl Default for SyntheticSolar {
    fn default() -> Self {
        Self {
            sunrise: 6.0,
            sunset: 18.0,
        }
    }
}

impl SyntheticSolar {
    /// Check that the daylight window is sensible
    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=24.0).contains(&self.sunrise) && (0.0..=24.0).contains(&self.sunset),
            "Sunrise and sunset must be hours between 0 and 24"
        );
        ensure!(
            self.sunrise < self.sunset,
            "Sunrise ({}) must be before sunset ({})",
            self.sunrise,
            self.sunset
        );

        Ok(())
    }

    /// Availability at the given timestamp
    fn availability(&self, timestamp: &NaiveDateTime) -> f64 {
        let hour = f64::from(timestamp.hour())
            + f64::from(timestamp.minute()) / 60.0
            + f64::from(timestamp.second()) / 3600.0;
        if hour <= self.sunrise || hour >= self.sunset {
            return 0.0;
        }

        let daylight = (hour - self.sunrise) / (self.sunset - self.sunrise);
        let day_of_year = f64::from(timestamp.ordinal());
        let seasonal = 0.75 + 0.25 * (2.0 * PI * (day_of_year - 172.0) / 365.0).cos();

        clip_availability((PI * daylight).sin() * seasonal)
    }

    /// Generate values for every snapshot
    pub fn generate(&self, snapshots: &SnapshotSet) -> Result<Vec<f64>> {
        self.validate()?;
        Ok(snapshots.iter().map(|ts| self.availability(ts)).collect())
    }
}

/// A single timestamped value from a driving time series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// When the value was recorded
    pub timestamp: NaiveDateTime,
    /// The raw value (e.g. irradiance in W/m²)
    pub value: f64,
}

/// Options controlling how observations are lined up with the model's snapshots
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentOptions {
    /// Shift applied to every observation timestamp before matching
    pub offset: TimeDelta,
    /// Match on month, day and time only, so data for a typical year can be reused
    pub ignore_year: bool,
    /// Discard observations on 29 February
    pub drop_leap_days: bool,
    /// Value corresponding to full availability. If `None`, the largest observation is used.
    pub scale: Option<f64>,
}

/// The key used to match observations to snapshots
type MatchKey = (Option<i32>, u32, u32, u32, u32);

fn match_key(timestamp: &NaiveDateTime, ignore_year: bool) -> MatchKey {
    (
        (!ignore_year).then_some(timestamp.year()),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
    )
}

/// Convert raw observations into availability fractions for each snapshot.
///
/// Snapshots without a matching observation get zero availability. If more than one observation
/// matches a snapshot, the first one is used.
///
/// # Returns
///
/// A vector with one value per snapshot, or an error if no snapshot could be matched at all.
pub fn align_observations(
    observations: &[Observation],
    snapshots: &SnapshotSet,
    options: &AlignmentOptions,
) -> Result<Vec<f64>> {
    let mut by_key = HashMap::new();
    let mut duplicates = 0usize;
    for obs in observations {
        if options.drop_leap_days && is_leap_day(&obs.timestamp) {
            continue;
        }

        let timestamp = obs
            .timestamp
            .checked_add_signed(options.offset)
            .with_context(|| {
                format!(
                    "Offset of {} minutes takes observation at {} out of range",
                    options.offset.num_minutes(),
                    obs.timestamp
                )
            })?;
        match by_key.entry(match_key(&timestamp, options.ignore_year)) {
            Entry::Vacant(entry) => {
                entry.insert(obs.value);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }
    if duplicates > 0 {
        debug!("Ignored {duplicates} duplicate observations");
    }

    let scale = options.scale.unwrap_or_else(|| {
        by_key
            .values()
            .copied()
            .filter(|value| value.is_finite())
            .fold(0.0, f64::max)
    });
    ensure!(
        scale.is_finite() && scale > 0.0,
        "Cannot normalise observations: scale must be a finite number greater than zero"
    );

    let mut matched = 0usize;
    let values: Vec<f64> = snapshots
        .iter()
        .map(|ts| match by_key.get(&match_key(ts, options.ignore_year)) {
            Some(value) => {
                matched += 1;
                clip_availability(value / scale)
            }
            None => 0.0,
        })
        .collect();
    ensure!(matched > 0, "No observations match the model's snapshots");
    debug!(
        "Matched observations for {matched} of {} snapshots",
        snapshots.len()
    );

    Ok(values)
}
