//! Code for loading availability profiles.
//!
//! Each profile is described by a `[profiles.<id>]` table in `model.toml`. A profile is read from
//! its data file if possible, otherwise its fallback is used. Problems with the data are reported
//! as warnings rather than errors.
use super::*;
use crate::profile::{
    AlignmentOptions, Observation, ProfileSource, SyntheticSolar, align_observations,
};
use crate::snapshot::SnapshotSet;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use csv::StringRecord;
use log::{info, warn};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::PathBuf;
use std::str::FromStr;
use unicase::UniCase;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_column, String, "value".to_string());
define_param_default!(default_sunrise, f64, 6.0);
define_param_default!(default_sunset, f64, 18.0);

/// What to use when a profile's data file cannot be used
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Default)]
pub enum ProfileFallback {
    /// A synthetic solar profile
    #[string = "synthetic_solar"]
    SyntheticSolar,
    /// All zeros
    #[default]
    #[string = "zero"]
    Zero,
}

/// The description of a profile in `model.toml`
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    /// The data file, relative to the model directory
    pub file: Option<PathBuf>,
    /// The name of the column holding values
    #[serde(default = "default_column")]
    pub column: String,
    /// Number of metadata rows before the header row
    #[serde(default)]
    pub skip_rows: usize,
    /// Shift applied to the file's timestamps, in minutes
    #[serde(default)]
    pub offset_minutes: i64,
    /// Match data to snapshots regardless of year
    #[serde(default)]
    pub ignore_year: bool,
    /// The value which corresponds to full availability. Defaults to the maximum in the file.
    pub scale: Option<f64>,
    /// What to use if the file cannot be used
    #[serde(default)]
    pub fallback: ProfileFallback,
    /// Sunrise hour for synthetic solar profiles
    #[serde(default = "default_sunrise")]
    pub sunrise: f64,
    /// Sunset hour for synthetic solar profiles
    #[serde(default = "default_sunset")]
    pub sunset: f64,
}

/// Load every profile described in `model.toml`.
///
/// This never fails: if a profile cannot be read from file, its fallback is used, and if the
/// fallback cannot be generated, an all-zero profile is used.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `specs` - Profile descriptions from `model.toml`
/// * `snapshots` - The snapshots every profile must cover
pub fn read_profiles(
    model_dir: &Path,
    specs: &IndexMap<String, ProfileSpec>,
    snapshots: &SnapshotSet,
) -> IndexMap<ProfileID, Profile> {
    specs
        .iter()
        .map(|(id, spec)| {
            let id = ProfileID::new(id);
            let profile = load_profile(model_dir, &id, spec, snapshots);
            info!(
                "Profile {id} loaded from {} (capacity factor {:.3})",
                profile.source,
                profile.mean()
            );
            (id, profile)
        })
        .collect()
}

/// Load a single profile, trying the data file, then the fallback, then zeros
fn load_profile(
    model_dir: &Path,
    id: &ProfileID,
    spec: &ProfileSpec,
    snapshots: &SnapshotSet,
) -> Profile {
    if let Some(file) = &spec.file {
        let file_path = model_dir.join(file);
        match read_profile_file(&file_path, spec, snapshots) {
            Ok(values) => return Profile::new(values, ProfileSource::File(file_path)),
            Err(err) => warn!("Could not use data for profile {id}: {err:#}"),
        }
    }

    match spec.fallback {
        ProfileFallback::SyntheticSolar => {
            let solar = SyntheticSolar {
                sunrise: spec.sunrise,
                sunset: spec.sunset,
            };
            match solar.generate(snapshots) {
                Ok(values) => {
                    warn!("Using synthetic solar profile for {id}");
                    return Profile::new(values, ProfileSource::Synthetic);
                }
                Err(err) => warn!("Could not generate synthetic profile for {id}: {err:#}"),
            }
        }
        ProfileFallback::Zero => {}
    }

    warn!("Using all-zero profile for {id}");
    Profile::zero(snapshots.len())
}

/// Read a profile's data file and align it with the snapshots
fn read_profile_file(
    file_path: &Path,
    spec: &ProfileSpec,
    snapshots: &SnapshotSet,
) -> Result<Vec<f64>> {
    let observations =
        read_observations(file_path, spec).with_context(|| input_err_msg(file_path))?;

    let offset = TimeDelta::try_minutes(spec.offset_minutes)
        .with_context(|| format!("Offset of {} minutes is too large", spec.offset_minutes))?;
    let options = AlignmentOptions {
        offset,
        ignore_year: spec.ignore_year,
        drop_leap_days: !snapshots.iter().any(crate::snapshot::is_leap_day),
        scale: spec.scale,
    };
    align_observations(&observations, snapshots, &options)
}

/// Column indices for the fields of an observation
struct ObservationColumns {
    year: usize,
    month: usize,
    day: usize,
    hour: usize,
    minute: Option<usize>,
    value: usize,
}

impl ObservationColumns {
    /// Find the columns by name, ignoring case
    fn from_headers(headers: &StringRecord, value_column: &str) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| UniCase::new(header) == UniCase::new(name))
        };
        let require = |name: &str| find(name).with_context(|| format!("Missing column {name}"));

        Ok(Self {
            year: require("Year")?,
            month: require("Month")?,
            day: require("Day")?,
            hour: require("Hour")?,
            minute: find("Minute"),
            value: require(value_column)?,
        })
    }

    fn parse(&self, record: &StringRecord) -> Result<Observation> {
        let minute = match self.minute {
            Some(index) => parse_field(record, index)?,
            None => 0,
        };
        let timestamp = to_datetime(
            parse_field(record, self.year)?,
            parse_field(record, self.month)?,
            parse_field(record, self.day)?,
            parse_field(record, self.hour)?,
            minute,
        )?;

        Ok(Observation {
            timestamp,
            value: parse_field(record, self.value)?,
        })
    }
}

/// Parse the field of a record at the given index
fn parse_field<T>(record: &StringRecord, index: usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let field = record.get(index).unwrap_or_default();
    field
        .parse()
        .with_context(|| format!("Invalid value: {field:?}"))
}

fn to_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .with_context(|| format!("Invalid date/time: {year}-{month}-{day} {hour}:{minute}"))
}

/// Read timestamped values from a CSV file.
///
/// The first `spec.skip_rows` lines (e.g. metadata about a weather station) are ignored. The next
/// line is a header, which must name `Year`, `Month`, `Day` and `Hour` columns (and optionally
/// `Minute`) as well as the value column. Header matching ignores case.
fn read_observations(file_path: &Path, spec: &ProfileSpec) -> Result<Vec<Observation>> {
    let contents = fs::read_to_string(file_path)?;
    let data = contents.lines().skip(spec.skip_rows).join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());

    let columns = ObservationColumns::from_headers(reader.headers()?, &spec.column)?;
    reader
        .records()
        .enumerate()
        .map(|(row, record)| {
            // Row numbers are one-based and exclude the header
            columns
                .parse(&record?)
                .with_context(|| format!("Error on data row {}", row + 1))
        })
        .collect()
}
