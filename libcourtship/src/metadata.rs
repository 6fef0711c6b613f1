// File naming conventions used by the scoring and recording tools.
//
// courtship score files: <genotype>_<lasergroup>_<repid>_<YYYYMMDD>_<HHMMSS>.csv
// scored movie files:    <condition>_<flynum>_<trialnum>_<YYYYMMDD>_<HHMMSS>.mp4.csv
// recorded logs:         <YYYY-MM-DD-HH-MM-SS>.csv
//
// Genotypes may themselves contain underscores, so the fixed fields are taken from the right.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::PrimitiveDateTime;

use super::constants::DEFAULT_STIMULUS_GROUP;
use super::error::MetadataError;

pub const SCORED_MOVIE_SUFFIX: &str = ".mp4.csv";
pub const CSV_SUFFIX: &str = ".csv";

/// Labels and provenance for one trial
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrialMetadata {
    pub trial_id: String,
    pub genotype: String,
    pub stimulus_group: String,
    pub replicate: String,
    pub trial_number: Option<String>,
    pub date: String,
    pub datetime: Option<PrimitiveDateTime>,
    pub source: PathBuf,
}

impl TrialMetadata {
    /// Name of the per-trial output table, `<genotype>_<lasergroup>_<repid>_<date>.csv`
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            self.genotype, self.stimulus_group, self.replicate, self.date
        )
    }

    /// Human readable label used in plot legends
    pub fn label(&self) -> String {
        match &self.trial_number {
            Some(n) => format!(
                "{} (fly {}, trial {})",
                self.genotype, self.replicate, n
            ),
            None => format!("{} rep {}", self.genotype, self.replicate),
        }
    }
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Split a file stem into (leading label, fixed fields). The leading label absorbs any
/// extra underscores.
fn split_fields(stem: &str, n_fixed: usize) -> Option<(String, Vec<&str>)> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < n_fixed + 1 {
        return None;
    }
    let split = parts.len() - n_fixed;
    let label = parts[..split].join("_");
    if label.is_empty() {
        return None;
    }
    Some((label, parts[split..].to_vec()))
}

/// Parse the `<YYYYMMDD>_<HHMMSS>` pair used by the scoring tools
pub fn parse_movie_datetime(date: &str, time: &str) -> Result<PrimitiveDateTime, MetadataError> {
    let joined = format!("{date}_{time}");
    PrimitiveDateTime::parse(
        &joined,
        format_description!("[year][month][day]_[hour][minute][second]"),
    )
    .map_err(|_| MetadataError::BadDateTime(joined))
}

/// Parse the `<YYYY-MM-DD-HH-MM-SS>.csv` name of a recorded log
pub fn parse_log_datetime(path: &Path) -> Result<PrimitiveDateTime, MetadataError> {
    let name = file_name_string(path);
    let stem = name
        .strip_suffix(CSV_SUFFIX)
        .ok_or_else(|| MetadataError::BadFileName(name.clone()))?;
    PrimitiveDateTime::parse(
        stem,
        format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]"),
    )
    .map_err(|_| MetadataError::BadDateTime(stem.to_string()))
}

/// Metadata of a courtship score file
pub fn parse_courtship_file_name(path: &Path) -> Result<TrialMetadata, MetadataError> {
    let name = file_name_string(path);
    let stem = name
        .strip_suffix(CSV_SUFFIX)
        .ok_or_else(|| MetadataError::BadFileName(name.clone()))?;
    let (genotype, fields) =
        split_fields(stem, 4).ok_or_else(|| MetadataError::BadFileName(name.clone()))?;
    let (laser, rep, date, time) = (fields[0], fields[1], fields[2], fields[3]);
    let datetime = parse_movie_datetime(date, time)?;
    Ok(TrialMetadata {
        trial_id: stem.to_string(),
        genotype,
        stimulus_group: laser.to_string(),
        replicate: rep.to_string(),
        trial_number: None,
        date: date.to_string(),
        datetime: Some(datetime),
        source: path.to_path_buf(),
    })
}

/// Metadata of a scored movie file. The condition is lower cased.
pub fn parse_scored_file_name(path: &Path) -> Result<TrialMetadata, MetadataError> {
    let name = file_name_string(path);
    let stem = name
        .strip_suffix(SCORED_MOVIE_SUFFIX)
        .ok_or_else(|| MetadataError::BadFileName(name.clone()))?;
    let (condition, fields) =
        split_fields(stem, 4).ok_or_else(|| MetadataError::BadFileName(name.clone()))?;
    let (flynum, trialnum, date, time) = (fields[0], fields[1], fields[2], fields[3]);
    let datetime = parse_movie_datetime(date, time)?;
    Ok(TrialMetadata {
        trial_id: stem.to_string(),
        genotype: condition.to_lowercase(),
        stimulus_group: String::from(DEFAULT_STIMULUS_GROUP),
        replicate: flynum.to_string(),
        trial_number: Some(trialnum.to_string()),
        date: date.to_string(),
        datetime: Some(datetime),
        source: path.to_path_buf(),
    })
}

/// Metadata of a recorded log used directly as a trial
pub fn log_metadata(path: &Path, experiment: &str, label: Option<&str>) -> TrialMetadata {
    let name = file_name_string(path);
    let stem = name.strip_suffix(CSV_SUFFIX).unwrap_or(&name).to_string();
    TrialMetadata {
        trial_id: label.map(|l| l.to_string()).unwrap_or_else(|| stem.clone()),
        genotype: experiment.to_string(),
        stimulus_group: String::from(DEFAULT_STIMULUS_GROUP),
        replicate: stem,
        trial_number: None,
        date: String::new(),
        datetime: parse_log_datetime(path).ok(),
        source: path.to_path_buf(),
    }
}

/// Find the recorded log whose file name date-time is closest to the given date-time.
/// Fails if the closest log is further away than max_diff seconds.
pub fn find_nearest_log(
    log_dir: &Path,
    datetime: &PrimitiveDateTime,
    max_diff: f64,
) -> Result<PathBuf, MetadataError> {
    let mut best: Option<(f64, PathBuf)> = None;
    for item in log_dir.read_dir()? {
        let item_path = item?.path();
        let log_time = match parse_log_datetime(&item_path) {
            Ok(t) => t,
            Err(_) => continue,
        };
        let diff = (log_time - *datetime).as_seconds_f64().abs();
        match &best {
            Some((best_diff, _)) if *best_diff <= diff => (),
            _ => best = Some((diff, item_path)),
        }
    }
    match best {
        Some((diff, path)) if diff <= max_diff => Ok(path),
        _ => Err(MetadataError::NoMatchingLog(datetime.to_string(), max_diff)),
    }
}

/// Explicit lookup table rewriting legacy genotype labels to their canonical form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenotypeSynonyms {
    table: BTreeMap<String, String>,
}

impl GenotypeSynonyms {
    pub fn new(table: BTreeMap<String, String>) -> Self {
        Self { table }
    }

    pub fn canonical<'a>(&'a self, genotype: &'a str) -> &'a str {
        self.table
            .get(genotype)
            .map(|s| s.as_str())
            .unwrap_or(genotype)
    }
}
