// Snapshots let the plotting stage be rerun without reprocessing the raw data.
//
// Layout of a snapshot directory:
//
// snapshots/
// |---- manifest.yml                 - format_version, created_by, pipeline, conditions, experiments
// |---- <key>_trials.csv             - trial, t, x, y, <features>, Genotype, lasergroup, RepID
// |---- <key>_mean.csv               - t, <features>
// |---- <key>_std.csv                - t, <features>
// |---- <key>_n.csv                  - t, <features>
// |---- <experiment>_<index>.csv     - t, frame, x, y, <features> (raw trial tables)
//
// Every table is a plain CSV; feature columns use Feature::column_name. NaN is written as `NaN`.
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::aggregate::{ConditionAggregate, FeatureAggregate};
use super::binning::BinnedSeries;
use super::constants::*;
use super::error::SnapshotError;
use super::metadata::TrialMetadata;
use super::trial::{Feature, Trial};

const TRIAL_COLUMN: &str = "trial";
const TIME_COLUMN: &str = "t";
const FRAME_COLUMN: &str = "frame";
const X_COLUMN: &str = "x";
const Y_COLUMN: &str = "y";

/// One persisted condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub key: String,
    pub label: String,
    pub condition: String,
    pub stimulus_group: String,
    pub bin_width: f64,
    pub n_trials: usize,
    pub trials_file: String,
    pub mean_file: String,
    pub std_file: String,
    pub count_file: String,
}

/// One persisted raw trial of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialEntry {
    pub label: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEntry {
    pub name: String,
    pub trials: Vec<TrialEntry>,
}

/// Description of everything in a snapshot directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: String,
    pub created_by: String,
    pub pipeline: String,
    #[serde(default)]
    pub conditions: Vec<ConditionEntry>,
    #[serde(default)]
    pub experiments: Vec<ExperimentEntry>,
}

impl SnapshotManifest {
    pub fn new(pipeline: &str) -> Self {
        Self {
            format_version: String::from(SNAPSHOT_FORMAT_VERSION),
            created_by: format!("{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            pipeline: pipeline.to_string(),
            conditions: vec![],
            experiments: vec![],
        }
    }

    pub fn write(&self, dir: &Path) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(MANIFEST_FILE_NAME), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Read a manifest, refusing snapshots written in another format version
    pub fn read(dir: &Path) -> Result<Self, SnapshotError> {
        let path = dir.join(MANIFEST_FILE_NAME);
        if !path.exists() {
            return Err(SnapshotError::MissingFile(path));
        }
        let manifest: Self = serde_yaml::from_str(&std::fs::read_to_string(&path)?)?;
        if manifest.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(
                manifest.format_version,
                String::from(SNAPSHOT_FORMAT_VERSION),
            ));
        }
        Ok(manifest)
    }

    pub fn condition(&self, key: &str) -> Option<&ConditionEntry> {
        self.conditions.iter().find(|c| c.key == key)
    }
}

fn fmt_value(value: f64) -> String {
    value.to_string()
}

fn parse_value(field: &str) -> Result<f64, SnapshotError> {
    let field = field.trim();
    if field.is_empty() {
        Ok(f64::NAN)
    } else {
        Ok(field.parse::<f64>()?)
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SnapshotError> {
    if !path.exists() {
        return Err(SnapshotError::MissingFile(path.to_path_buf()));
    }
    Ok(csv::Reader::from_path(path)?)
}

/// Position of each named column in a header
struct Columns {
    positions: BTreeMap<String, usize>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Self {
            positions: headers
                .iter()
                .enumerate()
                .map(|(idx, h)| (h.to_string(), idx))
                .collect(),
        }
    }

    fn require(&self, name: &str) -> Result<usize, SnapshotError> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| SnapshotError::MissingColumn(name.to_string()))
    }

    /// The feature columns, in header order. Any column that is neither a feature nor one of
    /// the known label columns is an error.
    fn features(&self, known: &[&str]) -> Result<Vec<(Feature, usize)>, SnapshotError> {
        let mut features = Vec::new();
        for (name, idx) in self.positions.iter() {
            if known.contains(&name.as_str()) {
                continue;
            }
            match Feature::from_column_name(name) {
                Some(f) => features.push((f, *idx)),
                None => return Err(SnapshotError::UnknownColumn(name.clone())),
            }
        }
        features.sort_by_key(|(_, idx)| *idx);
        Ok(features)
    }
}

fn features_of<'a, I: Iterator<Item = &'a BTreeMap<Feature, Vec<f64>>>>(tables: I) -> Vec<Feature> {
    let mut features: Vec<Feature> = tables.flat_map(|c| c.keys().copied()).collect();
    features.sort();
    features.dedup();
    features
}

/// Write binned trials to one table, one block of rows per trial
pub fn write_series_table(path: &Path, series: &[BinnedSeries]) -> Result<(), SnapshotError> {
    let features = features_of(series.iter().map(|s| &s.columns));
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![TRIAL_COLUMN, TIME_COLUMN, X_COLUMN, Y_COLUMN];
    header.extend(features.iter().map(|f| f.column_name()));
    header.extend([GENOTYPE_COLUMN, STIMULUS_GROUP_COLUMN, REPLICATE_COLUMN]);
    writer.write_record(&header)?;

    for s in series {
        for row in 0..s.len() {
            let mut record = vec![
                s.meta.trial_id.clone(),
                fmt_value(s.t[row]),
                fmt_value(s.x[row]),
                fmt_value(s.y[row]),
            ];
            record.extend(features.iter().map(|f| {
                fmt_value(s.column(*f).map(|c| c[row]).unwrap_or(f64::NAN))
            }));
            record.extend([
                s.meta.genotype.clone(),
                s.meta.stimulus_group.clone(),
                s.meta.replicate.clone(),
            ]);
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read back a table written by write_series_table. Trials keep their order of appearance.
pub fn read_series_table(path: &Path, bin_width: f64) -> Result<Vec<BinnedSeries>, SnapshotError> {
    let mut reader = open_reader(path)?;
    let columns = Columns::new(reader.headers()?);
    let trial_col = columns.require(TRIAL_COLUMN)?;
    let t_col = columns.require(TIME_COLUMN)?;
    let x_col = columns.require(X_COLUMN)?;
    let y_col = columns.require(Y_COLUMN)?;
    let genotype_col = columns.require(GENOTYPE_COLUMN)?;
    let group_col = columns.require(STIMULUS_GROUP_COLUMN)?;
    let rep_col = columns.require(REPLICATE_COLUMN)?;
    let features = columns.features(&[
        TRIAL_COLUMN,
        TIME_COLUMN,
        X_COLUMN,
        Y_COLUMN,
        GENOTYPE_COLUMN,
        STIMULUS_GROUP_COLUMN,
        REPLICATE_COLUMN,
    ])?;

    let mut series: Vec<BinnedSeries> = Vec::new();
    // trial id -> position in series, which keeps first-seen order
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let trial_id = field(trial_col);
        let current = match index.get(trial_id) {
            Some(idx) => *idx,
            None => {
                index.insert(trial_id.to_string(), series.len());
                series.push(BinnedSeries {
                    meta: TrialMetadata {
                        trial_id: trial_id.to_string(),
                        genotype: field(genotype_col).to_string(),
                        stimulus_group: field(group_col).to_string(),
                        replicate: field(rep_col).to_string(),
                        ..Default::default()
                    },
                    bin_width,
                    t: vec![],
                    x: vec![],
                    y: vec![],
                    columns: features.iter().map(|(f, _)| (*f, vec![])).collect(),
                });
                series.len() - 1
            }
        };
        let s = &mut series[current];
        s.t.push(parse_value(field(t_col))?);
        s.x.push(parse_value(field(x_col))?);
        s.y.push(parse_value(field(y_col))?);
        for (feature, idx) in features.iter() {
            let value = parse_value(field(*idx))?;
            s.columns.entry(*feature).or_default().push(value);
        }
    }
    Ok(series)
}

fn write_aggregate_table<F: Fn(&FeatureAggregate, usize) -> String>(
    path: &Path,
    aggregate: &ConditionAggregate,
    value: F,
) -> Result<(), SnapshotError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![TIME_COLUMN];
    header.extend(aggregate.features.keys().map(|f| f.column_name()));
    writer.write_record(&header)?;
    for (row, t) in aggregate.t.iter().enumerate() {
        let mut record = vec![fmt_value(*t)];
        record.extend(aggregate.features.values().map(|fa| value(fa, row)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_aggregate_table(path: &Path) -> Result<(Vec<f64>, BTreeMap<Feature, Vec<f64>>), SnapshotError> {
    let mut reader = open_reader(path)?;
    let columns = Columns::new(reader.headers()?);
    let t_col = columns.require(TIME_COLUMN)?;
    let features = columns.features(&[TIME_COLUMN])?;
    let mut t = Vec::new();
    let mut values: BTreeMap<Feature, Vec<f64>> =
        features.iter().map(|(f, _)| (*f, vec![])).collect();
    for record in reader.records() {
        let record = record?;
        t.push(parse_value(record.get(t_col).unwrap_or(""))?);
        for (feature, idx) in features.iter() {
            values
                .entry(*feature)
                .or_default()
                .push(parse_value(record.get(*idx).unwrap_or(""))?);
        }
    }
    Ok((t, values))
}

/// Persist one condition (its binned trials plus mean, std and count tables)
pub fn write_condition(
    dir: &Path,
    key: &str,
    label: &str,
    trials: &[BinnedSeries],
    aggregate: &ConditionAggregate,
) -> Result<ConditionEntry, SnapshotError> {
    std::fs::create_dir_all(dir)?;
    let entry = ConditionEntry {
        key: key.to_string(),
        label: label.to_string(),
        condition: aggregate.condition.clone(),
        stimulus_group: aggregate.stimulus_group.clone(),
        bin_width: aggregate.bin_width,
        n_trials: aggregate.n_trials,
        trials_file: format!("{key}_trials.csv"),
        mean_file: format!("{key}_mean.csv"),
        std_file: format!("{key}_std.csv"),
        count_file: format!("{key}_n.csv"),
    };
    write_series_table(&dir.join(&entry.trials_file), trials)?;
    write_aggregate_table(&dir.join(&entry.mean_file), aggregate, |fa, row| {
        fmt_value(fa.mean[row])
    })?;
    write_aggregate_table(&dir.join(&entry.std_file), aggregate, |fa, row| {
        fmt_value(fa.std[row])
    })?;
    write_aggregate_table(&dir.join(&entry.count_file), aggregate, |fa, row| {
        fa.count[row].to_string()
    })?;
    Ok(entry)
}

/// Reload a condition written by write_condition
pub fn read_condition(
    dir: &Path,
    entry: &ConditionEntry,
) -> Result<(Vec<BinnedSeries>, ConditionAggregate), SnapshotError> {
    let trials = read_series_table(&dir.join(&entry.trials_file), entry.bin_width)?;
    let (t, means) = read_aggregate_table(&dir.join(&entry.mean_file))?;
    let (_, stds) = read_aggregate_table(&dir.join(&entry.std_file))?;
    let (_, counts) = read_aggregate_table(&dir.join(&entry.count_file))?;

    let mut features = BTreeMap::new();
    for (feature, mean) in means {
        let std = stds
            .get(&feature)
            .cloned()
            .ok_or_else(|| SnapshotError::MissingColumn(feature.column_name().to_string()))?;
        let count = counts
            .get(&feature)
            .ok_or_else(|| SnapshotError::MissingColumn(feature.column_name().to_string()))?
            .iter()
            .map(|c| if c.is_finite() { *c as usize } else { 0 })
            .collect();
        features.insert(feature, FeatureAggregate { mean, std, count });
    }

    let aggregate = ConditionAggregate {
        condition: entry.condition.clone(),
        stimulus_group: entry.stimulus_group.clone(),
        bin_width: entry.bin_width,
        n_trials: entry.n_trials,
        t,
        features,
    };
    Ok((trials, aggregate))
}

/// Write the raw (unbinned) table of a trial
pub fn write_trial_table(path: &Path, trial: &Trial) -> Result<(), SnapshotError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![TIME_COLUMN, FRAME_COLUMN, X_COLUMN, Y_COLUMN];
    header.extend(trial.columns.keys().map(|f| f.column_name()));
    writer.write_record(&header)?;
    for row in 0..trial.len() {
        let mut record = vec![
            fmt_value(trial.t[row]),
            trial.frame[row].map(|f| f.to_string()).unwrap_or_default(),
            fmt_value(trial.x[row]),
            fmt_value(trial.y[row]),
        ];
        record.extend(trial.columns.values().map(|c| fmt_value(c[row])));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back a table written by write_trial_table
pub fn read_trial_table(path: &Path, meta: TrialMetadata) -> Result<Trial, SnapshotError> {
    let mut reader = open_reader(path)?;
    let columns = Columns::new(reader.headers()?);
    let t_col = columns.require(TIME_COLUMN)?;
    let frame_col = columns.require(FRAME_COLUMN)?;
    let x_col = columns.require(X_COLUMN)?;
    let y_col = columns.require(Y_COLUMN)?;
    let features = columns.features(&[TIME_COLUMN, FRAME_COLUMN, X_COLUMN, Y_COLUMN])?;

    let mut trial = Trial::new(meta);
    let mut values: BTreeMap<Feature, Vec<f64>> =
        features.iter().map(|(f, _)| (*f, vec![])).collect();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let frame = field(frame_col).trim();
        trial.push_row(
            parse_value(field(t_col))?,
            if frame.is_empty() {
                None
            } else {
                Some(parse_value(frame)? as u64)
            },
            parse_value(field(x_col))?,
            parse_value(field(y_col))?,
        );
        for (feature, idx) in features.iter() {
            values
                .entry(*feature)
                .or_default()
                .push(parse_value(field(*idx))?);
        }
    }
    trial.columns = values;
    Ok(trial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_condition;

    fn series(trial_id: &str, t: &[f64], wing: &[f64]) -> BinnedSeries {
        let meta = TrialMetadata {
            trial_id: trial_id.to_string(),
            genotype: String::from("wGP"),
            stimulus_group: String::from("130"),
            replicate: String::from("1"),
            ..Default::default()
        };
        let mut columns = BTreeMap::new();
        columns.insert(Feature::Wing, wing.to_vec());
        columns.insert(Feature::Stimulus, vec![0.0; t.len()]);
        BinnedSeries {
            meta,
            bin_width: 5.0,
            t: t.to_vec(),
            x: vec![1.0; t.len()],
            y: vec![2.0; t.len()],
            columns,
        }
    }

    #[test]
    fn test_condition_snapshot_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let trials = vec![
            series("a", &[0.0, 5.0], &[0.25, 0.5]),
            series("b", &[0.0, 5.0, 10.0], &[0.75, f64::NAN, 1.0]),
        ];
        let aggregate = aggregate_condition("wGP", &trials).unwrap();
        let entry = write_condition(dir.path(), "exp", "P1>TRPA1", &trials, &aggregate).unwrap();
        let mut manifest = SnapshotManifest::new("courtship");
        manifest.conditions.push(entry);
        manifest.write(dir.path()).unwrap();

        let manifest = SnapshotManifest::read(dir.path()).unwrap();
        let entry = manifest.condition("exp").unwrap();
        assert_eq!(entry.label, "P1>TRPA1");
        let (loaded_trials, loaded_aggregate) = read_condition(dir.path(), entry).unwrap();
        assert_eq!(loaded_trials.len(), 2);
        assert_eq!(loaded_trials[0].t, vec![0.0, 5.0]);
        assert_eq!(loaded_trials[1].meta.trial_id, "b");
        assert!(loaded_trials[1].column(Feature::Wing).unwrap()[1].is_nan());
        assert_eq!(loaded_aggregate.t, aggregate.t);
        let wing = loaded_aggregate.feature(Feature::Wing).unwrap();
        assert_eq!(wing.count, vec![2, 1, 1]);
        assert_eq!(wing.mean, aggregate.feature(Feature::Wing).unwrap().mean);
    }

    #[test]
    fn test_interleaved_series_rows_regroup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp_trials.csv");
        std::fs::write(
            &path,
            "trial,t,x,y,Genotype,lasergroup,RepID,wing\n\
             a,0,1,1,wGP,130,1,0.5\n\
             b,0,2,2,wGP,130,2,1\n\
             a,5,1,1,wGP,130,1,0\n\
             c,0,3,3,wGP,130,3,0\n\
             b,5,2,2,wGP,130,2,0.25\n",
        )
        .unwrap();
        let loaded = read_series_table(&path, 5.0).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|s| s.meta.trial_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(loaded[0].t, vec![0.0, 5.0]);
        assert_eq!(loaded[1].column(Feature::Wing).unwrap(), &[1.0, 0.25]);
        assert_eq!(loaded[1].meta.replicate, "2");
        assert_eq!(loaded[2].t, vec![0.0]);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = SnapshotManifest::new("courtship");
        manifest.format_version = String::from("0.1");
        manifest.write(dir.path()).unwrap();
        assert!(matches!(
            SnapshotManifest::read(dir.path()),
            Err(SnapshotError::UnsupportedVersion(_, _))
        ));
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SnapshotManifest::read(dir.path()),
            Err(SnapshotError::MissingFile(_))
        ));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp_mean.csv");
        std::fs::write(&path, "t,wing,velocity\n0,1,2\n").unwrap();
        assert!(matches!(
            read_aggregate_table(&path),
            Err(SnapshotError::UnknownColumn(c)) if c == "velocity"
        ));
    }

    #[test]
    fn test_trial_table_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coupled_0.csv");
        let mut trial = Trial::new(TrialMetadata::default());
        trial.push_row(0.0, Some(3), 1.0, 2.0);
        trial.push_row(0.5, None, f64::NAN, 2.5);
        trial.set_column(Feature::InArea, vec![1.0, 0.0]).unwrap();
        write_trial_table(&path, &trial).unwrap();
        let loaded = read_trial_table(&path, TrialMetadata::default()).unwrap();
        assert_eq!(loaded.t, trial.t);
        assert_eq!(loaded.frame, vec![Some(3), None]);
        assert!(loaded.x[1].is_nan());
        assert_eq!(loaded.column(Feature::InArea).unwrap(), &[1.0, 0.0]);
    }
}
