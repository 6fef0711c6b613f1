use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::error::TrialError;
use super::metadata::{parse_courtship_file_name, TrialMetadata};
use super::scores::{forward_fill, parse_stimulus_code, Behavior, ScoreEvent};

const LASER_COLUMN: &str = "laser";
const STIMULUS_SCORE_COLUMN: &str = "as";

/// The derived per-timestep columns a trial can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Wing,
    Proboscis,
    Jump,
    DistanceToTarget,
    InArea,
    Stimulus,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Wing,
        Feature::Proboscis,
        Feature::Jump,
        Feature::DistanceToTarget,
        Feature::InArea,
        Feature::Stimulus,
    ];

    /// Column name used in every table this crate writes
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Wing => "wing",
            Self::Proboscis => "proboscis",
            Self::Jump => "jump",
            Self::DistanceToTarget => "dtarget",
            Self::InArea => "in_area",
            Self::Stimulus => "laser",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column_name() == name)
    }

    /// Axis label for plots
    pub fn axis_label(&self) -> &'static str {
        match self {
            Self::Wing => "Wing Ext. Index",
            Self::Proboscis => "Proboscis Extension",
            Self::Jump => "Jumping",
            Self::DistanceToTarget => "Distance (pixels)",
            Self::InArea => "Fraction in Area",
            Self::Stimulus => "Laser",
        }
    }
}

/// One experimental run: labels plus a column oriented table of observations.
///
/// `t` is non-decreasing once a trial has been loaded. An excluded trial is kept for
/// reporting but never aggregated.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub meta: TrialMetadata,
    pub t: Vec<f64>,
    pub frame: Vec<Option<u64>>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub columns: BTreeMap<Feature, Vec<f64>>,
    pub excluded: bool,
}

impl Trial {
    pub fn new(meta: TrialMetadata) -> Self {
        Self {
            meta,
            t: Vec::new(),
            frame: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            columns: BTreeMap::new(),
            excluded: false,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Append a timestep. Only valid before any feature column is added.
    pub fn push_row(&mut self, t: f64, frame: Option<u64>, x: f64, y: f64) {
        self.t.push(t);
        self.frame.push(frame);
        self.x.push(x);
        self.y.push(y);
    }

    /// Add or replace a feature column; it must have one value per timestep
    pub fn set_column(&mut self, feature: Feature, values: Vec<f64>) -> Result<(), TrialError> {
        if values.len() != self.len() {
            return Err(TrialError::ColumnLength(
                feature.column_name().to_string(),
                values.len(),
                self.len(),
            ));
        }
        self.columns.insert(feature, values);
        Ok(())
    }

    pub fn column(&self, feature: Feature) -> Option<&[f64]> {
        self.columns.get(&feature).map(|c| c.as_slice())
    }

    pub fn is_time_sorted(&self) -> bool {
        self.t.windows(2).all(|w| w[0] <= w[1])
    }

    /// Stable sort of every column by time. Non-finite times sort last.
    pub fn sort_by_time(&mut self) {
        if self.is_time_sorted() {
            return;
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|a, b| self.t[*a].total_cmp(&self.t[*b]));
        // total_cmp puts negative NaN first; keep every NaN at the end instead
        order.sort_by_key(|idx| self.t[*idx].is_nan());
        self.t = order.iter().map(|i| self.t[*i]).collect();
        self.frame = order.iter().map(|i| self.frame[*i]).collect();
        self.x = order.iter().map(|i| self.x[*i]).collect();
        self.y = order.iter().map(|i| self.y[*i]).collect();
        for values in self.columns.values_mut() {
            *values = order.iter().map(|i| values[*i]).collect();
        }
    }

    /// Read a courtship score file, where the scorer's codes are stored on the timestep rows.
    /// Metadata comes from the file name.
    ///
    /// The stimulus is the numeric `laser` column when present. Otherwise it is the forward
    /// filled `as` annotation, which the courtship scorer uses for the laser rather than the
    /// proboscis. Rows with a blank time are kept with a NaN time and sort last.
    pub fn read_courtship_csv(path: &Path) -> Result<Self, TrialError> {
        if !path.exists() {
            return Err(TrialError::BadFilePath(path.to_path_buf()));
        }
        let meta = parse_courtship_file_name(path)?;
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let has_column = |name: &str| headers.iter().any(|h| h == name);
        let mut rows = reader
            .deserialize::<CourtshipRow>()
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by(|a, b| a.time().total_cmp(&b.time()));
        rows.sort_by_key(|r| r.time().is_nan());

        let mut trial = Trial::new(meta);
        for row in rows.iter() {
            trial.push_row(
                row.time(),
                row.framenumber
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64),
                row.x.unwrap_or(f64::NAN),
                row.y.unwrap_or(f64::NAN),
            );
        }

        let stimulus = if has_column(LASER_COLUMN) {
            rows.iter().map(|r| r.laser.unwrap_or(f64::NAN)).collect()
        } else if has_column(STIMULUS_SCORE_COLUMN) {
            let mut events = Vec::new();
            for (index, row) in rows.iter().enumerate() {
                if let Some(value) = parse_stimulus_code(row.stimulus.as_deref().unwrap_or(""))? {
                    events.push(ScoreEvent { index, value });
                }
            }
            forward_fill(trial.len(), &events)
        } else {
            vec![f64::NAN; trial.len()]
        };
        trial.set_column(Feature::Stimulus, stimulus)?;

        for behavior in [Behavior::Wing, Behavior::Jump] {
            if !has_column(behavior.score_column()) {
                continue;
            }
            let mut events = Vec::new();
            for (index, row) in rows.iter().enumerate() {
                let code = match behavior {
                    Behavior::Jump => row.cv.as_deref(),
                    _ => row.zx.as_deref(),
                };
                if let Some(value) = behavior.parse_code(code.unwrap_or(""))? {
                    events.push(ScoreEvent { index, value });
                }
            }
            trial.set_column(behavior.feature(), forward_fill(trial.len(), &events))?;
        }
        Ok(trial)
    }

    /// Read a recorded tracking/laser log exported to CSV
    pub fn read_log_csv(path: &Path, meta: TrialMetadata) -> Result<Self, TrialError> {
        if !path.exists() {
            return Err(TrialError::BadFilePath(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<LogRow>()
            .collect::<Result<Vec<_>, _>>()?;

        let mut trial = Trial::new(meta);
        let mut power = Vec::with_capacity(rows.len());
        for row in rows {
            trial.push_row(
                row.t.unwrap_or(f64::NAN),
                row.framenumber,
                row.x.unwrap_or(f64::NAN),
                row.y.unwrap_or(f64::NAN),
            );
            power.push(row.laser_power.unwrap_or(0.0));
        }
        trial.set_column(Feature::Stimulus, power)?;
        trial.sort_by_time();
        Ok(trial)
    }
}

/// A row of a courtship score file
#[derive(Debug, Deserialize)]
struct CourtshipRow {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    framenumber: Option<f64>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    laser: Option<f64>,
    #[serde(rename = "as", default)]
    stimulus: Option<String>,
    #[serde(default)]
    zx: Option<String>,
    #[serde(default)]
    cv: Option<String>,
}

impl CourtshipRow {
    fn time(&self) -> f64 {
        self.t.unwrap_or(f64::NAN)
    }
}

/// A row of a recorded log
#[derive(Debug, Deserialize)]
struct LogRow {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    framenumber: Option<u64>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    laser_power: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;

    #[test]
    fn test_column_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_column_name(feature.column_name()), Some(feature));
        }
        assert_eq!(Feature::from_column_name("Genotype"), None);
    }

    #[test]
    fn test_sort_by_time_moves_every_column() {
        let mut trial = Trial::new(TrialMetadata::default());
        trial.push_row(2.0, Some(2), 20.0, 0.0);
        trial.push_row(f64::NAN, Some(9), 90.0, 0.0);
        trial.push_row(1.0, Some(1), 10.0, 0.0);
        trial.set_column(Feature::Stimulus, vec![0.2, 0.9, 0.1]).unwrap();
        trial.sort_by_time();
        assert_eq!(&trial.t[..2], &[1.0, 2.0]);
        assert!(trial.t[2].is_nan());
        assert_eq!(trial.frame, vec![Some(1), Some(2), Some(9)]);
        assert_eq!(trial.x, vec![10.0, 20.0, 90.0]);
        assert_eq!(trial.column(Feature::Stimulus).unwrap(), &[0.1, 0.2, 0.9]);
    }

    #[test]
    fn test_set_column_checks_length() {
        let mut trial = Trial::new(TrialMetadata::default());
        trial.push_row(0.0, None, 0.0, 0.0);
        assert!(matches!(
            trial.set_column(Feature::Wing, vec![0.0, 1.0]),
            Err(TrialError::ColumnLength(_, 2, 1))
        ));
    }

    #[test]
    fn test_read_courtship_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wGP_130_1_20130528_153021.csv");
        std::fs::write(
            &path,
            "t,framenumber,x,y,laser,zx\n\
             0.2,2,11,10,1,\n\
             0.0,0,10,10,0,\n\
             0.1,1,10,11,1,z\n\
             0.3,3,,,0,\n\
             0.4,4,12,12,0,x\n",
        )
        .unwrap();
        let trial = Trial::read_courtship_csv(&path).unwrap();
        assert!(trial.is_time_sorted());
        assert_eq!(trial.meta.genotype, "wGP");
        assert_eq!(trial.frame[0], Some(0));
        assert!(trial.x[3].is_nan());
        assert_eq!(
            trial.column(Feature::Wing).unwrap(),
            &[0.0, 1.0, 1.0, 1.0, 0.0]
        );
        assert_eq!(
            trial.column(Feature::Stimulus).unwrap(),
            &[0.0, 1.0, 1.0, 0.0, 0.0]
        );
        // columns absent from the file are not invented
        assert!(trial.column(Feature::Jump).is_none());
    }

    #[test]
    fn test_read_courtship_csv_unknown_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wGP_130_1_20130528_153021.csv");
        std::fs::write(&path, "t,x,y,laser,zx\n0.0,1,1,0,q\n").unwrap();
        assert!(matches!(
            Trial::read_courtship_csv(&path),
            Err(TrialError::ScoreError(ScoreError::UnknownCode { .. }))
        ));
    }

    #[test]
    fn test_courtship_stimulus_from_as_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wGP_130_1_20130528_153021.csv");
        std::fs::write(
            &path,
            "t,x,y,as,zx\n0.0,1,1,a,z\n0.1,1,1,,\n0.2,1,1,s,x\n0.3,1,1,,\n",
        )
        .unwrap();
        let mut trial = Trial::read_courtship_csv(&path).unwrap();
        assert_eq!(
            trial.column(Feature::Stimulus).unwrap(),
            &[1.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(trial.column(Feature::Wing).unwrap(), &[1.0, 1.0, 0.0, 0.0]);
        // the courtship `as` column is the laser, not a proboscis score
        assert!(trial.column(Feature::Proboscis).is_none());
        assert_eq!(
            crate::align::align_to_stimulus_offset(&mut trial, 120.0),
            crate::align::Alignment::Aligned { zero_index: 1 }
        );
    }

    #[test]
    fn test_blank_time_is_kept_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wGP_130_1_20130528_153021.csv");
        std::fs::write(&path, "t,x,y,laser\n0.0,1,1,0\n,2,2,1\n0.1,3,3,1\n").unwrap();
        let trial = Trial::read_courtship_csv(&path).unwrap();
        assert_eq!(trial.len(), 3);
        assert_eq!(&trial.t[..2], &[0.0, 0.1]);
        assert!(trial.t[2].is_nan());
        assert_eq!(trial.x, vec![1.0, 3.0, 2.0]);

        let log_path = dir.path().join("2013-05-28-15-30-25.csv");
        std::fs::write(
            &log_path,
            "t,framenumber,x,y,laser_power\n,10,1,1,0\n0.0,11,2,2,0\n",
        )
        .unwrap();
        let log = Trial::read_log_csv(&log_path, TrialMetadata::default()).unwrap();
        assert_eq!(log.t[0], 0.0);
        assert!(log.t[1].is_nan());
        assert_eq!(log.frame, vec![Some(11), Some(10)]);
    }

    #[test]
    fn test_read_log_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2013-05-28-15-30-25.csv");
        std::fs::write(
            &path,
            "t,framenumber,x,y,laser_power\n0.0,10,1,1,0\n0.1,11,2,2,0.5\n0.2,12,3,3,\n",
        )
        .unwrap();
        let trial = Trial::read_log_csv(&path, TrialMetadata::default()).unwrap();
        assert_eq!(trial.len(), 3);
        assert_eq!(trial.frame, vec![Some(10), Some(11), Some(12)]);
        assert_eq!(trial.column(Feature::Stimulus).unwrap(), &[0.0, 0.5, 0.0]);
    }
}
