// Categorical behavior scores. The scorer only annotates the frames where a behavior starts
// or stops, so every score column is sparse and has to be forward filled onto the trial.
use serde::Deserialize;
use std::path::Path;

use super::error::{ScoreError, TrialError};
use super::trial::{Feature, Trial};

pub const SCORE_ON: f64 = 1.0;
pub const SCORE_OFF: f64 = 0.0;

/// The scored behaviors and their single letter vocabularies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Proboscis,
    Wing,
    Jump,
}

impl Behavior {
    pub const ALL: [Behavior; 3] = [Behavior::Proboscis, Behavior::Wing, Behavior::Jump];

    /// Column holding this behavior in a score file
    pub fn score_column(&self) -> &'static str {
        match self {
            Self::Proboscis => "as",
            Self::Wing => "zx",
            Self::Jump => "cv",
        }
    }

    pub fn feature(&self) -> Feature {
        match self {
            Self::Proboscis => Feature::Proboscis,
            Self::Wing => Feature::Wing,
            Self::Jump => Feature::Jump,
        }
    }

    /// (on, off) codes
    fn codes(&self) -> (&'static str, &'static str) {
        match self {
            Self::Proboscis => ("a", "s"),
            Self::Wing => ("z", "x"),
            Self::Jump => ("c", "v"),
        }
    }

    /// Translate a score code. An empty cell is not an annotation and gives None.
    pub fn parse_code(&self, code: &str) -> Result<Option<f64>, ScoreError> {
        let code = code.trim();
        let (on, off) = self.codes();
        if code.is_empty() || code.eq_ignore_ascii_case("nan") {
            Ok(None)
        } else if code == on {
            Ok(Some(SCORE_ON))
        } else if code == off {
            Ok(Some(SCORE_OFF))
        } else {
            Err(ScoreError::UnknownCode {
                column: self.score_column().to_string(),
                value: code.to_string(),
            })
        }
    }
}

/// Translate a cell of the `as` column of a courtship score file, which carries the laser
/// annotation. The scorer writes `a` (on) and `s` (off); exported files may hold the numeric
/// value instead.
pub fn parse_stimulus_code(code: &str) -> Result<Option<f64>, ScoreError> {
    match Behavior::Proboscis.parse_code(code) {
        Err(ScoreError::UnknownCode { column, value }) => match value.parse::<f64>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(ScoreError::UnknownCode { column, value }),
        },
        other => other,
    }
}

/// One annotation placed on a trial timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvent {
    pub index: usize,
    pub value: f64,
}

/// Forward fill sparse annotations over len timesteps. Timesteps before the first annotation
/// are off. When two annotations land on the same timestep the later one wins.
pub fn forward_fill(len: usize, events: &[ScoreEvent]) -> Vec<f64> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.index); // stable, so later annotations stay later
    let mut filled = Vec::with_capacity(len);
    let mut current = SCORE_OFF;
    let mut next = sorted.iter().peekable();
    for idx in 0..len {
        while let Some(event) = next.next_if(|e| e.index == idx) {
            current = event.value;
        }
        filled.push(current);
    }
    filled
}

/// A row of a sparse score file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRow {
    #[serde(default)]
    pub framenumber: Option<f64>,
    #[serde(rename = "as", default)]
    pub proboscis: Option<String>,
    #[serde(default)]
    pub zx: Option<String>,
    #[serde(default)]
    pub cv: Option<String>,
}

impl ScoreRow {
    pub fn code(&self, behavior: Behavior) -> Option<&str> {
        match behavior {
            Behavior::Proboscis => self.proboscis.as_deref(),
            Behavior::Wing => self.zx.as_deref(),
            Behavior::Jump => self.cv.as_deref(),
        }
    }

    /// The annotated frame, if the row carries one
    pub fn frame(&self) -> Option<u64> {
        match self.framenumber {
            Some(f) if f.is_finite() && f >= 0.0 => Some(f as u64),
            _ => None,
        }
    }
}

pub fn read_score_rows(path: &Path) -> Result<Vec<ScoreRow>, ScoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<ScoreRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Index of the single timestep recorded at frame. Zero or several matches mean the score
/// file and the recording disagree, which is fatal.
pub fn match_frame(frames: &[Option<u64>], frame: u64) -> Result<usize, ScoreError> {
    let mut matching = frames
        .iter()
        .enumerate()
        .filter(|(_, f)| **f == Some(frame))
        .map(|(idx, _)| idx);
    match (matching.next(), matching.count()) {
        (Some(idx), 0) => Ok(idx),
        (None, _) => Err(ScoreError::FrameMismatch { frame, matches: 0 }),
        (Some(_), rest) => Err(ScoreError::FrameMismatch {
            frame,
            matches: rest + 1,
        }),
    }
}

/// Join sparse score rows onto a trial by frame number and add one forward filled column per
/// behavior. Rows without a frame number are ignored.
pub fn apply_scores(trial: &mut Trial, rows: &[ScoreRow]) -> Result<(), TrialError> {
    let mut events: Vec<Vec<ScoreEvent>> = vec![Vec::new(); Behavior::ALL.len()];
    for row in rows {
        let frame = match row.frame() {
            Some(f) => f,
            None => continue,
        };
        let index = match_frame(&trial.frame, frame)?;
        for (behavior, behavior_events) in Behavior::ALL.iter().zip(events.iter_mut()) {
            if let Some(value) = behavior.parse_code(row.code(*behavior).unwrap_or(""))? {
                behavior_events.push(ScoreEvent { index, value });
            }
        }
    }

    let len = trial.len();
    for (behavior, behavior_events) in Behavior::ALL.iter().zip(events.iter()) {
        trial.set_column(behavior.feature(), forward_fill(len, behavior_events))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrialMetadata;

    fn trial_with_frames(frames: &[u64]) -> Trial {
        let mut trial = Trial::new(TrialMetadata::default());
        for (i, f) in frames.iter().enumerate() {
            trial.push_row(i as f64 * 0.1, Some(*f), 0.0, 0.0);
        }
        trial
    }

    fn row(frame: f64, proboscis: &str, wing: &str, jump: &str) -> ScoreRow {
        let cell = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        ScoreRow {
            framenumber: Some(frame),
            proboscis: cell(proboscis),
            zx: cell(wing),
            cv: cell(jump),
        }
    }

    #[test]
    fn test_vocabulary() {
        assert_eq!(Behavior::Wing.parse_code("z").unwrap(), Some(SCORE_ON));
        assert_eq!(Behavior::Wing.parse_code("x").unwrap(), Some(SCORE_OFF));
        assert_eq!(Behavior::Proboscis.parse_code(" a ").unwrap(), Some(SCORE_ON));
        assert_eq!(Behavior::Jump.parse_code("").unwrap(), None);
        assert!(matches!(
            Behavior::Wing.parse_code("a"),
            Err(ScoreError::UnknownCode { .. })
        ));
    }

    #[test]
    fn test_stimulus_codes() {
        assert_eq!(parse_stimulus_code("a").unwrap(), Some(1.0));
        assert_eq!(parse_stimulus_code("s").unwrap(), Some(0.0));
        assert_eq!(parse_stimulus_code("0.5").unwrap(), Some(0.5));
        assert_eq!(parse_stimulus_code("").unwrap(), None);
        assert!(matches!(
            parse_stimulus_code("z"),
            Err(ScoreError::UnknownCode { .. })
        ));
    }

    #[test]
    fn test_forward_fill_across_unannotated_rows() {
        let filled = forward_fill(
            6,
            &[
                ScoreEvent { index: 1, value: 1.0 },
                ScoreEvent { index: 5, value: 0.0 },
            ],
        );
        // leading row is off, the three unannotated rows repeat the last annotation
        assert_eq!(filled, vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_later_annotation_on_same_row_wins() {
        let filled = forward_fill(
            2,
            &[
                ScoreEvent { index: 0, value: 1.0 },
                ScoreEvent { index: 0, value: 0.0 },
            ],
        );
        assert_eq!(filled, vec![0.0, 0.0]);
    }

    #[test]
    fn test_match_frame_must_be_unique() {
        let frames = vec![Some(10), Some(11), Some(11), None];
        assert_eq!(match_frame(&frames, 10).unwrap(), 0);
        assert!(matches!(
            match_frame(&frames, 11),
            Err(ScoreError::FrameMismatch { matches: 2, .. })
        ));
        assert!(matches!(
            match_frame(&frames, 99),
            Err(ScoreError::FrameMismatch { matches: 0, .. })
        ));
    }

    #[test]
    fn test_apply_scores() {
        let mut trial = trial_with_frames(&[100, 101, 102, 103, 104, 105]);
        let rows = vec![
            row(101.0, "a", "z", ""),
            ScoreRow::default(),
            row(f64::NAN, "s", "x", "c"),
            row(104.0, "", "x", "c"),
        ];
        apply_scores(&mut trial, &rows).unwrap();
        assert_eq!(
            trial.column(Feature::Proboscis).unwrap(),
            &[0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(
            trial.column(Feature::Wing).unwrap(),
            &[0.0, 1.0, 1.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(
            trial.column(Feature::Jump).unwrap(),
            &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_apply_scores_rejects_unknown_frame_and_code() {
        let mut trial = trial_with_frames(&[1, 2, 3]);
        assert!(matches!(
            apply_scores(&mut trial, &[row(7.0, "a", "", "")]),
            Err(TrialError::ScoreError(ScoreError::FrameMismatch { .. }))
        ));
        assert!(matches!(
            apply_scores(&mut trial, &[row(2.0, "q", "", "")]),
            Err(TrialError::ScoreError(ScoreError::UnknownCode { .. }))
        ));
    }

    #[test]
    fn test_read_score_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("th_1_1_20130528_153021.mp4.csv");
        std::fs::write(&path, "framenumber,as,zx,cv\n12,a,,\n,s,x,v\n14,,z,c\n").unwrap();
        let rows = read_score_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].frame(), Some(12));
        assert_eq!(rows[0].code(Behavior::Wing), None);
        assert_eq!(rows[1].frame(), None);
        assert_eq!(rows[2].code(Behavior::Jump), Some("c"));
    }
}
