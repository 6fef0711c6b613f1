use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("TargetSet is empty; at least one target coordinate is required")]
    Empty,
    #[error("Could not load targets because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("TargetSet failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("TargetSet failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("File name {0} does not follow the expected naming convention")]
    BadFileName(String),
    #[error("Could not parse date-time {0} from a file name")]
    BadDateTime(String),
    #[error("No recorded log within {1} seconds of score file date-time {0}")]
    NoMatchingLog(String, f64),
    #[error("Metadata failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Unknown value {value:?} in score column {column}")]
    UnknownCode { column: String, value: String },
    #[error("Score frame {frame} matched {matches} trial timesteps; expected exactly one")]
    FrameMismatch { frame: u64, matches: usize },
    #[error("Score file failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Score file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("Could not open trial because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Trial failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Trial failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Trial failed due to metadata error: {0}")]
    MetadataError(#[from] MetadataError),
    #[error("Trial failed due to score error: {0}")]
    ScoreError(#[from] ScoreError),
    #[error("Trial column {0} has {1} rows; expected {2}")]
    ColumnLength(String, usize, usize),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Missing input: {0}")]
    MissingInput(String),
    #[error("Loader found no matching files in {0:?}")]
    NoMatchingFiles(PathBuf),
    #[error("Loader failed due to trial error: {0}")]
    TrialError(#[from] TrialError),
    #[error("Loader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("A loader worker panicked")]
    WorkerPanicked,
    #[error("Loader failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Condition {0} has no trials to aggregate")]
    NoTrials(String),
    #[error("Condition {0} mixes stimulus groups {1:?}; only one stimulus group is handled per aggregation")]
    MultipleStimulusGroups(String, Vec<String>),
    #[error("Condition {0} mixes bin widths {1} and {2}")]
    MismatchedBinWidth(String, f64, f64),
}

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("Conditions have differing stimulus groups: {0:?}")]
    MismatchedStimulusGroups(Vec<String>),
    #[error("Conditions have differing bin widths: {0:?}")]
    MismatchedBinWidths(Vec<f64>),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot file {0:?} does not exist; run without --only-plot first")]
    MissingFile(PathBuf),
    #[error("Snapshot has format version {0}; expected {1}")]
    UnsupportedVersion(String, String),
    #[error("Snapshot has an unknown column {0}")]
    UnknownColumn(String),
    #[error("Snapshot is missing column {0}")]
    MissingColumn(String),
    #[error("Snapshot failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Snapshot failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Snapshot failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Snapshot failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Plotting failed while drawing: {0}")]
    DrawingError(String),
    #[error("Cannot lay out {0} panels in one figure; at most {1} are supported")]
    TooManyPanels(usize, usize),
    #[error("Plotting failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to TargetSet error: {0}")]
    TargetError(#[from] TargetError),
    #[error("Processor failed due to Metadata error: {0}")]
    MetadataError(#[from] MetadataError),
    #[error("Processor failed due to Trial error: {0}")]
    TrialError(#[from] TrialError),
    #[error("Processor failed due to Loader error: {0}")]
    LoaderError(#[from] LoaderError),
    #[error("Processor failed due to Aggregate error: {0}")]
    AggregateError(#[from] AggregateError),
    #[error("Processor failed due to Combine error: {0}")]
    CombineError(#[from] CombineError),
    #[error("Processor failed due to Snapshot error: {0}")]
    SnapshotError(#[from] SnapshotError),
    #[error("Processor failed due to Plot error: {0}")]
    PlotError(#[from] PlotError),
    #[error("Processor failed because trial {0} has no laser onset")]
    NoStimulusOnset(String),
    #[error("Processor failed because experiments contain different numbers of trials: {0:?}")]
    MismatchedTrialCounts(Vec<(String, usize)>),
    #[error("Processor failed because the snapshot was written by the {0} pipeline, not {1}")]
    WrongPipeline(String, String),
    #[error("Processor failed because no experiments were found in the manifest")]
    NoExperiments,
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Processor failed to write YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
