use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::aggregate::{aggregate_condition, ConditionAggregate, Summary};
use super::align::{align_to_onset, align_to_stimulus_offset, detect_stimulus_window, Alignment};
use super::binning::{bin_trial, BinnedSeries};
use super::combine::{active_spans, combine, Comparison, ConditionData, ConditionRole};
use super::config::Config;
use super::constants::*;
use super::error::{LoaderError, ProcessorError, SnapshotError, TrialError};
use super::features::{add_distance_to_target, add_in_area, latency_to_stay, time_in_area};
use super::loader::{list_files, load_parallel};
use super::metadata::{
    find_nearest_log, log_metadata, parse_scored_file_name, GenotypeSynonyms, TrialMetadata,
    CSV_SUFFIX, SCORED_MOVIE_SUFFIX,
};
use super::plot::{
    condition_grid, render, trajectory_grid, BarsFigure, ConditionPanel, ConditionPanelsFigure,
    Line, LinesFigure, TimeseriesFigure, TrajectoryFigure,
};
use super::scores::{apply_scores, read_score_rows, Behavior};
use super::snapshot::{
    read_condition, read_trial_table, write_condition, write_series_table, write_trial_table,
    ExperimentEntry, SnapshotManifest, TrialEntry,
};
use super::targets::TargetSet;
use super::trial::{Feature, Trial};
use super::worker_status::WorkerStatus;

const TIME_AXIS_LABEL: &str = "Time (s)";
const PERCENT_IN_AREA_LABEL: &str = "Percentage of time spent in area";

/// The analyses this crate can run on a data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// 10 minute courtship experiment: score files plus a background image
    Courtship,
    /// Proboscis / wing / jump scores joined onto recorded logs
    Scored,
    /// Trajectories and time in area of recorded logs listed in a manifest
    Arena,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Courtship => "courtship",
            Self::Scored => "scored",
            Self::Arena => "arena",
        }
    }
}

fn n_workers(config: &Config) -> usize {
    config.n_threads.max(1) as usize
}

fn read_snapshot(dir: &Path, pipeline: Pipeline) -> Result<SnapshotManifest, ProcessorError> {
    log::info!("Loading snapshot from {}...", dir.to_string_lossy());
    let manifest = SnapshotManifest::read(dir)?;
    if manifest.pipeline != pipeline.name() {
        return Err(ProcessorError::WrongPipeline(
            manifest.pipeline,
            pipeline.name().to_string(),
        ));
    }
    log::info!("Snapshot was written by {}", manifest.created_by);
    Ok(manifest)
}

/************************************* Courtship *************************************/

/// Split binned trials into the three configured conditions. Genotypes that are not a
/// configured condition are reported and dropped.
fn group_conditions(
    config: &Config,
    synonyms: &GenotypeSynonyms,
    trials: Vec<BinnedSeries>,
) -> Result<Comparison, ProcessorError> {
    let mut by_genotype: FxHashMap<String, Vec<BinnedSeries>> = FxHashMap::default();
    for series in trials {
        by_genotype
            .entry(series.meta.genotype.clone())
            .or_default()
            .push(series);
    }

    let mut take = |role: ConditionRole,
                    genotype: &str,
                    label: &str|
     -> Result<ConditionData, ProcessorError> {
        let genotype = synonyms.canonical(genotype);
        let trials = by_genotype.remove(genotype).unwrap_or_default();
        log::info!("{label} ({genotype}): {} trials", trials.len());
        let aggregate = aggregate_condition(genotype, &trials)?;
        Ok(ConditionData {
            role,
            label: label.to_string(),
            trials,
            aggregate,
        })
    };
    let [(exp, exp_label), (exp2, exp2_label), (ctrl, ctrl_label)] = config.get_conditions();
    let exp = take(ConditionRole::Experimental, exp, exp_label)?;
    let exp2 = take(ConditionRole::SecondaryExperimental, exp2, exp2_label)?;
    let ctrl = take(ConditionRole::Control, ctrl, ctrl_label)?;

    for (genotype, trials) in by_genotype.iter() {
        log::warn!(
            "Ignoring {} trials of genotype {genotype}, which is not a configured condition",
            trials.len()
        );
    }
    Ok(combine(exp, exp2, ctrl)?)
}

/// Load every score file of a courtship directory, align and bin the trials, and write the
/// per-trial outputs
fn compute_courtship(
    config: &Config,
    data_path: &Path,
    tx: &Sender<WorkerStatus>,
) -> Result<Comparison, ProcessorError> {
    let images = list_files(data_path, ".png")?;
    match images.first() {
        Some(image) => log::info!("Background image: {}", image.to_string_lossy()),
        None => {
            return Err(LoaderError::MissingInput(format!(
                "no background image (.png) in {}",
                data_path.to_string_lossy()
            ))
            .into())
        }
    }
    let targets = TargetSet::from_config(config, data_path)?;

    let files = list_files(data_path, CSV_SUFFIX)?;
    if files.is_empty() {
        return Err(LoaderError::NoMatchingFiles(data_path.to_path_buf()).into());
    }
    let trials = load_parallel(&files, n_workers(config), tx, |path| {
        let mut trial = Trial::read_courtship_csv(path)?;
        add_distance_to_target(&mut trial, &targets)?;
        Ok(trial)
    })?;

    let synonyms = GenotypeSynonyms::new(config.genotype_synonyms.clone());
    let output_dir = config.get_output_directory(data_path);
    std::fs::create_dir_all(&output_dir)?;
    let mut binned = Vec::with_capacity(trials.len());
    for mut trial in trials {
        if align_to_stimulus_offset(&mut trial, config.pre_stimulus_window) == Alignment::Excluded
        {
            log::warn!(
                "No stimulus found in {}; trial excluded",
                trial.meta.source.to_string_lossy()
            );
            continue;
        }
        let series = bin_trial(&trial, config.bin_width, &synonyms);
        write_series_table(
            &output_dir.join(trial.meta.output_file_name()),
            std::slice::from_ref(&series),
        )?;
        binned.push(series);
    }
    log::info!(
        "Wrote {} binned trials to {}",
        binned.len(),
        output_dir.to_string_lossy()
    );

    group_conditions(config, &synonyms, binned)
}

fn write_comparison(dir: &Path, comparison: &Comparison) -> Result<(), ProcessorError> {
    let mut manifest = SnapshotManifest::new(Pipeline::Courtship.name());
    for condition in comparison.conditions() {
        manifest.conditions.push(write_condition(
            dir,
            condition.role.file_prefix(),
            &condition.label,
            &condition.trials,
            &condition.aggregate,
        )?);
    }
    manifest.write(dir)?;
    log::info!("Saved snapshot to {}", dir.to_string_lossy());
    Ok(())
}

fn read_comparison(dir: &Path) -> Result<Comparison, ProcessorError> {
    let manifest = read_snapshot(dir, Pipeline::Courtship)?;
    let load = |role: ConditionRole| -> Result<ConditionData, ProcessorError> {
        let entry = manifest.condition(role.file_prefix()).ok_or_else(|| {
            SnapshotError::MissingFile(dir.join(format!("{}_trials.csv", role.file_prefix())))
        })?;
        let (trials, aggregate) = read_condition(dir, entry)?;
        Ok(ConditionData {
            role,
            label: entry.label.clone(),
            trials,
            aggregate,
        })
    };
    Ok(combine(
        load(ConditionRole::Experimental)?,
        load(ConditionRole::SecondaryExperimental)?,
        load(ConditionRole::Control)?,
    )?)
}

fn plot_comparison(
    config: &Config,
    comparison: &Comparison,
    plot_dir: &Path,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let spread = if config.use_sem { "SEM" } else { "STD" };
    let spans = comparison.stimulus_spans();
    let figure = |feature: Feature, title: &str, y_range: (f64, f64)| TimeseriesFigure {
        title: title.to_string(),
        x_label: String::from(TIME_AXIS_LABEL),
        y_label: format!("{}, +/- {spread}", feature.axis_label()),
        x_range: config.time_limits,
        y_range,
        series: ConditionRole::ALL
            .iter()
            .filter_map(|role| comparison.series(*role, feature))
            .collect(),
        spans: spans.clone(),
        use_sem: config.use_sem,
    };

    let mut written = render(
        &figure(Feature::Wing, "Wing Extension", config.wing_limits),
        &plot_dir.join("following_and_WingExt"),
    )?;
    if config.plot_distance {
        written.extend(render(
            &figure(
                Feature::DistanceToTarget,
                "Distance to Nearest Target",
                config.distance_limits,
            ),
            &plot_dir.join("following_and_dtarget"),
        )?);
    }
    Ok(written)
}

/// Courtship pipeline. Returns the rendered plot files.
pub fn process_courtship(
    config: &Config,
    data_path: &Path,
    only_plot: bool,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let snapshot_dir = config.get_snapshot_directory(data_path);
    let comparison = if only_plot {
        read_comparison(&snapshot_dir)?
    } else {
        let comparison = compute_courtship(config, data_path, tx)?;
        write_comparison(&snapshot_dir, &comparison)?;
        comparison
    };
    plot_comparison(config, &comparison, &config.get_plot_directory(data_path))
}

/************************************** Scored **************************************/

/// The binned trials of one scored condition and their aggregate
#[derive(Debug, Clone)]
struct ScoredCondition {
    label: String,
    trials: Vec<BinnedSeries>,
    aggregate: ConditionAggregate,
}

/// Find the recorded log of a scored movie and join the scores onto it
fn load_scored_trial(
    score_path: &Path,
    log_dir: &Path,
    max_log_time_diff: f64,
) -> Result<Trial, LoaderError> {
    let meta = parse_scored_file_name(score_path).map_err(TrialError::from)?;
    let datetime = meta
        .datetime
        .ok_or_else(|| TrialError::BadFilePath(score_path.to_path_buf()))?;
    let log_path =
        find_nearest_log(log_dir, &datetime, max_log_time_diff).map_err(TrialError::from)?;
    log::info!(
        "Matched {} to log {}",
        meta.trial_id,
        log_path.to_string_lossy()
    );
    let mut trial = Trial::read_log_csv(&log_path, meta)?;
    let rows = read_score_rows(score_path).map_err(TrialError::from)?;
    apply_scores(&mut trial, &rows)?;
    Ok(trial)
}

fn compute_scored(
    config: &Config,
    data_path: &Path,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<ScoredCondition>, ProcessorError> {
    let score_dir = data_path.join(SCORE_DIR_NAME);
    let log_dir = data_path.join(LOG_DIR_NAME);
    if !log_dir.is_dir() {
        return Err(LoaderError::MissingInput(format!(
            "log directory {} does not exist",
            log_dir.to_string_lossy()
        ))
        .into());
    }
    let files = list_files(&score_dir, SCORED_MOVIE_SUFFIX)?;
    if files.is_empty() {
        return Err(LoaderError::NoMatchingFiles(score_dir).into());
    }
    let trials = load_parallel(&files, n_workers(config), tx, |path| {
        load_scored_trial(path, &log_dir, config.max_log_time_diff)
    })?;

    let synonyms = GenotypeSynonyms::new(config.genotype_synonyms.clone());
    let mut by_condition: FxHashMap<String, Vec<BinnedSeries>> = FxHashMap::default();
    for mut trial in trials {
        let window = trial
            .column(Feature::Stimulus)
            .and_then(detect_stimulus_window)
            .ok_or_else(|| ProcessorError::NoStimulusOnset(trial.meta.trial_id.clone()))?;
        match align_to_onset(&mut trial, &window) {
            Some(offset) => log::info!("{}: laser on for {offset:.1} s", trial.meta.trial_id),
            None => log::info!("{}: laser never turned off", trial.meta.trial_id),
        }
        let series = bin_trial(&trial, config.bin_width, &synonyms);
        by_condition
            .entry(series.meta.genotype.clone())
            .or_default()
            .push(series);
    }

    let mut names: Vec<String> = by_condition.keys().cloned().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| -> Result<ScoredCondition, ProcessorError> {
            let trials = by_condition.remove(&name).unwrap_or_default();
            let aggregate = aggregate_condition(&name, &trials)?;
            Ok(ScoredCondition {
                label: name,
                trials,
                aggregate,
            })
        })
        .collect()
}

fn write_scored(dir: &Path, conditions: &[ScoredCondition]) -> Result<(), ProcessorError> {
    let mut manifest = SnapshotManifest::new(Pipeline::Scored.name());
    for condition in conditions {
        manifest.conditions.push(write_condition(
            dir,
            &condition.label,
            &condition.label,
            &condition.trials,
            &condition.aggregate,
        )?);
    }
    manifest.write(dir)?;
    log::info!("Saved snapshot to {}", dir.to_string_lossy());
    Ok(())
}

fn read_scored(dir: &Path) -> Result<Vec<ScoredCondition>, ProcessorError> {
    let manifest = read_snapshot(dir, Pipeline::Scored)?;
    let mut conditions = Vec::with_capacity(manifest.conditions.len());
    for entry in manifest.conditions.iter() {
        let (trials, aggregate) = read_condition(dir, entry)?;
        conditions.push(ScoredCondition {
            label: entry.label.clone(),
            trials,
            aggregate,
        });
    }
    Ok(conditions)
}

fn condition_panel(condition: &ScoredCondition, feature: Feature) -> ConditionPanel {
    let aggregate = &condition.aggregate;
    ConditionPanel {
        title: format!("{} (n={})", condition.label, condition.trials.len()),
        traces: condition
            .trials
            .iter()
            .filter_map(|s| {
                s.column(feature)
                    .map(|values| s.t.iter().copied().zip(values.iter().copied()).collect())
            })
            .collect(),
        mean: aggregate
            .feature(feature)
            .map(|fa| aggregate.t.iter().copied().zip(fa.mean.iter().copied()).collect())
            .unwrap_or_default(),
        spans: aggregate
            .feature(Feature::Stimulus)
            .map(|fa| active_spans(&aggregate.t, &fa.mean, aggregate.bin_width))
            .unwrap_or_default(),
    }
}

fn plot_scored(
    conditions: &[ScoredCondition],
    plot_dir: &Path,
) -> Result<Vec<PathBuf>, ProcessorError> {
    condition_grid(conditions.len())?;
    let mut written = Vec::new();
    for behavior in Behavior::ALL {
        let feature = behavior.feature();
        let figure = ConditionPanelsFigure {
            title: feature.axis_label().to_string(),
            x_label: String::from(TIME_AXIS_LABEL),
            y_label: feature.axis_label().to_string(),
            panels: conditions
                .iter()
                .map(|c| condition_panel(c, feature))
                .collect(),
        };
        written.extend(render(&figure, &plot_dir.join(feature.column_name()))?);
    }
    Ok(written)
}

/// Scored pipeline. Returns the rendered plot files.
pub fn process_scored(
    config: &Config,
    data_path: &Path,
    only_plot: bool,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let snapshot_dir = config.get_snapshot_directory(data_path);
    let conditions = if only_plot {
        read_scored(&snapshot_dir)?
    } else {
        let conditions = compute_scored(config, data_path, tx)?;
        write_scored(&snapshot_dir, &conditions)?;
        conditions
    };
    plot_scored(&conditions, &config.get_plot_directory(data_path))
}

/************************************** Arena ***************************************/

/// One recorded log listed in an arena manifest. Relative paths are relative to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTrial {
    pub log: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Read an arena manifest: a map of experiment name to ordered trials. Keys starting with an
/// underscore are not experiments. Experiments named in `preferred` come first, in that
/// order, followed by the rest alphabetically.
pub fn read_arena_manifest(
    path: &Path,
    preferred: &[String],
) -> Result<Vec<(String, Vec<ManifestTrial>)>, ProcessorError> {
    if !path.exists() {
        return Err(LoaderError::MissingInput(format!(
            "manifest {} does not exist",
            path.to_string_lossy()
        ))
        .into());
    }
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
    let mut experiments = Vec::new();
    for (name, value) in raw {
        if name.starts_with('_') {
            continue;
        }
        experiments.push((name, serde_yaml::from_value::<Vec<ManifestTrial>>(value)?));
    }
    experiments.sort_by_key(|(name, _)| {
        preferred
            .iter()
            .position(|p| p == name)
            .unwrap_or(preferred.len())
    });
    Ok(experiments)
}

/// Write a manifest listing every log in dir under one experiment. Returns its path.
pub fn generate_arena_manifest(dir: &Path, experiment: &str) -> Result<PathBuf, ProcessorError> {
    let logs = list_files(dir, CSV_SUFFIX)?;
    if logs.is_empty() {
        return Err(LoaderError::NoMatchingFiles(dir.to_path_buf()).into());
    }
    let trials: Vec<ManifestTrial> = logs
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| ManifestTrial {
            log: PathBuf::from(name),
            label: None,
        })
        .collect();
    let mut manifest = BTreeMap::new();
    manifest.insert(experiment.to_string(), trials);
    let path = dir.join(MANIFEST_FILE_NAME);
    std::fs::write(&path, serde_yaml::to_string(&manifest)?)?;
    log::info!(
        "Generated manifest {} with {} logs",
        path.to_string_lossy(),
        logs.len()
    );
    Ok(path)
}

struct ArenaJob {
    path: PathBuf,
    experiment: String,
    label: Option<String>,
}

impl AsRef<Path> for ArenaJob {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// The trials of one arena experiment, in manifest order
#[derive(Debug, Clone)]
struct ArenaExperiment {
    name: String,
    trials: Vec<Trial>,
}

fn load_arena(
    config: &Config,
    base_dir: &Path,
    listed: &[(String, Vec<ManifestTrial>)],
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<ArenaExperiment>, ProcessorError> {
    let jobs: Vec<ArenaJob> = listed
        .iter()
        .flat_map(|(name, trials)| {
            trials.iter().map(move |t| ArenaJob {
                path: base_dir.join(&t.log),
                experiment: name.clone(),
                label: t.label.clone(),
            })
        })
        .collect();
    let mut loaded = load_parallel(&jobs, n_workers(config), tx, |job| {
        let meta = log_metadata(&job.path, &job.experiment, job.label.as_deref());
        Ok(Trial::read_log_csv(&job.path, meta)?)
    })?
    .into_iter();

    Ok(listed
        .iter()
        .map(|(name, trials)| ArenaExperiment {
            name: name.clone(),
            trials: loaded.by_ref().take(trials.len()).collect(),
        })
        .collect())
}

fn write_arena(dir: &Path, experiments: &[ArenaExperiment]) -> Result<(), ProcessorError> {
    std::fs::create_dir_all(dir)?;
    let mut manifest = SnapshotManifest::new(Pipeline::Arena.name());
    for experiment in experiments {
        let mut entry = ExperimentEntry {
            name: experiment.name.clone(),
            trials: Vec::with_capacity(experiment.trials.len()),
        };
        for (idx, trial) in experiment.trials.iter().enumerate() {
            let file = format!("{}_{idx}.csv", experiment.name);
            write_trial_table(&dir.join(&file), trial)?;
            entry.trials.push(TrialEntry {
                label: trial.meta.trial_id.clone(),
                file,
            });
        }
        manifest.experiments.push(entry);
    }
    manifest.write(dir)?;
    log::info!("Saved snapshot to {}", dir.to_string_lossy());
    Ok(())
}

fn read_arena(dir: &Path) -> Result<Vec<ArenaExperiment>, ProcessorError> {
    let manifest = read_snapshot(dir, Pipeline::Arena)?;
    let mut experiments = Vec::with_capacity(manifest.experiments.len());
    for entry in manifest.experiments.iter() {
        let mut trials = Vec::with_capacity(entry.trials.len());
        for t in entry.trials.iter() {
            let meta = TrialMetadata {
                trial_id: t.label.clone(),
                genotype: entry.name.clone(),
                stimulus_group: String::from(DEFAULT_STIMULUS_GROUP),
                ..Default::default()
            };
            trials.push(read_trial_table(&dir.join(&t.file), meta)?);
        }
        experiments.push(ArenaExperiment {
            name: entry.name.clone(),
            trials,
        });
    }
    Ok(experiments)
}

/// Every experiment must hold the same number of trials. Returns that number.
fn check_trial_counts(experiments: &[ArenaExperiment]) -> Result<usize, ProcessorError> {
    let counts: Vec<(String, usize)> = experiments
        .iter()
        .map(|e| (e.name.clone(), e.trials.len()))
        .collect();
    let mut distinct: Vec<usize> = counts.iter().map(|(_, n)| *n).collect();
    distinct.sort();
    distinct.dedup();
    match distinct.as_slice() {
        [] => Err(ProcessorError::NoExperiments),
        [n] => Ok(*n),
        _ => Err(ProcessorError::MismatchedTrialCounts(counts)),
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn plot_arena(
    config: &Config,
    experiments: &[ArenaExperiment],
    targets: &TargetSet,
    n_trials: usize,
    plot_dir: &Path,
) -> Result<Vec<PathBuf>, ProcessorError> {
    trajectory_grid(n_trials)?;
    let mut written = Vec::new();
    let mut totals = Vec::with_capacity(experiments.len());
    let mut latencies = Vec::with_capacity(experiments.len());

    for experiment in experiments {
        let title = title_case(&experiment.name);
        let trajectories = TrajectoryFigure {
            title: format!("{title} Trajectories"),
            trials: experiment
                .trials
                .iter()
                .map(|t| {
                    (
                        t.meta.trial_id.clone(),
                        t.x.iter().copied().zip(t.y.iter().copied()).collect(),
                    )
                })
                .collect(),
            targets: targets.points().to_vec(),
            area_radius: config.area_radius,
        };
        written.extend(render(
            &trajectories,
            &plot_dir.join(format!("{}_trajectories", experiment.name)),
        )?);

        let in_area: Vec<_> = experiment
            .trials
            .iter()
            .map(|t| {
                time_in_area(t, config.time_in_area_horizon, config.time_in_area_interval)
            })
            .collect();
        let per_interval = LinesFigure {
            title: format!("{title} Time in Area"),
            x_label: String::from(TIME_AXIS_LABEL),
            y_label: String::from(PERCENT_IN_AREA_LABEL),
            lines: experiment
                .trials
                .iter()
                .zip(in_area.iter())
                .map(|(t, a)| Line {
                    label: t.meta.trial_id.clone(),
                    points: a.offsets.iter().copied().zip(a.percent.iter().copied()).collect(),
                    errors: None,
                })
                .collect(),
        };
        written.extend(render(
            &per_interval,
            &plot_dir.join(format!("{}_time", experiment.name)),
        )?);

        totals.push(Line {
            label: experiment.name.clone(),
            points: in_area
                .iter()
                .enumerate()
                .map(|(idx, a)| (idx as f64, a.total))
                .collect(),
            errors: None,
        });

        let summaries: Vec<Summary> = experiment
            .trials
            .iter()
            .map(|t| {
                let stays = latency_to_stay(t, config.stay_duration);
                log::info!(
                    "{} {}: {} stays of at least {} s",
                    title,
                    t.meta.trial_id,
                    stays.len(),
                    config.stay_duration
                );
                Summary::from_values(stays)
            })
            .collect();
        latencies.push(Line {
            label: experiment.name.clone(),
            points: summaries
                .iter()
                .enumerate()
                .map(|(idx, s)| (idx as f64, s.mean))
                .collect(),
            errors: Some(summaries.iter().map(|s| s.std).collect()),
        });
    }

    let latency_title = format!("Latency to first {}s contact", config.stay_duration);
    written.extend(render(
        &BarsFigure {
            title: String::from("Time in Area"),
            x_label: String::from("Trial"),
            y_label: String::from(PERCENT_IN_AREA_LABEL),
            n_categories: n_trials,
            groups: totals.clone(),
        },
        &plot_dir.join("timeinarea"),
    )?);
    written.extend(render(
        &LinesFigure {
            title: String::from("Time in Area"),
            x_label: String::from("Trial"),
            y_label: String::from(PERCENT_IN_AREA_LABEL),
            lines: totals,
        },
        &plot_dir.join("timeinarea_l"),
    )?);
    written.extend(render(
        &BarsFigure {
            title: latency_title.clone(),
            x_label: String::from("Trial"),
            y_label: latency_title.clone(),
            n_categories: n_trials,
            groups: latencies.clone(),
        },
        &plot_dir.join("latency"),
    )?);
    written.extend(render(
        &LinesFigure {
            title: latency_title.clone(),
            x_label: String::from("Trial"),
            y_label: latency_title,
            lines: latencies,
        },
        &plot_dir.join("latency_l"),
    )?);
    Ok(written)
}

/// Arena pipeline. `path` is either a manifest file or a directory of logs, for which a
/// manifest listing every log as a coupled trial is generated. Returns the rendered plot files.
pub fn process_arena(
    config: &Config,
    path: &Path,
    only_plot: bool,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    let base_dir = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };
    let targets = TargetSet::from_config(config, &base_dir)?;
    let snapshot_dir = config.get_snapshot_directory(&base_dir);

    let mut experiments = if only_plot {
        read_arena(&snapshot_dir)?
    } else {
        let manifest_path = if path.is_dir() {
            generate_arena_manifest(path, DEFAULT_EXPERIMENTS[0])?
        } else {
            path.to_path_buf()
        };
        let listed = read_arena_manifest(&manifest_path, &config.experiments)?;
        if listed.is_empty() {
            return Err(ProcessorError::NoExperiments);
        }
        load_arena(config, &base_dir, &listed, tx)?
    };

    for experiment in experiments.iter_mut() {
        for trial in experiment.trials.iter_mut() {
            add_in_area(trial, &targets, config.area_radius)?;
        }
    }
    let n_trials = check_trial_counts(&experiments)?;
    if !only_plot {
        write_arena(&snapshot_dir, &experiments)?;
    }
    plot_arena(
        config,
        &experiments,
        &targets,
        n_trials,
        &config.get_plot_directory(&base_dir),
    )
}

/// The function to be called by a separate thread (typically the CLI).
/// Runs one pipeline on path and returns the rendered plot files.
pub fn process(
    config: Config,
    pipeline: Pipeline,
    path: PathBuf,
    only_plot: bool,
    tx: Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, ProcessorError> {
    if !path.exists() {
        return Err(LoaderError::MissingInput(format!(
            "{} does not exist",
            path.to_string_lossy()
        ))
        .into());
    }
    log::info!(
        "Running the {} pipeline on {}...",
        pipeline.name(),
        path.to_string_lossy()
    );
    let written = match pipeline {
        Pipeline::Courtship => process_courtship(&config, &path, only_plot, &tx)?,
        Pipeline::Scored => process_scored(&config, &path, only_plot, &tx)?,
        Pipeline::Arena => process_arena(&config, &path, only_plot, &tx)?,
    };
    log::info!("Finished the {} pipeline.", pipeline.name());
    Ok(written)
}
