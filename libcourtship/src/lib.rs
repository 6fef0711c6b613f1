//! # libcourtship
//!
//! libcourtship is the analysis library behind `courtship_cli`. It takes the per-trial score
//! files and the recorded tracking/laser logs of fly courtship and optogenetic activation
//! assays, computes derived measurements (distance to target, time in area, latency to stay,
//! wing extension, proboscis extension and jumping), aligns every trial on its stimulus, bins
//! the trials onto a fixed time grid, aggregates them per condition and renders the plots.
//!
//! ## Pipelines
//!
//! Three analyses share the same stages (load, compute features, align, bin and aggregate,
//! combine, persist, plot):
//!
//! - courtship: a directory holding one background image (.png) and one score CSV per trial.
//! Trials are aligned on the end of the stimulus and compared across three configured
//! conditions (experimental, secondary experimental and control).
//! - scored: a directory with a `csvs/` folder of sparse score files and a `logs/` folder of
//! recorded logs. Each score file is matched to the log closest in time, the scores are
//! joined on by frame number and trials are aligned on the laser onset. One figure per
//! behavior is drawn with one panel per condition.
//! - arena: a manifest listing recorded logs per experiment (or a directory of logs, for which
//! a manifest is generated). Trajectories, time spent in the target area and the latency to
//! stay in the area are plotted per experiment and per trial.
//!
//! Every pipeline persists its results in a `snapshots/` directory, so the plots can be
//! redrawn later without reprocessing the raw data (`--only-plot` in the CLI).
//!
//! ## Configuration
//!
//! Configurations are YAML files; a template can be generated with `courtship_cli new`.
//! Missing fields take their default values. The format is as follows:
//!
//! ```yml
//! exp_genotype: wGP
//! exp2_genotype: '40347'
//! ctrl_genotype: uasstoptrpmyc
//! exp_label: P1>TRPA1
//! exp2_label: pIP10>TRPA1
//! ctrl_label: Control
//! genotype_synonyms:
//!   csGP: wGP
//! targets: []
//! targets_path: null
//! bin_width: 5.0
//! pre_stimulus_window: 120.0
//! n_threads: 1
//! max_log_time_diff: 10.0
//! area_radius: 30.0
//! time_in_area_horizon: 300.0
//! time_in_area_interval: 30.0
//! stay_duration: 20.0
//! experiments:
//! - coupled
//! - uncoupled
//! - grey
//! plot_distance: false
//! use_sem: true
//! time_limits: [-120.0, 480.0]
//! wing_limits: [-0.1, 0.6]
//! distance_limits: [20.0, 120.0]
//! ```
//!
//! Targets listed under `targets` (as `x`/`y` pairs) take precedence over the target table
//! and are written to it. Otherwise the table at `targets_path` (default
//! `outputs/targetlocations.csv`, relative to the data directory) is read.
//!
//! ## Input Formats
//!
//! ### Courtship score files
//!
//! Named `<genotype>_<lasergroup>_<repid>_<YYYYMMDD>_<HHMMSS>.csv`, with the columns
//!
//! ```csv
//! t,framenumber,x,y,as,zx,cv
//! ```
//!
//! where `framenumber`, `zx` and `cv` are optional. In these files `as` holds the laser: `a`
//! when it turns on, `s` when it turns off (a numeric value is also accepted). A numeric
//! `laser` column, when present, is used as the stimulus instead. The score columns are sparse:
//! only the rows where a behavior or the laser starts (`z`, `c`, `a`) or stops (`x`, `v`, `s`)
//! are annotated.
//!
//! ### Scored movies and recorded logs
//!
//! Score files are named `<condition>_<flynum>_<trialnum>_<YYYYMMDD>_<HHMMSS>.mp4.csv` with
//! the columns `framenumber,as,zx,cv`. Recorded logs are named `<YYYY-MM-DD-HH-MM-SS>.csv`
//! with the columns `t,framenumber,x,y,laser_power`.
//!
//! ### Arena manifests
//!
//! ```yml
//! coupled:
//! - log: 2014-01-01-12-00-00.csv
//!   label: first
//! grey:
//! - log: 2014-01-01-12-30-00.csv
//! ```
//!
//! Keys starting with an underscore are ignored. Log paths are relative to the manifest.
//!
//! ## Output
//!
//! ```text
//! <data directory>
//! |---- outputs/
//! |    |---- <genotype>_<lasergroup>_<repid>_<date>.csv - binned trial (courtship)
//! |    |---- targetlocations.csv - index, x, y
//! |---- snapshots/
//! |    |---- manifest.yml
//! |    |---- ...
//! |---- plots/
//! |    |---- <figure>.png
//! |    |---- <figure>.svg
//! ```
pub mod aggregate;
pub mod align;
pub mod binning;
pub mod combine;
pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod loader;
pub mod metadata;
pub mod plot;
pub mod process;
pub mod scores;
pub mod snapshot;
pub mod targets;
pub mod trial;
pub mod worker_status;
