// Defaults for the courtship experiments. Most of these can be overridden in the Config.

/// Width of a time bin in seconds
pub const DEFAULT_BIN_WIDTH: f64 = 5.0;
/// Shift applied to trials with no detectable stimulus (seconds before the first sample)
pub const PRE_STIMULUS_WINDOW: f64 = 120.0;
/// Largest allowed difference between a score file datetime and a recorded log datetime (seconds)
pub const MAX_LOG_TIME_DIFF: f64 = 10.0;

pub const DEFAULT_EXP_GENOTYPE: &str = "wGP";
pub const DEFAULT_EXP2_GENOTYPE: &str = "40347";
pub const DEFAULT_CTRL_GENOTYPE: &str = "uasstoptrpmyc";

/// Stimulus group given to trials whose file names do not carry one
pub const DEFAULT_STIMULUS_GROUP: &str = "laser";

// Arena experiment defaults
pub const DEFAULT_AREA_RADIUS: f64 = 30.0;
pub const DEFAULT_TIME_IN_AREA_HORIZON: f64 = 300.0;
pub const DEFAULT_TIME_IN_AREA_INTERVAL: f64 = 30.0;
pub const DEFAULT_STAY_DURATION: f64 = 20.0;
pub const DEFAULT_EXPERIMENTS: [&str; 3] = ["coupled", "uncoupled", "grey"];

// Directory layout
pub const OUTPUT_DIR_NAME: &str = "outputs";
pub const SNAPSHOT_DIR_NAME: &str = "snapshots";
pub const PLOT_DIR_NAME: &str = "plots";
pub const TARGETS_FILE_NAME: &str = "targetlocations.csv";
pub const SCORE_DIR_NAME: &str = "csvs";
pub const LOG_DIR_NAME: &str = "logs";
pub const MANIFEST_FILE_NAME: &str = "manifest.yml";

/// This is the version of the snapshot format
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0";

// Output column names for the trial labels
pub const GENOTYPE_COLUMN: &str = "Genotype";
pub const STIMULUS_GROUP_COLUMN: &str = "lasergroup";
pub const REPLICATE_COLUMN: &str = "RepID";

/// Most panels drawn in a single per-condition figure
pub const MAX_CONDITION_PANELS: usize = 9;
/// Most trajectories drawn in a single experiment figure
pub const MAX_TRAJECTORY_PANELS: usize = 16;

pub const PLOT_WIDTH: u32 = 1200;
pub const PLOT_HEIGHT: u32 = 800;
