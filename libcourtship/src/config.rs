use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::ConfigError;
use super::targets::Point;

/// Structure representing the analysis configuration. Contains the condition names, the
/// target coordinates, and the binning/plotting parameters.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml. Missing
/// fields take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exp_genotype: String,
    pub exp2_genotype: String,
    pub ctrl_genotype: String,
    pub exp_label: String,
    pub exp2_label: String,
    pub ctrl_label: String,
    pub genotype_synonyms: BTreeMap<String, String>,
    pub targets: Vec<Point>,
    pub targets_path: Option<PathBuf>,
    pub bin_width: f64,
    pub pre_stimulus_window: f64,
    pub n_threads: i32,
    pub max_log_time_diff: f64,
    pub area_radius: f64,
    pub time_in_area_horizon: f64,
    pub time_in_area_interval: f64,
    pub stay_duration: f64,
    pub experiments: Vec<String>,
    pub plot_distance: bool,
    pub use_sem: bool,
    pub time_limits: (f64, f64),
    pub wing_limits: (f64, f64),
    pub distance_limits: (f64, f64),
}

impl Default for Config {
    /// Generate a Config for the 10 minute courtship experiments
    fn default() -> Self {
        let mut genotype_synonyms = BTreeMap::new();
        genotype_synonyms.insert(String::from("csGP"), String::from(DEFAULT_EXP_GENOTYPE));
        Self {
            exp_genotype: String::from(DEFAULT_EXP_GENOTYPE),
            exp2_genotype: String::from(DEFAULT_EXP2_GENOTYPE),
            ctrl_genotype: String::from(DEFAULT_CTRL_GENOTYPE),
            exp_label: String::from("P1>TRPA1"),
            exp2_label: String::from("pIP10>TRPA1"),
            ctrl_label: String::from("Control"),
            genotype_synonyms,
            targets: vec![],
            targets_path: None,
            bin_width: DEFAULT_BIN_WIDTH,
            pre_stimulus_window: PRE_STIMULUS_WINDOW,
            n_threads: 1,
            max_log_time_diff: MAX_LOG_TIME_DIFF,
            area_radius: DEFAULT_AREA_RADIUS,
            time_in_area_horizon: DEFAULT_TIME_IN_AREA_HORIZON,
            time_in_area_interval: DEFAULT_TIME_IN_AREA_INTERVAL,
            stay_duration: DEFAULT_STAY_DURATION,
            experiments: DEFAULT_EXPERIMENTS.iter().map(|e| e.to_string()).collect(),
            plot_distance: false,
            use_sem: true,
            time_limits: (-120.0, 480.0),
            wing_limits: (-0.1, 0.6),
            distance_limits: (20.0, 120.0),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check the numeric parameters. Widths, intervals and the horizon must be finite and
    /// positive; windows, durations and distances must be finite and not negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::InvalidValue(format!(
                "n_threads must be at least 1, found {}",
                self.n_threads
            )));
        }
        for (name, value) in [
            ("bin_width", self.bin_width),
            ("time_in_area_horizon", self.time_in_area_horizon),
            ("time_in_area_interval", self.time_in_area_interval),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be positive and finite, found {value}"
                )));
            }
        }
        for (name, value) in [
            ("pre_stimulus_window", self.pre_stimulus_window),
            ("stay_duration", self.stay_duration),
            ("max_log_time_diff", self.max_log_time_diff),
            ("area_radius", self.area_radius),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be finite and not negative, found {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// Directory where per-trial outputs and the target table are written
    pub fn get_output_directory(&self, data_path: &Path) -> PathBuf {
        data_path.join(OUTPUT_DIR_NAME)
    }

    /// Directory holding the persisted condition snapshots
    pub fn get_snapshot_directory(&self, data_path: &Path) -> PathBuf {
        data_path.join(SNAPSHOT_DIR_NAME)
    }

    /// Directory where the rendered figures are written
    pub fn get_plot_directory(&self, data_path: &Path) -> PathBuf {
        data_path.join(PLOT_DIR_NAME)
    }

    /// Path of the target table, either configured or the default location in the outputs
    pub fn get_targets_path(&self, data_path: &Path) -> PathBuf {
        match &self.targets_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => data_path.join(p),
            None => self.get_output_directory(data_path).join(TARGETS_FILE_NAME),
        }
    }

    /// The (genotype, plot label) pairs in experimental, secondary, control order
    pub fn get_conditions(&self) -> [(&str, &str); 3] {
        [
            (&self.exp_genotype, &self.exp_label),
            (&self.exp2_genotype, &self.exp2_label),
            (&self.ctrl_genotype, &self.ctrl_label),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "exp_genotype: P1\nn_threads: 4\ntargets:\n  - x: 1.0\n    y: 2.0\n")
            .unwrap();
        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.exp_genotype, "P1");
        assert_eq!(config.n_threads, 4);
        assert_eq!(config.targets, vec![Point::new(1.0, 2.0)]);
        // untouched fields fall back to the defaults
        assert_eq!(config.ctrl_genotype, DEFAULT_CTRL_GENOTYPE);
        assert_eq!(config.bin_width, DEFAULT_BIN_WIDTH);
        assert_eq!(config.genotype_synonyms.get("csGP").unwrap(), "wGP");
    }

    #[test]
    fn test_invalid_threads_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "n_threads: 0\n").unwrap();
        assert!(matches!(
            Config::read_config_file(&path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        for line in [
            "time_in_area_horizon: .inf\n",
            "time_in_area_horizon: 0.0\n",
            "stay_duration: .nan\n",
            "pre_stimulus_window: -1.0\n",
            "bin_width: .inf\n",
        ] {
            std::fs::write(&path, line).unwrap();
            assert!(
                matches!(
                    Config::read_config_file(&path),
                    Err(ConfigError::InvalidValue(_))
                ),
                "{line} was accepted"
            );
        }
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_missing_config() {
        let path = Path::new("/definitely/not/here.yml");
        assert!(matches!(
            Config::read_config_file(path),
            Err(ConfigError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_targets_path_resolution() {
        let mut config = Config::default();
        let data = Path::new("/data/exp1");
        assert_eq!(
            config.get_targets_path(data),
            PathBuf::from("/data/exp1/outputs/targetlocations.csv")
        );
        config.targets_path = Some(PathBuf::from("targets.csv"));
        assert_eq!(
            config.get_targets_path(data),
            PathBuf::from("/data/exp1/targets.csv")
        );
    }
}
