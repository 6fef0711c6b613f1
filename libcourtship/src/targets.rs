use serde::{Deserialize, Serialize};
use std::path::Path;

use super::config::Config;
use super::error::TargetError;

/// A 2D coordinate in camera pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TargetRow {
    index: usize,
    x: f64,
    y: f64,
}

/// The fixed landmarks of one dataset. Never empty, and never modified once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSet {
    points: Vec<Point>,
}

impl TargetSet {
    pub fn new(points: Vec<Point>) -> Result<Self, TargetError> {
        if points.is_empty() {
            return Err(TargetError::Empty);
        }
        Ok(Self { points })
    }

    /// Read a target table with the columns `index,x,y`. Rows are ordered by index.
    pub fn read_csv(path: &Path) -> Result<Self, TargetError> {
        if !path.exists() {
            return Err(TargetError::BadFilePath(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = reader
            .deserialize::<TargetRow>()
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by_key(|r| r.index);
        Self::new(rows.into_iter().map(|r| Point::new(r.x, r.y)).collect())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TargetError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for (index, p) in self.points.iter().enumerate() {
            writer.serialize(TargetRow {
                index,
                x: p.x,
                y: p.y,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Targets listed in the config win over the target table. Configured targets are
    /// written to the table location so later runs see the same landmarks.
    pub fn from_config(config: &Config, data_path: &Path) -> Result<Self, TargetError> {
        let table_path = config.get_targets_path(data_path);
        if config.targets.is_empty() {
            log::info!("Reading targets from {}", table_path.to_string_lossy());
            Self::read_csv(&table_path)
        } else {
            let targets = Self::new(config.targets.clone())?;
            targets.write_csv(&table_path)?;
            log::info!(
                "Using {} configured targets, saved to {}",
                targets.len(),
                table_path.to_string_lossy()
            );
            Ok(targets)
        }
    }

    /// Distance from (x, y) to the closest target. NaN if the position is not finite.
    pub fn nearest_distance(&self, x: f64, y: f64) -> f64 {
        if !(x.is_finite() && y.is_finite()) {
            return f64::NAN;
        }
        self.points
            .iter()
            .map(|p| p.distance(x, y))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> TargetSet {
        TargetSet::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(0.0, 100.0),
            Point::new(100.0, 100.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert!(matches!(TargetSet::new(vec![]), Err(TargetError::Empty)));
    }

    #[test]
    fn test_nearest_is_minimum_of_all_distances() {
        let targets = square();
        for &(x, y) in &[(10.0, 20.0), (90.0, 5.0), (50.0, 50.0), (-30.0, 140.0), (0.0, 0.0)] {
            let brute = targets
                .points()
                .iter()
                .map(|p| ((p.x - x).powi(2) + (p.y - y).powi(2)).sqrt())
                .fold(f64::INFINITY, f64::min);
            let d = targets.nearest_distance(x, y);
            assert_eq!(d, brute);
            assert!(d >= 0.0);
        }
        assert_eq!(targets.nearest_distance(100.0, 100.0), 0.0);
    }

    #[test]
    fn test_missing_position_gives_nan() {
        assert!(square().nearest_distance(f64::NAN, 3.0).is_nan());
    }

    #[test]
    fn test_csv_round_trip_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs").join("targetlocations.csv");
        let targets = square();
        targets.write_csv(&path).unwrap();
        let loaded = TargetSet::read_csv(&path).unwrap();
        assert_eq!(loaded, targets);
    }

    #[test]
    fn test_config_targets_win() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.targets = vec![Point::new(5.0, 6.0)];
        let targets = TargetSet::from_config(&config, dir.path()).unwrap();
        assert_eq!(targets.points(), &[Point::new(5.0, 6.0)]);
        assert!(config.get_targets_path(dir.path()).exists());
    }
}
