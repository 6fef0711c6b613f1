use super::error::TrialError;
use super::targets::TargetSet;
use super::trial::{Feature, Trial};

/// Add the distance from the tracked position to the nearest target at every timestep
pub fn add_distance_to_target(trial: &mut Trial, targets: &TargetSet) -> Result<(), TrialError> {
    let distances = trial
        .x
        .iter()
        .zip(trial.y.iter())
        .map(|(x, y)| targets.nearest_distance(*x, *y))
        .collect();
    trial.set_column(Feature::DistanceToTarget, distances)
}

/// Flag the timesteps where the fly is within radius of a target. Untracked timesteps are
/// not in the area.
pub fn add_in_area(trial: &mut Trial, targets: &TargetSet, radius: f64) -> Result<(), TrialError> {
    if trial.column(Feature::DistanceToTarget).is_none() {
        add_distance_to_target(trial, targets)?;
    }
    let in_area = trial
        .column(Feature::DistanceToTarget)
        .unwrap_or_default()
        .iter()
        .map(|d| if *d <= radius { 1.0 } else { 0.0 })
        .collect();
    trial.set_column(Feature::InArea, in_area)
}

/// Percentage of time spent in the area per interval, measured from the first sample
#[derive(Debug, Clone, PartialEq)]
pub struct TimeInArea {
    /// Start of each interval, seconds from the start of the trial
    pub offsets: Vec<f64>,
    /// Percent of samples in the area per interval, NaN for intervals without samples
    pub percent: Vec<f64>,
    /// Percent of samples in the area over the whole horizon
    pub total: f64,
}

pub fn time_in_area(trial: &Trial, horizon: f64, interval: f64) -> TimeInArea {
    let n_intervals = if horizon.is_finite() && interval.is_finite() && interval > 0.0 {
        (horizon / interval).ceil().max(0.0) as usize
    } else {
        0
    };
    let mut inside = vec![0usize; n_intervals];
    let mut samples = vec![0usize; n_intervals];
    let in_area = trial.column(Feature::InArea).unwrap_or_default();
    let start = trial.t.iter().copied().find(|t| t.is_finite());

    if let Some(start) = start {
        for (t, flag) in trial.t.iter().zip(in_area.iter()) {
            let rel = t - start;
            if !rel.is_finite() || rel < 0.0 || rel >= horizon {
                continue;
            }
            let idx = (rel / interval).floor() as usize;
            if idx >= n_intervals {
                continue;
            }
            samples[idx] += 1;
            if *flag > 0.0 {
                inside[idx] += 1;
            }
        }
    }

    let percent_of = |inside: usize, samples: usize| {
        if samples == 0 {
            f64::NAN
        } else {
            100.0 * inside as f64 / samples as f64
        }
    };
    TimeInArea {
        offsets: (0..n_intervals).map(|i| i as f64 * interval).collect(),
        percent: inside
            .iter()
            .zip(samples.iter())
            .map(|(i, s)| percent_of(*i, *s))
            .collect(),
        total: percent_of(inside.iter().sum(), samples.iter().sum()),
    }
}

/// Latencies (seconds from the first sample) of every visit to the area lasting at least
/// stay seconds. The first entry is the latency to the first qualifying contact.
pub fn latency_to_stay(trial: &Trial, stay: f64) -> Vec<f64> {
    let in_area = trial.column(Feature::InArea).unwrap_or_default();
    let start = match trial.t.iter().copied().find(|t| t.is_finite()) {
        Some(s) => s,
        None => return vec![],
    };

    let mut latencies = Vec::new();
    let mut bout_start: Option<f64> = None;
    let mut bout_end = 0.0;
    let mut close_bout = |bout_start: Option<f64>, bout_end: f64| {
        if let Some(b) = bout_start {
            if bout_end - b >= stay {
                latencies.push(b - start);
            }
        }
    };
    for (t, flag) in trial.t.iter().zip(in_area.iter()) {
        if !t.is_finite() {
            continue;
        }
        if *flag > 0.0 {
            if bout_start.is_none() {
                bout_start = Some(*t);
            }
            bout_end = *t;
        } else {
            close_bout(bout_start, bout_end);
            bout_start = None;
        }
    }
    close_bout(bout_start, bout_end);
    latencies
}
