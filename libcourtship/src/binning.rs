use std::collections::BTreeMap;

use super::metadata::{GenotypeSynonyms, TrialMetadata};
use super::trial::{Feature, Trial};

/// A trial resampled onto a uniform time grid. Row i is bin `t[i]`, covering
/// `[t[i], t[i] + bin_width)`. Rows are time ascending and only populated bins are present.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSeries {
    pub meta: TrialMetadata,
    pub bin_width: f64,
    pub t: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub columns: BTreeMap<Feature, Vec<f64>>,
}

/// Index of the bin containing t. Bins are anchored at zero, so bin k is [k*w, (k+1)*w).
pub fn bin_index(t: f64, bin_width: f64) -> i64 {
    (t / bin_width).floor() as i64
}

/// Running NaN-skipping mean
#[derive(Debug, Clone, Copy, Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Average every column per bin. Rows with a non-finite time are dropped.
/// Returns the populated bin indices in ascending order and one averaged vector per column.
fn bin_columns(t: &[f64], columns: &[&[f64]], bin_width: f64) -> (Vec<i64>, Vec<Vec<f64>>) {
    let mut bins: BTreeMap<i64, Vec<MeanAccumulator>> = BTreeMap::new();
    for (row, time) in t.iter().enumerate() {
        if !time.is_finite() {
            continue;
        }
        let accumulators = bins
            .entry(bin_index(*time, bin_width))
            .or_insert_with(|| vec![MeanAccumulator::default(); columns.len()]);
        for (acc, column) in accumulators.iter_mut().zip(columns.iter()) {
            acc.push(column[row]);
        }
    }

    let indices: Vec<i64> = bins.keys().copied().collect();
    let averaged = (0..columns.len())
        .map(|col| bins.values().map(|accs| accs[col].mean()).collect())
        .collect();
    (indices, averaged)
}

fn clamp_stimulus(columns: &mut BTreeMap<Feature, Vec<f64>>) {
    if let Some(stimulus) = columns.get_mut(&Feature::Stimulus) {
        stimulus
            .iter_mut()
            .filter(|v| **v > 0.0)
            .for_each(|v| *v = 1.0);
    }
}

fn resample(
    meta: TrialMetadata,
    t: &[f64],
    x: &[f64],
    y: &[f64],
    columns: &BTreeMap<Feature, Vec<f64>>,
    bin_width: f64,
) -> BinnedSeries {
    let features: Vec<Feature> = columns.keys().copied().collect();
    let mut inputs: Vec<&[f64]> = vec![x, y];
    inputs.extend(columns.values().map(|c| c.as_slice()));

    let (indices, mut averaged) = bin_columns(t, &inputs, bin_width);
    let feature_columns: Vec<Vec<f64>> = averaged.split_off(2);
    let mut binned_columns: BTreeMap<Feature, Vec<f64>> =
        features.into_iter().zip(feature_columns).collect();
    clamp_stimulus(&mut binned_columns);

    let mut averaged = averaged.into_iter();
    BinnedSeries {
        meta,
        bin_width,
        t: indices.iter().map(|i| *i as f64 * bin_width).collect(),
        x: averaged.next().unwrap_or_default(),
        y: averaged.next().unwrap_or_default(),
        columns: binned_columns,
    }
}

/// Resample an aligned trial onto bins of bin_width seconds. The stimulus column is clamped
/// to a presence flag and the genotype label is rewritten through the synonym table.
pub fn bin_trial(trial: &Trial, bin_width: f64, synonyms: &GenotypeSynonyms) -> BinnedSeries {
    let mut meta = trial.meta.clone();
    meta.genotype = synonyms.canonical(&meta.genotype).to_string();
    resample(
        meta,
        &trial.t,
        &trial.x,
        &trial.y,
        &trial.columns,
        bin_width,
    )
}

impl BinnedSeries {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn column(&self, feature: Feature) -> Option<&[f64]> {
        self.columns.get(&feature).map(|c| c.as_slice())
    }

    /// Resample this series again onto bins of bin_width
    pub fn rebin(&self, bin_width: f64) -> BinnedSeries {
        resample(
            self.meta.clone(),
            &self.t,
            &self.x,
            &self.y,
            &self.columns,
            bin_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_from(times: &[f64], stimulus: &[f64], wing: &[f64]) -> Trial {
        let mut meta = TrialMetadata::default();
        meta.genotype = String::from("csGP");
        meta.stimulus_group = String::from("130");
        meta.replicate = String::from("1");
        let mut trial = Trial::new(meta);
        for (i, t) in times.iter().enumerate() {
            trial.push_row(*t, Some(i as u64), i as f64, 0.0);
        }
        trial
            .set_column(Feature::Stimulus, stimulus.to_vec())
            .unwrap();
        trial.set_column(Feature::Wing, wing.to_vec()).unwrap();
        trial
    }

    fn synonyms() -> GenotypeSynonyms {
        let mut table = BTreeMap::new();
        table.insert(String::from("csGP"), String::from("wGP"));
        GenotypeSynonyms::new(table)
    }

    #[test]
    fn test_bin_index_is_a_half_open_partition() {
        assert_eq!(bin_index(0.0, 5.0), 0);
        assert_eq!(bin_index(4.999, 5.0), 0);
        assert_eq!(bin_index(5.0, 5.0), 1);
        assert_eq!(bin_index(-0.001, 5.0), -1);
        assert_eq!(bin_index(-5.0, 5.0), -1);
        assert_eq!(bin_index(-5.001, 5.0), -2);
    }

    #[test]
    fn test_bin_trial_means_and_labels() {
        let trial = trial_from(
            &[-6.0, -4.0, -1.0, 0.0, 2.0, 7.0, f64::NAN],
            &[0.0, 0.0, 0.0, 255.0, 0.0, 0.0, 1.0],
            &[1.0, 0.0, 1.0, 1.0, 0.0, f64::NAN, 1.0],
        );
        let binned = bin_trial(&trial, 5.0, &synonyms());
        assert_eq!(binned.t, vec![-10.0, -5.0, 0.0, 5.0]);
        assert_eq!(binned.column(Feature::Wing).unwrap()[1], 0.5);
        assert_eq!(binned.column(Feature::Wing).unwrap()[2], 0.5);
        assert!(binned.column(Feature::Wing).unwrap()[3].is_nan());
        assert_eq!(binned.x, vec![0.0, 1.5, 3.5, 5.0]);
        // raw intensity collapses to a presence flag
        assert_eq!(
            binned.column(Feature::Stimulus).unwrap(),
            &[0.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(binned.meta.genotype, "wGP");
        assert_eq!(binned.meta.stimulus_group, "130");
    }

    #[test]
    fn test_rebinning_is_idempotent() {
        let times: Vec<f64> = (0..200).map(|i| i as f64 * 0.37 - 30.0).collect();
        let stim: Vec<f64> = times.iter().map(|t| if *t < 0.0 { 3.0 } else { 0.0 }).collect();
        let wing: Vec<f64> = times.iter().map(|t| (t * 0.1).sin().abs()).collect();
        let trial = trial_from(&times, &stim, &wing);
        let binned = bin_trial(&trial, 5.0, &synonyms());
        let again = binned.rebin(5.0);
        assert_eq!(again.t, binned.t);
        assert_eq!(again.columns, binned.columns);

        // a coarser width that 5 divides keeps the coarse boundaries of a direct binning
        let direct = bin_trial(&trial, 10.0, &synonyms());
        assert_eq!(binned.rebin(10.0).t, direct.t);
    }

    #[test]
    fn test_stimulus_is_binary_after_binning() {
        // three trials, stimulus on during [0, 10) at varying intensity
        for intensity in [0.5, 1.0, 200.0] {
            let times: Vec<f64> = (0..40).map(|i| i as f64 * 0.5 - 5.0).collect();
            let stim: Vec<f64> = times
                .iter()
                .map(|t| if (0.0..10.0).contains(t) { intensity } else { 0.0 })
                .collect();
            let wing = vec![0.0; times.len()];
            let binned = bin_trial(&trial_from(&times, &stim, &wing), 5.0, &synonyms());
            assert!(binned
                .column(Feature::Stimulus)
                .unwrap()
                .iter()
                .all(|v| *v == 0.0 || *v == 1.0));
        }
    }
}
