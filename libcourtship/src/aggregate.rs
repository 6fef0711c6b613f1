use std::collections::BTreeMap;

use super::binning::{bin_index, BinnedSeries};
use super::error::AggregateError;
use super::trial::Feature;

/// Mean, sample standard deviation and count of the finite values in a set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl Summary {
    /// Summarise the finite values. The standard deviation uses n - 1 and is NaN for fewer
    /// than two values; the mean is NaN when there are none.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let count = finite.len();
        if count == 0 {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                count,
            };
        }
        let mean = finite.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };
        Self { mean, std, count }
    }

    /// Standard error of the mean
    pub fn sem(&self) -> f64 {
        self.std / (self.count as f64).sqrt()
    }
}

/// Per-bin statistics of one feature over the trials of a condition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureAggregate {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub count: Vec<usize>,
}

impl FeatureAggregate {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn push(&mut self, summary: Summary) {
        self.mean.push(summary.mean);
        self.std.push(summary.std);
        self.count.push(summary.count);
    }

    pub fn summary(&self, idx: usize) -> Summary {
        Summary {
            mean: self.mean[idx],
            std: self.std[idx],
            count: self.count[idx],
        }
    }
}

/// Statistics of every feature per time bin over all trials of one condition
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionAggregate {
    pub condition: String,
    pub stimulus_group: String,
    pub bin_width: f64,
    pub n_trials: usize,
    pub t: Vec<f64>,
    pub features: BTreeMap<Feature, FeatureAggregate>,
}

impl ConditionAggregate {
    pub fn feature(&self, feature: Feature) -> Option<&FeatureAggregate> {
        self.features.get(&feature)
    }
}

/// Aggregate the binned trials of one condition.
///
/// Every trial must share one stimulus group and one bin width; mixing them is an error
/// rather than something this function silently splits.
pub fn aggregate_condition(
    condition: &str,
    series: &[BinnedSeries],
) -> Result<ConditionAggregate, AggregateError> {
    let first = series
        .first()
        .ok_or_else(|| AggregateError::NoTrials(condition.to_string()))?;

    let mut groups: Vec<String> = series.iter().map(|s| s.meta.stimulus_group.clone()).collect();
    groups.sort();
    groups.dedup();
    if groups.len() != 1 {
        return Err(AggregateError::MultipleStimulusGroups(
            condition.to_string(),
            groups,
        ));
    }
    if let Some(other) = series.iter().find(|s| s.bin_width != first.bin_width) {
        return Err(AggregateError::MismatchedBinWidth(
            condition.to_string(),
            first.bin_width,
            other.bin_width,
        ));
    }

    let features: Vec<Feature> = {
        let mut f: Vec<Feature> = series
            .iter()
            .flat_map(|s| s.columns.keys().copied())
            .collect();
        f.sort();
        f.dedup();
        f
    };

    // bin -> feature -> values from every trial
    let mut bins: BTreeMap<i64, BTreeMap<Feature, Vec<f64>>> = BTreeMap::new();
    for s in series {
        for (row, time) in s.t.iter().enumerate() {
            let values = bins.entry(bin_index(*time, s.bin_width)).or_default();
            for (feature, column) in s.columns.iter() {
                values.entry(*feature).or_default().push(column[row]);
            }
        }
    }

    let mut aggregated: BTreeMap<Feature, FeatureAggregate> = BTreeMap::new();
    for values in bins.values() {
        for feature in features.iter() {
            let summary = Summary::from_values(values.get(feature).cloned().unwrap_or_default());
            aggregated.entry(*feature).or_default().push(summary);
        }
    }

    Ok(ConditionAggregate {
        condition: condition.to_string(),
        stimulus_group: groups.remove(0),
        bin_width: first.bin_width,
        n_trials: series.len(),
        t: bins.keys().map(|i| *i as f64 * first.bin_width).collect(),
        features: aggregated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrialMetadata;

    fn series(group: &str, t: &[f64], wing: &[f64]) -> BinnedSeries {
        let mut meta = TrialMetadata::default();
        meta.genotype = String::from("wGP");
        meta.stimulus_group = group.to_string();
        let mut columns = BTreeMap::new();
        columns.insert(Feature::Wing, wing.to_vec());
        BinnedSeries {
            meta,
            bin_width: 5.0,
            t: t.to_vec(),
            x: vec![0.0; t.len()],
            y: vec![0.0; t.len()],
            columns,
        }
    }

    #[test]
    fn test_summary() {
        let s = Summary::from_values([1.0, 2.0, 3.0, f64::NAN]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.std, 1.0);
        assert_eq!(s.count, 3);
        let empty = Summary::from_values([f64::NAN]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
    }

    #[test]
    fn test_single_trial_has_nan_std_and_count_one() {
        let agg =
            aggregate_condition("wGP", &[series("130", &[-5.0, 0.0, 5.0], &[0.1, 0.2, 0.3])])
                .unwrap();
        let wing = agg.feature(Feature::Wing).unwrap();
        assert_eq!(agg.t, vec![-5.0, 0.0, 5.0]);
        assert_eq!(wing.mean, vec![0.1, 0.2, 0.3]);
        assert!(wing.std.iter().all(|s| s.is_nan()));
        assert_eq!(wing.count, vec![1, 1, 1]);
    }

    #[test]
    fn test_aggregate_over_trials() {
        let agg = aggregate_condition(
            "wGP",
            &[
                series("130", &[0.0, 5.0], &[0.0, 1.0]),
                series("130", &[0.0, 10.0], &[1.0, 0.5]),
                series("130", &[0.0], &[f64::NAN]),
            ],
        )
        .unwrap();
        let wing = agg.feature(Feature::Wing).unwrap();
        assert_eq!(agg.t, vec![0.0, 5.0, 10.0]);
        assert_eq!(agg.n_trials, 3);
        assert_eq!(wing.mean, vec![0.5, 1.0, 0.5]);
        assert_eq!(wing.count, vec![2, 1, 1]);
        assert!((wing.std[0] - 0.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(agg.stimulus_group, "130");
    }

    #[test]
    fn test_mixed_stimulus_groups_rejected() {
        let result = aggregate_condition(
            "wGP",
            &[
                series("130", &[0.0], &[0.0]),
                series("200", &[0.0], &[0.0]),
            ],
        );
        assert!(matches!(
            result,
            Err(AggregateError::MultipleStimulusGroups(_, g)) if g == vec!["130", "200"]
        ));
    }

    #[test]
    fn test_no_trials_rejected() {
        assert!(matches!(
            aggregate_condition("wGP", &[]),
            Err(AggregateError::NoTrials(_))
        ));
    }
}
