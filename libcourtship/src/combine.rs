use std::collections::BTreeMap;

use super::aggregate::ConditionAggregate;
use super::binning::{bin_index, BinnedSeries};
use super::error::CombineError;
use super::trial::Feature;

/// The three conditions compared in one figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionRole {
    Experimental,
    SecondaryExperimental,
    Control,
}

impl ConditionRole {
    pub const ALL: [ConditionRole; 3] = [
        ConditionRole::Experimental,
        ConditionRole::SecondaryExperimental,
        ConditionRole::Control,
    ];

    /// Prefix of the snapshot files of this role
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Experimental => "exp",
            Self::SecondaryExperimental => "exp2",
            Self::Control => "ctrl",
        }
    }

    pub fn from_file_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.file_prefix() == prefix)
    }
}

/// Everything known about one condition: its binned trials and their aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionData {
    pub role: ConditionRole,
    pub label: String,
    pub trials: Vec<BinnedSeries>,
    pub aggregate: ConditionAggregate,
}

/// One line of a comparison plot: mean, spread and sample count on the shared time axis
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub label: String,
    pub xaxis: Vec<f64>,
    pub value: Vec<f64>,
    pub std: Vec<f64>,
    pub n: Vec<usize>,
}

/// Three conditions on a common time axis, ready to plot
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub t: Vec<f64>,
    pub bin_width: f64,
    pub stimulus_group: String,
    conditions: Vec<ConditionData>,
}

/// Combine the experimental, secondary experimental and control conditions. The conditions
/// must share a stimulus group and a bin width.
pub fn combine(
    exp: ConditionData,
    exp2: ConditionData,
    ctrl: ConditionData,
) -> Result<Comparison, CombineError> {
    let conditions = vec![exp, exp2, ctrl];

    let mut groups: Vec<String> = conditions
        .iter()
        .map(|c| c.aggregate.stimulus_group.clone())
        .collect();
    groups.dedup();
    if groups.len() != 1 {
        return Err(CombineError::MismatchedStimulusGroups(
            conditions
                .iter()
                .map(|c| c.aggregate.stimulus_group.clone())
                .collect(),
        ));
    }

    let widths: Vec<f64> = conditions.iter().map(|c| c.aggregate.bin_width).collect();
    if widths.iter().any(|w| *w != widths[0]) {
        return Err(CombineError::MismatchedBinWidths(widths));
    }
    let bin_width = widths[0];

    let mut bins: Vec<i64> = conditions
        .iter()
        .flat_map(|c| c.aggregate.t.iter().map(|t| bin_index(*t, bin_width)))
        .collect();
    bins.sort();
    bins.dedup();

    Ok(Comparison {
        t: bins.iter().map(|b| *b as f64 * bin_width).collect(),
        bin_width,
        stimulus_group: groups.remove(0),
        conditions,
    })
}

impl Comparison {
    pub fn conditions(&self) -> &[ConditionData] {
        &self.conditions
    }

    pub fn condition(&self, role: ConditionRole) -> Option<&ConditionData> {
        self.conditions.iter().find(|c| c.role == role)
    }

    /// The statistics of one feature of one condition, on the shared time axis. Bins where
    /// the condition has no data are NaN with a count of zero.
    pub fn series(&self, role: ConditionRole, feature: Feature) -> Option<PlotSeries> {
        let condition = self.condition(role)?;
        let aggregate = condition.aggregate.feature(feature)?;
        let lookup: BTreeMap<i64, usize> = condition
            .aggregate
            .t
            .iter()
            .enumerate()
            .map(|(row, t)| (bin_index(*t, self.bin_width), row))
            .collect();

        let mut series = PlotSeries {
            label: condition.label.clone(),
            xaxis: self.t.clone(),
            value: Vec::with_capacity(self.t.len()),
            std: Vec::with_capacity(self.t.len()),
            n: Vec::with_capacity(self.t.len()),
        };
        for t in self.t.iter() {
            match lookup.get(&bin_index(*t, self.bin_width)) {
                Some(row) => {
                    series.value.push(aggregate.mean[*row]);
                    series.std.push(aggregate.std[*row]);
                    series.n.push(aggregate.count[*row]);
                }
                None => {
                    series.value.push(f64::NAN);
                    series.std.push(f64::NAN);
                    series.n.push(0);
                }
            }
        }
        Some(series)
    }

    /// Time spans where the control condition had the stimulus on
    pub fn stimulus_spans(&self) -> Vec<(f64, f64)> {
        match self.series(ConditionRole::Control, Feature::Stimulus) {
            Some(s) => active_spans(&s.xaxis, &s.value, self.bin_width),
            None => vec![],
        }
    }
}

/// Merge consecutive bins with a positive value into [start, end) spans
pub fn active_spans(t: &[f64], values: &[f64], bin_width: f64) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = Vec::new();
    for (time, value) in t.iter().zip(values.iter()) {
        if !(*value > 0.0) {
            continue;
        }
        match spans.last_mut() {
            Some((_, end)) if (*end - *time).abs() < bin_width * 1e-6 => *end = time + bin_width,
            _ => spans.push((*time, time + bin_width)),
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_condition;
    use crate::metadata::TrialMetadata;

    fn condition(role: ConditionRole, group: &str, t: &[f64], stim: &[f64]) -> ConditionData {
        let mut meta = TrialMetadata::default();
        meta.genotype = role.file_prefix().to_string();
        meta.stimulus_group = group.to_string();
        let mut columns = BTreeMap::new();
        columns.insert(Feature::Stimulus, stim.to_vec());
        columns.insert(Feature::Wing, vec![0.5; t.len()]);
        let trials = vec![BinnedSeries {
            meta,
            bin_width: 5.0,
            t: t.to_vec(),
            x: vec![0.0; t.len()],
            y: vec![0.0; t.len()],
            columns,
        }];
        let aggregate = aggregate_condition(role.file_prefix(), &trials).unwrap();
        ConditionData {
            role,
            label: role.file_prefix().to_uppercase(),
            trials,
            aggregate,
        }
    }

    #[test]
    fn test_combine_aligns_time_axes() {
        let comparison = combine(
            condition(ConditionRole::Experimental, "130", &[0.0, 5.0], &[1.0, 0.0]),
            condition(ConditionRole::SecondaryExperimental, "130", &[5.0, 10.0], &[0.0, 0.0]),
            condition(ConditionRole::Control, "130", &[-5.0, 0.0, 5.0], &[1.0, 1.0, 0.0]),
        )
        .unwrap();
        assert_eq!(comparison.t, vec![-5.0, 0.0, 5.0, 10.0]);

        let exp = comparison
            .series(ConditionRole::Experimental, Feature::Wing)
            .unwrap();
        assert_eq!(exp.label, "EXP");
        assert!(exp.value[0].is_nan());
        assert_eq!(&exp.value[1..3], &[0.5, 0.5]);
        assert_eq!(exp.n, vec![0, 1, 1, 0]);

        assert_eq!(comparison.stimulus_spans(), vec![(-5.0, 5.0)]);
    }

    #[test]
    fn test_combine_rejects_differing_stimulus_groups() {
        let result = combine(
            condition(ConditionRole::Experimental, "130", &[0.0], &[1.0]),
            condition(ConditionRole::SecondaryExperimental, "200", &[0.0], &[1.0]),
            condition(ConditionRole::Control, "130", &[0.0], &[1.0]),
        );
        assert!(matches!(
            result,
            Err(CombineError::MismatchedStimulusGroups(_))
        ));
    }

    #[test]
    fn test_active_spans() {
        assert_eq!(
            active_spans(
                &[0.0, 5.0, 10.0, 15.0, 20.0],
                &[1.0, 1.0, 0.0, 1.0, f64::NAN],
                5.0
            ),
            vec![(0.0, 10.0), (15.0, 20.0)]
        );
    }
}
