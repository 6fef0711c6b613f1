use super::trial::{Feature, Trial};

/// Result of aligning a trial on its stimulus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    /// The timestep at zero_index now has time zero
    Aligned { zero_index: usize },
    /// No stimulus was found; the trial was shifted by the fallback rule and marked excluded
    Excluded,
}

fn is_active(value: f64) -> bool {
    value > 0.0
}

/// Shift the time axis so that the last timestep with an active stimulus is time zero
/// (stimulus off). Without any active timestep the trial is shifted so that its first sample
/// sits pre_stimulus_window seconds before zero, and it is marked excluded.
pub fn align_to_stimulus_offset(trial: &mut Trial, pre_stimulus_window: f64) -> Alignment {
    let last_active = trial.column(Feature::Stimulus).and_then(|stim| {
        stim.iter()
            .zip(trial.t.iter())
            .enumerate()
            .filter(|(_, (s, t))| is_active(**s) && t.is_finite())
            .map(|(idx, _)| idx)
            .last()
    });

    match last_active {
        Some(zero_index) => {
            let zero = trial.t[zero_index];
            trial.t.iter_mut().for_each(|t| *t -= zero);
            Alignment::Aligned { zero_index }
        }
        None => {
            let start = trial
                .t
                .iter()
                .copied()
                .filter(|t| t.is_finite())
                .fold(f64::INFINITY, f64::min);
            if start.is_finite() {
                trial
                    .t
                    .iter_mut()
                    .for_each(|t| *t = *t - start - pre_stimulus_window);
            }
            trial.excluded = true;
            Alignment::Excluded
        }
    }
}

/// Stimulus onset and offset found in a laser power trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusWindow {
    /// First timestep with positive power
    pub onset: usize,
    /// First timestep after onset where the power is back to zero, if the laser was turned off
    pub offset: Option<usize>,
}

/// Find the laser onset and offset of a recorded log
pub fn detect_stimulus_window(power: &[f64]) -> Option<StimulusWindow> {
    let onset = power.iter().position(|p| is_active(*p))?;
    let offset = power[onset..]
        .iter()
        .position(|p| *p == 0.0)
        .map(|idx| idx + onset);
    Some(StimulusWindow { onset, offset })
}

/// Shift the time axis so that the stimulus onset is time zero. Returns the offset time
/// relative to the onset, if there is one.
pub fn align_to_onset(trial: &mut Trial, window: &StimulusWindow) -> Option<f64> {
    let zero = trial.t[window.onset];
    trial.t.iter_mut().for_each(|t| *t -= zero);
    window.offset.map(|idx| trial.t[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrialMetadata;

    fn trial(times: &[f64], stimulus: &[f64]) -> Trial {
        let mut trial = Trial::new(TrialMetadata::default());
        for t in times {
            trial.push_row(*t, None, 0.0, 0.0);
        }
        trial
            .set_column(Feature::Stimulus, stimulus.to_vec())
            .unwrap();
        trial
    }

    #[test]
    fn test_align_to_last_active_timestep() {
        let mut t = trial(&[10.0, 11.0, 12.0, 13.0, 14.0], &[0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(
            align_to_stimulus_offset(&mut t, 120.0),
            Alignment::Aligned { zero_index: 2 }
        );
        assert_eq!(t.t, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(t.t.iter().filter(|v| **v == 0.0).count(), 1);
        assert!(!t.excluded);
    }

    #[test]
    fn test_intensity_counts_as_active() {
        let mut t = trial(&[0.0, 1.0, 2.0], &[0.0, 0.4, 0.0]);
        assert_eq!(
            align_to_stimulus_offset(&mut t, 120.0),
            Alignment::Aligned { zero_index: 1 }
        );
    }

    #[test]
    fn test_no_stimulus_excludes_trial() {
        let mut t = trial(&[5.0, 6.0, 7.0], &[0.0, 0.0, 0.0]);
        assert_eq!(align_to_stimulus_offset(&mut t, 120.0), Alignment::Excluded);
        assert!(t.excluded);
        assert_eq!(t.t, vec![-120.0, -119.0, -118.0]);
    }

    #[test]
    fn test_detect_window() {
        assert_eq!(
            detect_stimulus_window(&[0.0, 0.0, 2.5, 2.5, 0.0, 2.5]),
            Some(StimulusWindow {
                onset: 2,
                offset: Some(4)
            })
        );
        assert_eq!(
            detect_stimulus_window(&[0.0, 1.0, 1.0]),
            Some(StimulusWindow {
                onset: 1,
                offset: None
            })
        );
        assert_eq!(detect_stimulus_window(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_align_to_onset() {
        let mut t = trial(&[1.0, 2.0, 3.0, 4.0], &[0.0, 1.0, 1.0, 0.0]);
        let window = detect_stimulus_window(t.column(Feature::Stimulus).unwrap()).unwrap();
        let off = align_to_onset(&mut t, &window);
        assert_eq!(t.t, vec![-1.0, 0.0, 1.0, 2.0]);
        assert_eq!(off, Some(2.0));
    }
}
