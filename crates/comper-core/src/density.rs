//! Adaptive per-measure pattern selection based on chord density

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::feel::Style;
use crate::random::RandomSource;
use crate::rhythm::{PatternLibrary, RhythmPattern, SYNCOPATED, WHOLE_NOTE};

/// Share of sparse measures that sustain a whole note
pub const SPARSE_WHOLE_NOTE_PROBABILITY: f64 = 0.9;

const EPSILON: f64 = 1e-9;

/// Thresholds of the density policy table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityPolicy {
    /// Chord count at which a measure counts as dense
    pub dense_chord_count: usize,
    /// Longest chord (beats) a dense measure may contain
    pub dense_max_duration: f64,
    pub sparse_whole_note_probability: f64,
}

impl Default for DensityPolicy {
    fn default() -> Self {
        Self {
            dense_chord_count: 4,
            dense_max_duration: 1.0,
            sparse_whole_note_probability: SPARSE_WHOLE_NOTE_PROBABILITY,
        }
    }
}

/// Chooses the pattern governing each measure
#[derive(Debug, Clone)]
pub struct DensitySelector {
    library: Arc<PatternLibrary>,
    policy: DensityPolicy,
}

impl DensitySelector {
    pub fn new(library: Arc<PatternLibrary>, policy: DensityPolicy) -> Self {
        Self { library, policy }
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    pub fn policy(&self) -> &DensityPolicy {
        &self.policy
    }

    /// Pattern for a measure, or `None` to play each chord on its own start
    ///
    /// First match wins: dense measures get no pattern, two chords get the
    /// syncopated comp, a single bar-long chord usually sustains a whole
    /// note, and everything else takes `fallback`.
    pub fn select_pattern_for_density<R: RandomSource>(
        &self,
        style: Style,
        chords_in_measure: usize,
        chord_duration: f64,
        beats_per_measure: f64,
        fallback: Option<Arc<RhythmPattern>>,
        rng: &mut R,
    ) -> Option<Arc<RhythmPattern>> {
        let policy = &self.policy;

        if chords_in_measure >= policy.dense_chord_count
            && chord_duration <= policy.dense_max_duration + EPSILON
        {
            debug!(chords_in_measure, "Dense measure, playing chord starts only");
            return None;
        }

        let name = if chords_in_measure == 2 {
            SYNCOPATED
        } else if chords_in_measure == 1 && chord_duration >= beats_per_measure - EPSILON {
            if rng.next_f64() < policy.sparse_whole_note_probability {
                WHOLE_NOTE
            } else {
                SYNCOPATED
            }
        } else {
            return fallback;
        };

        match self.library.get(style, name) {
            Some(pattern) => Some(pattern),
            None => {
                warn!(style = style.id(), name, "Pattern missing from catalog, using fallback");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{seeded, SequenceSource};
    use crate::rhythm::{PatternLibrary, HALF_NOTE};

    fn selector() -> DensitySelector {
        DensitySelector::new(
            Arc::new(PatternLibrary::standard().unwrap()),
            DensityPolicy::default(),
        )
    }

    fn name(p: &Option<Arc<RhythmPattern>>) -> Option<&str> {
        p.as_ref().map(|p| p.name())
    }

    #[test]
    fn test_dense_measure_has_no_pattern() {
        let s = selector();
        let fallback = s.library().get(Style::Swing, HALF_NOTE);
        let mut rng = seeded(1);
        let picked = s.select_pattern_for_density(Style::Swing, 4, 1.0, 4.0, fallback, &mut rng);
        assert!(picked.is_none());
    }

    #[test]
    fn test_three_chords_fall_through() {
        let s = selector();
        let fallback = s.library().get(Style::Swing, HALF_NOTE);
        let mut rng = seeded(1);
        let picked = s.select_pattern_for_density(Style::Swing, 3, 1.0, 4.0, fallback.clone(), &mut rng);
        assert_eq!(name(&picked), Some(HALF_NOTE));
        let picked = s.select_pattern_for_density(Style::Swing, 3, 1.0, 4.0, None, &mut rng);
        assert!(picked.is_none());
    }

    #[test]
    fn test_two_chords_syncopate() {
        let s = selector();
        let mut rng = seeded(1);
        let picked = s.select_pattern_for_density(Style::Latin, 2, 2.0, 4.0, None, &mut rng);
        assert_eq!(name(&picked), Some(SYNCOPATED));
    }

    #[test]
    fn test_sparse_choice_is_pinned_by_source() {
        let s = selector();
        let mut rng = SequenceSource::new(vec![0.5, 0.95]);
        let first = s.select_pattern_for_density(Style::Swing, 1, 4.0, 4.0, None, &mut rng);
        let second = s.select_pattern_for_density(Style::Swing, 1, 4.0, 4.0, None, &mut rng);
        assert_eq!(name(&first), Some(WHOLE_NOTE));
        assert_eq!(name(&second), Some(SYNCOPATED));
    }

    #[test]
    fn test_sparse_split_is_ninety_ten() {
        let s = selector();
        let mut rng = seeded(2024);
        let trials = 10_000;
        let whole = (0..trials)
            .filter(|_| {
                let p = s.select_pattern_for_density(Style::Swing, 1, 4.0, 4.0, None, &mut rng);
                name(&p) == Some(WHOLE_NOTE)
            })
            .count();
        let share = whole as f64 / trials as f64;
        assert!((share - 0.9).abs() < 0.015, "whole note share {share}");
    }

    #[test]
    fn test_missing_pattern_uses_fallback() {
        let s = DensitySelector::new(Arc::new(PatternLibrary::default()), DensityPolicy::default());
        let mut rng = seeded(3);
        assert!(s.select_pattern_for_density(Style::Swing, 2, 2.0, 4.0, None, &mut rng).is_none());
    }
}
