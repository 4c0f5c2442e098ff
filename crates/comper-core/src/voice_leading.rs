//! Voice-leading optimizer
//!
//! Picks one voicing per chord event so the summed transition cost over the
//! whole progression, including the wrap from the last chord back to the
//! first, is as small as the dynamic program can make it. The DP table is a
//! flat arena indexed by `offset[step] + candidate`, with predecessor and
//! path-origin indices stored beside it so backtracking needs no links.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chord::{Chord, ChordEvent};
use crate::voicing::{Voicing, VoicingGenerator};

/// Spread deviation (semitones) tolerated before normalization nudges a voicing
pub const SPREAD_TOLERANCE: u8 = 14;

/// Signed weights of the transition cost terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceLeadingWeights {
    /// Reward when a 7th falls a semitone into the next chord's 3rd
    pub seventh_resolution: f64,
    /// Reward per retained common tone
    pub common_tone: f64,
    /// Reward per voice moving by half or whole step
    pub stepwise: f64,
    /// Penalty per semitone of the largest leap
    pub leap: f64,
    /// Penalty per parallel octave or perfect fifth
    pub parallel: f64,
    /// Penalty per crossed voice pair
    pub crossing: f64,
    /// Penalty per cluster in the destination voicing
    pub cluster: f64,
    /// Penalty per semitone of spread change
    pub spread_change: f64,
}

impl Default for VoiceLeadingWeights {
    fn default() -> Self {
        Self {
            seventh_resolution: -8.0,
            common_tone: -2.0,
            stepwise: -1.0,
            leap: 0.5,
            parallel: 3.0,
            crossing: 2.0,
            cluster: 1.5,
            spread_change: 0.15,
        }
    }
}

/// Voice pairs between two voicings, ordered by source pitch
///
/// Left hands pair from the bottom, right hands from the top so the melody
/// voice always tracks the melody voice.
fn pair_voices(a: &Voicing, b: &Voicing) -> Vec<(u8, u8)> {
    let mut pairs: Vec<(u8, u8)> = a
        .left()
        .iter()
        .zip(b.left().iter())
        .map(|(&x, &y)| (x, y))
        .collect();
    pairs.extend(
        a.right()
            .iter()
            .rev()
            .zip(b.right().iter().rev())
            .map(|(&x, &y)| (x, y)),
    );
    pairs.sort_by_key(|&(x, _)| x);
    pairs
}

/// Cost of moving from voicing `a` over `from` to voicing `b` over `to`
pub fn transition_cost(
    weights: &VoiceLeadingWeights,
    a: &Voicing,
    from: &Chord,
    b: &Voicing,
    to: &Chord,
) -> f64 {
    let mut cost = 0.0;

    if let Some(seventh) = from.seventh_pitch_class() {
        let target = to.third_pitch_class();
        let resolutions = a
            .notes()
            .iter()
            .filter(|&&n| n % 12 == seventh && n > 0)
            .filter(|&&n| (n - 1) % 12 == target && b.notes().contains(&(n - 1)))
            .count();
        cost += weights.seventh_resolution * resolutions as f64;
    }

    let common = a.notes().iter().filter(|n| b.notes().contains(n)).count();
    cost += weights.common_tone * common as f64;

    let pairs = pair_voices(a, b);
    let mut largest_leap = 0i16;
    for &(x, y) in &pairs {
        let motion = (y as i16 - x as i16).abs();
        if matches!(motion, 1 | 2) {
            cost += weights.stepwise;
        }
        largest_leap = largest_leap.max(motion);
    }
    cost += weights.leap * largest_leap as f64;

    for (i, &(x1, y1)) in pairs.iter().enumerate() {
        for &(x2, y2) in &pairs[i + 1..] {
            let m1 = y1 as i16 - x1 as i16;
            let m2 = y2 as i16 - x2 as i16;
            let before = (x2 as i16 - x1 as i16).abs();
            let after = (y2 as i16 - y1 as i16).abs();
            if m1 != 0 && m1.signum() == m2.signum() && before > 0 && after > 0 {
                let octaves = before % 12 == 0 && after % 12 == 0;
                let fifths = before % 12 == 7 && after % 12 == 7;
                if octaves || fifths {
                    cost += weights.parallel;
                }
            }
            if (x1 < x2 && y1 > y2) || (x1 > x2 && y1 < y2) {
                cost += weights.crossing;
            }
        }
    }

    cost += weights.cluster * b.cluster_count() as f64;
    cost += weights.spread_change * (a.spread() as f64 - b.spread() as f64).abs();

    cost
}

/// Result of the dynamic program over candidate indices
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Chosen candidate index per step
    pub choices: Vec<usize>,
    /// Path cost plus loop closure of the chosen path
    pub total_cost: f64,
    /// Path cost plus loop closure for every final-step candidate
    pub terminal_costs: Vec<f64>,
}

/// Global voice-leading optimizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceLeadingOptimizer {
    pub generator: VoicingGenerator,
    pub weights: VoiceLeadingWeights,
}

impl VoiceLeadingOptimizer {
    pub fn new(weights: VoiceLeadingWeights) -> Self {
        Self {
            generator: VoicingGenerator::default(),
            weights,
        }
    }

    pub fn cost(&self, a: &Voicing, from: &Chord, b: &Voicing, to: &Chord) -> f64 {
        transition_cost(&self.weights, a, from, b, to)
    }

    /// One voicing per chord event, in input order
    pub fn optimize_progression(&self, events: &[ChordEvent]) -> Vec<Voicing> {
        if events.is_empty() {
            return Vec::new();
        }
        let chords: Vec<&Chord> = events.iter().map(|e| &e.chord).collect();
        let candidates: Vec<Vec<Voicing>> = chords
            .iter()
            .map(|c| self.generator.generate_all_variants(c))
            .collect();

        let solution = self.solve(&chords, &candidates);
        debug!(
            chords = chords.len(),
            candidates = candidates.iter().map(Vec::len).sum::<usize>(),
            total_cost = solution.total_cost,
            "Voice leading optimized"
        );

        let chosen: Vec<Voicing> = solution
            .choices
            .iter()
            .zip(&candidates)
            .map(|(&k, cands)| cands[k].clone())
            .collect();
        normalize_spread(chosen, &candidates, SPREAD_TOLERANCE)
    }

    /// Dynamic program over explicit candidate sets
    ///
    /// Panics if any step has no candidates; the generator guarantees at
    /// least a fallback voicing for every chord.
    pub fn solve(&self, chords: &[&Chord], candidates: &[Vec<Voicing>]) -> Solution {
        assert_eq!(chords.len(), candidates.len(), "one candidate set per chord");
        if chords.is_empty() {
            return Solution {
                choices: Vec::new(),
                total_cost: 0.0,
                terminal_costs: Vec::new(),
            };
        }
        for (i, set) in candidates.iter().enumerate() {
            assert!(!set.is_empty(), "voicing candidate set exhausted at step {i}");
        }

        let mut offsets = Vec::with_capacity(candidates.len());
        let mut total = 0usize;
        for set in candidates {
            offsets.push(total);
            total += set.len();
        }

        let mut dp = vec![f64::INFINITY; total];
        let mut back = vec![0usize; total];
        let mut origin = vec![0usize; total];

        for k in 0..candidates[0].len() {
            dp[k] = 0.0;
            origin[k] = k;
        }

        for i in 1..candidates.len() {
            let (prev_off, off) = (offsets[i - 1], offsets[i]);
            for (k, to) in candidates[i].iter().enumerate() {
                let mut best = f64::INFINITY;
                let mut best_j = 0;
                for (j, from) in candidates[i - 1].iter().enumerate() {
                    let c = dp[prev_off + j] + self.cost(from, chords[i - 1], to, chords[i]);
                    if c < best {
                        best = c;
                        best_j = j;
                    }
                }
                dp[off + k] = best;
                back[off + k] = best_j;
                origin[off + k] = origin[prev_off + best_j];
            }
        }

        let last = candidates.len() - 1;
        let last_off = offsets[last];
        let first_chord = chords[0];
        let last_chord = chords[last];
        let terminal_costs: Vec<f64> = candidates[last]
            .iter()
            .enumerate()
            .map(|(k, v)| {
                let start = &candidates[0][origin[last_off + k]];
                dp[last_off + k] + self.cost(v, last_chord, start, first_chord)
            })
            .collect();

        let mut best_k = 0;
        for (k, &c) in terminal_costs.iter().enumerate() {
            if c < terminal_costs[best_k] {
                best_k = k;
            }
        }

        let mut choices = vec![0usize; candidates.len()];
        choices[last] = best_k;
        for i in (1..candidates.len()).rev() {
            choices[i - 1] = back[offsets[i] + choices[i]];
        }

        Solution {
            choices,
            total_cost: terminal_costs[best_k],
            terminal_costs,
        }
    }

    /// Summed transition cost of a voicing path, including the loop back
    pub fn progression_cost(&self, chords: &[&Chord], voicings: &[Voicing]) -> f64 {
        let n = chords.len().min(voicings.len());
        if n == 0 {
            return 0.0;
        }
        let path: f64 = (1..n)
            .map(|i| self.cost(&voicings[i - 1], chords[i - 1], &voicings[i], chords[i]))
            .sum();
        path + self.cost(&voicings[n - 1], chords[n - 1], &voicings[0], chords[0])
    }
}

/// Nudge outlier spreads toward the progression median
///
/// Candidates from the same step with the same pitch classes are preferred;
/// otherwise the top or bottom note is moved by an octave. Every replacement
/// stays on the keyboard.
pub fn normalize_spread(
    mut voicings: Vec<Voicing>,
    candidates: &[Vec<Voicing>],
    tolerance: u8,
) -> Vec<Voicing> {
    if voicings.len() < 2 {
        return voicings;
    }
    let mut spreads: Vec<u8> = voicings.iter().map(Voicing::spread).collect();
    spreads.sort_unstable();
    let target = spreads[(spreads.len() - 1) / 2] as i16;
    let distance = |v: &Voicing| (v.spread() as i16 - target).abs();

    for (i, voicing) in voicings.iter_mut().enumerate() {
        let current = distance(voicing);
        if current <= tolerance as i16 {
            continue;
        }
        let pcs = voicing.pitch_classes();
        let mut options: Vec<Voicing> = candidates
            .get(i)
            .into_iter()
            .flatten()
            .filter(|c| c.pitch_classes() == pcs)
            .cloned()
            .collect();
        if let (Some(lo), Some(hi)) = (voicing.lowest(), voicing.highest()) {
            options.extend(
                [(hi, -1), (lo, 1), (hi, 1), (lo, -1)]
                    .into_iter()
                    .filter_map(|(pitch, octaves)| voicing.with_note_moved(pitch, octaves)),
            );
        }

        let mut best: Option<Voicing> = None;
        for option in options {
            if !option.in_range() || !option.hands_apart() || distance(&option) >= current {
                continue;
            }
            if best.as_ref().is_none_or(|b| distance(&option) < distance(b)) {
                best = Some(option);
            }
        }
        if let Some(best) = best {
            debug!(
                step = i,
                from = voicing.spread(),
                to = best.spread(),
                target,
                "Spread normalized"
            );
            *voicing = best;
        }
    }
    voicings
}
