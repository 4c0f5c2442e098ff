//! Two-hand piano voicings and the voicing generator
//!
//! A chord is realized by looking up the interval templates of every voicing
//! family that suits its quality, placing the left hand around C3 and the
//! right hand around F4, and folding each hand by octaves until the whole
//! voicing sits on the physical keyboard. Chords without a template always
//! fall back to a close-position realization, so generation never comes back
//! empty.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chord::{Chord, ChordQuality};

/// Lowest playable MIDI note
pub const PIANO_LOW: u8 = 36;
/// Highest playable MIDI note
pub const PIANO_HIGH: u8 = 96;
/// Left hand centers one octave below middle C
pub const LEFT_HAND_ANCHOR: u8 = 48;
/// Right hand centers a fourth above middle C
pub const RIGHT_HAND_ANCHOR: u8 = 65;
/// Voicings with more seconds than this are set aside
pub const MAX_CLUSTERS: usize = 1;
/// Cap on candidates per chord handed to the optimizer
pub const MAX_VARIANTS: usize = 48;

const OCTAVE_FOLDS: [i16; 5] = [0, -12, 12, -24, 24];

/// Which hand plays a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

/// Voicing family a realization came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoicingFamily {
    RootlessA,
    RootlessB,
    Shell,
    Quartal,
    Drop2,
    Drop3,
    DiminishedStack,
    Fallback,
}

impl VoicingFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RootlessA => "Rootless A",
            Self::RootlessB => "Rootless B",
            Self::Shell => "Shell",
            Self::Quartal => "Quartal",
            Self::Drop2 => "Drop 2",
            Self::Drop3 => "Drop 3",
            Self::DiminishedStack => "Diminished Stack",
            Self::Fallback => "Fallback",
        }
    }
}

// ============================================================================
// Voicing
// ============================================================================

/// A concrete set of MIDI pitches split between two hands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voicing {
    left: Vec<u8>,
    right: Vec<u8>,
    notes: Vec<u8>,
    family: VoicingFamily,
}

impl Voicing {
    pub fn new(mut left: Vec<u8>, mut right: Vec<u8>, family: VoicingFamily) -> Self {
        left.sort_unstable();
        left.dedup();
        right.sort_unstable();
        right.dedup();
        right.retain(|n| !left.contains(n));
        let mut notes: Vec<u8> = left.iter().chain(right.iter()).copied().collect();
        notes.sort_unstable();
        Self {
            left,
            right,
            notes,
            family,
        }
    }

    /// All pitches, ascending
    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn left(&self) -> &[u8] {
        &self.left
    }

    pub fn right(&self) -> &[u8] {
        &self.right
    }

    /// Whether every left-hand note sits below every right-hand note
    pub fn hands_apart(&self) -> bool {
        match (self.left.last(), self.right.first()) {
            (Some(l), Some(r)) => l < r,
            _ => true,
        }
    }

    pub fn family(&self) -> VoicingFamily {
        self.family
    }

    pub fn lowest(&self) -> Option<u8> {
        self.notes.first().copied()
    }

    pub fn highest(&self) -> Option<u8> {
        self.notes.last().copied()
    }

    /// Top note minus bottom note
    pub fn spread(&self) -> u8 {
        match (self.lowest(), self.highest()) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0,
        }
    }

    pub fn hand_of(&self, pitch: u8) -> Hand {
        if self.left.contains(&pitch) {
            Hand::Left
        } else {
            Hand::Right
        }
    }

    pub fn in_range(&self) -> bool {
        self.notes.iter().all(|&n| (PIANO_LOW..=PIANO_HIGH).contains(&n))
    }

    /// Number of adjacent minor/major seconds in the combined note set
    pub fn cluster_count(&self) -> usize {
        self.notes
            .windows(2)
            .filter(|w| matches!(w[1] - w[0], 1 | 2))
            .count()
    }

    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = self.notes.iter().map(|n| n % 12).collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    /// Shift every note, rejecting results off the keyboard
    pub fn transposed(&self, semitones: i16) -> Option<Voicing> {
        let left = shift_notes(&self.left, semitones)?;
        let right = shift_notes(&self.right, semitones)?;
        Some(Voicing::new(left, right, self.family))
    }

    /// Move a single pitch by octaves, keeping it in the same hand
    pub fn with_note_moved(&self, pitch: u8, octaves: i16) -> Option<Voicing> {
        let target = pitch as i16 + octaves * 12;
        if !(PIANO_LOW as i16..=PIANO_HIGH as i16).contains(&target) {
            return None;
        }
        let target = target as u8;
        if self.notes.contains(&target) {
            return None;
        }
        let replace = |hand: &[u8]| -> Vec<u8> {
            hand.iter().map(|&n| if n == pitch { target } else { n }).collect()
        };
        Some(Voicing::new(replace(&self.left), replace(&self.right), self.family))
    }
}

fn shift_notes(notes: &[u8], semitones: i16) -> Option<Vec<u8>> {
    notes
        .iter()
        .map(|&n| {
            let shifted = n as i16 + semitones;
            (PIANO_LOW as i16..=PIANO_HIGH as i16)
                .contains(&shifted)
                .then_some(shifted as u8)
        })
        .collect()
}

// ============================================================================
// Templates
// ============================================================================

/// Interval template for one voicing family
///
/// Intervals are semitones above the chord root. A leading `0` in the left
/// hand stands for the bass note, which is the slash bass when the chord
/// has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicingTemplate {
    pub family: VoicingFamily,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
}

impl VoicingTemplate {
    fn new(family: VoicingFamily, left: &[u8], right: &[u8]) -> Self {
        Self {
            family,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

/// Drop the voice `from_top` places below the top of a close stack by an
/// octave (1 = drop 2, 2 = drop 3), re-based so intervals stay non-negative
fn drop_voice(close: &[u8], from_top: usize) -> Vec<u8> {
    if close.len() < from_top + 1 {
        return close.to_vec();
    }
    let idx = close.len() - 1 - from_top;
    let mut notes: Vec<u8> = close
        .iter()
        .enumerate()
        .map(|(i, &n)| if i == idx { n } else { n + 12 })
        .collect();
    notes.sort_unstable();
    notes
}

/// Templates for every family that suits the chord's quality
pub fn templates(chord: &Chord) -> Vec<VoicingTemplate> {
    use ChordQuality as Q;
    use VoicingFamily as F;

    let q = chord.quality;
    let t = chord.third();
    let f = chord.fifth();
    let c = chord.color_tone();
    let n = chord.ninth();
    let four_note = chord.quality.intervals().len() == 4;

    let mut out = Vec::new();

    match q {
        Q::Diminished | Q::Diminished7 => {
            out.push(VoicingTemplate::new(F::DiminishedStack, &[0], &[0, 3, 6, 9]));
            if q == Q::Diminished7 {
                out.push(VoicingTemplate::new(F::Drop2, &[0], &drop_voice(&[0, 3, 6, 9], 1)));
            }
            return out;
        }
        Q::Augmented | Q::Sus2 => return out,
        Q::Major | Q::Minor => {
            out.push(VoicingTemplate::new(F::Drop2, &[0], &drop_voice(&[0, t, f], 1)));
            return out;
        }
        _ => {}
    }

    if q != Q::Sus4 {
        if q == Q::Dominant13 {
            out.push(VoicingTemplate::new(F::RootlessA, &[0], &[t, c, n, 21]));
            out.push(VoicingTemplate::new(F::RootlessB, &[0], &[c, n, t + 12, 21]));
        } else {
            out.push(VoicingTemplate::new(F::RootlessA, &[0], &[t, f, c, n]));
            out.push(VoicingTemplate::new(F::RootlessB, &[0], &[c, n, t + 12, f + 12]));
        }
        out.push(VoicingTemplate::new(F::Shell, &[0], &[c, t + 12]));
    }

    if q != Q::HalfDiminished && q != Q::MinorMajor7 {
        let start = if q.is_minor() || matches!(q, Q::Sus4 | Q::Dominant7Sus4) { f } else { t };
        out.push(VoicingTemplate::new(
            F::Quartal,
            &[0],
            &[start, start + 5, start + 10, start + 15],
        ));
    }

    if four_note {
        let close = [0, t, f, c];
        out.push(VoicingTemplate::new(F::Drop2, &[0], &drop_voice(&close, 1)));
        out.push(VoicingTemplate::new(F::Drop3, &[0], &drop_voice(&close, 2)));
    }

    out
}

// ============================================================================
// Placement
// ============================================================================

/// Pitch of class `pc` closest to `anchor` (ties resolve downward)
fn nearest_pitch(pc: u8, anchor: u8) -> i16 {
    let low = anchor as i16 - 6;
    low + (pc as i16 - low).rem_euclid(12)
}

/// Smallest pitch of class `pc` strictly above `prev`
fn next_above(pc: u8, prev: i16) -> i16 {
    let start = prev + 1;
    start + (pc as i16 - start).rem_euclid(12)
}

/// Fold a hand by octaves until it fits on the keyboard
fn fit_to_keyboard(notes: &[i16]) -> Option<Vec<u8>> {
    OCTAVE_FOLDS.iter().find_map(|&shift| {
        notes
            .iter()
            .map(|&n| {
                let shifted = n + shift;
                (PIANO_LOW as i16..=PIANO_HIGH as i16)
                    .contains(&shifted)
                    .then_some(shifted as u8)
            })
            .collect::<Option<Vec<u8>>>()
    })
}

/// Place a template's hands around their anchors
pub fn realize(chord: &Chord, template: &VoicingTemplate) -> Option<Voicing> {
    let &first_right = template.right.first()?;

    let mut left: Vec<i16> = Vec::with_capacity(template.left.len());
    for (i, &interval) in template.left.iter().enumerate() {
        let pc = if i == 0 && interval == 0 {
            chord.bass_pitch_class()
        } else {
            (chord.root + interval) % 12
        };
        let pitch = match left.last() {
            None => nearest_pitch(pc, LEFT_HAND_ANCHOR),
            Some(&prev) => next_above(pc, prev),
        };
        left.push(pitch);
    }

    let base = nearest_pitch((chord.root + first_right) % 12, RIGHT_HAND_ANCHOR);
    let mut right: Vec<i16> = template
        .right
        .iter()
        .map(|&i| base + i as i16 - first_right as i16)
        .collect();

    let left = fit_to_keyboard(&left)?;
    let left_top = *left.iter().max()? as i16;
    let right_bottom = *right.iter().min()?;
    if right_bottom <= left_top {
        let lift = ((left_top - right_bottom) / 12 + 1) * 12;
        right.iter_mut().for_each(|n| *n += lift);
    }
    let right = fit_to_keyboard(&right)?;
    let right_bottom = *right.iter().min()?;
    if right_bottom as i16 <= left_top {
        return None;
    }

    Some(Voicing::new(left, right, template.family))
}

/// Close-position root/third/fifth(/seventh) over the bass; always fits
pub fn fallback_voicing(chord: &Chord) -> Voicing {
    let bass = nearest_pitch(chord.bass_pitch_class(), LEFT_HAND_ANCHOR) as u8;
    let root = nearest_pitch(chord.root, 60) as u8;
    let right: Vec<u8> = chord.quality.intervals().iter().map(|&i| root + i).collect();
    Voicing::new(vec![bass], right, VoicingFamily::Fallback)
}

// ============================================================================
// Voicing Generator
// ============================================================================

/// Produces candidate voicings for chords
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoicingGenerator {
    pub max_clusters: usize,
    pub max_variants: usize,
}

impl Default for VoicingGenerator {
    fn default() -> Self {
        Self {
            max_clusters: MAX_CLUSTERS,
            max_variants: MAX_VARIANTS,
        }
    }
}

impl VoicingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One realization per suitable family, cluttered spacings set aside
    pub fn generate(&self, chord: &Chord) -> Vec<Voicing> {
        let mut seen = HashSet::new();
        let mut clean = Vec::new();
        let mut cluttered = Vec::new();

        for template in templates(chord) {
            let Some(voicing) = realize(chord, &template) else {
                continue;
            };
            if !seen.insert(voicing.notes().to_vec()) {
                continue;
            }
            if voicing.cluster_count() > self.max_clusters {
                cluttered.push(voicing);
            } else {
                clean.push(voicing);
            }
        }

        if !clean.is_empty() {
            return clean;
        }
        if !cluttered.is_empty() {
            cluttered.sort_by_key(|v| v.cluster_count());
            return cluttered;
        }

        debug!(
            root = chord.root,
            quality = chord.quality.name(),
            "No voicing template for chord, using fallback"
        );
        vec![fallback_voicing(chord)]
    }

    /// Base voicings plus right-hand inversions and octave transpositions
    pub fn generate_all_variants(&self, chord: &Chord) -> Vec<Voicing> {
        let bases = self.generate(chord);
        let base_clusters = bases.iter().map(|v| v.cluster_count()).min().unwrap_or(0);
        let cluster_limit = self.max_clusters.max(base_clusters);

        let mut seen: HashSet<Vec<u8>> = bases.iter().map(|v| v.notes().to_vec()).collect();
        let mut out = bases.clone();

        let mut inverted = Vec::new();
        for base in &bases {
            let mut right = base.right().to_vec();
            for _ in 1..right.len() {
                right.rotate_left(1);
                if let Some(last) = right.last_mut() {
                    *last += 12;
                }
                let widened: Vec<i16> = right.iter().map(|&n| n as i16).collect();
                let Some(folded) = fit_to_keyboard(&widened) else {
                    continue;
                };
                let voicing = Voicing::new(base.left().to_vec(), folded, base.family());
                if voicing.hands_apart() {
                    inverted.push(voicing);
                }
            }
        }

        let shapes: Vec<Voicing> = bases.iter().chain(inverted.iter()).cloned().collect();
        let shifted = shapes
            .iter()
            .flat_map(|v| [-12, 12].into_iter().filter_map(move |s| v.transposed(s)));

        for voicing in inverted.into_iter().chain(shifted) {
            if out.len() >= self.max_variants {
                break;
            }
            if voicing.cluster_count() > cluster_limit {
                continue;
            }
            if seen.insert(voicing.notes().to_vec()) {
                out.push(voicing);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::Alteration;

    const ALL_QUALITIES: [ChordQuality; 19] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::Sus2,
        ChordQuality::Sus4,
        ChordQuality::Major6,
        ChordQuality::Minor6,
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::Dominant7,
        ChordQuality::HalfDiminished,
        ChordQuality::Diminished7,
        ChordQuality::MinorMajor7,
        ChordQuality::Dominant9,
        ChordQuality::Major9,
        ChordQuality::Minor9,
        ChordQuality::Dominant13,
        ChordQuality::Dominant7Sus4,
    ];

    #[test]
    fn test_every_chord_voices_on_the_keyboard() {
        let generator = VoicingGenerator::new();
        for quality in ALL_QUALITIES {
            for root in 0..12 {
                let chord = Chord::new(root, quality);
                let voicings = generator.generate(&chord);
                assert!(!voicings.is_empty(), "{root} {}", quality.name());
                for v in &voicings {
                    assert!(v.in_range(), "{root} {} -> {:?}", quality.name(), v.notes());
                }
                let variants = generator.generate_all_variants(&chord);
                assert!(variants.len() >= voicings.len());
                assert!(variants.len() <= MAX_VARIANTS);
                assert!(variants.iter().all(Voicing::in_range));
            }
        }
    }

    #[test]
    fn test_rootless_a_dominant() {
        // G7: B D F A over a G bass
        let chord = Chord::new(7, ChordQuality::Dominant7);
        let template = templates(&chord)
            .into_iter()
            .find(|t| t.family == VoicingFamily::RootlessA)
            .unwrap();
        let voicing = realize(&chord, &template).unwrap();
        assert_eq!(voicing.left(), &[43]);
        assert_eq!(voicing.right(), &[59, 62, 65, 69]);
        assert_eq!(voicing.spread(), 26);
    }

    #[test]
    fn test_alterations_color_rootless() {
        let chord = Chord::new(7, ChordQuality::Dominant7).with_alterations([Alteration::Flat9]);
        let template = templates(&chord)
            .into_iter()
            .find(|t| t.family == VoicingFamily::RootlessA)
            .unwrap();
        let voicing = realize(&chord, &template).unwrap();
        // Ab instead of A on top
        assert!(voicing.pitch_classes().contains(&8));
        assert!(!voicing.pitch_classes().contains(&9));
    }

    #[test]
    fn test_fallback_for_untemplated_quality() {
        let chord = Chord::new(0, ChordQuality::Augmented);
        let voicings = VoicingGenerator::new().generate(&chord);
        assert_eq!(voicings.len(), 1);
        assert_eq!(voicings[0].family(), VoicingFamily::Fallback);
        assert_eq!(voicings[0].right(), &[60, 64, 68]);
        assert_eq!(voicings[0].left(), &[48]);
    }

    #[test]
    fn test_slash_bass_in_left_hand() {
        let chord = Chord::new(0, ChordQuality::Major7).with_bass(7);
        for v in VoicingGenerator::new().generate(&chord) {
            assert_eq!(v.left()[0] % 12, 7);
        }
    }

    #[test]
    fn test_cluster_count() {
        let v = Voicing::new(vec![48], vec![60, 62, 63, 67], VoicingFamily::Fallback);
        assert_eq!(v.cluster_count(), 2);
        let v = Voicing::new(vec![48], vec![64, 67, 71], VoicingFamily::Fallback);
        assert_eq!(v.cluster_count(), 0);
    }

    #[test]
    fn test_drop_voice() {
        // C E G B, drop 2 -> G C E B (re-based)
        assert_eq!(drop_voice(&[0, 4, 7, 11], 1), vec![7, 12, 16, 23]);
        // drop 3 -> E C G B
        assert_eq!(drop_voice(&[0, 4, 7, 11], 2), vec![4, 12, 19, 23]);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = VoicingGenerator::new();
        let chord = Chord::new(2, ChordQuality::Minor7);
        assert_eq!(
            generator.generate_all_variants(&chord),
            generator.generate_all_variants(&chord)
        );
    }
}
