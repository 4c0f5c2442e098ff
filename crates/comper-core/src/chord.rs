//! Chords, timed chord events and progressions

use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// Shortest duration a chord event may have, in beats
pub const MIN_CHORD_DURATION: f64 = 0.5;

const EPSILON: f64 = 1e-9;

// ============================================================================
// Chord Quality
// ============================================================================

/// Chord quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Major6,
    Minor6,
    Major7,
    Minor7,
    Dominant7,
    HalfDiminished,
    Diminished7,
    MinorMajor7,
    Dominant9,
    Major9,
    Minor9,
    Dominant13,
    Dominant7Sus4,
}

impl ChordQuality {
    /// Get chord intervals from root (close position, root position)
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
            Self::Major6 => &[0, 4, 7, 9],
            Self::Minor6 => &[0, 3, 7, 9],
            Self::Major7 | Self::Major9 => &[0, 4, 7, 11],
            Self::Minor7 | Self::Minor9 => &[0, 3, 7, 10],
            Self::Dominant7 | Self::Dominant9 | Self::Dominant13 => &[0, 4, 7, 10],
            Self::HalfDiminished => &[0, 3, 6, 10],
            Self::Diminished7 => &[0, 3, 6, 9],
            Self::MinorMajor7 => &[0, 3, 7, 11],
            Self::Dominant7Sus4 => &[0, 5, 7, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "Major",
            Self::Minor => "Minor",
            Self::Diminished => "Dim",
            Self::Augmented => "Aug",
            Self::Sus2 => "Sus2",
            Self::Sus4 => "Sus4",
            Self::Major6 => "6",
            Self::Minor6 => "m6",
            Self::Major7 => "Maj7",
            Self::Minor7 => "Min7",
            Self::Dominant7 => "Dom7",
            Self::HalfDiminished => "m7b5",
            Self::Diminished7 => "Dim7",
            Self::MinorMajor7 => "mMaj7",
            Self::Dominant9 => "9",
            Self::Major9 => "Maj9",
            Self::Minor9 => "m9",
            Self::Dominant13 => "13",
            Self::Dominant7Sus4 => "7sus4",
        }
    }

    /// Dominant-function qualities (used by anticipation and 7th resolution)
    pub fn is_dominant(&self) -> bool {
        matches!(
            self,
            Self::Dominant7 | Self::Dominant9 | Self::Dominant13 | Self::Dominant7Sus4
        )
    }

    /// Whether the quality carries a minor third
    pub fn is_minor(&self) -> bool {
        matches!(
            self,
            Self::Minor
                | Self::Minor6
                | Self::Minor7
                | Self::Minor9
                | Self::MinorMajor7
                | Self::HalfDiminished
                | Self::Diminished
                | Self::Diminished7
        )
    }

    /// Whether the quality is a four-note (or extended) chord with a 7th
    pub fn has_seventh(&self) -> bool {
        !matches!(
            self,
            Self::Major
                | Self::Minor
                | Self::Diminished
                | Self::Augmented
                | Self::Sus2
                | Self::Sus4
                | Self::Major6
                | Self::Minor6
        )
    }
}

// ============================================================================
// Alterations
// ============================================================================

/// Extension or alteration applied on top of the quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Alteration {
    Flat9,
    Natural9,
    Sharp9,
    Natural11,
    Sharp11,
    Flat13,
    Natural13,
}

impl Alteration {
    /// Semitones above the root
    pub fn semitones(&self) -> u8 {
        match self {
            Self::Flat9 => 13,
            Self::Natural9 => 14,
            Self::Sharp9 => 15,
            Self::Natural11 => 17,
            Self::Sharp11 => 18,
            Self::Flat13 => 20,
            Self::Natural13 => 21,
        }
    }
}

// ============================================================================
// Chord
// ============================================================================

/// A chord symbol: root, quality, optional slash bass and alterations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    /// Pitch class of the root (0=C .. 11=B)
    pub root: u8,
    pub quality: ChordQuality,
    /// Pitch class of the slash bass, if any
    #[serde(default)]
    pub bass: Option<u8>,
    /// Sorted, deduplicated
    #[serde(default)]
    pub alterations: Vec<Alteration>,
}

impl Chord {
    pub fn new(root: u8, quality: ChordQuality) -> Self {
        Self {
            root: root % 12,
            quality,
            bass: None,
            alterations: Vec::new(),
        }
    }

    pub fn with_bass(mut self, bass: u8) -> Self {
        self.bass = Some(bass % 12);
        self
    }

    pub fn with_alterations(mut self, alterations: impl IntoIterator<Item = Alteration>) -> Self {
        self.alterations.extend(alterations);
        self.alterations.sort();
        self.alterations.dedup();
        self
    }

    pub fn is_dominant(&self) -> bool {
        self.quality.is_dominant()
    }

    pub fn has(&self, alteration: Alteration) -> bool {
        self.alterations.contains(&alteration)
    }

    /// Pitch class the left hand anchors on
    pub fn bass_pitch_class(&self) -> u8 {
        self.bass.unwrap_or(self.root)
    }

    /// Third (or suspended 4th/2nd) in semitones above the root
    pub fn third(&self) -> u8 {
        self.quality.intervals()[1]
    }

    /// Fifth in semitones above the root, replaced by #11/b13 on dominants
    pub fn fifth(&self) -> u8 {
        if self.is_dominant() {
            if self.has(Alteration::Flat13) {
                return 8;
            }
            if self.has(Alteration::Sharp11) {
                return 6;
            }
        }
        self.quality.intervals()[2]
    }

    /// Seventh in semitones above the root (None for triads and 6 chords)
    pub fn seventh(&self) -> Option<u8> {
        if self.quality.has_seventh() {
            self.quality.intervals().get(3).copied()
        } else {
            None
        }
    }

    /// The 7th, or the 6th on sixth chords, or the octave on triads
    pub fn color_tone(&self) -> u8 {
        match self.quality.intervals().get(3) {
            Some(&tone) => tone,
            None => 12,
        }
    }

    /// Ninth in semitones above the root, honoring b9/#9
    pub fn ninth(&self) -> u8 {
        if self.has(Alteration::Flat9) {
            13
        } else if self.has(Alteration::Sharp9) {
            15
        } else {
            14
        }
    }

    /// Pitch class of the 7th, if the chord has one
    pub fn seventh_pitch_class(&self) -> Option<u8> {
        self.seventh().map(|s| (self.root + s) % 12)
    }

    /// Pitch class of the third
    pub fn third_pitch_class(&self) -> u8 {
        (self.root + self.third()) % 12
    }

    /// All chord-tone pitch classes including alterations
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = self
            .quality
            .intervals()
            .iter()
            .copied()
            .chain(self.alterations.iter().map(|a| a.semitones()))
            .map(|i| (self.root + i) % 12)
            .collect();
        if let Some(bass) = self.bass {
            pcs.push(bass);
        }
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }
}

// ============================================================================
// Chord Events and Progressions
// ============================================================================

/// A chord placed on the absolute beat timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub chord: Chord,
    /// Start position in beats from the progression start
    pub start: f64,
    /// Duration in beats
    pub duration: f64,
}

impl ChordEvent {
    /// Create an event, raising short durations to [`MIN_CHORD_DURATION`]
    pub fn new(chord: Chord, start: f64, duration: f64) -> Result<Self> {
        if !start.is_finite() || start < 0.0 {
            return Err(invalid(format!("chord start must be a non-negative beat, got {start}")));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(invalid(format!("chord duration must be positive, got {duration}")));
        }
        Ok(Self {
            chord,
            start,
            duration: duration.max(MIN_CHORD_DURATION),
        })
    }

    /// End beat (start + duration)
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, beat: f64) -> bool {
        beat >= self.start - EPSILON && beat < self.end() - EPSILON
    }
}

/// Chord count and longest chord duration of one measure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureDensity {
    pub index: usize,
    /// Index of the first chord event starting in this measure
    pub first_event: usize,
    pub chord_count: usize,
    pub longest_duration: f64,
}

/// An ordered, non-overlapping sequence of chord events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub events: Vec<ChordEvent>,
    pub beats_per_measure: f64,
    /// Opaque key metadata, passed through untouched
    #[serde(default)]
    pub key: Option<String>,
}

impl Progression {
    pub fn new(events: Vec<ChordEvent>, beats_per_measure: f64) -> Result<Self> {
        let progression = Self {
            events,
            beats_per_measure,
            key: None,
        };
        progression.validate()?;
        Ok(progression)
    }

    /// Build back-to-back events starting at beat 0
    pub fn sequential(chords: Vec<(Chord, f64)>, beats_per_measure: f64) -> Result<Self> {
        let mut start = 0.0;
        let mut events = Vec::with_capacity(chords.len());
        for (chord, duration) in chords {
            let event = ChordEvent::new(chord, start, duration)?;
            start = event.end();
            events.push(event);
        }
        Self::new(events, beats_per_measure)
    }

    /// Check ordering, overlap and measure length
    pub fn validate(&self) -> Result<()> {
        if !self.beats_per_measure.is_finite() || self.beats_per_measure <= 0.0 {
            return Err(invalid(format!(
                "beats per measure must be positive, got {}",
                self.beats_per_measure
            )));
        }
        for (i, event) in self.events.iter().enumerate() {
            let chord = &event.chord;
            if chord.root > 11 {
                return Err(invalid(format!("event {i} root pitch class {} outside 0..=11", chord.root)));
            }
            if let Some(bass) = chord.bass.filter(|&b| b > 11) {
                return Err(invalid(format!("event {i} bass pitch class {bass} outside 0..=11")));
            }
            if !event.start.is_finite() || event.start < 0.0 {
                return Err(invalid(format!("event {i} has invalid start {}", event.start)));
            }
            if !event.duration.is_finite() || event.duration < MIN_CHORD_DURATION - EPSILON {
                return Err(invalid(format!(
                    "event {i} duration {} is below the {MIN_CHORD_DURATION}-beat floor",
                    event.duration
                )));
            }
        }
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[1].start < pair[0].end() - EPSILON {
                return Err(invalid(format!(
                    "event {} starting at {} overlaps event {} ending at {}",
                    i + 1,
                    pair[1].start,
                    i,
                    pair[0].end()
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Loop length in beats (end of the last event)
    pub fn length_beats(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.end())
    }

    /// Measure index an absolute beat falls into
    pub fn measure_of(&self, beat: f64) -> usize {
        ((beat + EPSILON) / self.beats_per_measure).floor().max(0.0) as usize
    }

    /// Group events by the measure their start falls in
    pub fn measures(&self) -> Vec<MeasureDensity> {
        let mut measures: Vec<MeasureDensity> = Vec::new();
        for (i, event) in self.events.iter().enumerate() {
            let index = self.measure_of(event.start);
            match measures.last_mut() {
                Some(m) if m.index == index => {
                    m.chord_count += 1;
                    m.longest_duration = m.longest_duration.max(event.duration);
                }
                _ => measures.push(MeasureDensity {
                    index,
                    first_event: i,
                    chord_count: 1,
                    longest_duration: event.duration,
                }),
            }
        }
        measures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComperError;

    #[test]
    fn test_chord_tones() {
        let g7 = Chord::new(7, ChordQuality::Dominant7);
        assert_eq!(g7.third_pitch_class(), 11);
        assert_eq!(g7.seventh_pitch_class(), Some(5));
        assert!(g7.is_dominant());

        let alt = Chord::new(7, ChordQuality::Dominant7)
            .with_alterations([Alteration::Flat13, Alteration::Flat9, Alteration::Flat9]);
        assert_eq!(alt.alterations, vec![Alteration::Flat9, Alteration::Flat13]);
        assert_eq!(alt.fifth(), 8);
        assert_eq!(alt.ninth(), 13);

        let c6 = Chord::new(0, ChordQuality::Major6);
        assert_eq!(c6.seventh(), None);
        assert_eq!(c6.color_tone(), 9);
    }

    #[test]
    fn test_slash_bass() {
        let chord = Chord::new(12 + 2, ChordQuality::Minor7).with_bass(7);
        assert_eq!(chord.root, 2);
        assert_eq!(chord.bass_pitch_class(), 7);
        assert!(chord.pitch_classes().contains(&7));
    }

    #[test]
    fn test_event_validation() {
        let c = Chord::new(0, ChordQuality::Major);
        assert!(ChordEvent::new(c.clone(), 0.0, -1.0).is_err());
        assert!(ChordEvent::new(c.clone(), -2.0, 1.0).is_err());
        assert!(ChordEvent::new(c.clone(), 0.0, f64::NAN).is_err());
        let short = ChordEvent::new(c, 0.0, 0.25).unwrap();
        assert_eq!(short.duration, MIN_CHORD_DURATION);
    }

    #[test]
    fn test_overlap_rejected() {
        let c = Chord::new(0, ChordQuality::Major);
        let a = ChordEvent::new(c.clone(), 0.0, 4.0).unwrap();
        let b = ChordEvent::new(c, 2.0, 4.0).unwrap();
        assert!(Progression::new(vec![a, b], 4.0).is_err());
        assert!(Progression::new(Vec::new(), 0.0).is_err());
    }

    #[test]
    fn test_out_of_range_pitch_class_rejected() {
        let event = |chord: &str| {
            format!(r#"{{"events":[{{"chord":{chord},"start":0.0,"duration":4.0}}],"beats_per_measure":4.0}}"#)
        };
        let high_root: Progression = serde_json::from_str(&event(
            r#"{"root":250,"quality":"Dominant13","bass":null,"alterations":[]}"#,
        ))
        .unwrap();
        assert!(matches!(high_root.validate(), Err(ComperError::InvalidInput(_))));

        let high_bass: Progression = serde_json::from_str(&event(
            r#"{"root":7,"quality":"Dominant7","bass":12,"alterations":[]}"#,
        ))
        .unwrap();
        assert!(matches!(high_bass.validate(), Err(ComperError::InvalidInput(_))));

        let slash: Progression = serde_json::from_str(&event(
            r#"{"root":7,"quality":"Dominant7","bass":11,"alterations":[]}"#,
        ))
        .unwrap();
        assert!(slash.validate().is_ok());
    }

    #[test]
    fn test_measures() {
        let c = Chord::new(0, ChordQuality::Major7);
        let progression = Progression::sequential(
            vec![
                (c.clone(), 4.0),
                (c.clone(), 2.0),
                (c.clone(), 2.0),
                (c.clone(), 1.0),
                (c.clone(), 1.0),
                (c.clone(), 1.0),
                (c, 1.0),
            ],
            4.0,
        )
        .unwrap();

        let measures = progression.measures();
        assert_eq!(measures.len(), 3);
        assert_eq!(measures[0].chord_count, 1);
        assert_eq!(measures[1].chord_count, 2);
        assert_eq!(measures[1].first_event, 1);
        assert_eq!(measures[2].chord_count, 4);
        assert_eq!(measures[2].longest_duration, 1.0);
        assert_eq!(progression.length_beats(), 12.0);
    }
}
