//! Humanized rendering of scheduled hits into note events
//!
//! Each pattern hit becomes one note event per selected voicing note. All
//! notes of a hit share a single Gaussian timing offset so the chord stays
//! together; strum, velocity shaping and duration jitter are applied per note.
//! Velocities are MIDI values in `1..=127`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chord::{ChordEvent, Progression};
use crate::error::{invalid, Result};
use crate::feel::JazzRendererConfig;
use crate::grid::{apply_rhythm_pattern, ScheduledHit};
use crate::random::{Gaussian, RandomSource};
use crate::rhythm::{HitKind, RhythmPattern};
use crate::voicing::{Hand, Voicing};

/// Bar position (in a 4-beat bar) from which a hit counts as an anticipation
pub const ANTICIPATION_ZONE: f64 = 3.4;
/// How far a note may sound ahead of, or beyond, its chord
pub const ANTICIPATION_WINDOW: f64 = 0.6;
/// Longest portion of the next chord an anticipation keeps ringing into
pub const ANTICIPATION_HOLD: f64 = 1.0;
/// Hit velocity used when no pattern governs a measure
pub const ON_BEAT_VELOCITY: f64 = 0.8;
pub const MIN_NOTE_DURATION: f64 = 0.05;

const EPSILON: f64 = 1e-9;

// ============================================================================
// Output
// ============================================================================

/// One sounding note on the absolute beat timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Start in beats
    pub start: f64,
    /// MIDI note number
    pub pitch: u8,
    /// MIDI velocity (1-127)
    pub velocity: u8,
    /// Duration in beats
    pub duration: f64,
    pub hand: Hand,
    /// Chord event whose voicing this note belongs to
    pub chord_index: usize,
}

/// Rendered note events plus the loop length the player restarts at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub events: Vec<NoteEvent>,
    pub loop_length: f64,
}

impl Performance {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Anticipation zone start for a bar of the given length
pub fn anticipation_zone(beats_per_measure: f64) -> f64 {
    beats_per_measure - (4.0 - ANTICIPATION_ZONE)
}

// ============================================================================
// Renderer
// ============================================================================

/// Turns voicings and rhythm patterns into humanized note events
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HumanizedRenderer {
    config: JazzRendererConfig,
}

impl HumanizedRenderer {
    pub fn new(config: JazzRendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JazzRendererConfig {
        &self.config
    }

    /// Render every chord event with the same pattern
    ///
    /// `None` plays each chord once on its own start beat.
    pub fn render<R: RandomSource>(
        &self,
        progression: &Progression,
        voicings: &[Voicing],
        pattern: Option<&RhythmPattern>,
        rng: &mut R,
    ) -> Result<Vec<NoteEvent>> {
        let patterns = vec![pattern; progression.len()];
        self.render_with_patterns(progression, voicings, &patterns, rng)
    }

    /// Render with one (optional) pattern per chord event
    pub fn render_with_patterns<R: RandomSource>(
        &self,
        progression: &Progression,
        voicings: &[Voicing],
        patterns: &[Option<&RhythmPattern>],
        rng: &mut R,
    ) -> Result<Vec<NoteEvent>> {
        let events = &progression.events;
        if voicings.len() != events.len() {
            return Err(invalid(format!(
                "{} voicings supplied for {} chord events",
                voicings.len(),
                events.len()
            )));
        }
        if patterns.len() != events.len() {
            return Err(invalid(format!(
                "{} patterns supplied for {} chord events",
                patterns.len(),
                events.len()
            )));
        }

        let bar = progression.beats_per_measure;
        let zone = anticipation_zone(bar);
        let mut gaussian = Gaussian::new(rng);
        let mut notes = Vec::new();
        // Pitches the previous chord already sounded ahead of this one
        let mut sounded_early: Vec<u8> = Vec::new();

        for (i, event) in events.iter().enumerate() {
            let pattern = patterns[i];
            let anticipates = pattern.is_some_and(|p| p.has_anticipation(bar, zone));
            let next = events.get(i + 1);
            let mut anticipated: Vec<u8> = Vec::new();

            for hit in scheduled_hits(pattern, event) {
                let anticipation = match next {
                    Some(next) if anticipates => is_anticipation(&hit, next, bar, zone),
                    _ => false,
                };
                let (owner, owner_event) = match next {
                    Some(next) if anticipation => (i + 1, next),
                    _ => (i, event),
                };
                let voicing = &voicings[owner];
                let mut selected = select_notes(voicing, hit.kind);
                if !anticipation && (hit.beat - event.start).abs() < EPSILON {
                    selected.retain(|p| !sounded_early.contains(p));
                }
                if selected.is_empty() {
                    continue;
                }
                if anticipation {
                    anticipated.extend_from_slice(&selected);
                }

                let base_duration = match next {
                    Some(next) if anticipation => {
                        (next.start - hit.beat) + next.duration.min(ANTICIPATION_HOLD)
                    }
                    _ => hit.duration.unwrap_or(event.end() - hit.beat),
                };
                self.render_hit(
                    &hit,
                    anticipation,
                    owner,
                    owner_event,
                    voicing,
                    &selected,
                    base_duration,
                    &mut gaussian,
                    &mut notes,
                );
            }
            sounded_early = anticipated;
        }

        notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));
        debug!(
            chords = events.len(),
            notes = notes.len(),
            style = self.config.style.id(),
            "Rendered progression"
        );
        Ok(notes)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_hit<R: RandomSource>(
        &self,
        hit: &ScheduledHit,
        anticipation: bool,
        owner: usize,
        owner_event: &ChordEvent,
        voicing: &Voicing,
        selected: &[u8],
        base_duration: f64,
        gaussian: &mut Gaussian<R>,
        out: &mut Vec<NoteEvent>,
    ) {
        let c = &self.config;
        let bias = if anticipation { c.anticipation_push } else { c.lay_back };
        let offset = gaussian.sample(0.0, c.timing_jitter) + bias;

        let earliest = (owner_event.start - ANTICIPATION_WINDOW).max(0.0);
        let latest = owner_event.end() + ANTICIPATION_WINDOW - 1e-6;
        let top = voicing.highest();

        for (k, &pitch) in selected.iter().enumerate() {
            let hand = voicing.hand_of(pitch);
            let start = (hit.beat + offset + k as f64 * c.strum).min(latest).max(earliest);

            let mut level = hit.velocity * c.dynamics
                + c.brightness * (f64::from(pitch) - 60.0) / 12.0
                + gaussian.sample(0.0, c.velocity_jitter);
            if hand == Hand::Left {
                level -= c.left_hand_attenuation;
            }
            if Some(pitch) == top {
                level += c.melody_accent;
            }

            let duration = (base_duration * c.legato + gaussian.sample(0.0, c.duration_jitter))
                .max(MIN_NOTE_DURATION);

            out.push(NoteEvent {
                start,
                pitch,
                velocity: midi_velocity(level),
                duration,
                hand,
                chord_index: owner,
            });
        }
    }
}

fn scheduled_hits(pattern: Option<&RhythmPattern>, event: &ChordEvent) -> Vec<ScheduledHit> {
    match pattern {
        Some(pattern) => apply_rhythm_pattern(pattern, event, event.start),
        None => vec![ScheduledHit {
            beat: event.start,
            offset: 0.0,
            kind: HitKind::Full,
            velocity: ON_BEAT_VELOCITY,
            duration: None,
        }],
    }
}

/// A late-bar hit close enough to the next chord to sound it early
fn is_anticipation(hit: &ScheduledHit, next: &ChordEvent, bar: f64, zone: f64) -> bool {
    let gap = next.start - hit.beat;
    hit.beat.rem_euclid(bar) >= zone - EPSILON && gap > EPSILON && gap <= ANTICIPATION_WINDOW + EPSILON
}

/// Voicing notes a hit sounds, in ascending pitch
pub fn select_notes(voicing: &Voicing, kind: HitKind) -> Vec<u8> {
    match kind {
        HitKind::Full => voicing.notes().to_vec(),
        HitKind::Bass => voicing.lowest().into_iter().collect(),
        HitKind::Top => voicing.highest().into_iter().collect(),
        HitKind::LeftHand => voicing.left().to_vec(),
        HitKind::RightHand => voicing.right().to_vec(),
        HitKind::Rest => Vec::new(),
    }
}

/// Convert a 0.0-1.0 level to a MIDI velocity
fn midi_velocity(level: f64) -> u8 {
    (level.clamp(0.0, 1.0) * 127.0).round().clamp(1.0, 127.0) as u8
}
