//! Grid-aligned pattern application
//!
//! Patterns repeat on an absolute beat grid whose phase comes from the
//! pattern length alone, so a chord that starts mid-grid picks the pattern
//! up where it already is instead of restarting it.

use crate::chord::ChordEvent;
use crate::rhythm::{HitKind, RhythmPattern};

const EPSILON: f64 = 1e-9;

/// A pattern hit stamped onto the absolute timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledHit {
    /// Absolute beat
    pub beat: f64,
    /// Position inside the pattern repetition
    pub offset: f64,
    pub kind: HitKind,
    /// Relative velocity (0.0-1.0)
    pub velocity: f64,
    /// Explicit duration override from the pattern
    pub duration: Option<f64>,
}

/// Start of the pattern repetition containing `start_beat`
pub fn phase_base(start_beat: f64, length: f64) -> f64 {
    ((start_beat + EPSILON) / length).floor() * length
}

/// Every pattern hit that falls inside the chord event, in time order
pub fn apply_rhythm_pattern(
    pattern: &RhythmPattern,
    event: &ChordEvent,
    start_beat: f64,
) -> Vec<ScheduledHit> {
    let length = pattern.length();
    let end = event.end();
    let mut out = Vec::new();

    let mut rep_start = phase_base(start_beat, length);
    while rep_start < end - EPSILON {
        for hit in pattern.hits() {
            let beat = rep_start + hit.position;
            if event.contains(beat) {
                out.push(ScheduledHit {
                    beat,
                    offset: hit.position,
                    kind: hit.kind,
                    velocity: hit.velocity,
                    duration: hit.duration,
                });
            }
        }
        rep_start += length;
    }
    out
}
