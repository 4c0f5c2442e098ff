//! Rhythm patterns and the immutable pattern catalog

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{invalid, Result};
use crate::feel::Style;

/// Swing factor of the swing-family canonical patterns
pub const STANDARD_SWING: f64 = 0.17;
/// Heaviest swing a pattern may carry
pub const MAX_SWING: f64 = 0.33;

pub const WHOLE_NOTE: &str = "Whole Note";
pub const SYNCOPATED: &str = "Syncopated";
pub const QUARTER_NOTE: &str = "Quarter Note";
pub const HALF_NOTE: &str = "Half Note";

const EPSILON: f64 = 1e-9;

/// What part of the voicing a hit sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitKind {
    Full,
    Bass,
    Top,
    LeftHand,
    RightHand,
    Rest,
}

/// A single hit inside a pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmHit {
    /// Beats from the pattern start
    pub position: f64,
    /// Relative velocity (0.0-1.0)
    pub velocity: f64,
    pub kind: HitKind,
    /// Explicit sounding duration in beats
    pub duration: Option<f64>,
}

impl RhythmHit {
    pub fn new(position: f64, velocity: f64, kind: HitKind) -> Self {
        Self {
            position,
            velocity,
            kind,
            duration: None,
        }
    }

    pub fn held(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Whether a position sits on an eighth-note off-beat
fn is_off_beat(position: f64) -> bool {
    (position.fract() - 0.5).abs() < EPSILON
}

// ============================================================================
// Rhythm Pattern
// ============================================================================

/// A named, repeating hit pattern belonging to one style
#[derive(Debug, Clone, PartialEq)]
pub struct RhythmPattern {
    name: String,
    style: Style,
    length: f64,
    hits: Vec<RhythmHit>,
    /// Unswung hit positions; swing is always applied from these
    base_positions: Vec<f64>,
    swing: f64,
    description: String,
    tempo_range: (f64, f64),
}

impl RhythmPattern {
    /// Validate and build a straight (unswung) pattern
    pub fn new(
        name: impl Into<String>,
        style: Style,
        length: f64,
        mut hits: Vec<RhythmHit>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if !length.is_finite() || length <= 0.0 {
            return Err(invalid(format!("pattern '{name}' length must be positive, got {length}")));
        }
        for hit in &hits {
            if !hit.position.is_finite() || hit.position < 0.0 || hit.position >= length {
                return Err(invalid(format!(
                    "pattern '{name}' hit position {} outside [0, {length})",
                    hit.position
                )));
            }
            if !(0.0..=1.0).contains(&hit.velocity) {
                return Err(invalid(format!(
                    "pattern '{name}' hit velocity {} outside [0, 1]",
                    hit.velocity
                )));
            }
            if let Some(d) = hit.duration {
                if !d.is_finite() || d <= 0.0 {
                    return Err(invalid(format!("pattern '{name}' hit duration {d} must be positive")));
                }
            }
        }
        hits.sort_by(|a, b| a.position.total_cmp(&b.position));
        let base_positions = hits.iter().map(|h| h.position).collect();
        Ok(Self {
            name,
            style,
            length,
            hits,
            base_positions,
            swing: 0.0,
            description: description.into(),
            tempo_range: (0.0, f64::MAX),
        })
    }

    /// Copy with off-beats shifted by `factor`, computed from the base positions
    pub fn with_swing(&self, factor: f64) -> Result<Self> {
        if !(0.0..=MAX_SWING).contains(&factor) {
            return Err(invalid(format!("swing factor {factor} outside [0, {MAX_SWING}]")));
        }
        let mut swung = self.clone();
        for (hit, &base) in swung.hits.iter_mut().zip(&self.base_positions) {
            hit.position = if is_off_beat(base) { base + factor } else { base };
            if hit.position >= self.length {
                return Err(invalid(format!(
                    "swing {factor} pushes hit at {base} past pattern length {}",
                    self.length
                )));
            }
        }
        swung.swing = factor;
        Ok(swung)
    }

    pub fn with_tempo_range(mut self, min_bpm: f64, max_bpm: f64) -> Self {
        self.tempo_range = (min_bpm, max_bpm);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// Length in beats
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Hits ordered by position
    pub fn hits(&self) -> &[RhythmHit] {
        &self.hits
    }

    pub fn base_positions(&self) -> &[f64] {
        &self.base_positions
    }

    pub fn swing(&self) -> f64 {
        self.swing
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn key(&self) -> String {
        pattern_key(self.style, &self.name)
    }

    /// Sounding hits per beat
    pub fn density(&self) -> f64 {
        let sounding = self.hits.iter().filter(|h| h.kind != HitKind::Rest).count();
        sounding as f64 / self.length
    }

    pub fn suits_tempo(&self, bpm: f64) -> bool {
        bpm >= self.tempo_range.0 && bpm <= self.tempo_range.1
    }

    /// Whether any sounding hit lands late enough in a bar to anticipate the next
    pub fn has_anticipation(&self, beats_per_bar: f64, zone_start: f64) -> bool {
        self.hits
            .iter()
            .filter(|h| h.kind != HitKind::Rest)
            .any(|h| h.position.rem_euclid(beats_per_bar) >= zone_start - EPSILON)
    }
}

/// Catalog key of a pattern, e.g. `swing/Syncopated`
pub fn pattern_key(style: Style, name: &str) -> String {
    format!("{}/{}", style.id(), name)
}

// ============================================================================
// Catalog contents
// ============================================================================

fn canonical_patterns(style: Style) -> Result<Vec<RhythmPattern>> {
    use HitKind::*;

    let swing = if style.is_swing_family() { STANDARD_SWING } else { 0.0 };

    let whole = RhythmPattern::new(
        WHOLE_NOTE,
        style,
        4.0,
        vec![RhythmHit::new(0.0, 0.9, Full).held(4.0)],
        "One hit sustained through the bar",
    )?;

    let syncopated = RhythmPattern::new(
        SYNCOPATED,
        style,
        4.0,
        vec![
            RhythmHit::new(0.5, 0.85, Full).held(1.25),
            RhythmHit::new(2.0, 0.8, Full),
        ],
        "Off-beat stab on the and of one, then beat three",
    )?
    .with_swing(swing)?;

    let quarter = RhythmPattern::new(
        QUARTER_NOTE,
        style,
        4.0,
        vec![
            RhythmHit::new(0.0, 1.0, Full).held(0.9),
            RhythmHit::new(1.0, 0.7, Full).held(0.9),
            RhythmHit::new(2.0, 0.9, Full).held(0.9),
            RhythmHit::new(3.0, 0.7, Full).held(0.9),
        ],
        "Four on the floor, accents on one and three",
    )?
    .with_tempo_range(0.0, 220.0);

    let half = RhythmPattern::new(
        HALF_NOTE,
        style,
        4.0,
        vec![
            RhythmHit::new(0.0, 0.9, Full).held(2.0),
            RhythmHit::new(2.0, 0.75, Full),
        ],
        "Beats one and three",
    )?;

    Ok(vec![whole, syncopated, quarter, half])
}

fn style_patterns(style: Style) -> Result<Vec<RhythmPattern>> {
    use HitKind::*;

    let patterns = match style {
        Style::Swing | Style::Bebop => vec![
            RhythmPattern::new(
                "Charleston",
                style,
                4.0,
                vec![
                    RhythmHit::new(0.0, 0.9, Full).held(1.0),
                    RhythmHit::new(1.5, 0.8, Full),
                ],
                "Beat one and the and of two",
            )?
            .with_swing(STANDARD_SWING)?,
            RhythmPattern::new(
                "Red Garland",
                style,
                4.0,
                vec![
                    RhythmHit::new(1.5, 0.7, RightHand).held(0.5),
                    RhythmHit::new(3.5, 0.85, Full),
                ],
                "Off-beat stabs with the next chord anticipated",
            )?
            .with_swing(STANDARD_SWING)?
            .with_tempo_range(80.0, 320.0),
        ],
        Style::Ballad => vec![RhythmPattern::new(
            "Ballad Pulse",
            style,
            4.0,
            vec![
                RhythmHit::new(0.0, 0.75, Bass).held(4.0),
                RhythmHit::new(1.0, 0.55, RightHand).held(1.0),
                RhythmHit::new(2.5, 0.5, RightHand).held(1.5),
            ],
            "Sustained bass with soft upper-structure fills",
        )?
        .with_tempo_range(0.0, 100.0)],
        Style::Latin => vec![
            RhythmPattern::new(
                "Bossa",
                style,
                4.0,
                vec![
                    RhythmHit::new(0.0, 0.85, Full).held(1.5),
                    RhythmHit::new(1.5, 0.7, RightHand).held(1.0),
                    RhythmHit::new(3.0, 0.75, Full).held(0.5),
                ],
                "Bossa nova comp",
            )?,
            RhythmPattern::new(
                "Montuno Push",
                style,
                4.0,
                vec![
                    RhythmHit::new(0.0, 0.8, Bass).held(1.0),
                    RhythmHit::new(1.5, 0.75, Full).held(1.0),
                    RhythmHit::new(3.5, 0.85, Full),
                ],
                "Montuno figure pushing into the next bar",
            )?,
        ],
        Style::Funk => vec![RhythmPattern::new(
            "Sixteenth Stabs",
            style,
            4.0,
            vec![
                RhythmHit::new(0.0, 0.9, Full).held(0.25),
                RhythmHit::new(0.75, 0.7, RightHand).held(0.25),
                RhythmHit::new(1.5, 0.75, RightHand).held(0.25),
                RhythmHit::new(2.5, 0.8, Full).held(0.25),
                RhythmHit::new(3.25, 0.65, RightHand).held(0.25),
            ],
            "Short sixteenth-note stabs",
        )?
        .with_tempo_range(60.0, 130.0)],
        Style::Gospel => vec![RhythmPattern::new(
            "Gospel Shuffle",
            style,
            4.0,
            vec![
                RhythmHit::new(0.0, 0.85, Bass).held(1.0),
                RhythmHit::new(0.5, 0.6, RightHand).held(0.5),
                RhythmHit::new(1.0, 0.75, RightHand).held(0.5),
                RhythmHit::new(1.5, 0.6, RightHand).held(0.5),
                RhythmHit::new(2.0, 0.8, Bass).held(1.0),
                RhythmHit::new(2.5, 0.6, RightHand).held(0.5),
                RhythmHit::new(3.0, 0.75, RightHand).held(0.5),
                RhythmHit::new(3.5, 0.7, RightHand),
            ],
            "Shuffled eighths over a walking bass",
        )?
        .with_swing(STANDARD_SWING)?
        .with_tempo_range(50.0, 160.0)],
        Style::Robotic => Vec::new(),
    };
    Ok(patterns)
}

// ============================================================================
// Pattern Library
// ============================================================================

/// Read-only pattern catalog keyed by style and name
///
/// Built once and shared behind an `Arc`; nothing mutates it afterwards.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: Vec<Arc<RhythmPattern>>,
    by_key: HashMap<String, usize>,
    by_style: HashMap<Style, Vec<usize>>,
}

impl PatternLibrary {
    /// Canonical shapes plus style extras for every style
    pub fn standard() -> Result<Self> {
        let mut all = Vec::new();
        for style in Style::ALL {
            all.extend(canonical_patterns(style)?);
            all.extend(style_patterns(style)?);
        }
        Ok(Self::from_patterns(all))
    }

    /// Build from explicit patterns; a repeated style/name keeps the first
    pub fn from_patterns(patterns: impl IntoIterator<Item = RhythmPattern>) -> Self {
        let mut library = Self::default();
        for pattern in patterns {
            let key = pattern.key();
            if library.by_key.contains_key(&key) {
                warn!(%key, "Duplicate rhythm pattern ignored");
                continue;
            }
            let idx = library.patterns.len();
            library.by_style.entry(pattern.style()).or_default().push(idx);
            library.by_key.insert(key, idx);
            library.patterns.push(Arc::new(pattern));
        }
        library
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// All patterns of a style, in registration order
    pub fn get_patterns(&self, style: Style) -> Vec<Arc<RhythmPattern>> {
        self.by_style
            .get(&style)
            .map(|idxs| idxs.iter().map(|&i| self.patterns[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, style: Style, name: &str) -> Option<Arc<RhythmPattern>> {
        self.get_pattern(&pattern_key(style, name))
    }

    /// Look up by `style/name` key, or by bare name with the default style first
    pub fn get_pattern(&self, key: &str) -> Option<Arc<RhythmPattern>> {
        if let Some(&i) = self.by_key.get(key) {
            return Some(self.patterns[i].clone());
        }
        if key.contains('/') {
            return None;
        }
        std::iter::once(Style::default())
            .chain(Style::ALL)
            .find_map(|style| self.get(style, key))
    }

    /// Patterns of a style suited to a tempo; every style pattern if none fit
    pub fn patterns(&self, style: Style, bpm: f64) -> Vec<Arc<RhythmPattern>> {
        let all = self.get_patterns(style);
        let suited: Vec<_> = all.iter().filter(|p| p.suits_tempo(bpm)).cloned().collect();
        if suited.is_empty() { all } else { suited }
    }

    /// Patterns of a style no busier than `max_hits_per_beat`
    pub fn by_density(&self, style: Style, max_hits_per_beat: f64) -> Vec<Arc<RhythmPattern>> {
        self.get_patterns(style)
            .into_iter()
            .filter(|p| p.density() <= max_hits_per_beat + EPSILON)
            .collect()
    }
}
