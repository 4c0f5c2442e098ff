//! comper-core: Voicing, voice leading, rhythm and humanized rendering for piano comping

pub mod chord;
pub mod config;
pub mod density;
mod error;
pub mod feel;
pub mod grid;
pub mod pipeline;
pub mod random;
pub mod renderer;
pub mod rhythm;
pub mod voice_leading;
pub mod voicing;

pub use chord::{Alteration, Chord, ChordEvent, ChordQuality, MeasureDensity, Progression, MIN_CHORD_DURATION};
pub use config::ComperConfig;
pub use density::{DensityPolicy, DensitySelector, SPARSE_WHOLE_NOTE_PROBABILITY};
pub use error::{ComperError, Result};
pub use feel::{Humanization, JazzRendererConfig, Style};
pub use grid::{apply_rhythm_pattern, phase_base, ScheduledHit};
pub use pipeline::Comper;
pub use random::{seeded, Gaussian, RandomSource, SequenceSource};
pub use renderer::{HumanizedRenderer, NoteEvent, Performance, ANTICIPATION_WINDOW};
pub use rhythm::{HitKind, PatternLibrary, RhythmHit, RhythmPattern, STANDARD_SWING};
pub use rhythm::{HALF_NOTE, QUARTER_NOTE, SYNCOPATED, WHOLE_NOTE};
pub use voice_leading::{transition_cost, Solution, VoiceLeadingOptimizer, VoiceLeadingWeights};
pub use voicing::{Hand, Voicing, VoicingFamily, VoicingGenerator, PIANO_HIGH, PIANO_LOW};
