//! Styles, humanization presets and renderer feel parameters

use serde::{Deserialize, Serialize};

/// Named comping style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Swing,
    Bebop,
    Ballad,
    Latin,
    Funk,
    Gospel,
    Robotic,
}

impl Style {
    pub const ALL: [Style; 7] = [
        Style::Swing,
        Style::Bebop,
        Style::Ballad,
        Style::Latin,
        Style::Funk,
        Style::Gospel,
        Style::Robotic,
    ];

    /// Lowercase identifier used in pattern keys and config files
    pub fn id(&self) -> &'static str {
        match self {
            Self::Swing => "swing",
            Self::Bebop => "bebop",
            Self::Ballad => "ballad",
            Self::Latin => "latin",
            Self::Funk => "funk",
            Self::Gospel => "gospel",
            Self::Robotic => "robotic",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Swing => "Swing",
            Self::Bebop => "Bebop",
            Self::Ballad => "Ballad",
            Self::Latin => "Latin",
            Self::Funk => "Funk",
            Self::Gospel => "Gospel",
            Self::Robotic => "Robotic",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id().eq_ignore_ascii_case(id))
    }

    /// Styles whose off-beats are swung
    pub fn is_swing_family(&self) -> bool {
        matches!(self, Self::Swing | Self::Bebop | Self::Gospel)
    }
}

/// How strongly the base feel parameters are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Humanization {
    Robotic,
    Tight,
    Natural,
    Loose,
    Expressive,
    #[default]
    StyleDefault,
}

impl Humanization {
    /// Multiplier on jitter, lay-back, push and strum
    pub fn scale(&self) -> f64 {
        match self {
            Self::Robotic => 0.0,
            Self::Tight => 0.5,
            Self::Natural | Self::StyleDefault => 1.0,
            Self::Loose => 1.5,
            Self::Expressive => 2.0,
        }
    }
}

/// Feel parameters of the humanized renderer
///
/// Timing values are in beats; velocity values on the 0.0-1.0 scale before
/// conversion to MIDI velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JazzRendererConfig {
    pub style: Style,
    /// Standard deviation of the per-hit timing offset
    pub timing_jitter: f64,
    /// Positive lays back behind the beat, negative pushes ahead
    pub lay_back: f64,
    /// Offset applied to anticipation hits instead of `lay_back`
    pub anticipation_push: f64,
    /// Delay between successive notes of a roll, 0 disables strumming
    pub strum: f64,
    /// Multiplier on sounding durations
    pub legato: f64,
    pub velocity_jitter: f64,
    pub duration_jitter: f64,
    /// Overall velocity scale applied to hit velocities
    pub dynamics: f64,
    /// Velocity added per octave above middle C
    pub brightness: f64,
    pub left_hand_attenuation: f64,
    /// Velocity added to the top voice
    pub melody_accent: f64,
}

impl Default for JazzRendererConfig {
    fn default() -> Self {
        Self::preset(Style::default())
    }
}

impl JazzRendererConfig {
    /// Base feel for a style
    pub fn preset(style: Style) -> Self {
        let swing = Self {
            style,
            timing_jitter: 0.015,
            lay_back: 0.02,
            anticipation_push: -0.03,
            strum: 0.008,
            legato: 0.9,
            velocity_jitter: 0.04,
            duration_jitter: 0.02,
            dynamics: 0.8,
            brightness: 0.03,
            left_hand_attenuation: 0.08,
            melody_accent: 0.06,
        };
        match style {
            Style::Swing => swing,
            Style::Bebop => Self {
                timing_jitter: 0.012,
                lay_back: 0.0,
                anticipation_push: -0.04,
                strum: 0.0,
                legato: 0.75,
                dynamics: 0.85,
                ..swing
            },
            Style::Ballad => Self {
                timing_jitter: 0.02,
                lay_back: 0.04,
                anticipation_push: -0.02,
                strum: 0.02,
                legato: 1.05,
                velocity_jitter: 0.03,
                dynamics: 0.65,
                melody_accent: 0.1,
                ..swing
            },
            Style::Latin => Self {
                timing_jitter: 0.01,
                lay_back: 0.0,
                strum: 0.0,
                legato: 0.85,
                ..swing
            },
            Style::Funk => Self {
                timing_jitter: 0.008,
                lay_back: -0.015,
                anticipation_push: -0.03,
                strum: 0.0,
                legato: 0.6,
                velocity_jitter: 0.05,
                dynamics: 0.9,
                ..swing
            },
            Style::Gospel => Self {
                timing_jitter: 0.015,
                lay_back: 0.03,
                strum: 0.012,
                legato: 0.95,
                dynamics: 0.85,
                melody_accent: 0.08,
                ..swing
            },
            Style::Robotic => Self {
                timing_jitter: 0.0,
                lay_back: 0.0,
                anticipation_push: 0.0,
                strum: 0.0,
                legato: 1.0,
                velocity_jitter: 0.0,
                duration_jitter: 0.0,
                brightness: 0.0,
                left_hand_attenuation: 0.0,
                melody_accent: 0.0,
                ..swing
            },
        }
    }

    /// Scale the stochastic and timing-bias parameters by a preset
    pub fn humanized(self, humanization: Humanization) -> Self {
        let k = humanization.scale();
        Self {
            timing_jitter: self.timing_jitter * k,
            lay_back: self.lay_back * k,
            anticipation_push: self.anticipation_push * k,
            strum: self.strum * k,
            velocity_jitter: self.velocity_jitter * k,
            duration_jitter: self.duration_jitter * k,
            ..self
        }
    }
}
