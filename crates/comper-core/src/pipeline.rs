//! End-to-end comping: voicings, per-measure patterns, humanized notes

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chord::Progression;
use crate::config::ComperConfig;
use crate::density::DensitySelector;
use crate::error::Result;
use crate::random::{seeded, RandomSource};
use crate::renderer::{HumanizedRenderer, Performance};
use crate::rhythm::{PatternLibrary, RhythmPattern};
use crate::voice_leading::VoiceLeadingOptimizer;
use crate::voicing::Voicing;

/// Configured comping pipeline over a shared pattern catalog
#[derive(Debug, Clone)]
pub struct Comper {
    config: ComperConfig,
    library: Arc<PatternLibrary>,
    optimizer: VoiceLeadingOptimizer,
    selector: DensitySelector,
    renderer: HumanizedRenderer,
}

impl Comper {
    pub fn new(config: ComperConfig, library: Arc<PatternLibrary>) -> Result<Self> {
        config.validate()?;
        let optimizer = VoiceLeadingOptimizer::new(config.voice_leading);
        let selector = DensitySelector::new(Arc::clone(&library), config.density);
        let renderer = HumanizedRenderer::new(config.renderer_config());
        info!(
            style = config.style.id(),
            patterns = library.len(),
            "Comper configured"
        );
        Ok(Self {
            config,
            library,
            optimizer,
            selector,
            renderer,
        })
    }

    pub fn config(&self) -> &ComperConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    pub fn optimizer(&self) -> &VoiceLeadingOptimizer {
        &self.optimizer
    }

    /// Random source for [`Comper::perform`], seeded from the config when set
    pub fn rng(&self) -> fastrand::Rng {
        match self.config.seed {
            Some(seed) => seeded(seed),
            None => fastrand::Rng::new(),
        }
    }

    /// Voice-led voicings, one per chord event
    pub fn voice(&self, progression: &Progression) -> Vec<Voicing> {
        self.optimizer.optimize_progression(&progression.events)
    }

    fn fallback(&self) -> Option<Arc<RhythmPattern>> {
        let name = self.config.fallback_pattern.as_deref()?;
        let pattern = self.library.get(self.config.style, name);
        if pattern.is_none() {
            warn!(style = self.config.style.id(), name, "Fallback pattern not in catalog");
        }
        pattern
    }

    /// Pattern governing each chord event, chosen per measure
    pub fn plan_patterns<R: RandomSource>(
        &self,
        progression: &Progression,
        rng: &mut R,
    ) -> Result<Vec<Option<Arc<RhythmPattern>>>> {
        let fallback = self.fallback();
        let mut plan = vec![None; progression.len()];

        for measure in progression.measures() {
            let mut pattern = self.selector.select_pattern_for_density(
                self.config.style,
                measure.chord_count,
                measure.longest_duration,
                progression.beats_per_measure,
                fallback.clone(),
                rng,
            );
            if let (Some(swing), Some(p)) = (self.config.swing, pattern.as_ref()) {
                pattern = Some(Arc::new(p.with_swing(swing)?));
            }
            debug!(
                measure = measure.index,
                chords = measure.chord_count,
                pattern = pattern.as_ref().map_or("none", |p| p.name()),
                "Measure pattern selected"
            );
            let span = measure.first_event..measure.first_event + measure.chord_count;
            for slot in &mut plan[span] {
                *slot = pattern.clone();
            }
        }
        Ok(plan)
    }

    /// Voice, plan and render a progression
    pub fn perform<R: RandomSource>(
        &self,
        progression: &Progression,
        rng: &mut R,
    ) -> Result<Performance> {
        progression.validate()?;
        if progression.is_empty() {
            return Ok(Performance::default());
        }

        let voicings = self.voice(progression);
        let plan = self.plan_patterns(progression, rng)?;
        let patterns: Vec<Option<&RhythmPattern>> = plan.iter().map(|p| p.as_deref()).collect();
        let events = self
            .renderer
            .render_with_patterns(progression, &voicings, &patterns, rng)?;

        let performance = Performance {
            events,
            loop_length: progression.length_beats(),
        };
        info!(
            chords = progression.len(),
            notes = performance.events.len(),
            loop_length = performance.loop_length,
            "Performance rendered"
        );
        Ok(performance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{Chord, ChordQuality};
    use crate::feel::Style;
    use crate::rhythm::{QUARTER_NOTE, SYNCOPATED};

    fn comper(config: ComperConfig) -> Comper {
        Comper::new(config, Arc::new(PatternLibrary::standard().unwrap())).unwrap()
    }

    fn starts(performance: &Performance) -> Vec<f64> {
        let mut s: Vec<f64> = performance.events.iter().map(|n| n.start).collect();
        s.dedup();
        s
    }

    fn chords(durations: &[f64]) -> Progression {
        let roots = [2, 7, 0, 9, 5, 10];
        Progression::sequential(
            durations
                .iter()
                .enumerate()
                .map(|(i, &d)| (Chord::new(roots[i % roots.len()], ChordQuality::Dominant7), d))
                .collect(),
            4.0,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_progression() {
        let comper = comper(ComperConfig::default());
        let progression = Progression::new(Vec::new(), 4.0).unwrap();
        let performance = comper.perform(&progression, &mut seeded(1)).unwrap();
        assert!(performance.is_empty());
        assert_eq!(performance.loop_length, 0.0);
    }

    #[test]
    fn test_dense_measure_plays_chord_starts() {
        let comper = comper(ComperConfig::for_style(Style::Robotic));
        let performance = comper
            .perform(&chords(&[1.0, 1.0, 1.0, 1.0]), &mut seeded(1))
            .unwrap();
        assert_eq!(starts(&performance), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(performance.loop_length, 4.0);
    }

    #[test]
    fn test_fallback_fills_open_measures() {
        let progression = chords(&[1.0, 1.0, 2.0]);
        let plain = comper(ComperConfig::for_style(Style::Robotic));
        let performance = plain.perform(&progression, &mut seeded(1)).unwrap();
        assert_eq!(starts(&performance), vec![0.0, 1.0, 2.0]);

        let quarters = comper(ComperConfig {
            fallback_pattern: Some(QUARTER_NOTE.into()),
            ..ComperConfig::for_style(Style::Robotic)
        });
        let performance = quarters.perform(&progression, &mut seeded(1)).unwrap();
        assert_eq!(starts(&performance), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_swing_override() {
        let comper = comper(ComperConfig {
            swing: Some(0.25),
            ..ComperConfig::for_style(Style::Robotic)
        });
        let progression = chords(&[2.0, 2.0]);
        let plan = comper.plan_patterns(&progression, &mut seeded(1)).unwrap();
        let pattern = plan[0].as_ref().unwrap();
        assert_eq!(pattern.name(), SYNCOPATED);
        assert_eq!(pattern.swing(), 0.25);

        let performance = comper.perform(&progression, &mut seeded(1)).unwrap();
        assert_eq!(starts(&performance), vec![0.75, 2.0]);
    }

    #[test]
    fn test_configured_seed_repeats() {
        let comper = comper(ComperConfig {
            seed: Some(11),
            ..ComperConfig::for_style(Style::Swing)
        });
        let progression = chords(&[4.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
        let a = comper.perform(&progression, &mut comper.rng()).unwrap();
        let b = comper.perform(&progression, &mut comper.rng()).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ComperConfig {
            swing: Some(1.0),
            ..ComperConfig::default()
        };
        assert!(Comper::new(config, Arc::new(PatternLibrary::default())).is_err());
    }
}
