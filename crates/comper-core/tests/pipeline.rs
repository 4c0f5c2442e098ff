use std::collections::BTreeMap;
use std::sync::Arc;

use comper_core::{
    seeded, Chord, ChordQuality, Comper, ComperConfig, ComperError, HumanizedRenderer,
    JazzRendererConfig, PatternLibrary, Progression, Style, VoiceLeadingOptimizer,
    VoicingGenerator, PIANO_HIGH, PIANO_LOW, SYNCOPATED,
};

fn two_five() -> Progression {
    Progression::sequential(
        vec![
            (Chord::new(2, ChordQuality::Minor7), 4.0),
            (Chord::new(7, ChordQuality::Dominant7), 4.0),
        ],
        4.0,
    )
    .unwrap()
}

#[test]
fn test_two_five_robotic_syncopated() {
    let progression = two_five();
    let voicings = VoiceLeadingOptimizer::default().optimize_progression(&progression.events);
    assert_eq!(voicings.len(), 2);

    let library = PatternLibrary::standard().unwrap();
    let pattern = library.get(Style::Robotic, SYNCOPATED).unwrap();
    let renderer = HumanizedRenderer::new(JazzRendererConfig::preset(Style::Robotic));
    let notes = renderer
        .render(&progression, &voicings, Some(pattern.as_ref()), &mut seeded(5))
        .unwrap();

    // Group notes by start; zero jitter means every note of a hit shares it
    let mut hits: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    for note in &notes {
        hits.entry(note.start.to_bits()).or_default().push(note.pitch);
    }
    let beats: Vec<f64> = hits.keys().map(|&b| f64::from_bits(b)).collect();
    assert_eq!(beats, vec![0.5, 2.0, 4.5, 6.0]);

    for (bits, pitches) in &hits {
        let beat = f64::from_bits(*bits);
        let voicing = if beat < 4.0 { &voicings[0] } else { &voicings[1] };
        assert_eq!(pitches.as_slice(), voicing.notes());
    }
}

#[test]
fn test_every_quality_voices_in_range() {
    let generator = VoicingGenerator::default();
    let qualities = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Dominant7,
        ChordQuality::Major7,
        ChordQuality::Minor7,
        ChordQuality::HalfDiminished,
        ChordQuality::Diminished7,
        ChordQuality::Augmented,
        ChordQuality::Sus4,
        ChordQuality::Dominant9,
    ];
    for quality in qualities {
        for root in 0..12 {
            let voicings = generator.generate(&Chord::new(root, quality));
            assert!(!voicings.is_empty());
            for v in &voicings {
                assert!(v.notes().iter().all(|&n| (PIANO_LOW..=PIANO_HIGH).contains(&n)));
            }
        }
    }
}

#[test]
fn test_full_pipeline_from_json() {
    let json = r#"{
        "events": [
            {"chord": {"root": 0, "quality": "Major7", "bass": null, "alterations": []}, "start": 0.0, "duration": 4.0},
            {"chord": {"root": 9, "quality": "Minor7", "bass": null, "alterations": []}, "start": 4.0, "duration": 2.0},
            {"chord": {"root": 2, "quality": "Minor7", "bass": null, "alterations": []}, "start": 6.0, "duration": 2.0},
            {"chord": {"root": 7, "quality": "Dominant7", "bass": null, "alterations": ["Flat9"]}, "start": 8.0, "duration": 4.0}
        ],
        "beats_per_measure": 4.0,
        "key": "C"
    }"#;
    let progression: Progression = serde_json::from_str(json).unwrap();
    progression.validate().unwrap();

    let comper = Comper::new(
        ComperConfig {
            seed: Some(99),
            ..ComperConfig::for_style(Style::Bebop)
        },
        Arc::new(PatternLibrary::standard().unwrap()),
    )
    .unwrap();
    let performance = comper.perform(&progression, &mut comper.rng()).unwrap();

    assert_eq!(performance.loop_length, 12.0);
    assert!(!performance.is_empty());
    assert!(performance.events.windows(2).all(|w| w[0].start <= w[1].start));
    assert!(performance.events.iter().all(|n| n.chord_index < progression.len()));

    let encoded = serde_json::to_string(&performance).unwrap();
    assert!(encoded.contains("loop_length"));
}

#[test]
fn test_out_of_range_root_is_an_error() {
    let json = r#"{
        "events": [
            {"chord": {"root": 250, "quality": "Dominant13", "bass": null, "alterations": []}, "start": 0.0, "duration": 4.0}
        ],
        "beats_per_measure": 4.0
    }"#;
    let progression: Progression = serde_json::from_str(json).unwrap();
    let comper = Comper::new(
        ComperConfig::for_style(Style::Robotic),
        Arc::new(PatternLibrary::standard().unwrap()),
    )
    .unwrap();
    let result = comper.perform(&progression, &mut seeded(3));
    assert!(matches!(result, Err(ComperError::InvalidInput(_))));
}
