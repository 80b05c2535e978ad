//! End-to-end run of the measurement stages on a synthetic recording:
//! extraction over a directory, per-speaker means, then Bark conversion.

use std::f64::consts::PI;
use std::path::Path;

use vowelspace::aggregate::{self, read_aggregates};
use vowelspace::extract::{self, read_rows};
use vowelspace::textgrid::Tier;
use vowelspace::{AggregateConfig, ExtractConfig, FrequencyUnit, Interval, IntervalTier, TextGrid, VowelError};

const SAMPLE_RATE: u32 = 16000;

/// Glottal pulses through a cascade of resonators at (700, 1220, 2600) Hz
fn synthetic_vowel(duration: f64) -> Vec<f64> {
    let sample_rate = SAMPLE_RATE as f64;
    let n = (duration * sample_rate).round() as usize;
    let period = (sample_rate / 120.0).round() as usize;

    let mut tilt = 0.0;
    let mut signal: Vec<f64> = (0..n)
        .map(|i| {
            let pulse = if i % period == 0 { 1.0 } else { 0.0 };
            tilt = pulse + 0.95 * tilt;
            tilt
        })
        .collect();

    for (frequency, bandwidth) in [(700.0, 80.0), (1220.0, 90.0), (2600.0, 120.0)] {
        let r = (-PI * bandwidth / sample_rate).exp();
        let (a1, a2) = (2.0 * r * (2.0 * PI * frequency / sample_rate).cos(), -r * r);
        let gain = 1.0 - a1 - a2;
        let (mut y1, mut y2) = (0.0, 0.0);
        for s in signal.iter_mut() {
            let y = gain * *s + a1 * y1 + a2 * y2;
            y2 = y1;
            y1 = y;
            *s = y;
        }
    }

    let peak = signal.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    signal.iter().map(|v| 0.8 * v / peak).collect()
}

fn write_wav(path: &Path, samples: &[f64]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * i16::MAX as f64) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn annotation(intervals: &[(f64, f64, &str)]) -> TextGrid {
    let xmax = intervals.last().map_or(0.0, |i| i.1);
    TextGrid {
        xmin: 0.0,
        xmax,
        tiers: vec![Tier::Interval(IntervalTier {
            name: "vowels".to_string(),
            xmin: 0.0,
            xmax,
            intervals: intervals
                .iter()
                .map(|&(start, end, label)| Interval {
                    start,
                    end,
                    label: label.to_string(),
                })
                .collect(),
        })],
    }
}

#[test]
fn test_extract_aggregate_bark() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let samples = synthetic_vowel(0.9);
    write_wav(&data.join("anjali_speech.wav"), &samples);
    annotation(&[(0.0, 0.1, ""), (0.1, 0.4, "æ"), (0.4, 0.5, " "), (0.5, 0.8, "æ"), (0.8, 0.9, "")])
        .save(data.join("anjali_speech.TextGrid"))
        .unwrap();
    // No annotation: reported as skipped, not an error
    write_wav(&data.join("bongani_speech.wav"), &samples);

    let extraction = extract::extract_directory(&data, &ExtractConfig::default()).unwrap();
    assert_eq!(extraction.files_processed.len(), 1);
    assert_eq!(extraction.skipped.len(), 1);
    assert_eq!(extraction.rows.len(), 2);
    assert!(extraction.dropped.is_empty());
    for row in &extraction.rows {
        assert_eq!(row.file, "anjali_speech.wav");
        assert!((row.f1_hz - 700.0).abs() < 100.0, "F1 = {}", row.f1_hz);
    }

    let tokens = dir.path().join("formants_all_participants.csv");
    extract::write_rows(&tokens, &extraction.rows).unwrap();
    assert_eq!(read_rows(&tokens).unwrap(), extraction.rows);

    let by_speaker = dir.path().join("formants_by_participant.csv");
    let aggregates = aggregate::aggregate_file(&tokens, &by_speaker, &AggregateConfig::default()).unwrap();
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].participant, "anjali");
    assert_eq!(aggregates[0].vowel_label, "æ");
    assert!((aggregates[0].f1_hz - 700.0).abs() < 100.0);
    assert_eq!(read_aggregates(&by_speaker).unwrap(), aggregates);

    let bark = dir.path().join("formants_by_participant_bark.csv");
    let converted = aggregate::bark_file(&by_speaker, &bark).unwrap();
    assert_eq!(converted.len(), 1);
    let expected = FrequencyUnit::Bark.from_hertz(aggregates[0].f1_hz);
    assert!((converted[0].f1_bark - expected).abs() < 1e-9);

    let header = std::fs::read_to_string(&bark).unwrap();
    assert!(header.starts_with("participant,vowel_label,F1_Hz,F2_Hz,F1_Bark,F2_Bark"));
}

#[test]
fn test_aggregate_refuses_to_overwrite_input() {
    let dir = tempfile::tempdir().unwrap();
    let tokens = dir.path().join("formants.csv");
    extract::write_rows(&tokens, &[]).unwrap();

    assert!(matches!(
        aggregate::aggregate_file(&tokens, &tokens, &AggregateConfig::default()),
        Err(VowelError::InPlaceOverwrite(_))
    ));
}
