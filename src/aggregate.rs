//! Per speaker and vowel averages of extracted formants
//!
//! The speaker is read from the recording's file name, which must start with
//! `<name>_speech` (e.g. `anjali_speech - take2.wav`). Means are rounded to
//! two decimals and rows come out sorted by `(participant, vowel_label)`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::extract::FormantRow;
use crate::{round_to, FrequencyUnit, Result, VowelError};

/// Participant name used for rows without a speaker id under [`UnmatchedSpeaker::Unknown`]
pub const UNKNOWN_SPEAKER: &str = "unknown";

/// What to do with a row whose file name carries no speaker id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedSpeaker {
    /// Fail with [`VowelError::UnmatchedSpeaker`]
    #[default]
    Error,
    /// Skip the row
    Drop,
    /// Group the row under [`UNKNOWN_SPEAKER`]
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    pub unmatched: UnmatchedSpeaker,
    /// Decimal places kept in the means
    pub decimals: i32,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            unmatched: UnmatchedSpeaker::Error,
            decimals: 2,
        }
    }
}

/// Mean F1/F2 of one speaker's tokens of one vowel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerAggregate {
    pub participant: String,
    pub vowel_label: String,
    #[serde(rename = "F1_Hz")]
    pub f1_hz: f64,
    #[serde(rename = "F2_Hz")]
    pub f2_hz: f64,
}

/// A [`SpeakerAggregate`] with its formants also on the Bark scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarkAggregate {
    pub participant: String,
    pub vowel_label: String,
    #[serde(rename = "F1_Hz")]
    pub f1_hz: f64,
    #[serde(rename = "F2_Hz")]
    pub f2_hz: f64,
    #[serde(rename = "F1_Bark")]
    pub f1_bark: f64,
    #[serde(rename = "F2_Bark")]
    pub f2_bark: f64,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Speaker id at the start of a file name: the word characters before the
/// last `_speech` of the leading word run
///
/// ```
/// use vowelspace::aggregate::speaker_id;
///
/// assert_eq!(speaker_id("anjali_speech - take2.wav"), Some("anjali"));
/// assert_eq!(speaker_id("take2.wav"), None);
/// ```
pub fn speaker_id(file: &str) -> Option<&str> {
    let run_end = file
        .char_indices()
        .find(|&(_, c)| !is_word_char(c))
        .map_or(file.len(), |(i, _)| i);
    let run = &file[..run_end];
    run.rmatch_indices("_speech")
        .map(|(i, _)| i)
        .find(|&i| i > 0)
        .map(|i| &run[..i])
}

/// Arithmetic means per key, sorted by key
fn group_means<I>(items: I, decimals: i32) -> Vec<SpeakerAggregate>
where
    I: IntoIterator<Item = (String, String, f64, f64)>,
{
    let mut groups: BTreeMap<(String, String), (f64, f64, usize)> = BTreeMap::new();
    for (participant, vowel, f1, f2) in items {
        let entry = groups.entry((participant, vowel)).or_insert((0.0, 0.0, 0));
        entry.0 += f1;
        entry.1 += f2;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|((participant, vowel_label), (f1_sum, f2_sum, count))| SpeakerAggregate {
            participant,
            vowel_label,
            f1_hz: round_to(f1_sum / count as f64, decimals),
            f2_hz: round_to(f2_sum / count as f64, decimals),
        })
        .collect()
}

/// Average formant rows per `(speaker, vowel)`
///
/// # Errors
/// `UnmatchedSpeaker` for a file name without a speaker id when the policy
/// is [`UnmatchedSpeaker::Error`].
pub fn aggregate(rows: &[FormantRow], config: &AggregateConfig) -> Result<Vec<SpeakerAggregate>> {
    let mut keyed = Vec::with_capacity(rows.len());
    let mut unmatched = 0usize;

    for row in rows {
        let participant = match (speaker_id(&row.file), config.unmatched) {
            (Some(id), _) => id.to_string(),
            (None, UnmatchedSpeaker::Error) => {
                return Err(VowelError::UnmatchedSpeaker {
                    file: row.file.clone(),
                })
            }
            (None, UnmatchedSpeaker::Drop) => {
                unmatched += 1;
                continue;
            }
            (None, UnmatchedSpeaker::Unknown) => {
                unmatched += 1;
                UNKNOWN_SPEAKER.to_string()
            }
        };
        keyed.push((participant, row.vowel_label.clone(), row.f1_hz, row.f2_hz));
    }

    if unmatched > 0 {
        let action = match config.unmatched {
            UnmatchedSpeaker::Drop => "dropped",
            _ => "grouped as 'unknown'",
        };
        log::warn!("{unmatched} rows without a '<name>_speech' file name were {action}");
    }

    Ok(group_means(keyed, config.decimals))
}

/// Group already aggregated rows again by `(participant, vowel_label)`
///
/// Aggregates have unique keys, so this returns its input unchanged.
pub fn regroup(aggregates: &[SpeakerAggregate], config: &AggregateConfig) -> Vec<SpeakerAggregate> {
    group_means(
        aggregates
            .iter()
            .map(|a| (a.participant.clone(), a.vowel_label.clone(), a.f1_hz, a.f2_hz)),
        config.decimals,
    )
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Read a formant estimate CSV, aggregate it and write the result to `output`
///
/// # Errors
/// `InPlaceOverwrite` when `output` is the input file.
pub fn aggregate_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &AggregateConfig,
) -> Result<Vec<SpeakerAggregate>> {
    let (input, output) = (input.as_ref(), output.as_ref());
    if same_file(input, output) {
        return Err(VowelError::InPlaceOverwrite(output.to_path_buf()));
    }

    let rows = crate::extract::read_rows(input)?;
    let aggregates = aggregate(&rows, config)?;
    write_table(output, &aggregates)?;
    log::info!(
        "Aggregated {} tokens into {} speaker/vowel rows",
        rows.len(),
        aggregates.len()
    );
    Ok(aggregates)
}

/// Add Bark values to every aggregate
pub fn to_bark(aggregates: &[SpeakerAggregate]) -> Vec<BarkAggregate> {
    aggregates
        .iter()
        .map(|a| BarkAggregate {
            participant: a.participant.clone(),
            vowel_label: a.vowel_label.clone(),
            f1_hz: a.f1_hz,
            f2_hz: a.f2_hz,
            f1_bark: FrequencyUnit::Bark.from_hertz(a.f1_hz),
            f2_bark: FrequencyUnit::Bark.from_hertz(a.f2_hz),
        })
        .collect()
}

/// Read a speaker aggregate CSV and write it back out with Bark columns
pub fn bark_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Vec<BarkAggregate>> {
    let (input, output) = (input.as_ref(), output.as_ref());
    if same_file(input, output) {
        return Err(VowelError::InPlaceOverwrite(output.to_path_buf()));
    }
    let converted = to_bark(&read_aggregates(input)?);
    write_table(output, &converted)?;
    Ok(converted)
}

/// Read a speaker aggregate CSV (`participant,vowel_label,F1_Hz,F2_Hz`)
pub fn read_aggregates<P: AsRef<Path>>(path: P) -> Result<Vec<SpeakerAggregate>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VowelError::FileNotFound {
            kind: "aggregate table",
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<SpeakerAggregate>, _>>()
        .map_err(VowelError::from)
}

/// Write serializable rows with a header row
pub fn write_table<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(file: &str, vowel: &str, f1: f64, f2: f64) -> FormantRow {
        FormantRow {
            file: file.to_string(),
            vowel_label: vowel.to_string(),
            t_mid_s: 0.5,
            f1_hz: f1,
            f2_hz: f2,
        }
    }

    fn sample_rows() -> Vec<FormantRow> {
        vec![
            row("maya_speech.wav", "ɛ", 550.0, 1900.0),
            row("anjali_speech - take2.wav", "æ", 600.0, 1700.0),
            row("anjali_speech - take2.wav", "ɛ", 500.0, 2000.0),
            row("anjali_speech - take1.wav", "æ", 620.0, 1750.347),
        ]
    }

    #[test]
    fn test_speaker_id() {
        assert_eq!(speaker_id("anjali_speech - take2.wav"), Some("anjali"));
        assert_eq!(speaker_id("anjali_speech - Anjali Camilla Mignone.wav"), Some("anjali"));
        assert_eq!(speaker_id("jo_ann_speech.wav"), Some("jo_ann"));
        assert_eq!(speaker_id("take2.wav"), None);
        assert_eq!(speaker_id("_speech.wav"), None);
        assert_eq!(speaker_id("anjali speech.wav"), None);
    }

    #[test]
    fn test_mean_and_rounding() {
        let aggregates = aggregate(&sample_rows(), &AggregateConfig::default()).unwrap();
        let ae = aggregates
            .iter()
            .find(|a| a.participant == "anjali" && a.vowel_label == "æ")
            .unwrap();

        assert_relative_eq!(ae.f1_hz, 610.0);
        // (1700 + 1750.347) / 2 = 1725.1735
        assert_relative_eq!(ae.f2_hz, 1725.17);
    }

    #[test]
    fn test_rounding_ties_go_to_even() {
        let rows = vec![
            row("lena_speech.wav", "æ", 610.0, 1800.5),
            row("lena_speech.wav", "æ", 610.25, 1800.25),
        ];
        let aggregates = aggregate(&rows, &AggregateConfig::default()).unwrap();

        // 610.125 and 1800.375 sit exactly halfway between two cents
        assert_eq!(aggregates[0].f1_hz, 610.12);
        assert_eq!(aggregates[0].f2_hz, 1800.38);
    }

    #[test]
    fn test_sorted_by_participant_then_vowel() {
        let aggregates = aggregate(&sample_rows(), &AggregateConfig::default()).unwrap();
        let keys: Vec<(&str, &str)> = aggregates
            .iter()
            .map(|a| (a.participant.as_str(), a.vowel_label.as_str()))
            .collect();
        assert_eq!(keys, vec![("anjali", "æ"), ("anjali", "ɛ"), ("maya", "ɛ")]);
    }

    #[test]
    fn test_regroup_is_fixed_point() {
        let config = AggregateConfig::default();
        let aggregates = aggregate(&sample_rows(), &config).unwrap();
        assert_eq!(regroup(&aggregates, &config), aggregates);
    }

    #[test]
    fn test_unmatched_speaker_policies() {
        let mut rows = sample_rows();
        rows.push(row("take2.wav", "æ", 700.0, 1600.0));

        assert!(matches!(
            aggregate(&rows, &AggregateConfig::default()),
            Err(VowelError::UnmatchedSpeaker { file }) if file == "take2.wav"
        ));

        let dropped = aggregate(
            &rows,
            &AggregateConfig {
                unmatched: UnmatchedSpeaker::Drop,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(dropped.len(), 3);

        let unknown = aggregate(
            &rows,
            &AggregateConfig {
                unmatched: UnmatchedSpeaker::Unknown,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(unknown.len(), 4);
        assert_eq!(unknown[3].participant, UNKNOWN_SPEAKER);
    }

    #[test]
    fn test_bark_columns() {
        let converted = to_bark(&[SpeakerAggregate {
            participant: "anjali".to_string(),
            vowel_label: "æ".to_string(),
            f1_hz: 650.0,
            f2_hz: 1700.0,
        }]);
        assert_relative_eq!(converted[0].f1_hz, 650.0);
        assert_relative_eq!(converted[0].f1_bark, 6.169_615, epsilon = 1e-5);
        assert!(converted[0].f2_bark > converted[0].f1_bark);
    }

    #[test]
    fn test_aggregate_file_refuses_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("formants.csv");
        crate::extract::write_rows(&input, &sample_rows()).unwrap();

        assert!(matches!(
            aggregate_file(&input, &input, &AggregateConfig::default()),
            Err(VowelError::InPlaceOverwrite(_))
        ));
        // The input is left untouched
        assert_eq!(crate::extract::read_rows(&input).unwrap().len(), 4);

        let output = dir.path().join("aggregates.csv");
        let written = aggregate_file(&input, &output, &AggregateConfig::default()).unwrap();
        assert_eq!(read_aggregates(&output).unwrap(), written);
        let header = std::fs::read_to_string(&output).unwrap();
        assert_eq!(header.lines().next(), Some("participant,vowel_label,F1_Hz,F2_Hz"));
    }
}
