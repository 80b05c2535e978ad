//! Formant extraction at the midpoint of every labelled vowel interval
//!
//! One Burg formant track is computed over the whole recording. Each labelled
//! interval on the vowel tier is then queried for F1 and F2 at its midpoint.
//! Tokens where either formant is undefined are dropped from the rows and
//! listed separately, so the loss stays visible.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::formant::FormantSettings;
use crate::textgrid::TextGrid;
use crate::{FrequencyUnit, Interpolation, Result, Sound, VowelError};

/// Column names of the formant estimate CSV
pub const ROW_HEADER: [&str; 5] = ["file", "vowel_label", "t_mid_s", "F1_Hz", "F2_Hz"];

/// Settings for a single extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    /// Interval tier that holds the vowel labels
    pub tier_name: String,
    /// Extension of the audio files picked up by [`extract_directory`]
    pub audio_extension: String,
    pub formant: FormantSettings,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            tier_name: "vowels".to_string(),
            audio_extension: "wav".to_string(),
            formant: FormantSettings::default(),
        }
    }
}

/// One vowel token: F1/F2 at the interval midpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormantRow {
    /// File name of the recording (no directory)
    pub file: String,
    pub vowel_label: String,
    pub t_mid_s: f64,
    #[serde(rename = "F1_Hz")]
    pub f1_hz: f64,
    #[serde(rename = "F2_Hz")]
    pub f2_hz: f64,
}

/// A labelled interval whose F1 or F2 was undefined at the midpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedToken {
    pub file: String,
    pub label: String,
    pub t_mid_s: f64,
}

/// Result of extracting one audio/annotation pair
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub rows: Vec<FormantRow>,
    pub dropped: Vec<DroppedToken>,
}

/// Result of extracting every pair in a directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryExtraction {
    pub rows: Vec<FormantRow>,
    /// Audio files that had an annotation and were analysed
    pub files_processed: Vec<PathBuf>,
    /// Audio files without a matching annotation
    pub skipped: Vec<PathBuf>,
    pub dropped: Vec<DroppedToken>,
}

impl DirectoryExtraction {
    /// True when no file produced any row
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extract F1/F2 for every labelled interval of one recording
///
/// # Errors
/// `FileNotFound` when either file is missing, `TierNotFound` when the
/// annotation lacks the configured tier, or any decoding/analysis error.
pub fn extract_file<P: AsRef<Path>, Q: AsRef<Path>>(
    audio: P,
    annotation: Q,
    config: &ExtractConfig,
) -> Result<Extraction> {
    let audio = audio.as_ref();
    let annotation = annotation.as_ref();
    for (kind, path) in [("audio", audio), ("annotation", annotation)] {
        if !path.exists() {
            return Err(VowelError::FileNotFound {
                kind,
                path: path.to_path_buf(),
            });
        }
    }

    let grid = TextGrid::from_file(annotation)?;
    // Fail on a missing tier before spending time on the analysis
    grid.interval_tier(&config.tier_name)?;
    let sound = Sound::from_file(audio)?;

    let file_name = audio
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| audio.display().to_string());
    extract_from(&sound, &grid, &file_name, config)
}

/// Extract F1/F2 from an already loaded recording and annotation
pub fn extract_from(
    sound: &Sound,
    grid: &TextGrid,
    file_name: &str,
    config: &ExtractConfig,
) -> Result<Extraction> {
    let tier = grid.interval_tier(&config.tier_name)?;
    let formant = sound.to_formant_burg(&config.formant)?;

    let mut extraction = Extraction::default();
    for interval in tier.labelled() {
        let label = interval.trimmed_label().to_string();
        let t_mid = interval.midpoint();
        let query = |n| formant.value_at_time(n, t_mid, FrequencyUnit::Hertz, Interpolation::Linear);

        match (query(1), query(2)) {
            (Some(f1_hz), Some(f2_hz)) => extraction.rows.push(FormantRow {
                file: file_name.to_string(),
                vowel_label: label,
                t_mid_s: t_mid,
                f1_hz,
                f2_hz,
            }),
            _ => {
                log::debug!("{file_name}: no F1/F2 for '{label}' at {t_mid:.3} s, dropping token");
                extraction.dropped.push(DroppedToken {
                    file: file_name.to_string(),
                    label,
                    t_mid_s: t_mid,
                });
            }
        }
    }

    if !extraction.dropped.is_empty() {
        log::warn!(
            "{file_name}: dropped {} of {} tokens with undefined formants",
            extraction.dropped.len(),
            extraction.dropped.len() + extraction.rows.len()
        );
    }
    Ok(extraction)
}

/// Annotation file next to `audio`: same stem with `.TextGrid` or `.textgrid`
pub fn annotation_for(audio: &Path) -> Option<PathBuf> {
    ["TextGrid", "textgrid"]
        .iter()
        .map(|ext| audio.with_extension(ext))
        .find(|candidate| candidate.exists())
}

/// Extract every audio/annotation pair in `dir`, in file name order
///
/// Audio files without an annotation are skipped with a warning. A directory
/// that yields no rows gives an empty result, not an error.
pub fn extract_directory<P: AsRef<Path>>(dir: P, config: &ExtractConfig) -> Result<DirectoryExtraction> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(VowelError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut audio_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&config.audio_extension))
        })
        .collect();
    audio_files.sort();

    let mut result = DirectoryExtraction::default();
    for audio in audio_files {
        let Some(annotation) = annotation_for(&audio) else {
            log::warn!("No TextGrid for {}, skipping", audio.display());
            result.skipped.push(audio);
            continue;
        };

        log::info!("Processing {}", audio.display());
        let extraction = extract_file(&audio, &annotation, config)?;
        result.rows.extend(extraction.rows);
        result.dropped.extend(extraction.dropped);
        result.files_processed.push(audio);
    }

    if result.is_empty() {
        log::warn!("No data extracted from {}; check the audio files and TextGrids", dir.display());
    } else {
        log::info!(
            "Extracted {} tokens from {} files ({} dropped, {} skipped)",
            result.rows.len(),
            result.files_processed.len(),
            result.dropped.len(),
            result.skipped.len()
        );
    }
    Ok(result)
}

/// Write formant rows as CSV; the header is written even when `rows` is empty
pub fn write_rows<P: AsRef<Path>>(path: P, rows: &[FormantRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(ROW_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a formant estimate CSV
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<FormantRow>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VowelError::FileNotFound {
            kind: "formant table",
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<FormantRow>, _>>()
        .map_err(VowelError::from)
}
