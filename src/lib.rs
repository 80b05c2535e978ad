//! vowelspace: vowel formant measurement and comparison
//!
//! The crate covers a small acoustic-phonetics pipeline. Each stage reads a
//! file, transforms a table and writes a file; stages only meet through CSV.
//!
//! # Stages
//!
//! - [`extract`] - F1/F2 at the midpoint of every labelled vowel interval,
//!   using a Burg LPC [`Formant`] track over a [`Sound`] and a [`TextGrid`]
//! - [`aggregate`] - per speaker/vowel means, plus Hertz to Bark conversion
//! - [`anova`] - two-way (sex × orientation) ANOVA over a [`WideTable`]
//! - [`plot`] - vowel-space charts with mean glyphs and [`ConfidenceEllipse`]s

pub mod sound;
pub mod window;
pub mod interpolation;
pub mod formant;
pub mod textgrid;
pub mod extract;
pub mod aggregate;
pub mod wide;
pub mod anova;
pub mod ellipse;
pub mod plot;

pub mod utils;

// Re-export main types at crate root
pub use sound::Sound;
pub use interpolation::Interpolation;
pub use formant::{Formant, FormantSettings};
pub use textgrid::{Interval, IntervalTier, TextGrid};
pub use extract::{DirectoryExtraction, Extraction, ExtractConfig, FormantRow};
pub use aggregate::{AggregateConfig, BarkAggregate, SpeakerAggregate, UnmatchedSpeaker};
pub use wide::WideTable;
pub use anova::{AnovaConfig, AnovaRow, AnovaTable};
pub use ellipse::ConfidenceEllipse;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur anywhere in the pipeline
#[derive(Error, Debug)]
pub enum VowelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV decoding error: {0}")]
    WavDecode(#[from] hound::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("{kind} file not found: {}", path.display())]
    FileNotFound { kind: &'static str, path: PathBuf },

    #[error("Data directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Tier named '{name}' not found in TextGrid (available tiers: {})", available.join(", "))]
    TierNotFound { name: String, available: Vec<String> },

    #[error("Tier '{0}' is a point tier, expected an interval tier")]
    NotAnIntervalTier(String),

    #[error("TextGrid parse error at line {line}: {message}")]
    TextGrid { line: usize, message: String },

    #[error("Column '{0}' not found in table")]
    MissingColumn(String),

    #[error("No speaker id in file name '{file}' (expected '<name>_speech...')")]
    UnmatchedSpeaker { file: String },

    #[error("Cannot derive sex category from column '{column}'")]
    UnknownSexCategory { column: String },

    #[error("Refusing to overwrite input file {} in place", .0.display())]
    InPlaceOverwrite(PathBuf),

    #[error("Plotting error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, VowelError>;

/// Frequency scales formant values are reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyUnit {
    #[default]
    Hertz,
    Bark,
}

impl FrequencyUnit {
    /// Convert a frequency in Hz to this unit
    pub fn from_hertz(self, hz: f64) -> f64 {
        match self {
            FrequencyUnit::Hertz => hz,
            FrequencyUnit::Bark => hz_to_bark(hz),
        }
    }

    /// Convert from this unit to Hz
    pub fn to_hertz(self, value: f64) -> f64 {
        match self {
            FrequencyUnit::Hertz => value,
            FrequencyUnit::Bark => bark_to_hz(value),
        }
    }

    /// Column suffix used in the wide comparison table (`F1Bark`, `F2Hz`, ...)
    pub fn suffix(self) -> &'static str {
        match self {
            FrequencyUnit::Hertz => "Hz",
            FrequencyUnit::Bark => "Bark",
        }
    }
}

/// Hz to Bark: 7 · asinh(f / 650)
fn hz_to_bark(hz: f64) -> f64 {
    let x = hz / 650.0;
    7.0 * (x + (x * x + 1.0).sqrt()).ln()
}

fn bark_to_hz(bark: f64) -> f64 {
    650.0 * (bark / 7.0).sinh()
}

/// Round to `decimals` places, ties to even
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hz_bark_roundtrip() {
        for hz in [100.0, 440.0, 1000.0, 5000.0] {
            let bark = FrequencyUnit::Bark.from_hertz(hz);
            assert_relative_eq!(FrequencyUnit::Bark.to_hertz(bark), hz, epsilon = 1e-9);
            assert_eq!(FrequencyUnit::Hertz.to_hertz(hz), hz);
        }
    }

    #[test]
    fn test_bark_reference_values() {
        // 650 Hz sits at 7·asinh(1)
        assert_relative_eq!(FrequencyUnit::Bark.from_hertz(650.0), 6.169_615, epsilon = 1e-5);
        assert_relative_eq!(FrequencyUnit::Bark.from_hertz(0.0), 0.0);
        // Typical adult /æ/ F1 lands around 7 Bark
        let f1 = FrequencyUnit::Bark.from_hertz(800.0);
        assert!(f1 > 7.0 && f1 < 7.5, "{f1}");
    }

    #[test]
    fn test_unit_suffix() {
        assert_eq!(FrequencyUnit::Bark.suffix(), "Bark");
        assert_eq!(FrequencyUnit::Hertz.suffix(), "Hz");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(610.004, 2), 610.0);
        assert_eq!(round_to(1234.5678, 2), 1234.57);
        // Exact binary ties go to the even digit
        assert_eq!(round_to(610.125, 2), 610.12);
        assert_eq!(round_to(610.375, 2), 610.38);
        assert_eq!(round_to(-2.5, 0), -2.0);
    }
}
