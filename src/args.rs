use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

use vowelspace::{FormantSettings, FrequencyUnit, UnmatchedSpeaker};

/// Logging verbosity.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Logging options.
#[derive(Args, Clone, Debug)]
pub struct LoggingOpt {
    /// The logging level to use.
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info, ignore_case = true, global = true)]
    pub log_level: LogLevel,
}

/// Frequency scale of the wide table columns.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    Hz,
    Bark,
}

impl From<Scale> for FrequencyUnit {
    fn from(scale: Scale) -> Self {
        match scale {
            Scale::Hz => FrequencyUnit::Hertz,
            Scale::Bark => FrequencyUnit::Bark,
        }
    }
}

/// Handling of file names without a `<name>_speech` prefix.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnmatchedOpt {
    /// Stop with an error.
    Error,
    /// Leave the row out.
    Drop,
    /// Group the row under the participant "unknown".
    Unknown,
}

impl From<UnmatchedOpt> for UnmatchedSpeaker {
    fn from(opt: UnmatchedOpt) -> Self {
        match opt {
            UnmatchedOpt::Error => UnmatchedSpeaker::Error,
            UnmatchedOpt::Drop => UnmatchedSpeaker::Drop,
            UnmatchedOpt::Unknown => UnmatchedSpeaker::Unknown,
        }
    }
}

/// Burg formant analysis settings.
#[derive(Args, Clone, Debug)]
pub struct FormantOpt {
    /// Seconds between analysis frames (0 = a quarter of the window length).
    #[arg(long, default_value_t = 0.0)]
    pub time_step: f64,

    /// Number of formants to track.
    #[arg(long, default_value_t = 5)]
    pub num_formants: usize,

    /// Formant ceiling in Hz (~5500 for female or mixed speakers, ~5000 for male).
    #[arg(long, default_value_t = 5500.0)]
    pub max_formant: f64,

    /// Analysis window length in seconds.
    #[arg(long, default_value_t = 0.025)]
    pub window_length: f64,

    /// Pre-emphasis corner frequency in Hz.
    #[arg(long, default_value_t = 50.0)]
    pub pre_emphasis: f64,
}

impl From<&FormantOpt> for FormantSettings {
    fn from(opt: &FormantOpt) -> Self {
        FormantSettings {
            time_step: opt.time_step,
            max_formants: opt.num_formants,
            max_formant_hz: opt.max_formant,
            window_length: opt.window_length,
            pre_emphasis_from: opt.pre_emphasis,
        }
    }
}

/// Formant extraction at vowel interval midpoints.
#[derive(Args, Clone, Debug)]
pub struct ExtractOpt {
    /// A directory of recordings with matching TextGrids, or a single recording.
    #[arg(value_hint = ValueHint::AnyPath, default_value = "data")]
    pub input: PathBuf,

    /// TextGrid for a single recording (defaults to the recording's stem + .TextGrid).
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub textgrid: Option<PathBuf>,

    /// The output CSV file.
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "formants_all_participants.csv")]
    pub output: PathBuf,

    /// Name of the interval tier holding the vowel labels.
    #[arg(long, default_value = "vowels")]
    pub tier: String,

    /// Extension of the audio files to pick up in a directory.
    #[arg(long, default_value = "wav")]
    pub audio_extension: String,

    #[command(flatten)]
    pub formant: FormantOpt,
}

/// Per speaker and vowel means of extracted formants.
#[derive(Args, Clone, Debug)]
pub struct AggregateOpt {
    /// Formant estimate CSV written by `extract`.
    #[arg(value_hint = ValueHint::FilePath, default_value = "formants_all_participants.csv")]
    pub input: PathBuf,

    /// The output CSV file; must differ from the input.
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "formants_by_participant.csv")]
    pub output: PathBuf,

    /// What to do with file names that carry no speaker id.
    #[arg(long, value_enum, default_value_t = UnmatchedOpt::Error)]
    pub unmatched: UnmatchedOpt,
}

/// Adds Bark columns to a speaker aggregate CSV.
#[derive(Args, Clone, Debug)]
pub struct BarkOpt {
    /// Speaker aggregate CSV written by `aggregate`.
    #[arg(value_hint = ValueHint::FilePath, default_value = "formants_by_participant.csv")]
    pub input: PathBuf,

    /// The output CSV file.
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "formants_by_participant_bark.csv")]
    pub output: PathBuf,
}

/// Wide comparison table input.
#[derive(Args, Clone, Debug)]
pub struct TableOpt {
    /// Number of speaker rows at the top of the table.
    #[arg(long, default_value_t = vowelspace::wide::DEFAULT_SPEAKER_ROWS)]
    pub speaker_rows: usize,

    /// Vowels to include.
    #[arg(long, value_delimiter = ',', default_values_t = ["æ".to_string(), "ɛ".to_string()])]
    pub vowels: Vec<String>,

    /// Scale suffix of the table columns.
    #[arg(long, value_enum, default_value_t = Scale::Bark)]
    pub scale: Scale,
}

/// Two-way ANOVA (sex × orientation) per vowel and formant.
#[derive(Args, Clone, Debug)]
pub struct AnovaOpt {
    /// The wide comparison table.
    #[arg(value_hint = ValueHint::FilePath, default_value = "vowel_data_wide.csv")]
    pub table: PathBuf,

    /// The output CSV file.
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "anova_summary_table.csv")]
    pub output: PathBuf,

    /// Formants to test.
    #[arg(long, value_delimiter = ',', default_values_t = ["F1".to_string(), "F2".to_string()])]
    pub formants: Vec<String>,

    #[command(flatten)]
    pub table_opt: TableOpt,
}

/// Figure size options.
#[derive(Args, Clone, Debug)]
pub struct FigureOpt {
    /// The output PNG file.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Figure width in inches.
    #[arg(long, default_value_t = 10.0)]
    pub width: f64,

    /// Figure height in inches.
    #[arg(long, default_value_t = 5.0)]
    pub height: f64,

    /// Resolution in dots per inch.
    #[arg(long, default_value_t = 100)]
    pub dpi: u32,
}

/// Vowel symbols at each group's mean.
#[derive(Args, Clone, Debug)]
pub struct MeansOpt {
    /// CSV of group means with columns group,vowel,F1,F2.
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "table", required_unless_present = "table")]
    pub points: Option<PathBuf>,

    /// Wide comparison table to take the group means from.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub table: Option<PathBuf>,

    #[command(flatten)]
    pub table_opt: TableOpt,

    #[command(flatten)]
    pub figure: FigureOpt,
}

/// Confidence ellipses per group with styled mean symbols.
#[derive(Args, Clone, Debug)]
pub struct EllipsesOpt {
    /// The wide comparison table.
    #[arg(value_hint = ValueHint::FilePath, default_value = "vowel_data_wide.csv")]
    pub table: PathBuf,

    /// Ellipse size in standard deviations.
    #[arg(long, default_value_t = 2.0)]
    pub n_std: f64,

    #[command(flatten)]
    pub table_opt: TableOpt,

    #[command(flatten)]
    pub figure: FigureOpt,
}

/// Chart variants.
#[derive(Subcommand, Clone, Debug)]
pub enum PlotOpt {
    Means(MeansOpt),
    Ellipses(EllipsesOpt),
}

/// Pipeline stages.
#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    Extract(ExtractOpt),
    Aggregate(AggregateOpt),
    Bark(BarkOpt),
    Anova(AnovaOpt),
    #[command(subcommand)]
    Plot(PlotOpt),
}

/// Vowel formant measurement and group comparison.
#[derive(Parser, Clone, Debug)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub log_opt: LoggingOpt,

    #[command(subcommand)]
    pub command: Command,
}
