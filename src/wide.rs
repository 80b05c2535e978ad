//! Wide comparison table: one row per speaker, one column per group and measure
//!
//! Column names follow `{group}_{sex}_{vowel}_{formant}{scale}`, for example
//! `Straight_M_æ_F1Bark` or `Gay_W_ɛ_F2Hz`. The sheet is assembled by hand and
//! may end with summary rows (e.g. p-values), so only the first
//! `speaker_rows` data rows are read.

use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::{FrequencyUnit, Result, VowelError};

/// Number of speaker rows in the comparison sheet
pub const DEFAULT_SPEAKER_ROWS: usize = 10;

/// Orientation factor; columns use `Straight` and `Gay`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Orientation {
    Straight,
    LgbtqPlus,
}

impl Orientation {
    pub const ALL: [Orientation; 2] = [Orientation::Straight, Orientation::LgbtqPlus];

    /// Group prefix in column names
    pub fn column_prefix(self) -> &'static str {
        match self {
            Orientation::Straight => "Straight",
            Orientation::LgbtqPlus => "Gay",
        }
    }

    /// Factor level derived from a column name: any name containing `Gay`
    /// belongs to the LGBTQ+ group
    pub fn from_column(column: &str) -> Self {
        if column.contains("Gay") {
            Orientation::LgbtqPlus
        } else {
            Orientation::Straight
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Straight => "Straight",
            Orientation::LgbtqPlus => "LGBTQ+",
        })
    }
}

/// Sex factor; columns use `M` and `W`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sex {
    Men,
    Women,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Men, Sex::Women];

    pub fn code(self) -> &'static str {
        match self {
            Sex::Men => "M",
            Sex::Women => "W",
        }
    }

    /// Factor level derived from a column name (`_M_` or `_W_`)
    ///
    /// # Errors
    /// `UnknownSexCategory` if the name carries neither marker.
    pub fn from_column(column: &str) -> Result<Self> {
        if column.contains("_M_") {
            Ok(Sex::Men)
        } else if column.contains("_W_") {
            Ok(Sex::Women)
        } else {
            Err(VowelError::UnknownSexCategory {
                column: column.to_string(),
            })
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sex::Men => "Men",
            Sex::Women => "Women",
        })
    }
}

/// Column name for one group and measure
///
/// ```
/// use vowelspace::wide::{column_name, Orientation, Sex};
/// use vowelspace::FrequencyUnit;
///
/// let name = column_name(Orientation::Straight, Sex::Men, "æ", "F1", FrequencyUnit::Bark);
/// assert_eq!(name, "Straight_M_æ_F1Bark");
/// ```
pub fn column_name(group: Orientation, sex: Sex, vowel: &str, formant: &str, scale: FrequencyUnit) -> String {
    format!(
        "{}_{}_{}_{}{}",
        group.column_prefix(),
        sex.code(),
        vowel,
        formant,
        scale.suffix()
    )
}

/// The four group columns of one vowel and formant, ordered
/// Straight men, LGBTQ+ men, Straight women, LGBTQ+ women
pub fn group_columns(vowel: &str, formant: &str, scale: FrequencyUnit) -> Vec<String> {
    Sex::ALL
        .iter()
        .flat_map(|&sex| {
            Orientation::ALL
                .iter()
                .map(move |&group| column_name(group, sex, vowel, formant, scale))
        })
        .collect()
}

/// Speaker rows of the comparison sheet, cells kept as text until queried
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl WideTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read the header and the first `speaker_rows` rows of a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, speaker_rows: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VowelError::FileNotFound {
                kind: "wide table",
                path: path.to_path_buf(),
            });
        }
        let table = Self::from_reader(std::fs::File::open(path)?, speaker_rows)?;
        log::debug!(
            "read {} speaker rows and {} columns from {}",
            table.num_rows(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, speaker_rows: usize) -> Result<Self> {
        // Trailing summary rows may have fewer cells
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let rows = reader
            .records()
            .take(speaker_rows)
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect::<Vec<String>>()))
            .collect::<std::result::Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Numeric values of a column; empty cells are `None`
    ///
    /// # Errors
    /// `MissingColumn` if no column has that name, `InvalidParameter` for a
    /// cell that is not a number.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let index = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| VowelError::MissingColumn(name.to_string()))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let cell = cells.get(index).map_or("", |c| c.trim());
                if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                    return Ok(None);
                }
                cell.parse::<f64>().map(Some).map_err(|_| {
                    VowelError::InvalidParameter(format!(
                        "column '{name}', row {}: '{cell}' is not a number",
                        row + 1
                    ))
                })
            })
            .collect()
    }

    /// Mean of the defined values of a column, `None` if it has none
    pub fn mean(&self, name: &str) -> Result<Option<f64>> {
        let values: Vec<f64> = self.column(name)?.into_iter().flatten().collect();
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }

    /// Rows where both columns are defined, as two parallel vectors
    pub fn paired(&self, x: &str, y: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let (xs, ys) = (self.column(x)?, self.column(y)?);
        Ok(xs
            .into_iter()
            .zip(ys)
            .filter_map(|pair| match pair {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            })
            .unzip())
    }
}
