//! Two-way (sex × orientation) ANOVA over the wide comparison table
//!
//! For every vowel and formant the four group columns are melted into long
//! form and fitted with the fixed-effects model `y ~ Sex * Orientation`. Sums
//! of squares are Type II, obtained by comparing least-squares fits:
//!
//! | Effect            | Sum of squares                          |
//! |-------------------|-----------------------------------------|
//! | `Sex`             | RSS(Orientation) - RSS(Sex + Orientation) |
//! | `Orientation`     | RSS(Sex) - RSS(Sex + Orientation)       |
//! | `Sex:Orientation` | RSS(Sex + Orientation) - RSS(full)      |
//! | `Residual`        | RSS(full)                               |
//!
//! The comparison works for unbalanced cells as well.
//!
//! Effects are labelled with the model term names `C(Sex)`, `C(Orientation)`
//! and `C(Sex):C(Orientation)` so summaries line up with existing sheets.

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::wide::{group_columns, Orientation, Sex, WideTable};
use crate::{FrequencyUnit, Result, VowelError};

pub const SEX_EFFECT: &str = "C(Sex)";
pub const ORIENTATION_EFFECT: &str = "C(Orientation)";
pub const INTERACTION_EFFECT: &str = "C(Sex):C(Orientation)";
pub const RESIDUAL: &str = "Residual";

/// Vowels, formants and scale to test
#[derive(Debug, Clone, PartialEq)]
pub struct AnovaConfig {
    pub vowels: Vec<String>,
    pub formants: Vec<String>,
    pub scale: FrequencyUnit,
}

impl Default for AnovaConfig {
    fn default() -> Self {
        Self {
            vowels: vec!["æ".to_string(), "ɛ".to_string()],
            formants: vec!["F1".to_string(), "F2".to_string()],
            scale: FrequencyUnit::Bark,
        }
    }
}

/// One speaker's value from one group column
#[derive(Debug, Clone, PartialEq)]
pub struct LongObservation {
    pub value: f64,
    pub column: String,
    pub sex: Sex,
    pub orientation: Orientation,
}

/// Reshape group columns into long form, deriving both factors from the
/// column names; empty cells are skipped
///
/// # Errors
/// `MissingColumn` for an absent column, `UnknownSexCategory` for a column
/// name without `_M_` or `_W_`.
pub fn melt(table: &WideTable, columns: &[String]) -> Result<Vec<LongObservation>> {
    let mut observations = Vec::new();
    for column in columns {
        let sex = Sex::from_column(column)?;
        let orientation = Orientation::from_column(column);
        observations.extend(table.column(column)?.into_iter().flatten().map(|value| LongObservation {
            value,
            column: column.clone(),
            sex,
            orientation,
        }));
    }
    Ok(observations)
}

/// Test statistics of one model term
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectTest {
    pub sum_sq: f64,
    pub df: f64,
    pub f: f64,
    pub p_value: f64,
}

/// Type II ANOVA table of the two-factor model
#[derive(Debug, Clone, PartialEq)]
pub struct AnovaTable {
    pub sex: EffectTest,
    pub orientation: EffectTest,
    pub interaction: EffectTest,
    pub residual_sum_sq: f64,
    pub residual_df: f64,
}

impl AnovaTable {
    /// Output rows in the order sex, orientation, interaction, residual
    pub fn rows(&self, vowel: &str, formant: &str) -> Vec<AnovaRow> {
        let effect_row = |effect: &str, test: &EffectTest| AnovaRow {
            vowel: vowel.to_string(),
            formant: formant.to_string(),
            effect: effect.to_string(),
            sum_sq: test.sum_sq,
            df: test.df,
            f: Some(test.f),
            p_value: Some(test.p_value),
        };

        vec![
            effect_row(SEX_EFFECT, &self.sex),
            effect_row(ORIENTATION_EFFECT, &self.orientation),
            effect_row(INTERACTION_EFFECT, &self.interaction),
            AnovaRow {
                vowel: vowel.to_string(),
                formant: formant.to_string(),
                effect: RESIDUAL.to_string(),
                sum_sq: self.residual_sum_sq,
                df: self.residual_df,
                f: None,
                p_value: None,
            },
        ]
    }
}

/// One line of the ANOVA summary CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaRow {
    #[serde(rename = "Vowel")]
    pub vowel: String,
    #[serde(rename = "Formant")]
    pub formant: String,
    #[serde(rename = "Effect")]
    pub effect: String,
    pub sum_sq: f64,
    pub df: f64,
    #[serde(rename = "F")]
    pub f: Option<f64>,
    pub p_value: Option<f64>,
}

/// Model terms, as indicator columns
#[derive(Clone, Copy)]
enum Term {
    Intercept,
    Women,
    LgbtqPlus,
    Interaction,
}

impl Term {
    fn value(self, obs: &LongObservation) -> f64 {
        let women = f64::from(u8::from(obs.sex == Sex::Women));
        let lgbtq = f64::from(u8::from(obs.orientation == Orientation::LgbtqPlus));
        match self {
            Term::Intercept => 1.0,
            Term::Women => women,
            Term::LgbtqPlus => lgbtq,
            Term::Interaction => women * lgbtq,
        }
    }
}

/// Residual sum of squares of the least-squares fit on `terms`
fn residual_sum_sq(observations: &[LongObservation], terms: &[Term]) -> Result<f64> {
    let n = observations.len();
    let design = DMatrix::from_fn(n, terms.len(), |i, j| terms[j].value(&observations[i]));
    let y = DVector::from_iterator(n, observations.iter().map(|o| o.value));

    let beta = design
        .clone()
        .svd(true, true)
        .solve(&y, 1e-12)
        .map_err(|e| VowelError::Analysis(format!("least-squares fit failed: {e}")))?;
    let residuals = y - design * beta;
    Ok(residuals.norm_squared())
}

/// Two-way fixed-effects ANOVA with interaction, Type II sums of squares
///
/// # Errors
/// `InvalidParameter` if a sex × orientation cell is empty or there are no
/// residual degrees of freedom left.
pub fn two_way_anova(observations: &[LongObservation]) -> Result<AnovaTable> {
    for sex in Sex::ALL {
        for orientation in Orientation::ALL {
            if !observations
                .iter()
                .any(|o| o.sex == sex && o.orientation == orientation)
            {
                return Err(VowelError::InvalidParameter(format!(
                    "no observations for {orientation} {sex}"
                )));
            }
        }
    }
    let n = observations.len();
    if n <= 4 {
        return Err(VowelError::InvalidParameter(format!(
            "{n} observations leave no residual degrees of freedom for a 2x2 design"
        )));
    }

    use Term::*;
    let rss_full = residual_sum_sq(observations, &[Intercept, Women, LgbtqPlus, Interaction])?;
    let rss_main = residual_sum_sq(observations, &[Intercept, Women, LgbtqPlus])?;
    let rss_sex = residual_sum_sq(observations, &[Intercept, Women])?;
    let rss_orientation = residual_sum_sq(observations, &[Intercept, LgbtqPlus])?;

    let residual_df = (n - 4) as f64;
    let mean_sq_residual = rss_full / residual_df;
    let test = |sum_sq: f64| -> Result<EffectTest> {
        // Differences of nearly equal fits can dip below zero
        let sum_sq = sum_sq.max(0.0);
        let f = sum_sq / mean_sq_residual;
        let distribution = FisherSnedecor::new(1.0, residual_df)
            .map_err(|e| VowelError::Analysis(format!("F distribution: {e}")))?;
        Ok(EffectTest {
            sum_sq,
            df: 1.0,
            f,
            p_value: distribution.sf(f),
        })
    };

    Ok(AnovaTable {
        sex: test(rss_orientation - rss_main)?,
        orientation: test(rss_sex - rss_main)?,
        interaction: test(rss_main - rss_full)?,
        residual_sum_sq: rss_full,
        residual_df,
    })
}

/// Run the ANOVA for every configured vowel × formant, vowels outermost
pub fn run(table: &WideTable, config: &AnovaConfig) -> Result<Vec<AnovaRow>> {
    let mut rows = Vec::new();
    for vowel in &config.vowels {
        for formant in &config.formants {
            let columns = group_columns(vowel, formant, config.scale);
            let observations = melt(table, &columns)?;
            let anova = two_way_anova(&observations)?;
            log::info!(
                "/{vowel}/ {formant}: Sex F = {:.3} (p = {:.3}), Orientation F = {:.3} (p = {:.3}), interaction F = {:.3} (p = {:.3})",
                anova.sex.f,
                anova.sex.p_value,
                anova.orientation.f,
                anova.orientation.p_value,
                anova.interaction.f,
                anova.interaction.p_value
            );
            rows.extend(anova.rows(vowel, formant));
        }
    }
    Ok(rows)
}

/// Write the ANOVA summary CSV (`Vowel,Formant,Effect,sum_sq,df,F,p_value`)
pub fn write_summary<P: AsRef<Path>>(path: P, rows: &[AnovaRow]) -> Result<()> {
    crate::aggregate::write_table(path, rows)
}
