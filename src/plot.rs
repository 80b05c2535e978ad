//! Vowel-space charts: one panel for men, one for women
//!
//! Both axes run the way vowel charts are read: F2 falls from left to right
//! and F1 grows downwards. Plotters has no reversed axis, so charts are built
//! on `(-F2, -F1)` and the tick labels are negated back.
//!
//! - [`plot_means`] puts the vowel symbol at each group's mean
//! - [`plot_ellipses`] adds a 2-SD [`ConfidenceEllipse`] under every mean and
//!   a legend across the top

use std::path::Path;
use std::str::FromStr;

use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};

use crate::ellipse::ConfidenceEllipse;
use crate::wide::{column_name, Orientation, Sex, WideTable};
use crate::{FrequencyUnit, Result, VowelError};

type Panel<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const DIM_GRAY: RGBColor = RGBColor(105, 105, 105);
const YELLOW: RGBColor = RGBColor(255, 255, 0);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const DARK_RED: RGBColor = RGBColor(139, 0, 0);
const DARK_ORANGE: RGBColor = RGBColor(255, 140, 0);
const DARK_BLUE: RGBColor = RGBColor(0, 0, 139);
const DARK_VIOLET: RGBColor = RGBColor(148, 0, 211);

const FONT: &str = "sans-serif";

/// One of the four speaker groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    pub orientation: Orientation,
    pub sex: Sex,
}

impl Group {
    /// Straight men, gay men, straight women, gay women
    pub const ALL: [Group; 4] = [
        Group { orientation: Orientation::Straight, sex: Sex::Men },
        Group { orientation: Orientation::LgbtqPlus, sex: Sex::Men },
        Group { orientation: Orientation::Straight, sex: Sex::Women },
        Group { orientation: Orientation::LgbtqPlus, sex: Sex::Women },
    ];

    /// Legend label, e.g. `Straight men`
    pub fn label(&self) -> String {
        format!(
            "{} {}",
            self.orientation.column_prefix(),
            self.sex.to_string().to_lowercase()
        )
    }

    fn is_straight(&self) -> bool {
        self.orientation == Orientation::Straight
    }

    /// Glyph colour in the means chart
    fn mean_color(&self) -> RGBColor {
        if self.is_straight() {
            BLACK
        } else {
            DIM_GRAY
        }
    }

    fn ellipse_color(&self) -> RGBColor {
        match (self.orientation, self.sex) {
            (Orientation::Straight, Sex::Men) => RED,
            (Orientation::LgbtqPlus, Sex::Men) => YELLOW,
            (Orientation::Straight, Sex::Women) => BLUE,
            (Orientation::LgbtqPlus, Sex::Women) => PURPLE,
        }
    }

    /// Darker shade of the ellipse colour, readable on white
    fn text_color(&self) -> RGBColor {
        match (self.orientation, self.sex) {
            (Orientation::Straight, Sex::Men) => DARK_RED,
            (Orientation::LgbtqPlus, Sex::Men) => DARK_ORANGE,
            (Orientation::Straight, Sex::Women) => DARK_BLUE,
            (Orientation::LgbtqPlus, Sex::Women) => DARK_VIOLET,
        }
    }

    /// Straight groups are bold, gay groups italic
    fn font_style(&self) -> FontStyle {
        if self.is_straight() {
            FontStyle::Bold
        } else {
            FontStyle::Italic
        }
    }
}

impl FromStr for Group {
    type Err = VowelError;

    /// Accepts labels such as `Straight Men`, `gay women` or `Gay_W`
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        let orientation = if lower.contains("straight") {
            Orientation::Straight
        } else if lower.contains("gay") || lower.contains("lgbtq") {
            Orientation::LgbtqPlus
        } else {
            return Err(VowelError::InvalidParameter(format!("no orientation in group '{s}'")));
        };
        // "women" contains "men", so test it first
        let sex = if lower.contains("women") || lower.ends_with("_w") {
            Sex::Women
        } else if lower.contains("men") || lower.ends_with("_m") {
            Sex::Men
        } else {
            return Err(VowelError::InvalidParameter(format!("no sex category in group '{s}'")));
        };
        Ok(Group { orientation, sex })
    }
}

/// A group's mean position for one vowel
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPoint {
    pub group: Group,
    pub vowel: String,
    pub f1: f64,
    pub f2: f64,
}

/// CSV layout of group points: `group,vowel,F1,F2`
#[derive(Debug, Serialize, Deserialize)]
struct PointRecord {
    group: String,
    vowel: String,
    #[serde(rename = "F1")]
    f1: f64,
    #[serde(rename = "F2")]
    f2: f64,
}

/// Per-speaker values of one group and vowel
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub group: Group,
    pub vowel: String,
    pub f1: Vec<f64>,
    pub f2: Vec<f64>,
}

/// Figure geometry and axis ranges
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    /// Visible F2 range `(low, high)`; drawn high on the left
    pub f2_range: (f64, f64),
    /// Visible F1 range `(low, high)`; drawn low at the top
    pub f1_range: (f64, f64),
    pub scale: FrequencyUnit,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    /// Vowel glyph size in points
    pub glyph_pt: f64,
    /// Ellipse size in standard deviations
    pub n_std: f64,
    pub ellipse_segments: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            f2_range: (10.5, 13.5),
            f1_range: (5.0, 8.5),
            scale: FrequencyUnit::Bark,
            width_in: 10.0,
            height_in: 5.0,
            dpi: 100,
            glyph_pt: 16.0,
            n_std: 2.0,
            ellipse_segments: 100,
        }
    }
}

impl PlotConfig {
    /// Ranges and glyph size of the means chart
    pub fn means() -> Self {
        Self {
            f2_range: (11.0, 13.0),
            f1_range: (5.0, 8.0),
            glyph_pt: 18.0,
            ..Self::default()
        }
    }

    /// Output size in pixels
    pub fn pixels(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (
            (self.width_in * dpi).round().max(1.0) as u32,
            (self.height_in * dpi).round().max(1.0) as u32,
        )
    }

    fn pt_to_px(&self, points: f64) -> f64 {
        points * f64::from(self.dpi) / 72.0
    }

    fn validate(&self) -> Result<()> {
        let valid_range = |(low, high): (f64, f64)| low.is_finite() && high.is_finite() && low < high;
        if !valid_range(self.f1_range) || !valid_range(self.f2_range) {
            return Err(VowelError::InvalidParameter(format!(
                "axis ranges must be increasing, got F1 {:?} and F2 {:?}",
                self.f1_range, self.f2_range
            )));
        }
        if self.dpi == 0 || self.width_in <= 0.0 || self.height_in <= 0.0 {
            return Err(VowelError::InvalidParameter("figure size must be positive".to_string()));
        }
        Ok(())
    }
}

fn plot_error<E: std::fmt::Display>(err: E) -> VowelError {
    VowelError::Plot(err.to_string())
}

/// Extra space around a plotting area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Margins {
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
}

/// Margins that leave a plotting area with the same units per pixel on both
/// axes, centred in the space not `reserved` for labels and caption
fn equal_aspect_margins(panel: (u32, u32), reserved: (u32, u32), x_span: f64, y_span: f64, base: u32) -> Margins {
    let avail_w = panel.0.saturating_sub(reserved.0 + 2 * base) as f64;
    let avail_h = panel.1.saturating_sub(reserved.1 + 2 * base) as f64;
    let px_per_unit = (avail_w / x_span).min(avail_h / y_span);
    let extra_w = (avail_w - x_span * px_per_unit).max(0.0);
    let extra_h = (avail_h - y_span * px_per_unit).max(0.0);

    let half = |extra: f64| (extra / 2.0).floor() as u32;
    Margins {
        left: base + half(extra_w),
        right: base + (extra_w as u32 - half(extra_w)),
        top: base + half(extra_h),
        bottom: base + (extra_h as u32 - half(extra_h)),
    }
}

/// Set up one panel: caption, reversed axes, ticks without grid lines
fn build_panel<'a, 'b>(
    area: &'a DrawingArea<BitMapBackend<'b>, Shift>,
    sex: Sex,
    config: &PlotConfig,
) -> Result<Panel<'a, 'b>> {
    let caption_px = config.pt_to_px(14.0);
    let label_px = config.pt_to_px(10.0);
    let x_label_area = (3.5 * label_px) as u32;
    let y_label_area = (4.5 * label_px) as u32;
    let (f2_low, f2_high) = config.f2_range;
    let (f1_low, f1_high) = config.f1_range;

    let margins = equal_aspect_margins(
        area.dim_in_pixel(),
        (y_label_area, x_label_area + (1.5 * caption_px) as u32),
        f2_high - f2_low,
        f1_high - f1_low,
        (0.1 * f64::from(config.dpi)) as u32,
    );

    let mut chart = ChartBuilder::on(area)
        .caption(sex.to_string(), (FONT, caption_px).into_font())
        .margin_left(margins.left)
        .margin_right(margins.right)
        .margin_top(margins.top)
        .margin_bottom(margins.bottom)
        .x_label_area_size(x_label_area)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(-f2_high..-f2_low, -f1_high..-f1_low)
        .map_err(plot_error)?;

    let unit = config.scale.suffix();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(format!("F2 ({unit})"))
        .y_desc(format!("F1 ({unit})"))
        .x_label_formatter(&|v| format!("{:.1}", -v))
        .y_label_formatter(&|v| format!("{:.1}", -v))
        .label_style((FONT, label_px).into_font())
        .axis_desc_style((FONT, label_px * 1.2).into_font())
        .draw()
        .map_err(plot_error)?;
    Ok(chart)
}

/// Vowel symbol centred on `(F2, F1)`
fn glyph(
    vowel: &str,
    f2: f64,
    f1: f64,
    size_px: f64,
    style: FontStyle,
    color: &RGBColor,
) -> Text<'static, (f64, f64), String> {
    let font = (FONT, size_px)
        .into_font()
        .style(style)
        .color(color)
        .pos(Pos::new(HPos::Center, VPos::Center));
    Text::new(vowel.to_string(), (-f2, -f1), font)
}

/// Chart variant A: vowel symbols at group means
pub fn plot_means<P: AsRef<Path>>(points: &[GroupPoint], config: &PlotConfig, path: P) -> Result<()> {
    config.validate()?;
    let path = path.as_ref();
    let root = BitMapBackend::new(path, config.pixels()).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let glyph_px = config.pt_to_px(config.glyph_pt);
    for (area, sex) in root.split_evenly((1, 2)).iter().zip(Sex::ALL) {
        let mut chart = build_panel(area, sex, config)?;
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.group.sex == sex)
                    .map(|p| glyph(&p.vowel, p.f2, p.f1, glyph_px, FontStyle::Normal, &p.group.mean_color())),
            )
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    log::info!("Saved vowel means plot to {}", path.display());
    Ok(())
}

/// Chart variant B: confidence ellipses with styled mean symbols
pub fn plot_ellipses<P: AsRef<Path>>(conditions: &[Condition], config: &PlotConfig, path: P) -> Result<()> {
    config.validate()?;
    let path = path.as_ref();
    let root = BitMapBackend::new(path, config.pixels()).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let legend_px = (config.pt_to_px(10.0) * 3.0) as u32;
    let (legend_area, body) = root.split_vertically(legend_px);
    draw_legend(&legend_area, config)?;

    let glyph_px = config.pt_to_px(config.glyph_pt);
    for (area, sex) in body.split_evenly((1, 2)).iter().zip(Sex::ALL) {
        let mut chart = build_panel(area, sex, config)?;

        for condition in conditions.iter().filter(|c| c.group.sex == sex) {
            let n = condition.f1.len().min(condition.f2.len());
            if n == 0 {
                log::warn!("{} /{}/: no values, nothing to draw", condition.group.label(), condition.vowel);
                continue;
            }
            let (f1, f2) = (&condition.f1[..n], &condition.f2[..n]);

            if n >= 2 {
                let ellipse = ConfidenceEllipse::fit(f2, f1, config.n_std)?;
                let outline: Vec<(f64, f64)> = ellipse
                    .outline(config.ellipse_segments)
                    .into_iter()
                    .map(|(x, y)| (-x, -y))
                    .collect();
                let mut closed = outline.clone();
                closed.extend(outline.first().copied());

                let fill = condition.group.ellipse_color().mix(0.25).filled();
                chart
                    .draw_series(std::iter::once(Polygon::new(outline, fill)))
                    .map_err(plot_error)?;
                chart
                    .draw_series(std::iter::once(PathElement::new(closed, BLACK.stroke_width(1))))
                    .map_err(plot_error)?;
            } else {
                log::warn!(
                    "{} /{}/: a single speaker, no ellipse drawn",
                    condition.group.label(),
                    condition.vowel
                );
            }

            let mean_f1 = f1.iter().sum::<f64>() / n as f64;
            let mean_f2 = f2.iter().sum::<f64>() / n as f64;
            chart
                .draw_series(std::iter::once(glyph(
                    &condition.vowel,
                    mean_f2,
                    mean_f1,
                    glyph_px,
                    condition.group.font_style(),
                    &condition.group.text_color(),
                )))
                .map_err(plot_error)?;
        }
    }

    root.present().map_err(plot_error)?;
    log::info!("Saved vowel ellipse plot to {}", path.display());
    Ok(())
}

/// Colour patches with group names, in one centred row
fn draw_legend(area: &DrawingArea<BitMapBackend<'_>, Shift>, config: &PlotConfig) -> Result<()> {
    let font_px = config.pt_to_px(10.0);
    let (width, height) = area.dim_in_pixel();
    let patch = (2.0 * font_px) as i32;
    let gap = (0.5 * font_px) as i32;
    let entry_width = |label: &str| patch + gap + (0.6 * font_px * label.chars().count() as f64) as i32 + 2 * gap;

    let labels: Vec<String> = Group::ALL.iter().map(Group::label).collect();
    let total: i32 = labels.iter().map(|l| entry_width(l.as_str())).sum();
    let mut x = ((width as i32 - total) / 2).max(0);
    let y_mid = height as i32 / 2;
    let half_patch = (0.35 * font_px) as i32;

    for (group, label) in Group::ALL.iter().zip(&labels) {
        let corners = [(x, y_mid - half_patch), (x + patch, y_mid + half_patch)];
        area.draw(&Rectangle::new(corners, group.ellipse_color().mix(0.25).filled()))
            .map_err(plot_error)?;
        area.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))
            .map_err(plot_error)?;
        let style = TextStyle::from((FONT, font_px).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
        area.draw(&Text::new(label.clone(), (x + patch + gap, y_mid), style))
            .map_err(plot_error)?;
        x += entry_width(label.as_str());
    }
    Ok(())
}

/// Read group means from a CSV with columns `group,vowel,F1,F2`
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<GroupPoint>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VowelError::FileNotFound {
            kind: "points",
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<PointRecord>()
        .map(|record| -> Result<GroupPoint> {
            let record = record?;
            Ok(GroupPoint {
                group: record.group.parse()?,
                vowel: record.vowel,
                f1: record.f1,
                f2: record.f2,
            })
        })
        .collect()
}

/// Group means of every vowel from the wide table
pub fn means_from_table(table: &WideTable, vowels: &[String], scale: FrequencyUnit) -> Result<Vec<GroupPoint>> {
    let mut points = Vec::new();
    for vowel in vowels {
        for group in Group::ALL {
            let f1_column = column_name(group.orientation, group.sex, vowel, "F1", scale);
            let f2_column = column_name(group.orientation, group.sex, vowel, "F2", scale);
            match (table.mean(&f1_column)?, table.mean(&f2_column)?) {
                (Some(f1), Some(f2)) => points.push(GroupPoint {
                    group,
                    vowel: vowel.clone(),
                    f1,
                    f2,
                }),
                _ => log::warn!("{} /{vowel}/: no values in {f1_column} / {f2_column}", group.label()),
            }
        }
    }
    Ok(points)
}

/// Per-speaker F1/F2 of every vowel and group from the wide table
pub fn conditions_from_table(table: &WideTable, vowels: &[String], scale: FrequencyUnit) -> Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    for vowel in vowels {
        for group in Group::ALL {
            let (f1, f2) = table.paired(
                &column_name(group.orientation, group.sex, vowel, "F1", scale),
                &column_name(group.orientation, group.sex, vowel, "F2", scale),
            )?;
            conditions.push(Condition {
                group,
                vowel: vowel.clone(),
                f1,
                f2,
            });
        }
    }
    Ok(conditions)
}
