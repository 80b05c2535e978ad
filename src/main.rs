mod args;

use anyhow::{bail, Context};
use clap::Parser;
use log::info;

use args::{Cli, Command, EllipsesOpt, FigureOpt, MeansOpt, PlotOpt};
use vowelspace::plot::{self, PlotConfig};
use vowelspace::{aggregate, anova, extract, AggregateConfig, AnovaConfig, ExtractConfig, WideTable};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_opt.log_level.into())
        .init();

    match cli.command {
        Command::Extract(opt) => {
            let config = ExtractConfig {
                tier_name: opt.tier.clone(),
                audio_extension: opt.audio_extension.clone(),
                formant: (&opt.formant).into(),
            };

            let (rows, dropped) = if opt.input.is_dir() {
                let result = extract::extract_directory(&opt.input, &config)
                    .with_context(|| format!("extracting formants from {}", opt.input.display()))?;
                if !result.skipped.is_empty() {
                    info!("{} recordings had no TextGrid", result.skipped.len());
                }
                (result.rows, result.dropped.len())
            } else {
                let annotation = match &opt.textgrid {
                    Some(path) => path.clone(),
                    None => extract::annotation_for(&opt.input)
                        .unwrap_or_else(|| opt.input.with_extension("TextGrid")),
                };
                let result = extract::extract_file(&opt.input, &annotation, &config)
                    .with_context(|| format!("extracting formants from {}", opt.input.display()))?;
                (result.rows, result.dropped.len())
            };

            extract::write_rows(&opt.output, &rows)
                .with_context(|| format!("writing {}", opt.output.display()))?;
            info!(
                "Saved {} tokens to {} ({dropped} dropped with undefined formants)",
                rows.len(),
                opt.output.display()
            );
        }
        Command::Aggregate(opt) => {
            let config = AggregateConfig {
                unmatched: opt.unmatched.into(),
                ..Default::default()
            };
            let aggregates = aggregate::aggregate_file(&opt.input, &opt.output, &config)
                .with_context(|| format!("aggregating {}", opt.input.display()))?;
            info!("Saved {} rows to {}", aggregates.len(), opt.output.display());
        }
        Command::Bark(opt) => {
            let converted = aggregate::bark_file(&opt.input, &opt.output)
                .with_context(|| format!("converting {} to Bark", opt.input.display()))?;
            info!("Saved {} rows to {}", converted.len(), opt.output.display());
        }
        Command::Anova(opt) => {
            let table = WideTable::from_csv(&opt.table, opt.table_opt.speaker_rows)
                .with_context(|| format!("reading {}", opt.table.display()))?;
            let config = AnovaConfig {
                vowels: opt.table_opt.vowels.clone(),
                formants: opt.formants.clone(),
                scale: opt.table_opt.scale.into(),
            };
            let rows = anova::run(&table, &config).context("running ANOVA")?;
            anova::write_summary(&opt.output, &rows)
                .with_context(|| format!("writing {}", opt.output.display()))?;
            info!("Saved {} ANOVA rows to {}", rows.len(), opt.output.display());
        }
        Command::Plot(PlotOpt::Means(opt)) => plot_means(&opt)?,
        Command::Plot(PlotOpt::Ellipses(opt)) => plot_ellipses(&opt)?,
    }
    Ok(())
}

fn figure_config(base: PlotConfig, figure: &FigureOpt, scale: vowelspace::FrequencyUnit) -> PlotConfig {
    PlotConfig {
        width_in: figure.width,
        height_in: figure.height,
        dpi: figure.dpi,
        scale,
        ..base
    }
}

fn plot_means(opt: &MeansOpt) -> anyhow::Result<()> {
    let scale = opt.table_opt.scale.into();
    let points = match (&opt.points, &opt.table) {
        (Some(path), _) => plot::read_points(path).with_context(|| format!("reading {}", path.display()))?,
        (None, Some(path)) => {
            let table = WideTable::from_csv(path, opt.table_opt.speaker_rows)
                .with_context(|| format!("reading {}", path.display()))?;
            plot::means_from_table(&table, &opt.table_opt.vowels, scale)?
        }
        (None, None) => bail!("either --points or --table is required"),
    };

    let config = figure_config(PlotConfig::means(), &opt.figure, scale);
    plot::plot_means(&points, &config, &opt.figure.output)
        .with_context(|| format!("drawing {}", opt.figure.output.display()))?;
    Ok(())
}

fn plot_ellipses(opt: &EllipsesOpt) -> anyhow::Result<()> {
    let scale = opt.table_opt.scale.into();
    let table = WideTable::from_csv(&opt.table, opt.table_opt.speaker_rows)
        .with_context(|| format!("reading {}", opt.table.display()))?;
    let conditions = plot::conditions_from_table(&table, &opt.table_opt.vowels, scale)?;

    let config = PlotConfig {
        n_std: opt.n_std,
        ..figure_config(PlotConfig::default(), &opt.figure, scale)
    };
    plot::plot_ellipses(&conditions, &config, &opt.figure.output)
        .with_context(|| format!("drawing {}", opt.figure.output.display()))?;
    Ok(())
}
