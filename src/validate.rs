//! Validation Orchestrator
//!
//! Runs the three stratifications for one trait — full sample with vs
//! without the phenological constraint, then per-macro-stage for each of
//! the two retrieval conditions — and writes the plot and error-table
//! artifacts. Macro-stages iterate in chronological order so output files
//! and stats rows are reproducible across runs.

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::config::{trait_settings, TraitSpec, ValidationConfig};
use crate::confusion::bbch_confusion_matrix;
use crate::data::{load_inversion_results, InsituData};
use crate::join::{derive_cab_insitu, derive_cab_predictions, join_with_insitu};
use crate::metrics::{error_stats_for_columns, stats_to_frame, ErrorStats};
use crate::plot::{scatter_figure, ScatterPanel};
use crate::stages::{assign_macro_stages, MacroStage, PREDICTED_MACRO_COL};

/// Prediction column of the unconstrained retrieval
pub fn pred_col_all(trait_key: &str) -> String {
    format!("{}_all", trait_key)
}

/// Prediction column of the phenology-constrained retrieval
pub fn pred_col_pheno(trait_key: &str) -> String {
    format!("{} (Phenology)", trait_key)
}

fn file_key(trait_key: &str) -> String {
    trait_key.replace(' ', "-")
}

/// Write a frame to CSV, creating the file
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut to_write = df.clone();
    CsvWriter::new(&mut file)
        .finish(&mut to_write)
        .with_context(|| format!("Failed to write CSV: {:?}", path))?;
    Ok(())
}

/// Validate one trait of a joined in-situ/inversion frame
///
/// Writes, under `out_dir`:
/// - `{trait}_scatterplot.png` + `{trait}_error_stats.csv` (full sample,
///   without/with phenological constraint)
/// - `{trait}_scatterplot_pheno_phases.png` + `{trait}_errors_pheno_phases.csv`
///   (per macro-stage, constrained retrieval)
/// - `{trait}_scatterplot_pheno_phases_all.png` +
///   `{trait}_errors_pheno_phases_all.csv` (per macro-stage, unconstrained)
/// - `bbch_confusion_matrix.csv`
pub fn validate_trait(joined: &DataFrame, out_dir: &Path, spec: &TraitSpec) -> Result<()> {
    // Rows without a reference value carry no information for any of the
    // stratifications
    let df = joined
        .clone()
        .lazy()
        .filter(col(spec.key).is_not_null())
        .collect()?;

    let all_col = pred_col_all(spec.key);
    let pheno_col = pred_col_pheno(spec.key);
    let key = file_key(spec.key);

    // Full sample, both retrieval conditions
    let (mut stats_all, t_all, p_all) = error_stats_for_columns(&df, spec.key, &all_col)?;
    stats_all.phenology_considered = Some(false);
    let (mut stats_pheno, t_pheno, p_pheno) = error_stats_for_columns(&df, spec.key, &pheno_col)?;
    stats_pheno.phenology_considered = Some(true);

    let panels = [
        ScatterPanel {
            title: "Inversion WITHOUT phenological constraints".to_string(),
            truth: t_all,
            pred: p_all,
            stats: stats_all.clone(),
        },
        ScatterPanel {
            title: "Inversion WITH phenological constraints".to_string(),
            truth: t_pheno,
            pred: p_pheno,
            stats: stats_pheno.clone(),
        },
    ];
    scatter_figure(
        &out_dir.join(format!("{}_scatterplot.png", key)),
        &panels,
        spec.name,
        spec.unit,
        spec.limits,
    )?;
    write_csv(
        &stats_to_frame(&[stats_all, stats_pheno])?,
        &out_dir.join(format!("{}_error_stats.csv", key)),
    )?;

    // Retrieval accuracy across phenological macro-stages
    let df = assign_macro_stages(&df)?;

    run_stage_stratification(&df, out_dir, spec, &pheno_col, "pheno_phases")?;
    run_stage_stratification(&df, out_dir, spec, &all_col, "pheno_phases_all")?;

    // Predicted vs observed macro-stage agreement
    bbch_confusion_matrix(&df, out_dir)?;

    Ok(())
}

/// Macro-stages present in the inversion's prediction column, in
/// chronological (grouping) order
fn stages_present(df: &DataFrame) -> Result<Vec<MacroStage>> {
    let labels = df
        .column(PREDICTED_MACRO_COL)
        .with_context(|| format!("Column '{}' not found", PREDICTED_MACRO_COL))?
        .str()?
        .clone();

    let mut stages: Vec<MacroStage> = Vec::new();
    for label in labels.iter().flatten() {
        let stage: MacroStage = label.parse()?;
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }
    stages.sort();
    Ok(stages)
}

/// One per-macro-stage stratification: a panel row plus a stats CSV
fn run_stage_stratification(
    df: &DataFrame,
    out_dir: &Path,
    spec: &TraitSpec,
    pred_col: &str,
    suffix: &str,
) -> Result<Vec<ErrorStats>> {
    let stages = stages_present(df)?;
    if stages.is_empty() {
        bail!(
            "No predicted macro-stages in column '{}'; cannot stratify",
            PREDICTED_MACRO_COL
        );
    }

    let mut panels = Vec::with_capacity(stages.len());
    let mut stats_rows = Vec::with_capacity(stages.len());
    for stage in stages {
        let sub = df
            .clone()
            .lazy()
            .filter(col(PREDICTED_MACRO_COL).eq(lit(stage.label())))
            .collect()?;

        let (mut stats, truth, pred) = error_stats_for_columns(&sub, spec.key, pred_col)?;
        stats.phase = Some(stage.label().to_string());

        panels.push(ScatterPanel {
            title: format!("Macro-Stage: {}", stage.label()),
            truth,
            pred,
            stats: stats.clone(),
        });
        stats_rows.push(stats);
    }

    let key = file_key(spec.key);
    scatter_figure(
        &out_dir.join(format!("{}_scatterplot_{}.png", key, suffix)),
        &panels,
        spec.name,
        spec.unit,
        spec.limits,
    )?;
    write_csv(
        &stats_to_frame(&stats_rows)?,
        &out_dir.join(format!("{}_errors_{}.csv", key, suffix)),
    )?;

    Ok(stats_rows)
}

/// Resolve the in-situ reference frame and inversion frame for one trait
fn frames_for_trait(
    trait_key: &str,
    insitu: &InsituData,
    inv_res: &DataFrame,
) -> Result<(DataFrame, DataFrame)> {
    match trait_key {
        "lai" => Ok((insitu.lai.clone(), inv_res.clone())),
        "ccc" => Ok((insitu.ccc.clone(), inv_res.clone())),
        // Composite trait: reference and predictions both derived from the
        // LAI/CCC constituents
        "cab" => Ok((
            derive_cab_insitu(&insitu.lai, &insitu.ccc)?,
            derive_cab_predictions(inv_res)?,
        )),
        other => bail!("No in-situ source known for trait '{}'", other),
    }
}

/// Run the full validation: every configured trait under every retrieval
/// configuration
pub fn run(config: &ValidationConfig) -> Result<()> {
    let insitu = InsituData::load(config)?;
    let settings = trait_settings();

    for configuration in &config.configurations {
        let conf_dir = config.inversion_dir.join(configuration);
        let inv_res = load_inversion_results(&conf_dir)?;
        println!(
            "Configuration '{}': {} inversion records",
            configuration,
            inv_res.height()
        );

        for &trait_key in &config.traits {
            let spec = settings
                .iter()
                .find(|s| s.key == trait_key)
                .with_context(|| format!("Trait '{}' has no settings entry", trait_key))?;

            let out_dir = conf_dir.join(format!("validation_{}", trait_key));
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

            let (insitu_trait, inv_for_trait) = frames_for_trait(trait_key, &insitu, &inv_res)?;
            let joined = join_with_insitu(&insitu_trait, &insitu.bbch, &inv_for_trait, &[trait_key])?;
            write_csv(
                &joined,
                &out_dir.join(format!("inv_res_joined_with_insitu_{}.csv", trait_key)),
            )?;
            println!("  {}: {} matched observations", trait_key, joined.height());

            validate_trait(&joined, &out_dir, spec)?;
        }
    }

    Ok(())
}
