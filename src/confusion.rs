//! BBCH Macro-Stage Confusion Matrix
//!
//! Contingency table between the macro-stage derived from in-situ BBCH
//! ratings (rows, observed) and the macro-stage predicted independently by
//! the inversion (columns, predicted). Pure counting, no aggregation beyond
//! that; rows with either side missing are skipped.

use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::Path;

use crate::stages::{MacroStage, BBCH_MACRO_COL, PREDICTED_MACRO_COL};

/// Output file name for the confusion-matrix artifact
pub const CONFUSION_MATRIX_FILE: &str = "bbch_confusion_matrix.csv";

/// Count (observed, predicted) macro-stage pairs in a joined frame
pub fn count_stage_pairs(df: &DataFrame) -> Result<FxHashMap<(MacroStage, MacroStage), u32>> {
    let observed = df
        .column(BBCH_MACRO_COL)
        .with_context(|| format!("Column '{}' not found", BBCH_MACRO_COL))?
        .str()?
        .clone();
    let predicted = df
        .column(PREDICTED_MACRO_COL)
        .with_context(|| format!("Column '{}' not found", PREDICTED_MACRO_COL))?
        .str()?
        .clone();

    let mut counts: FxHashMap<(MacroStage, MacroStage), u32> = FxHashMap::default();
    for (obs_opt, pred_opt) in observed.iter().zip(predicted.iter()) {
        if let (Some(obs), Some(pred)) = (obs_opt, pred_opt) {
            let obs_stage: MacroStage = obs.parse()?;
            let pred_stage: MacroStage = pred.parse()?;
            *counts.entry((obs_stage, pred_stage)).or_insert(0) += 1;
        }
    }

    Ok(counts)
}

/// Build the confusion matrix frame and persist it
///
/// All macro-stages appear on both axes in chronological order so the
/// artifact shape is stable across runs. Returns the matrix frame.
pub fn bbch_confusion_matrix(df: &DataFrame, out_dir: &Path) -> Result<DataFrame> {
    let counts = count_stage_pairs(df)?;

    let observed_labels: Vec<&str> = MacroStage::ALL.iter().map(|s| s.label()).collect();
    let mut matrix = DataFrame::new(vec![Column::new(
        "observed".into(),
        observed_labels,
    )])?;

    for pred_stage in MacroStage::ALL {
        let col_counts: Vec<u32> = MacroStage::ALL
            .iter()
            .map(|obs_stage| {
                counts
                    .get(&(*obs_stage, pred_stage))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        matrix.with_column(Column::new(pred_stage.label().into(), col_counts))?;
    }

    let fpath = out_dir.join(CONFUSION_MATRIX_FILE);
    let mut file = File::create(&fpath)
        .with_context(|| format!("Failed to create confusion matrix file: {:?}", fpath))?;
    let mut to_write = matrix.clone();
    CsvWriter::new(&mut file)
        .finish(&mut to_write)
        .with_context(|| "Failed to write confusion matrix CSV")?;

    Ok(matrix)
}
