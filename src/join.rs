//! In-Situ / Inversion Joiner
//!
//! Merges the normalized in-situ trait records with the BBCH phenology
//! ratings and the model-inversion results into a single table keyed by
//! point identity and time, one row per observation with both reference and
//! predicted trait columns.
//!
//! A merge producing zero rows, or a table missing an expected column, is a
//! caller-visible failure. Nothing is silently swallowed.

use anyhow::{bail, Context, Result};
use polars::prelude::*;

use crate::stages::BBCH_RATING_COL;

/// Keys shared between the in-situ tables and the inversion results
pub const JOIN_KEYS: [&str; 5] = ["point_id", "gdd_cumsum", "parcel", "location", "date"];

/// Keys for merging the two Cab constituent frames (date is resolved after
/// the merge since the two campaigns stamp it independently)
pub const CAB_CONSTITUENT_KEYS: [&str; 4] = ["point_id", "gdd_cumsum", "parcel", "location"];

/// Conversion factor from the CCC/LAI ratio [g m-2] to Cab [ug cm-2]
pub const CAB_SCALE: f64 = 100.0;

fn require_columns(df: &DataFrame, cols: &[&str], what: &str) -> Result<()> {
    for c in cols {
        if df.column(c).is_err() {
            bail!("{} table is missing expected column '{}'", what, c);
        }
    }
    Ok(())
}

/// Align key dtypes across sources before merging
///
/// `gdd_cumsum` may arrive as integer (sentinel-patched years) or float, and
/// `date` as parsed dates or raw strings depending on the reader.
fn normalize_keys(lf: LazyFrame) -> LazyFrame {
    lf.with_columns([
        col("gdd_cumsum").cast(DataType::Float64),
        col("date").cast(DataType::String),
    ])
}

/// Join in-situ reference records with BBCH ratings and inversion results
///
/// Produces one row per matched observation carrying the reference trait
/// columns, the in-situ BBCH rating and every prediction column of the
/// inversion table.
pub fn join_with_insitu(
    insitu: &DataFrame,
    bbch: &DataFrame,
    inv_res: &DataFrame,
    traits: &[&str],
) -> Result<DataFrame> {
    require_columns(insitu, &JOIN_KEYS, "in-situ trait")?;
    require_columns(insitu, traits, "in-situ trait")?;
    require_columns(bbch, &["point_id", "date", BBCH_RATING_COL], "in-situ BBCH")?;
    require_columns(inv_res, &JOIN_KEYS, "inversion result")?;

    let insitu_cols: Vec<Expr> = JOIN_KEYS
        .iter()
        .chain(traits.iter())
        .map(|c| col(*c))
        .collect();

    let insitu_lf = normalize_keys(insitu.clone().lazy().select(insitu_cols));

    let bbch_lf = bbch.clone().lazy().select([
        col("point_id"),
        col("date").cast(DataType::String),
        col(BBCH_RATING_COL),
    ]);

    let with_bbch = insitu_lf.join(
        bbch_lf,
        [col("point_id"), col("date")],
        [col("point_id"), col("date")],
        JoinArgs::new(JoinType::Inner),
    );

    let inv_lf = normalize_keys(inv_res.clone().lazy());

    let joined = with_bbch
        .join(
            inv_lf,
            JOIN_KEYS.map(col),
            JOIN_KEYS.map(col),
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
        .with_context(|| "Failed to join in-situ records with inversion results")?;

    if joined.height() == 0 {
        bail!(
            "Join of in-situ and inversion data produced zero rows \
             (key mismatch between sources?)"
        );
    }

    Ok(joined)
}

/// Compute the in-situ Cab reference frame from its LAI and CCC constituents
///
/// The two campaign frames are merged on point identity and thermal time;
/// duplicated `date`/`lai` columns from the CCC side are resolved in favour
/// of the LAI side, then `cab = ccc / lai * 100` [ug cm-2].
pub fn derive_cab_insitu(lai: &DataFrame, ccc: &DataFrame) -> Result<DataFrame> {
    require_columns(lai, &CAB_CONSTITUENT_KEYS, "in-situ LAI")?;
    require_columns(lai, &["lai", "date"], "in-situ LAI")?;
    require_columns(ccc, &CAB_CONSTITUENT_KEYS, "in-situ CCC")?;
    require_columns(ccc, &["ccc"], "in-situ CCC")?;

    let lai_lf = lai
        .clone()
        .lazy()
        .with_columns([col("gdd_cumsum").cast(DataType::Float64)]);
    let ccc_lf = ccc
        .clone()
        .lazy()
        .with_columns([col("gdd_cumsum").cast(DataType::Float64)]);

    let merged = lai_lf
        .join(
            ccc_lf,
            CAB_CONSTITUENT_KEYS.map(col),
            CAB_CONSTITUENT_KEYS.map(col),
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
        .with_context(|| "Failed to merge LAI and CCC constituent frames")?;

    if merged.height() == 0 {
        bail!("Merging LAI and CCC in-situ frames produced zero rows");
    }

    // The CCC campaign frame carries its own date/lai columns; polars
    // suffixes them "_right" on the merge and the LAI-side copy wins.
    let mut resolved = merged;
    for dup in ["date_right", "lai_right", "genotype_right"] {
        if resolved.column(dup).is_ok() {
            resolved = resolved.drop(dup)?;
        }
    }

    let out = resolved
        .lazy()
        .with_columns([(col("ccc").cast(DataType::Float64)
            / col("lai").cast(DataType::Float64)
            * lit(CAB_SCALE))
        .alias("cab")])
        .collect()?;

    Ok(out)
}

/// Derive Cab prediction columns for every retrieval configuration present
///
/// Each inversion column starting with `lai` (e.g. `lai_all`,
/// `lai (Phenology)`) must have a CCC counterpart; the matching `cab` column
/// is computed with the same ratio formula as the reference value.
pub fn derive_cab_predictions(inv_res: &DataFrame) -> Result<DataFrame> {
    let lai_cols: Vec<String> = inv_res
        .get_column_names()
        .iter()
        .map(|n| n.as_str().to_string())
        .filter(|n| n.starts_with("lai"))
        .collect();

    if lai_cols.is_empty() {
        bail!("Inversion results contain no 'lai*' prediction columns to derive Cab from");
    }

    let mut exprs = Vec::with_capacity(lai_cols.len());
    for lai_col in &lai_cols {
        let suffix = &lai_col["lai".len()..];
        let ccc_col = format!("ccc{}", suffix);
        let cab_col = format!("cab{}", suffix);

        if inv_res.column(&ccc_col).is_err() {
            bail!(
                "Inversion results are missing '{}' matching prediction column '{}'",
                ccc_col,
                lai_col
            );
        }

        exprs.push(
            (col(ccc_col.as_str()).cast(DataType::Float64)
                / col(lai_col.as_str()).cast(DataType::Float64)
                * lit(CAB_SCALE))
            .alias(cab_col.as_str()),
        );
    }

    let out = inv_res.clone().lazy().with_columns(exprs).collect()?;
    Ok(out)
}
