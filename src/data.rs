//! Data Loading and Schema Normalization
//!
//! Reads the per-year in-situ trait tables, the BBCH phenology ratings and
//! the model-inversion results with Polars, and normalizes the heterogeneous
//! campaign schemas into the common layout the joiner expects.
//!
//! The campaign attribute tables are consumed as CSV exports; the analysis
//! never touches geometry, so the geospatial container format stays outside
//! this crate.

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::config::{year_schemas, PatchValue, TraitTable, ValidationConfig, YearSchema};

/// In-situ LAI table inside a campaign directory
pub const INSITU_LAI_FILE: &str = "in-situ_glai.csv";
/// In-situ CCC table inside a campaign directory
pub const INSITU_CCC_FILE: &str = "in-situ_ccc.csv";
/// In-situ BBCH rating table
pub const INSITU_BBCH_FILE: &str = "in-situ_bbch.csv";
/// Inversion result file inside a retrieval-configuration directory
pub const INVERSION_RESULT_FILE: &str = "inv_res_gdd_insitu_points.csv";

/// Common column layout shared by the normalized trait tables
const COMMON_COLS: [&str; 6] = [
    "point_id",
    "parcel",
    "location",
    "date",
    "gdd_cumsum",
    "genotype",
];

/// In-situ reference data for one validation run
///
/// Loaded once, read-only afterwards. Trait frames combine all campaign
/// years in the normalized common layout.
pub struct InsituData {
    /// LAI records, all years
    pub lai: DataFrame,
    /// CCC records, all years (keeps the co-measured `lai` column for Cab)
    pub ccc: DataFrame,
    /// BBCH phenology ratings
    pub bbch: DataFrame,
}

impl InsituData {
    /// Load and normalize all in-situ tables named by the configuration
    pub fn load(config: &ValidationConfig) -> Result<Self> {
        println!("Loading in-situ campaign data...");

        let schemas = year_schemas(&config.years);

        let mut lai_frames = Vec::with_capacity(schemas.len());
        let mut ccc_frames = Vec::with_capacity(schemas.len());
        for schema in &schemas {
            let campaign_dir = config
                .insitu_dir
                .join(format!("in_situ_traits_{}", schema.year));

            lai_frames.push(load_trait_table(
                &campaign_dir.join(INSITU_LAI_FILE),
                schema,
                TraitTable::Lai,
                &["lai"],
            )?);
            ccc_frames.push(load_trait_table(
                &campaign_dir.join(INSITU_CCC_FILE),
                schema,
                TraitTable::Ccc,
                &["ccc", "lai"],
            )?);
        }

        let lai = stack_years(lai_frames)?;
        let ccc = stack_years(ccc_frames)?;

        let bbch_path = config
            .insitu_dir
            .join(format!("in_situ_traits_{}", config.bbch_year))
            .join(INSITU_BBCH_FILE);
        let bbch = read_csv(&bbch_path)?;

        println!("  LAI records: {}", lai.height());
        println!("  CCC records: {}", ccc.height());
        println!("  BBCH ratings: {}", bbch.height());

        Ok(InsituData { lai, ccc, bbch })
    }
}

/// Read a headered CSV into a frame
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.into()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load CSV: {:?}", path))
}

/// Load the inversion results of one retrieval configuration
pub fn load_inversion_results(configuration_dir: &Path) -> Result<DataFrame> {
    read_csv(&configuration_dir.join(INVERSION_RESULT_FILE))
}

/// Apply one year's schema-normalization table to a raw campaign frame
///
/// Pure frame transform: the table-scoped renames first, then the derived
/// `point_id` and `parcel` aliases, then constant injection. Testable in
/// isolation from both the readers and the merge.
pub fn apply_year_schema(
    df: &DataFrame,
    schema: &YearSchema,
    table: TraitTable,
) -> Result<DataFrame> {
    let mut out = df.clone();
    for (old, new) in schema.renames_for(table) {
        out.rename(old, (*new).into())
            .with_context(|| format!("Year {}: cannot rename column '{}'", schema.year, old))?;
    }

    let mut exprs: Vec<Expr> = Vec::new();
    if schema.point_id_from_plot {
        // point_id = first two '_'-separated tokens of the Plot label
        exprs.push(
            col("Plot")
                .cast(DataType::String)
                .str()
                .split(lit("_"))
                .list()
                .slice(lit(0), lit(2))
                .list()
                .join(lit("_"), true)
                .alias("point_id"),
        );
    }
    if let Some(src) = schema.parcel_from {
        exprs.push(col(src).alias("parcel"));
    }
    for (name, value) in &schema.constants {
        let value_expr = match value {
            PatchValue::Str(s) => lit(*s),
            // lit() would materialize an Int32 column; the sentinel contract
            // is i64
            PatchValue::Int(i) => lit(*i).cast(DataType::Int64),
        };
        exprs.push(value_expr.alias(*name));
    }

    if exprs.is_empty() {
        return Ok(out);
    }

    out.lazy()
        .with_columns(exprs)
        .collect()
        .with_context(|| format!("Year {}: schema normalization failed", schema.year))
}

/// Read one campaign trait table and project it onto the common layout
fn load_trait_table(
    path: &Path,
    schema: &YearSchema,
    table: TraitTable,
    trait_cols: &[&str],
) -> Result<DataFrame> {
    let raw = read_csv(path)?;
    let normalized = apply_year_schema(&raw, schema, table)?;

    let mut cols: Vec<Expr> = COMMON_COLS.iter().map(|c| col(*c)).collect();
    cols.extend(trait_cols.iter().map(|c| col(*c)));

    normalized
        .lazy()
        .select(cols)
        .with_columns([
            // key dtypes must match across years before stacking
            col("gdd_cumsum").cast(DataType::Float64),
            col("date").cast(DataType::String),
        ])
        .collect()
        .with_context(|| format!("Trait table {:?} is missing expected columns", path))
}

/// Stack the per-year frames of one trait into a single table
fn stack_years(mut frames: Vec<DataFrame>) -> Result<DataFrame> {
    if frames.is_empty() {
        anyhow::bail!("No campaign years configured");
    }
    let mut combined = frames.remove(0);
    for frame in frames {
        combined = combined
            .vstack(&frame)
            .with_context(|| "Failed to combine campaign years")?;
    }
    Ok(combined)
}
