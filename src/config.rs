//! Run Configuration and Trait Settings
//!
//! Everything the pipeline needs to know about a validation run lives here
//! and is passed in explicitly: the trait catalogue (labels, units, plotting
//! limits) and the per-year schema-normalization tables that reconcile the
//! heterogeneous in-situ campaign files before merging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Plotting bounds for a trait (presentational only)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraitLimits {
    pub min: f64,
    pub max: f64,
}

impl TraitLimits {
    pub fn new(min: f64, max: f64) -> Self {
        TraitLimits { min, max }
    }
}

/// One trait to validate: frame column key, axis labels, plot limits
#[derive(Debug, Clone)]
pub struct TraitSpec {
    /// DataFrame column holding the in-situ reference value
    pub key: &'static str,
    /// Full trait name for axis labeling
    pub name: &'static str,
    /// Physical unit for axis labeling
    pub unit: &'static str,
    pub limits: TraitLimits,
}

/// Catalogue of the traits this pipeline knows how to validate
pub fn trait_settings() -> Vec<TraitSpec> {
    vec![
        TraitSpec {
            key: "lai",
            name: "Green Leaf Area Index",
            unit: "m2 m-2",
            limits: TraitLimits::new(0.0, 8.0),
        },
        TraitSpec {
            key: "ccc",
            name: "Canopy Chlorophyll Content",
            unit: "g m-2",
            limits: TraitLimits::new(0.0, 4.0),
        },
        TraitSpec {
            key: "cab",
            name: "Leaf Chlorophyll Content",
            unit: "ug cm-2",
            limits: TraitLimits::new(0.0, 80.0),
        },
    ]
}

/// Constant value injected into a frame by a schema patch
#[derive(Debug, Clone)]
pub enum PatchValue {
    Str(&'static str),
    Int(i64),
}

/// Which in-situ trait table a schema is being applied to
///
/// The campaign files differ per table, not just per year: the 2019 CCC
/// export carries its trait under a unit-suffixed header while the LAI
/// export does not, so renames are scoped to the table they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitTable {
    Lai,
    Ccc,
}

/// Schema-normalization table for one in-situ campaign year
///
/// The campaign files do not share a schema: the 2019 tables lack the
/// growing-degree-day axis and encode point identity differently. Each year
/// declares its fix-ups here so the transformation is auditable and testable
/// independently of the merge logic.
#[derive(Debug, Clone)]
pub struct YearSchema {
    pub year: i32,
    /// Column renames applied first to the LAI table only
    pub lai_renames: Vec<(&'static str, &'static str)>,
    /// Column renames applied first to the CCC table only,
    /// e.g. "CCC [g/m2]" -> "ccc"
    pub ccc_renames: Vec<(&'static str, &'static str)>,
    /// Derive `point_id` from the first two '_'-separated tokens of `Plot`
    pub point_id_from_plot: bool,
    /// Alias `parcel` from this column if set
    pub parcel_from: Option<&'static str>,
    /// Constant columns injected after renames (sentinels included)
    pub constants: Vec<(&'static str, PatchValue)>,
}

impl YearSchema {
    /// Identity schema: the year's files already match the common layout
    pub fn passthrough(year: i32) -> Self {
        YearSchema {
            year,
            lai_renames: Vec::new(),
            ccc_renames: Vec::new(),
            point_id_from_plot: false,
            parcel_from: None,
            constants: Vec::new(),
        }
    }

    /// Renames that apply to the given trait table
    pub fn renames_for(&self, table: TraitTable) -> &[(&'static str, &'static str)] {
        match table {
            TraitTable::Lai => &self.lai_renames,
            TraitTable::Ccc => &self.ccc_renames,
        }
    }
}

/// Sentinel `gdd_cumsum` for campaigns without a thermal-time record.
/// Inversion results for those campaigns carry the same sentinel, so the
/// join keys still line up.
pub const GDD_SENTINEL: i64 = 999;

/// Schema tables for the supported campaign years
pub fn year_schemas(years: &[i32]) -> Vec<YearSchema> {
    years
        .iter()
        .map(|&year| match year {
            2019 => YearSchema {
                year,
                lai_renames: Vec::new(),
                ccc_renames: vec![("CCC [g/m2]", "ccc")],
                point_id_from_plot: true,
                parcel_from: Some("field"),
                constants: vec![
                    ("gdd_cumsum", PatchValue::Int(GDD_SENTINEL)),
                    ("genotype", PatchValue::Str("Arnold")),
                    ("location", PatchValue::Str("SwissFutureFarm")),
                ],
            },
            _ => YearSchema::passthrough(year),
        })
        .collect()
}

/// Explicit configuration for one validation run
///
/// Passed into the pipeline instead of living as module-level state, so each
/// component can be unit-tested with fixture directories.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// In-situ campaign years to combine
    pub years: Vec<i32>,
    /// Campaign year holding the BBCH phenology ratings
    pub bbch_year: i32,
    /// Directory holding `in_situ_traits_{year}/` subdirectories
    pub insitu_dir: PathBuf,
    /// Directory holding one subdirectory per retrieval configuration
    pub inversion_dir: PathBuf,
    /// Retrieval configuration subdirectory names
    pub configurations: Vec<&'static str>,
    /// Trait keys to validate (subset of `trait_settings()`)
    pub traits: Vec<&'static str>,
}
