//! Validate PROSAIL-derived and in-situ measured traits by computing common
//! error metrics and plotting scatter, per retrieval configuration and
//! phenological macro-stage.
//!
//! No CLI flags: trait list, campaign years and directory layout are the
//! constants below. Errors propagate and terminate the run with a non-zero
//! exit.

use anyhow::Result;
use trait_validation::{run, ValidationConfig};

/// Traits to validate (see `trait_settings()` for the full catalogue)
const TRAITS: &[&str] = &["cab"];

/// In-situ campaign years to combine
const YEARS: &[i32] = &[2019, 2022];

/// Campaign year carrying the BBCH phenology ratings
const BBCH_YEAR: i32 = 2022;

/// Directory holding `in_situ_traits_{year}/` subdirectories
const INSITU_DIR: &str = "../data";

/// Directory holding one subdirectory per retrieval configuration
const INVERSION_DIR: &str = "../results/lut_based_inversion";

/// Retrieval configuration subdirectories to validate
const CONFIGURATIONS: &[&str] = &["agdds_and_s2", "agdds_only"];

fn main() -> Result<()> {
    let config = ValidationConfig {
        years: YEARS.to_vec(),
        bbch_year: BBCH_YEAR,
        insitu_dir: INSITU_DIR.into(),
        inversion_dir: INVERSION_DIR.into(),
        configurations: CONFIGURATIONS.to_vec(),
        traits: TRAITS.to_vec(),
    };

    run(&config)
}
