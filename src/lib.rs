//! Trait Retrieval Validation
//!
//! Validates radiative-transfer-model trait retrievals (LAI, CCC, Cab)
//! against in-situ field measurements:
//! - `config`: run configuration, trait settings, per-year schema tables
//! - `data`: CSV loading and campaign schema normalization with Polars
//! - `join`: in-situ / inversion merging and composite-trait derivation
//! - `stages`: BBCH macro-stage classification
//! - `metrics`: bias / RMSE / R2 error statistics
//! - `confusion`: predicted vs observed macro-stage contingency table
//! - `plot`: predicted-vs-observed scatter rendering (plotters)
//! - `validate`: per-trait orchestration and artifact writing

pub mod config;
pub mod confusion;
pub mod data;
pub mod join;
pub mod metrics;
pub mod plot;
pub mod stages;
pub mod validate;

// Re-export commonly used types
pub use config::{
    trait_settings, year_schemas, TraitLimits, TraitSpec, TraitTable, ValidationConfig,
};
pub use confusion::bbch_confusion_matrix;
pub use data::InsituData;
pub use join::{derive_cab_insitu, derive_cab_predictions, join_with_insitu};
pub use metrics::{error_stats, ErrorStats};
pub use stages::{assign_macro_stages, MacroStage, StageError};
pub use validate::{run, validate_trait};
