//! Phenological Macro-Stage Classification
//!
//! Maps BBCH ratings (0-99) onto the three coarse macro-stages used to
//! parametrize the phenology-constrained retrieval. The bucketing is a fixed
//! range table covering the full BBCH domain with no gaps; anything outside
//! the domain is a typed error, never a silent default.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column holding the in-situ BBCH rating after the join
pub const BBCH_RATING_COL: &str = "BBCH Rating";
/// Macro-stage derived from the in-situ BBCH rating
pub const BBCH_MACRO_COL: &str = "BBCH Rating (Macro-Stages)";
/// Macro-stage predicted independently by the inversion
pub const PREDICTED_MACRO_COL: &str = "Macro-Stage";

#[derive(Debug, Error, PartialEq)]
pub enum StageError {
    #[error("BBCH rating {0} outside the valid range 0-99")]
    OutOfRange(f64),
    #[error("unknown macro-stage label '{0}'")]
    UnknownLabel(String),
}

/// Coarse phenological development phase
///
/// Ordered chronologically so that grouped outputs iterate in a stable,
/// reproducible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MacroStage {
    /// BBCH 0-29
    GerminationTillering,
    /// BBCH 30-59
    StemElongation,
    /// BBCH 60-99
    HeadingRipening,
}

impl MacroStage {
    pub const ALL: [MacroStage; 3] = [
        MacroStage::GerminationTillering,
        MacroStage::StemElongation,
        MacroStage::HeadingRipening,
    ];

    /// Classify a BBCH rating into its macro-stage
    ///
    /// Pure fixed-table lookup. Non-finite or out-of-domain ratings raise
    /// `StageError::OutOfRange`.
    pub fn from_bbch(bbch_val: f64) -> Result<Self, StageError> {
        if !bbch_val.is_finite() {
            return Err(StageError::OutOfRange(bbch_val));
        }
        match bbch_val {
            v if (0.0..30.0).contains(&v) => Ok(MacroStage::GerminationTillering),
            v if (30.0..60.0).contains(&v) => Ok(MacroStage::StemElongation),
            v if (60.0..100.0).contains(&v) => Ok(MacroStage::HeadingRipening),
            v => Err(StageError::OutOfRange(v)),
        }
    }

    /// Label used in frame columns and output file rows
    pub fn label(&self) -> &'static str {
        match self {
            MacroStage::GerminationTillering => "germination-tillering (BBCH 0-29)",
            MacroStage::StemElongation => "stem elongation (BBCH 30-59)",
            MacroStage::HeadingRipening => "heading-ripening (BBCH 60-99)",
        }
    }
}

impl fmt::Display for MacroStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MacroStage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacroStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.label() == s)
            .ok_or_else(|| StageError::UnknownLabel(s.to_string()))
    }
}

/// Append the macro-stage column derived from the in-situ BBCH ratings
///
/// Rows with a missing rating keep a null macro-stage; ratings outside the
/// BBCH domain abort the run.
pub fn assign_macro_stages(df: &DataFrame) -> anyhow::Result<DataFrame> {
    let ratings = df
        .column(BBCH_RATING_COL)?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();

    let mut labels: Vec<Option<&'static str>> = Vec::with_capacity(ratings.len());
    for opt in ratings.iter() {
        match opt {
            Some(v) => labels.push(Some(MacroStage::from_bbch(v)?.label())),
            None => labels.push(None),
        }
    }

    let stage_col = Column::new(BBCH_MACRO_COL.into(), labels);
    let mut out = df.clone();
    out.with_column(stage_col)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_bbch_domain_is_covered() {
        // Every integer rating in 0-99 classifies to exactly one stage
        for bbch in 0..=99 {
            let stage = MacroStage::from_bbch(bbch as f64)
                .expect("rating in domain must classify");
            // Deterministic: same input, same output
            assert_eq!(MacroStage::from_bbch(bbch as f64).unwrap(), stage);
        }
    }

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(
            MacroStage::from_bbch(29.0).unwrap(),
            MacroStage::GerminationTillering
        );
        assert_eq!(
            MacroStage::from_bbch(30.0).unwrap(),
            MacroStage::StemElongation
        );
        assert_eq!(
            MacroStage::from_bbch(59.0).unwrap(),
            MacroStage::StemElongation
        );
        assert_eq!(
            MacroStage::from_bbch(60.0).unwrap(),
            MacroStage::HeadingRipening
        );
        assert_eq!(
            MacroStage::from_bbch(99.0).unwrap(),
            MacroStage::HeadingRipening
        );
    }

    #[test]
    fn test_out_of_range_ratings_are_errors() {
        assert_eq!(
            MacroStage::from_bbch(-1.0),
            Err(StageError::OutOfRange(-1.0))
        );
        assert_eq!(
            MacroStage::from_bbch(100.0),
            Err(StageError::OutOfRange(100.0))
        );
        assert!(MacroStage::from_bbch(f64::NAN).is_err());
        assert!(MacroStage::from_bbch(f64::INFINITY).is_err());
    }

    #[test]
    fn test_label_round_trip() {
        for stage in MacroStage::ALL {
            let parsed: MacroStage = stage.label().parse().unwrap();
            assert_eq!(parsed, stage);
        }
        assert!("booting".parse::<MacroStage>().is_err());
    }

    #[test]
    fn test_assign_macro_stages_column() {
        let df = df!(
            BBCH_RATING_COL => [Some(12.0), Some(45.0), None, Some(85.0)],
        )
        .unwrap();

        let out = assign_macro_stages(&df).unwrap();
        let stages = out.column(BBCH_MACRO_COL).unwrap().str().unwrap();

        assert_eq!(
            stages.get(0),
            Some(MacroStage::GerminationTillering.label())
        );
        assert_eq!(stages.get(1), Some(MacroStage::StemElongation.label()));
        assert_eq!(stages.get(2), None);
        assert_eq!(stages.get(3), Some(MacroStage::HeadingRipening.label()));
    }

    #[test]
    fn test_assign_macro_stages_rejects_invalid_rating() {
        let df = df!(BBCH_RATING_COL => [150.0]).unwrap();
        assert!(assign_macro_stages(&df).is_err());
    }
}
