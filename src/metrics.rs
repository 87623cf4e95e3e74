//! Error-Metric Calculation
//!
//! Scatter-plot-ready goodness-of-fit statistics for paired true/predicted
//! trait values: bias, RMSE, coefficient of determination and sample count.
//! Pairs are filtered jointly so a missing value on either side drops the
//! whole pair and alignment is preserved.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

/// Goodness-of-fit statistics for one validation run
///
/// Immutable once computed. `phenology_considered` is set for full-sample
/// runs, `phase` for per-macro-stage runs.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    /// mean(pred - true)
    pub bias: f64,
    /// sqrt(mean((pred - true)^2)), always >= 0
    pub rmse: f64,
    /// Coefficient of determination; NaN when true values have zero variance
    pub r2: f64,
    /// Number of valid pairs
    pub n: usize,
    pub phenology_considered: Option<bool>,
    pub phase: Option<String>,
}

/// Extract the jointly valid (finite on both sides) pairs from two columns
///
/// Filtering must happen on pairs, not per column, otherwise the true and
/// predicted sequences drift out of alignment.
pub fn paired_finite(truth: &Float64Chunked, pred: &Float64Chunked) -> (Vec<f64>, Vec<f64>) {
    let mut t_out = Vec::with_capacity(truth.len());
    let mut p_out = Vec::with_capacity(truth.len());

    for (t_opt, p_opt) in truth.iter().zip(pred.iter()) {
        if let (Some(t), Some(p)) = (t_opt, p_opt) {
            if t.is_finite() && p.is_finite() {
                t_out.push(t);
                p_out.push(p);
            }
        }
    }

    (t_out, p_out)
}

/// Compute error statistics for aligned true/predicted sequences
///
/// Inputs must already be jointly filtered (see `paired_finite`). An empty
/// input, or sequences of different lengths (which carry no usable pairing),
/// yields NaN statistics with n = 0 rather than a panic.
pub fn error_stats(truth: &[f64], pred: &[f64]) -> ErrorStats {
    let n = truth.len();
    if n == 0 || n != pred.len() {
        return ErrorStats {
            bias: f64::NAN,
            rmse: f64::NAN,
            r2: f64::NAN,
            n: 0,
            phenology_considered: None,
            phase: None,
        };
    }

    let n_f = n as f64;
    let bias = truth
        .iter()
        .zip(pred.iter())
        .map(|(t, p)| p - t)
        .sum::<f64>()
        / n_f;
    let mse = truth
        .iter()
        .zip(pred.iter())
        .map(|(t, p)| (p - t) * (p - t))
        .sum::<f64>()
        / n_f;
    let rmse = mse.sqrt();

    // R2 = 1 - SS_res / SS_tot; degenerate (NaN) when SS_tot is zero
    let t_mean = truth.iter().sum::<f64>() / n_f;
    let ss_tot = truth.iter().map(|t| (t - t_mean) * (t - t_mean)).sum::<f64>();
    let ss_res = truth
        .iter()
        .zip(pred.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };

    ErrorStats {
        bias,
        rmse,
        r2,
        n,
        phenology_considered: None,
        phase: None,
    }
}

/// Compute error statistics for two columns of a joined frame
pub fn error_stats_for_columns(
    df: &DataFrame,
    truth_col: &str,
    pred_col: &str,
) -> Result<(ErrorStats, Vec<f64>, Vec<f64>)> {
    let truth = df
        .column(truth_col)
        .with_context(|| format!("Reference column '{}' not found", truth_col))?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();
    let pred = df
        .column(pred_col)
        .with_context(|| format!("Prediction column '{}' not found", pred_col))?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();

    let (t, p) = paired_finite(&truth, &pred);
    let stats = error_stats(&t, &p);
    Ok((stats, t, p))
}

/// Render stats rows to a frame for CSV output
pub fn stats_to_frame(stats: &[ErrorStats]) -> Result<DataFrame> {
    let bias: Vec<f64> = stats.iter().map(|s| s.bias).collect();
    let rmse: Vec<f64> = stats.iter().map(|s| s.rmse).collect();
    let r2: Vec<f64> = stats.iter().map(|s| s.r2).collect();
    let n: Vec<u32> = stats.iter().map(|s| s.n as u32).collect();

    let mut df = df!(
        "bias" => bias,
        "rmse" => rmse,
        "r2" => r2,
        "n" => n,
    )?;

    // Optional annotation columns, only written when any row carries them
    if stats.iter().any(|s| s.phenology_considered.is_some()) {
        let pheno: Vec<Option<bool>> = stats.iter().map(|s| s.phenology_considered).collect();
        df.with_column(Column::new("phenology_considered".into(), pheno))?;
    }
    if stats.iter().any(|s| s.phase.is_some()) {
        let phase: Vec<Option<String>> = stats.iter().map(|s| s.phase.clone()).collect();
        df.with_column(Column::new("phase".into(), phase))?;
    }

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_prediction() {
        let truth = [1.0, 2.0, 3.0, 4.0];
        let stats = error_stats(&truth, &truth);

        assert_relative_eq!(stats.bias, 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats.rmse, 0.0, epsilon = 1e-12);
        assert_relative_eq!(stats.r2, 1.0, epsilon = 1e-12);
        assert_eq!(stats.n, 4);
    }

    #[test]
    fn test_rmse_is_non_negative_and_bias_sign() {
        // Predictions systematically above truth: positive bias
        let truth = [1.0, 2.0, 3.0];
        let pred = [1.5, 2.5, 3.5];
        let stats = error_stats(&truth, &pred);

        assert!(stats.rmse >= 0.0);
        assert_relative_eq!(stats.bias, 0.5, epsilon = 1e-12);
        assert_relative_eq!(stats.rmse, 0.5, epsilon = 1e-12);

        // Predictions below truth: negative bias
        let pred_low = [0.5, 1.5, 2.5];
        let stats_low = error_stats(&truth, &pred_low);
        assert!(stats_low.bias < 0.0);
        assert!(stats_low.rmse >= 0.0);
    }

    #[test]
    fn test_constant_truth_gives_nan_r2() {
        let truth = [2.0, 2.0, 2.0];
        let pred = [1.0, 2.0, 3.0];
        let stats = error_stats(&truth, &pred);

        assert!(stats.r2.is_nan());
        assert!(stats.rmse.is_finite());
    }

    #[test]
    fn test_empty_input_yields_nan_not_panic() {
        let stats = error_stats(&[], &[]);
        assert_eq!(stats.n, 0);
        assert!(stats.bias.is_nan());
        assert!(stats.rmse.is_nan());
        assert!(stats.r2.is_nan());
    }

    #[test]
    fn test_misaligned_input_yields_degenerate_stats_not_panic() {
        let stats = error_stats(&[1.0, 2.0, 3.0], &[1.0, 2.0]);
        assert_eq!(stats.n, 0);
        assert!(stats.bias.is_nan());
        assert!(stats.rmse.is_nan());
        assert!(stats.r2.is_nan());
    }

    #[test]
    fn test_joint_pair_filtering() {
        let truth = Float64Chunked::new(
            "truth".into(),
            &[Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
        );
        let pred = Float64Chunked::new(
            "pred".into(),
            &[Some(1.1), None, Some(3.0), Some(f64::NAN), Some(5.2)],
        );

        let (t, p) = paired_finite(&truth, &pred);

        // Only rows 0 and 4 survive: row 1 misses pred, row 2 misses truth,
        // row 3 has a non-finite pred
        assert_eq!(t, vec![1.0, 5.0]);
        assert_eq!(p, vec![1.1, 5.2]);
    }

    #[test]
    fn test_r2_known_value() {
        // truth variance: mean=2, ss_tot = 2; residuals: 0.01 each, ss_res = 0.03
        let truth = [1.0, 2.0, 3.0];
        let pred = [1.1, 2.1, 3.1];
        let stats = error_stats(&truth, &pred);

        assert_relative_eq!(stats.r2, 1.0 - 0.03 / 2.0, epsilon = 1e-9);
        assert_relative_eq!(stats.bias, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_stats_to_frame_columns() {
        let mut a = error_stats(&[1.0, 2.0], &[1.0, 2.0]);
        a.phenology_considered = Some(false);
        let mut b = error_stats(&[1.0, 2.0], &[1.5, 2.5]);
        b.phenology_considered = Some(true);

        let df = stats_to_frame(&[a, b]).unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column("phenology_considered").is_ok());
        assert!(df.column("phase").is_err());
    }
}
