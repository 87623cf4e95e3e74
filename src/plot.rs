//! Scatter-Plot Rendering
//!
//! Renders predicted-vs-observed scatter panels to PNG with plotters: square
//! axes clamped to the trait's plotting limits, a 1:1 reference line and a
//! goodness-of-fit annotation block per panel.

use anyhow::{anyhow, bail, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::config::TraitLimits;
use crate::metrics::ErrorStats;

/// Edge length of one square panel in pixels
pub const PANEL_PX: u32 = 1000;

/// One predicted-vs-observed panel of a scatter figure
pub struct ScatterPanel {
    pub title: String,
    pub truth: Vec<f64>,
    pub pred: Vec<f64>,
    pub stats: ErrorStats,
}

/// Render a row of scatter panels to a PNG file
pub fn scatter_figure(
    path: &Path,
    panels: &[ScatterPanel],
    trait_name: &str,
    trait_unit: &str,
    limits: TraitLimits,
) -> Result<()> {
    if panels.is_empty() {
        bail!("Scatter figure requested with zero panels");
    }

    let width = PANEL_PX * panels.len() as u32;
    let root = BitMapBackend::new(path, (width, PANEL_PX)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Failed to clear plot background: {}", e))?;

    let areas = root.split_evenly((1, panels.len()));
    for (area, panel) in areas.iter().zip(panels.iter()) {
        draw_panel(area, panel, trait_name, trait_unit, limits)?;
    }

    root.present()
        .map_err(|e| anyhow!("Failed to write scatter figure {:?}: {}", path, e))?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &ScatterPanel,
    trait_name: &str,
    trait_unit: &str,
    limits: TraitLimits,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(30)
        .caption(&panel.title, ("sans-serif", 30))
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(limits.min..limits.max, limits.min..limits.max)
        .map_err(|e| anyhow!("Failed to build chart axes: {}", e))?;

    chart
        .configure_mesh()
        .x_desc(format!("In-situ {} [{}]", trait_name, trait_unit))
        .y_desc(format!("Retrieved {} [{}]", trait_name, trait_unit))
        .label_style(("sans-serif", 20))
        .draw()
        .map_err(|e| anyhow!("Failed to draw chart mesh: {}", e))?;

    // 1:1 reference line
    chart
        .draw_series(LineSeries::new(
            vec![(limits.min, limits.min), (limits.max, limits.max)],
            BLACK.stroke_width(2),
        ))
        .map_err(|e| anyhow!("Failed to draw 1:1 line: {}", e))?;

    chart
        .draw_series(
            panel
                .truth
                .iter()
                .zip(panel.pred.iter())
                .map(|(&t, &p)| Circle::new((t, p), 5, BLUE.mix(0.6).filled())),
        )
        .map_err(|e| anyhow!("Failed to draw observation dots: {}", e))?;

    // Annotation block, upper-left inside the axes
    let stats = &panel.stats;
    let lines = [
        format!("N     = {}", stats.n),
        format!("bias  = {:.2}", stats.bias),
        format!("RMSE  = {:.2}", stats.rmse),
        format!("R2    = {:.2}", stats.r2),
    ];
    for (idx, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            (110, 100 + 32 * idx as i32),
            ("sans-serif", 24).into_font(),
        ))
        .map_err(|e| anyhow!("Failed to draw annotation: {}", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::error_stats;

    #[test]
    fn test_scatter_figure_writes_png() {
        let tmp = std::env::temp_dir().join("trait_validation_plot_test");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("scatter.png");

        let truth = vec![1.0, 2.0, 3.0, 4.0];
        let pred = vec![1.2, 1.9, 3.3, 3.8];
        let stats = error_stats(&truth, &pred);

        let panels = [
            ScatterPanel {
                title: "Inversion WITHOUT phenological constraints".to_string(),
                truth: truth.clone(),
                pred: pred.clone(),
                stats: stats.clone(),
            },
            ScatterPanel {
                title: "Inversion WITH phenological constraints".to_string(),
                truth,
                pred,
                stats,
            },
        ];

        scatter_figure(
            &path,
            &panels,
            "Green Leaf Area Index",
            "m2 m-2",
            TraitLimits::new(0.0, 8.0),
        )
        .unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn test_empty_panel_list_is_error() {
        let tmp = std::env::temp_dir().join("trait_validation_plot_empty");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("never.png");

        assert!(scatter_figure(&path, &[], "LAI", "m2 m-2", TraitLimits::new(0.0, 8.0)).is_err());
        std::fs::remove_dir_all(&tmp).ok();
    }
}
