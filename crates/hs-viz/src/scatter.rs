use hs_core::Result;
use hs_inference::smoothed_trend;
use serde::{Deserialize, Serialize};

/// One predicted-effect-vs-covariate panel (plot-friendly JSON).
///
/// `x` and `effect` are the raw scatter points; `trend_x`/`trend_y`
/// carry a LOESS smoother evaluated on a uniform grid so renderers
/// need no statistics of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectScatterPanel {
    /// Covariate column name.
    pub covariate: String,
    /// Human-readable covariate label, when the source file carried one.
    pub label: Option<String>,
    /// Covariate values on the held-out partition.
    pub x: Vec<f64>,
    /// Predicted per-unit effects, aligned with `x`.
    pub effect: Vec<f64>,
    /// Trend grid over the covariate range.
    pub trend_x: Vec<f64>,
    /// Smoothed effect at each grid point.
    pub trend_y: Vec<f64>,
    /// Smoother span fraction used.
    pub span: f64,
}

/// A grid of panels, one per top-ranked covariate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectScatterGrid {
    /// Panels in ranking order.
    pub panels: Vec<EffectScatterPanel>,
}

/// Build one panel: scatter points plus a LOESS trend on `n_points`
/// uniform grid points.
pub fn scatter_panel(
    covariate: &str,
    label: Option<String>,
    x: &[f64],
    effect: &[f64],
    span: f64,
    n_points: usize,
) -> Result<EffectScatterPanel> {
    let (trend_x, trend_y) = smoothed_trend(x, effect, span, n_points)?;
    Ok(EffectScatterPanel {
        covariate: covariate.to_string(),
        label,
        x: x.to_vec(),
        effect: effect.to_vec(),
        trend_x,
        trend_y,
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_carries_scatter_and_trend() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let effect: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let panel = scatter_panel("assets_total_bl", None, &x, &effect, 0.75, 10).unwrap();

        assert_eq!(panel.x.len(), 50);
        assert_eq!(panel.trend_x.len(), 10);
        assert_eq!(panel.trend_y.len(), 10);
        // Linear data: the smoother reproduces the line.
        for (gx, gy) in panel.trend_x.iter().zip(&panel.trend_y) {
            assert!((gy - (2.0 * gx + 1.0)).abs() < 1e-8);
        }
    }

    #[test]
    fn test_panel_serializes_parallel_arrays() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let effect = vec![1.0, 1.5, 2.0, 2.5];
        let panel =
            scatter_panel("n_children", Some("children in household".into()), &x, &effect, 1.0, 4)
                .unwrap();
        let json = serde_json::to_value(&panel).unwrap();
        assert_eq!(json["covariate"], "n_children");
        assert_eq!(json["x"].as_array().unwrap().len(), 4);
        assert_eq!(json["trend_y"].as_array().unwrap().len(), 4);
    }
}
