//! LOESS smoothing for effect-vs-covariate trend lines.
//!
//! Local linear regression with tricube weights over a span-fraction
//! window, evaluated on a caller-supplied grid. Matches the smoother
//! behind the scatter panels: span 1.0 by default (every point in every
//! window, distance-downweighted).

use hs_core::{Error, Result};

/// Fitted values of the local linear smoother at each point of `eval`.
///
/// For each evaluation point, the `ceil(span · n)` nearest observations
/// form the window; observations are weighted by tricube distance and a
/// weighted line is fitted.
pub fn loess(x: &[f64], y: &[f64], span: f64, eval: &[f64]) -> Result<Vec<f64>> {
    let n = x.len();
    if n < 2 {
        return Err(Error::Validation("loess needs at least 2 observations".to_string()));
    }
    if y.len() != n {
        return Err(Error::Validation(format!(
            "y has length {}, expected {n}",
            y.len()
        )));
    }
    if !(span > 0.0 && span <= 1.0) {
        return Err(Error::Validation(format!("span must be in (0, 1], got {span}")));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(Error::Validation("x/y must contain only finite values".to_string()));
    }

    let q = ((span * n as f64).ceil() as usize).clamp(2, n);
    let mut fitted = Vec::with_capacity(eval.len());

    for &x0 in eval {
        // q nearest observations by |x - x0|.
        let mut dist: Vec<(f64, usize)> =
            x.iter().enumerate().map(|(i, &xi)| ((xi - x0).abs(), i)).collect();
        dist.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("finite distances"));
        dist.truncate(q);
        let d_max = dist.last().expect("q >= 2").0;

        let mut sw = 0.0;
        let mut swx = 0.0;
        let mut swy = 0.0;
        let mut swxx = 0.0;
        let mut swxy = 0.0;
        for &(d, i) in &dist {
            let u = if d_max > 0.0 { d / d_max } else { 0.0 };
            let weight = (1.0 - u.powi(3)).powi(3).max(0.0);
            let xi = x[i] - x0; // center to keep the normal equations stable
            sw += weight;
            swx += weight * xi;
            swy += weight * y[i];
            swxx += weight * xi * xi;
            swxy += weight * xi * y[i];
        }

        let denom = sw * swxx - swx * swx;
        let value = if denom.abs() > 1e-12 * sw.max(1.0) {
            // Intercept of the centered fit is the value at x0.
            (swxx * swy - swx * swxy) / denom
        } else {
            swy / sw // degenerate window: weighted mean
        };
        fitted.push(value);
    }

    Ok(fitted)
}

/// Evaluate the smoother on an `n_points` uniform grid over `[min x, max x]`.
///
/// Returns `(grid, fitted)`, the arrays plotted as the trend line.
pub fn smoothed_trend(
    x: &[f64],
    y: &[f64],
    span: f64,
    n_points: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if n_points < 2 {
        return Err(Error::Validation("trend grid needs at least 2 points".to_string()));
    }
    let lo = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let step = (hi - lo) / (n_points - 1) as f64;
    let grid: Vec<f64> = (0..n_points).map(|i| lo + step * i as f64).collect();
    let fitted = loess(x, y, span, &grid)?;
    Ok((grid, fitted))
}
