//! Ordinary least squares with standard errors and p-values.
//!
//! Used twice in the pipeline as a diagnostic: the baseline average
//! treatment effect (outcome on treatment) and the segment check
//! (predicted effect on treatment). Output is read by a human, nothing
//! downstream consumes it programmatically.

use hs_core::{Coefficient, CoefficientTable, DataFrame, Error, GroupSummary, Result};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Fit OLS of `y` on an intercept plus the named predictor columns.
///
/// Returns a coefficient table with estimate, standard error, t-value and
/// two-sided Student-t p-value per term.
pub fn ols(y: &[f64], predictors: &[(&str, &[f64])]) -> Result<CoefficientTable> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Validation("y must be non-empty".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("y must contain only finite values".to_string()));
    }
    for (name, col) in predictors {
        if col.len() != n {
            return Err(Error::Validation(format!(
                "predictor '{name}' has length {}, expected {n}",
                col.len()
            )));
        }
        if col.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "predictor '{name}' must contain only finite values"
            )));
        }
    }

    // Columns: [intercept, predictors...]
    let k = predictors.len() + 1;
    let mut x_data = Vec::with_capacity(n * k);
    for i in 0..n {
        x_data.push(1.0);
        for (_, col) in predictors {
            x_data.push(col[i]);
        }
    }

    let x_mat = DMatrix::from_row_slice(n, k, &x_data);
    let y_vec = DVector::from_column_slice(y);

    let xtx = x_mat.transpose() * &x_mat;
    let xty = x_mat.transpose() * &y_vec;
    let xtx_inv =
        xtx.try_inverse().ok_or_else(|| Error::Computation("X'X singular in OLS".to_string()))?;
    let beta = &xtx_inv * &xty;

    let y_hat = &x_mat * &beta;
    let resid = &y_vec - &y_hat;
    let rss: f64 = resid.iter().map(|r| r * r).sum();

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };

    let dof = n as f64 - k as f64;
    let sigma2 = if dof > 0.0 { rss / dof } else { f64::NAN };
    let t_dist = if dof > 0.0 { StudentsT::new(0.0, 1.0, dof).ok() } else { None };

    let mut coefficients = Vec::with_capacity(k);
    let term_names = std::iter::once("intercept").chain(predictors.iter().map(|(name, _)| *name));
    for (j, term) in term_names.enumerate() {
        let estimate = beta[j];
        let std_error = (sigma2 * xtx_inv[(j, j)]).sqrt();
        let t_value = if std_error > 0.0 { estimate / std_error } else { f64::NAN };
        let p_value = match (&t_dist, t_value.is_finite()) {
            (Some(dist), true) => 2.0 * (1.0 - dist.cdf(t_value.abs())),
            _ => f64::NAN,
        };
        coefficients.push(Coefficient {
            term: term.to_string(),
            estimate,
            std_error,
            t_value,
            p_value,
        });
    }

    Ok(CoefficientTable { coefficients, n_obs: n, r_squared })
}

/// OLS of one frame column on the binary treatment column.
pub fn ols_on_treatment(
    frame: &DataFrame,
    outcome: &str,
    treatment: &str,
) -> Result<CoefficientTable> {
    let y = frame.numeric(outcome)?;
    let w = frame.numeric(treatment)?;
    ols(y, &[(treatment, w)])
}

/// Mean of `values` within each distinct value of `groups`, sorted by group.
///
/// Rows where either side is non-finite are skipped.
pub fn grouped_mean(groups: &[f64], values: &[f64]) -> Result<Vec<GroupSummary>> {
    if groups.len() != values.len() {
        return Err(Error::Validation(format!(
            "groups has length {}, values has length {}",
            groups.len(),
            values.len()
        )));
    }

    let mut cells: Vec<(f64, f64, usize)> = Vec::new();
    for (&g, &v) in groups.iter().zip(values) {
        if !g.is_finite() || !v.is_finite() {
            continue;
        }
        match cells.iter_mut().find(|(cell_g, _, _)| *cell_g == g) {
            Some((_, sum, count)) => {
                *sum += v;
                *count += 1;
            }
            None => cells.push((g, v, 1)),
        }
    }
    cells.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("finite group keys"));

    Ok(cells
        .into_iter()
        .map(|(group, sum, n)| GroupSummary { group, mean: sum / n as f64, n })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ols_two_group_exact() {
        // Treatment coefficient of y ~ 1 + w is the difference in group means.
        let y = vec![1.0, 3.0, 2.0, 7.0, 9.0, 8.0];
        let w = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let table = ols(&y, &[("treatment", &w)]).unwrap();

        let intercept = table.term("intercept").unwrap();
        let treat = table.term("treatment").unwrap();
        assert!((intercept.estimate - 2.0).abs() < 1e-12);
        assert!((treat.estimate - 6.0).abs() < 1e-12);
        assert_eq!(table.n_obs, 6);
        assert!(treat.p_value > 0.0 && treat.p_value < 0.05);
    }

    #[test]
    fn test_ols_perfect_fit_r_squared() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let table = ols(&y, &[("x", &x)]).unwrap();
        assert!((table.term("x").unwrap().estimate - 3.0).abs() < 1e-10);
        assert!((table.r_squared - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_ols_singular_design() {
        let y = vec![1.0, 2.0, 3.0];
        let x = vec![1.0, 1.0, 1.0]; // collinear with the intercept
        let err = ols(&y, &[("x", &x)]).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }

    #[test]
    fn test_ols_rejects_non_finite() {
        let y = vec![1.0, f64::NAN];
        let x = vec![0.0, 1.0];
        assert!(ols(&y, &[("x", &x)]).is_err());
    }

    #[test]
    fn test_grouped_mean() {
        let groups = vec![1.0, 0.0, 1.0, 0.0, f64::NAN];
        let values = vec![10.0, 2.0, 20.0, 4.0, 99.0];
        let cells = grouped_mean(&groups, &values).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].group, 0.0);
        assert!((cells[0].mean - 3.0).abs() < 1e-12);
        assert_eq!(cells[1].n, 2);
        assert!((cells[1].mean - 15.0).abs() < 1e-12);
    }
}
