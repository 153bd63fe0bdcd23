//! Panel linear regression with entity fixed effects.
//!
//! Entity-demeaned ("within") OLS for balanced and unbalanced panels, with
//! three covariance estimators: conventional, White heteroskedasticity-robust
//! and Liang–Zeger entity-clustered. Entity effects are recovered afterwards
//! as `α_i = ȳ_i − x̄_i·β`.
//!
//! # References
//!
//! - Wooldridge, *Econometric Analysis of Cross Section and Panel Data*, Ch. 10.
//! - Arellano (1987), "Computing robust standard errors for within-groups estimators."
//! - White (1980), "A heteroskedasticity-consistent covariance matrix estimator."

use nalgebra::{DMatrix, DVector};
use pl_core::{CovarianceKind, Error, Result};

/// Relative singular-value tolerance for the rank check on the
/// column-normalized demeaned design.
const RANK_TOL: f64 = 1e-10;

/// Per-observation tolerance, relative to a column's norm before demeaning,
/// under which a demeaned column counts as absorbed by the entity effects.
const ABSORBED_TOL: f64 = 1e-12;

/// Raw output of the within estimator.
#[derive(Debug, Clone)]
pub struct WithinFit {
    /// Coefficient estimates (length k; the entity effects are absorbed).
    pub coefficients: Vec<f64>,
    /// Coefficient covariance of the requested kind (k × k).
    pub covariance: DMatrix<f64>,
    /// Per-entity effect `α_i`, indexed by entity.
    pub entity_effects: Vec<f64>,
    /// Per-entity observation count, indexed by entity.
    pub entity_sizes: Vec<usize>,
    /// Within residuals, in observation order.
    pub residuals: Vec<f64>,
    /// Demeaned target, in observation order.
    pub y_within: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Residual degrees of freedom: `n − N − k`.
    pub df_resid: usize,
}

/// Fit a panel fixed-effects ("within") regression.
///
/// # Arguments
///
/// - `entity` — 0-based entity index for each observation (length n).
/// - `x` — design matrix, row-major, shape (n, k). No intercept column.
/// - `y` — dependent variable (length n).
/// - `names` — covariate names, used in error messages (length k).
///
/// Entities observed once carry no within variation; they still get an effect.
pub fn within_fit(
    entity: &[usize],
    x: &[f64],
    y: &[f64],
    names: &[&str],
    kind: CovarianceKind,
) -> Result<WithinFit> {
    let n = y.len();
    let k = names.len();
    if n == 0 {
        return Err(Error::ModelFit("y must be non-empty".into()));
    }
    if k == 0 {
        return Err(Error::ModelFit("at least one covariate is required".into()));
    }
    if entity.len() != n {
        return Err(Error::ModelFit(format!("entity length ({}) != n ({})", entity.len(), n)));
    }
    if x.len() != n * k {
        return Err(Error::ModelFit(format!("x length ({}) != n*k ({})", x.len(), n * k)));
    }

    let n_entities = entity.iter().copied().max().map_or(0, |m| m + 1);

    // Entity means of y and X
    let mut sizes = vec![0usize; n_entities];
    let mut y_mean = vec![0.0_f64; n_entities];
    let mut x_mean = vec![0.0_f64; n_entities * k];
    for i in 0..n {
        let g = entity[i];
        sizes[g] += 1;
        y_mean[g] += y[i];
        for j in 0..k {
            x_mean[g * k + j] += x[i * k + j];
        }
    }
    for g in 0..n_entities {
        if sizes[g] == 0 {
            return Err(Error::ModelFit(format!("entity index {g} has no observations")));
        }
        let ng = sizes[g] as f64;
        y_mean[g] /= ng;
        for j in 0..k {
            x_mean[g * k + j] /= ng;
        }
    }

    let raw_norms: Vec<f64> =
        (0..k).map(|j| (0..n).map(|i| x[i * k + j] * x[i * k + j]).sum::<f64>().sqrt()).collect();

    let df = n as i64 - n_entities as i64 - k as i64;
    if df <= 0 {
        return Err(Error::ModelFit(format!(
            "not enough degrees of freedom: {n} observations, {n_entities} entities, {k} covariates"
        )));
    }
    let df_resid = df as usize;

    // Subtract means
    let mut x_dm = vec![0.0_f64; n * k];
    let mut y_dm = vec![0.0_f64; n];
    for i in 0..n {
        let g = entity[i];
        y_dm[i] = y[i] - y_mean[g];
        for j in 0..k {
            x_dm[i * k + j] = x[i * k + j] - x_mean[g * k + j];
        }
    }

    let x_mat = DMatrix::from_row_slice(n, k, &x_dm);
    let y_vec = DVector::from_column_slice(&y_dm);

    check_rank(&x_mat, &raw_norms, names)?;

    // OLS on demeaned data: beta = (X'X)^{-1} X'y
    let xtx = x_mat.transpose() * &x_mat;
    let xty = x_mat.transpose() * &y_vec;
    let chol = xtx
        .cholesky()
        .ok_or_else(|| Error::ModelFit("X'X is singular after demeaning".into()))?;
    let beta = chol.solve(&xty);
    let xtx_inv = chol.inverse();

    let resid = &y_vec - &x_mat * &beta;
    let rss: f64 = resid.iter().map(|r| r * r).sum();

    let covariance = match kind {
        CovarianceKind::Unadjusted => &xtx_inv * (rss / df_resid as f64),
        CovarianceKind::Robust => heteroskedastic_cov(&x_mat, &resid, &xtx_inv, df_resid),
        CovarianceKind::Clustered => cluster_robust_cov(&x_mat, &resid, &xtx_inv, entity),
    };

    // α_g = ȳ_g − x̄_g·β
    let coefficients: Vec<f64> = beta.iter().copied().collect();
    let entity_effects: Vec<f64> = (0..n_entities)
        .map(|g| {
            let xb: f64 = (0..k).map(|j| x_mean[g * k + j] * coefficients[j]).sum();
            y_mean[g] - xb
        })
        .collect();

    Ok(WithinFit {
        coefficients,
        covariance,
        entity_effects,
        entity_sizes: sizes,
        residuals: resid.iter().copied().collect(),
        y_within: y_dm,
        rss,
        df_resid,
    })
}

/// Fail unless the demeaned design has full column rank.
///
/// A column that is constant within every entity vanishes after demeaning, up
/// to rounding of the entity means. It is judged against its own norm before
/// demeaning (`raw_norms`) and reported by name. Other deficiencies come from
/// the SVD of the column-normalized matrix, which keeps wildly different
/// covariate scales (index points vs. currency) from masquerading as rank loss.
fn check_rank(x: &DMatrix<f64>, raw_norms: &[f64], names: &[&str]) -> Result<()> {
    let k = x.ncols();
    let n = x.nrows() as f64;
    let norms: Vec<f64> = (0..k).map(|j| x.column(j).norm()).collect();

    let absorbed: Vec<&str> = norms
        .iter()
        .zip(raw_norms)
        .zip(names)
        .filter(|&((&nrm, &raw), _)| nrm <= raw * n * ABSORBED_TOL)
        .map(|(_, &name)| name)
        .collect();
    if !absorbed.is_empty() {
        return Err(Error::ModelFit(format!(
            "covariate(s) collinear with entity effects (no within-entity variation): {}",
            absorbed.join(", ")
        )));
    }

    let mut scaled = x.clone();
    for (j, &nrm) in norms.iter().enumerate() {
        let mut col = scaled.column_mut(j);
        col /= nrm;
    }
    let sv = scaled.singular_values();
    let max_sv = sv.iter().copied().fold(0.0_f64, f64::max);
    let rank = sv.iter().filter(|&&s| s > max_sv * RANK_TOL).count();
    if rank < k {
        return Err(Error::ModelFit(format!(
            "design matrix is rank-deficient after demeaning (rank {rank} < {k}); covariates: {}",
            names.join(", ")
        )));
    }
    Ok(())
}

/// White heteroskedasticity-robust covariance for the within estimator.
///
/// `V = (X'X)^{-1} (Σ_i e_i² x_i x_i') (X'X)^{-1} · n / (n − N − k)`, where the
/// scale accounts for the absorbed entity effects.
pub fn heteroskedastic_cov(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    df_resid: usize,
) -> DMatrix<f64> {
    let n = x.nrows();
    let k = x.ncols();

    let mut meat = DMatrix::zeros(k, k);
    for i in 0..n {
        let e2 = residuals[i] * residuals[i];
        for a in 0..k {
            let xa = x[(i, a)] * e2;
            for b in 0..k {
                meat[(a, b)] += xa * x[(i, b)];
            }
        }
    }

    let correction = n as f64 / df_resid as f64;
    (xtx_inv * &meat) * xtx_inv * correction
}

/// Liang–Zeger cluster-robust (HC0 sandwich) covariance.
///
/// `V_CR = (X'X)^{-1} B (X'X)^{-1}` where `B = Σ_g X_g' e_g e_g' X_g`, with the
/// small-sample correction `G/(G−1) · (N−1)/(N−K)`.
pub fn cluster_robust_cov(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    cluster_ids: &[usize],
) -> DMatrix<f64> {
    let n = x.nrows();
    let k = x.ncols();
    let n_clusters = cluster_ids.iter().copied().max().map_or(0, |m| m + 1);

    // Score per cluster: s_g = X_g' e_g
    let mut scores = vec![0.0_f64; n_clusters * k];
    for i in 0..n {
        let g = cluster_ids[i];
        for j in 0..k {
            scores[g * k + j] += x[(i, j)] * residuals[i];
        }
    }

    let mut meat = DMatrix::zeros(k, k);
    for s_g in scores.chunks_exact(k) {
        for a in 0..k {
            for b in 0..k {
                meat[(a, b)] += s_g[a] * s_g[b];
            }
        }
    }

    let g = n_clusters as f64;
    let n_f = n as f64;
    let k_f = k as f64;
    let correction =
        if g > 1.0 && n_f > k_f { (g / (g - 1.0)) * ((n_f - 1.0) / (n_f - k_f)) } else { 1.0 };

    (xtx_inv * &meat) * xtx_inv * correction
}

/// Standard errors from a covariance matrix diagonal (negative variances clamp to 0).
pub fn std_errors(cov: &DMatrix<f64>) -> Vec<f64> {
    (0..cov.nrows()).map(|j| cov[(j, j)].max(0.0).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_within_two_entities_exact() {
        // Entity 0: y = 5 + 2x; entity 1: y = 10 + 2x.
        let entity = vec![0, 0, 0, 1, 1, 1];
        let x = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let y = vec![7.0, 9.0, 11.0, 30.0, 50.0, 70.0];

        let fit = within_fit(&entity, &x, &y, &["x"], CovarianceKind::Robust).unwrap();
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.entity_effects[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(fit.entity_effects[1], 10.0, epsilon = 1e-9);
        assert_eq!(fit.entity_sizes, vec![3, 3]);
        assert_eq!(fit.df_resid, 3);
        assert!(fit.rss < 1e-18);
    }

    #[test]
    fn test_within_with_noise_recovers_slope() {
        let entity = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let x = vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![8.1, 11.0, 13.9, 17.1, 13.0, 16.1, 18.9, 22.0];

        let fit = within_fit(&entity, &x, &y, &["x"], CovarianceKind::Unadjusted).unwrap();
        assert!((fit.coefficients[0] - 3.0).abs() < 0.2, "beta={}", fit.coefficients[0]);
        assert!((fit.entity_effects[0] - 5.0).abs() < 0.3);
        assert!((fit.entity_effects[1] - 10.0).abs() < 0.3);
        assert!(fit.covariance[(0, 0)] > 0.0);
    }

    #[test]
    fn test_all_covariance_kinds_finite() {
        let entity = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let y: Vec<f64> =
            x.iter().enumerate().map(|(i, &xi)| 2.0 * xi + 1.0 + 0.1 * (i % 3) as f64).collect();

        for kind in [CovarianceKind::Unadjusted, CovarianceKind::Robust, CovarianceKind::Clustered] {
            let fit = within_fit(&entity, &x, &y, &["x"], kind).unwrap();
            let se = std_errors(&fit.covariance);
            assert!(se[0].is_finite() && se[0] > 0.0, "{kind:?} se={}", se[0]);
        }
    }

    #[test]
    fn test_single_period_entity_gets_effect() {
        // Entity 2 is observed once: it does not move beta but gets α = y − xβ.
        let entity = vec![0, 0, 0, 1, 1, 1, 2];
        let x = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![3.0, 5.0, 7.0, 4.0, 6.0, 8.0, 100.0];

        let fit = within_fit(&entity, &x, &y, &["x"], CovarianceKind::Robust).unwrap();
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.entity_effects[2], 92.0, epsilon = 1e-9);
        assert_eq!(fit.residuals[6], 0.0);
    }

    #[test]
    fn test_time_invariant_covariate_is_rejected() {
        let entity = vec![0, 0, 0, 1, 1, 1];
        // column a varies within entities, column b is constant per entity
        let x = vec![1.0, 5.0, 2.0, 5.0, 4.0, 5.0, 1.0, 7.0, 3.0, 7.0, 2.0, 7.0];
        let y = vec![1.0, 2.0, 3.0, 4.0, 6.0, 5.0];
        let err = within_fit(&entity, &x, &y, &["a", "b"], CovarianceKind::Robust).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::ModelFit(_)));
        assert!(msg.contains("collinear with entity effects"), "{msg}");
        assert!(msg.ends_with(": b"), "{msg}");
    }

    #[test]
    fn test_large_time_invariant_covariate_is_rejected() {
        // Wage constant per entity at a magnitude where the entity mean does not
        // round-trip, so demeaning leaves ~1e-10 of noise instead of zeros.
        let entity = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let wages = [4217000.7, 3100000.3, 2876543.1];
        let hdi = [61.2, 63.5, 64.1, 70.3, 71.0, 72.8, 66.6, 67.9, 69.4];
        let x: Vec<f64> = entity.iter().zip(hdi).flat_map(|(&g, h)| [h, wages[g]]).collect();
        let y: Vec<f64> = entity
            .iter()
            .zip(hdi)
            .map(|(&g, h)| 100.0 * g as f64 + 3.0 * h + 0.1 * (h * 7.0).sin())
            .collect();

        let err = within_fit(
            &entity,
            &x,
            &y,
            &["human_development_index", "minimum_wage"],
            CovarianceKind::Robust,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ModelFit(_)));
        let msg = err.to_string();
        assert!(msg.contains("collinear with entity effects"), "{msg}");
        assert!(msg.ends_with(": minimum_wage"), "{msg}");
    }

    #[test]
    fn test_small_within_variation_is_kept() {
        // Wages move by a few thousand rupiah inside each entity: tiny relative
        // to their level, but real variation.
        let entity = vec![0, 0, 0, 1, 1, 1];
        let x: Vec<f64> = [
            (61.0, 3_100_000.0),
            (62.5, 3_104_000.0),
            (63.1, 3_101_500.0),
            (70.2, 4_200_000.0),
            (70.9, 4_203_000.0),
            (72.0, 4_208_000.0),
        ]
        .iter()
        .flat_map(|&(h, w)| [h, w])
        .collect();
        let y = vec![10.0, 12.5, 11.0, 30.0, 33.0, 35.5];
        let fit = within_fit(&entity, &x, &y, &["hdi", "wage"], CovarianceKind::Unadjusted);
        assert!(fit.is_ok(), "{:?}", fit.err());
    }

    #[test]
    fn test_collinear_covariates_are_rejected() {
        let entity = vec![0, 0, 0, 1, 1, 1];
        let a = [1.0, 2.0, 4.0, 1.0, 3.0, 2.0];
        let x: Vec<f64> = a.iter().flat_map(|&v| [v, 1000.0 * v]).collect();
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0];
        let err = within_fit(&entity, &x, &y, &["a", "a_scaled"], CovarianceKind::Robust);
        assert!(matches!(err, Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_degrees_of_freedom_exhausted() {
        let entity = vec![0, 0, 1, 1];
        let x = vec![1.0, 2.0, 1.0, 3.0];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        // n − N − k = 4 − 2 − 1 = 1 is fine; drop a row to exhaust it.
        assert!(within_fit(&entity, &x, &y, &["x"], CovarianceKind::Robust).is_ok());
        let err = within_fit(&entity[..3], &x[..3], &y[..3], &["x"], CovarianceKind::Robust);
        assert!(matches!(err, Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_validation() {
        assert!(within_fit(&[], &[], &[], &["x"], CovarianceKind::Robust).is_err());
        assert!(within_fit(&[0], &[1.0], &[1.0, 2.0], &["x"], CovarianceKind::Robust).is_err());
        assert!(within_fit(&[0, 0], &[1.0, 2.0], &[1.0, 2.0], &[], CovarianceKind::Robust).is_err());
    }

    #[test]
    fn test_heteroskedastic_cov_matches_hand_computation() {
        // Single entity, demeaned x = [-1, 0, 1], residuals e = [1, -2, 1]
        let x = DMatrix::from_row_slice(3, 1, &[-1.0, 0.0, 1.0]);
        let e = DVector::from_column_slice(&[1.0, -2.0, 1.0]);
        let xtx_inv = DMatrix::from_element(1, 1, 0.5);
        // meat = 1 + 0 + 1 = 2; V = 0.5 * 2 * 0.5 * 3/1
        let v = heteroskedastic_cov(&x, &e, &xtx_inv, 1);
        assert_relative_eq!(v[(0, 0)], 1.5, epsilon = 1e-12);
    }
}
