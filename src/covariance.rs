use crate::config::DEFAULT_TRADING_DAYS;
use crate::error::{PortfolioError, Result};
use crate::returns::mean;

/// Square, symmetric matrix indexed `[asset_i][asset_j]`.
pub type CovarianceMatrix = Vec<Vec<f64>>;

/// Annualized sample covariance across assets, using 252 trading days.
pub fn compute_covariance<S: AsRef<[f64]>>(returns_by_asset: &[S]) -> Result<CovarianceMatrix> {
    compute_covariance_with(returns_by_asset, DEFAULT_TRADING_DAYS)
}

/// Annualized sample covariance (divisor `m - 1`) scaled by `trading_days`.
///
/// Every series must have the same length `m >= 2`. Only the upper triangle is
/// accumulated and then mirrored, so the result is exactly symmetric.
pub fn compute_covariance_with<S: AsRef<[f64]>>(
    returns_by_asset: &[S],
    trading_days: f64,
) -> Result<CovarianceMatrix> {
    let series: Vec<&[f64]> = returns_by_asset.iter().map(|s| s.as_ref()).collect();
    let n = series.len();
    if n == 0 {
        return Err(PortfolioError::invalid("covariance needs at least one return series"));
    }

    let m = series[0].len();
    if m < 2 {
        return Err(PortfolioError::invalid(format!(
            "covariance needs at least 2 return periods, got {}",
            m
        )));
    }
    if let Some((idx, s)) = series.iter().enumerate().find(|(_, s)| s.len() != m) {
        return Err(PortfolioError::invalid(format!(
            "return series {} has {} periods, expected {}",
            idx,
            s.len(),
            m
        )));
    }

    let means: Vec<f64> = series.iter().map(|s| mean(s)).collect();

    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let mut sum = 0.0;
            for k in 0..m {
                let di = series[i][k] - means[i];
                let dj = series[j][k] - means[j];
                sum += di * dj;
            }
            let covariance = sum / (m as f64 - 1.0) * trading_days;
            cov[i][j] = covariance;
            cov[j][i] = covariance;
        }
    }

    Ok(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_series(n: usize, m: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..m).map(|_| rng.gen_range(-0.05..0.05)).collect())
            .collect()
    }

    #[test]
    fn test_covariance_matrix_symmetry() {
        let series = random_series(4, 60, 7);
        let cov = compute_covariance(&series).unwrap();

        assert_eq!(cov.len(), 4);
        for i in 0..4 {
            assert_eq!(cov[i].len(), 4);
            for j in 0..4 {
                assert_eq!(cov[i][j], cov[j][i], "Covariance matrix should be symmetric");
            }
        }
    }

    #[test]
    fn test_diagonal_matches_annualized_variance() {
        let series = random_series(3, 120, 11);
        let cov = compute_covariance(&series).unwrap();

        for (i, s) in series.iter().enumerate() {
            let mu = s.iter().sum::<f64>() / s.len() as f64;
            let var = s.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / (s.len() as f64 - 1.0);
            assert_relative_eq!(cov[i][i], var * 252.0, max_relative = 1e-12);
            assert!(cov[i][i] > 0.0, "Variance should be positive");
        }
    }

    #[test]
    fn test_known_two_asset_covariance() {
        // y = 2x exactly, so cov(x, y) = 2 var(x) and var(y) = 4 var(x).
        let x = vec![0.01, -0.02, 0.03, 0.00];
        let y: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        let cov = compute_covariance_with(&[x, y], 1.0).unwrap();

        assert_relative_eq!(cov[0][1], 2.0 * cov[0][0], max_relative = 1e-12);
        assert_relative_eq!(cov[1][1], 4.0 * cov[0][0], max_relative = 1e-12);
    }

    #[test]
    fn test_covariance_rejects_bad_shapes() {
        assert!(compute_covariance::<Vec<f64>>(&[]).is_err());
        assert!(compute_covariance(&[vec![0.1]]).is_err());
        assert!(matches!(
            compute_covariance(&[vec![0.1, 0.2], vec![0.1, 0.2, 0.3]]),
            Err(PortfolioError::InvalidInput(_))
        ));
    }
}
