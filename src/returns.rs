use crate::error::{PortfolioError, Result};

/// Converts a chronological price series into simple period-over-period returns.
///
/// `returns[i] = (prices[i + 1] - prices[i]) / prices[i]`, so the output is one
/// element shorter than the input. Prices must be finite and strictly positive.
pub fn compute_returns(prices: &[f64]) -> Result<Vec<f64>> {
    validate_prices(prices)?;

    Ok(prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect())
}

pub(crate) fn validate_prices(prices: &[f64]) -> Result<()> {
    if prices.len() < 2 {
        return Err(PortfolioError::invalid(format!(
            "price series needs at least 2 observations, got {}",
            prices.len()
        )));
    }
    if let Some((idx, p)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
        return Err(PortfolioError::invalid(format!(
            "price at index {} must be finite and positive, got {}",
            idx, p
        )));
    }
    Ok(())
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_returns_length_and_values() {
        let prices = [100.0, 110.0, 121.0, 108.9];
        let returns = compute_returns(&prices).unwrap();

        assert_eq!(returns.len(), prices.len() - 1);
        assert_relative_eq!(returns[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(returns[1], 0.10, epsilon = 1e-12);
        assert_relative_eq!(returns[2], -0.10, epsilon = 1e-12);
    }

    #[test]
    fn test_returns_reconstruct_prices() {
        let prices = [42.0, 43.5, 41.2, 41.2, 47.9, 39.01];
        let returns = compute_returns(&prices).unwrap();

        for (i, r) in returns.iter().enumerate() {
            let rebuilt = prices[i] * (1.0 + r);
            assert_relative_eq!(rebuilt, prices[i + 1], max_relative = 1e-12);
        }
    }

    #[test]
    fn test_returns_rejects_short_series() {
        assert!(matches!(
            compute_returns(&[100.0]),
            Err(PortfolioError::InvalidInput(_))
        ));
        assert!(compute_returns(&[]).is_err());
    }

    #[test]
    fn test_returns_rejects_non_positive_prices() {
        assert!(compute_returns(&[100.0, 0.0, 50.0]).is_err());
        assert!(compute_returns(&[100.0, -5.0]).is_err());
        assert!(compute_returns(&[100.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }
}
