use crate::config::EngineConfig;
use crate::covariance::{compute_covariance_with, CovarianceMatrix};
use crate::error::{PortfolioError, Result};
use crate::returns::{compute_returns, mean, validate_prices};
use serde::Serialize;
use std::collections::HashSet;

/// Relative slack allowed between an asset's stored returns and its prices.
const RETURN_MATCH_TOLERANCE: f64 = 1e-9;

/// One weight per asset, in the same order as the asset list.
pub type WeightVector = Vec<f64>;

// ──────────────────────────────────────────────────────────────────────────────
// Data Structures
// ──────────────────────────────────────────────────────────────────────────────

/// A priced asset with its derived simple returns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    /// Chronological, strictly positive prices.
    pub prices: Vec<f64>,
    /// `prices.len() - 1` simple returns.
    pub returns: Vec<f64>,
    /// Current holding weight, if the caller tracks one.
    pub weight: Option<f64>,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, prices: Vec<f64>) -> Result<Self> {
        let returns = compute_returns(&prices)?;
        Ok(Self {
            symbol: symbol.into(),
            name: name.into(),
            prices,
            returns,
            weight: None,
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Why a metric in [`PortfolioMetrics`] is not a finite ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Degeneracy {
    /// Portfolio volatility is zero; Sharpe is ±inf (NaN with zero excess return).
    ZeroVolatility,
    /// Benchmark returns have zero variance; beta is NaN.
    ZeroMarketVariance,
}

/// Full risk/return bundle for one weight vector.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub beta: f64,
    /// One-day parametric 95% VaR, expressed as a (negative) return.
    pub var_95: f64,
    pub max_drawdown: f64,
    pub weights: WeightVector,
    pub degeneracies: Vec<Degeneracy>,
}

impl PortfolioMetrics {
    pub fn is_degenerate(&self) -> bool {
        !self.degeneracies.is_empty()
    }

    /// Turns any recorded degeneracy into a `DegenerateComputation` error.
    pub fn ensure_well_defined(&self) -> Result<&Self> {
        match self.degeneracies.first() {
            None => Ok(self),
            Some(Degeneracy::ZeroVolatility) => Err(PortfolioError::DegenerateComputation(
                "portfolio volatility is zero; Sharpe ratio undefined".to_string(),
            )),
            Some(Degeneracy::ZeroMarketVariance) => Err(PortfolioError::DegenerateComputation(
                "market returns have zero variance; beta undefined".to_string(),
            )),
        }
    }
}

/// Annualized return, volatility and Sharpe only; what the search loops rank on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskReturn {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

// ──────────────────────────────────────────────────────────────────────────────
// Public Operations
// ──────────────────────────────────────────────────────────────────────────────

/// Metrics for `weights` over `assets`, benchmarked against `market_returns`,
/// under the default configuration.
pub fn compute_metrics(
    assets: &[Asset],
    weights: &[f64],
    market_returns: &[f64],
) -> Result<PortfolioMetrics> {
    compute_metrics_with(assets, weights, market_returns, &EngineConfig::default())
}

pub fn compute_metrics_with(
    assets: &[Asset],
    weights: &[f64],
    market_returns: &[f64],
    config: &EngineConfig,
) -> Result<PortfolioMetrics> {
    PortfolioModel::new(assets, market_returns.to_vec(), config)?.evaluate(weights)
}

/// Metrics for the holding weights carried on each asset.
pub fn compute_metrics_for_holdings(
    assets: &[Asset],
    market_returns: &[f64],
) -> Result<PortfolioMetrics> {
    let weights = assets
        .iter()
        .map(|a| {
            a.weight.ok_or_else(|| {
                PortfolioError::invalid(format!("asset {} has no holding weight", a.symbol))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    compute_metrics(assets, &weights, market_returns)
}

/// Per-period average of the assets' returns; the benchmark used when the
/// caller does not supply one.
pub fn equal_weight_benchmark(assets: &[Asset]) -> Result<Vec<f64>> {
    let periods = validate_assets(assets)?;
    let n = assets.len() as f64;
    Ok((0..periods)
        .map(|t| assets.iter().map(|a| a.returns[t]).sum::<f64>() / n)
        .collect())
}

/// Largest peak-to-trough decline of a value series, as a fraction of the peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

/// Normalizes caller weights onto the simplex. Entries must be finite and
/// non-negative with at least one positive. Weights are scaled by the largest
/// entry before summing so huge inputs cannot overflow the sum.
pub fn normalize_weights(weights: &[f64], num_assets: usize) -> Result<WeightVector> {
    if weights.len() != num_assets {
        return Err(PortfolioError::invalid(format!(
            "weight vector has {} entries for {} assets",
            weights.len(),
            num_assets
        )));
    }
    if let Some((idx, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(PortfolioError::invalid(format!(
            "weight at index {} must be finite and non-negative, got {}",
            idx, w
        )));
    }
    let largest = weights.iter().copied().fold(0.0_f64, f64::max);
    if largest <= 0.0 {
        return Err(PortfolioError::invalid("weights sum to zero"));
    }
    let scaled: Vec<f64> = weights.iter().map(|w| w / largest).collect();
    let sum: f64 = scaled.iter().sum();
    Ok(scaled.iter().map(|w| w / sum).collect())
}

// ──────────────────────────────────────────────────────────────────────────────
// Portfolio Model
// ──────────────────────────────────────────────────────────────────────────────

/// Validated statistics for one asset universe, computed once and evaluated
/// for as many weight vectors as needed.
#[derive(Debug)]
pub struct PortfolioModel<'a> {
    assets: &'a [Asset],
    annual_means: Vec<f64>,
    covariance: CovarianceMatrix,
    market_deviations: Vec<f64>,
    market_sum_squares: f64,
    risk_free_rate: f64,
    trading_days: f64,
    var_z_score: f64,
    zero_volatility_tolerance: f64,
}

impl<'a> PortfolioModel<'a> {
    pub fn new(assets: &'a [Asset], market_returns: Vec<f64>, config: &EngineConfig) -> Result<Self> {
        let periods = validate_assets(assets)?;
        if market_returns.len() != periods {
            return Err(PortfolioError::invalid(format!(
                "market series has {} periods, assets have {}",
                market_returns.len(),
                periods
            )));
        }
        if market_returns.iter().any(|r| !r.is_finite()) {
            return Err(PortfolioError::invalid("market returns must be finite"));
        }
        if !(config.trading_days > 0.0) {
            return Err(PortfolioError::invalid("trading_days must be positive"));
        }

        let series: Vec<&[f64]> = assets.iter().map(|a| a.returns.as_slice()).collect();
        let covariance = compute_covariance_with(&series, config.trading_days)?;
        let annual_means = series
            .iter()
            .map(|s| mean(s) * config.trading_days)
            .collect();

        let market_mean = mean(&market_returns);
        let market_deviations: Vec<f64> = market_returns.iter().map(|r| r - market_mean).collect();
        let market_sum_squares = market_deviations.iter().map(|d| d * d).sum();

        Ok(Self {
            assets,
            annual_means,
            covariance,
            market_deviations,
            market_sum_squares,
            risk_free_rate: config.risk_free_rate,
            trading_days: config.trading_days,
            var_z_score: config.var_z_score,
            zero_volatility_tolerance: config.zero_volatility_tolerance.max(0.0),
        })
    }

    /// Benchmarks the universe against its own equal-weighted average.
    pub fn with_benchmark_proxy(assets: &'a [Asset], config: &EngineConfig) -> Result<Self> {
        let market = equal_weight_benchmark(assets)?;
        Self::new(assets, market, config)
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn assets(&self) -> &'a [Asset] {
        self.assets
    }

    pub fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    pub fn annual_means(&self) -> &[f64] {
        &self.annual_means
    }

    /// Validates and normalizes `weights`, then computes the full bundle.
    pub fn evaluate(&self, weights: &[f64]) -> Result<PortfolioMetrics> {
        let weights = normalize_weights(weights, self.num_assets())?;
        Ok(self.evaluate_normalized(weights))
    }

    /// `weights` must already be normalized and sized to the universe.
    pub(crate) fn evaluate_normalized(&self, weights: WeightVector) -> PortfolioMetrics {
        let rr = self.risk_return(&weights);
        let mut degeneracies = Vec::new();
        if rr.volatility == 0.0 {
            degeneracies.push(Degeneracy::ZeroVolatility);
        }

        let beta = if self.market_sum_squares > 0.0 {
            self.portfolio_market_covariance(&weights) / self.market_sum_squares
        } else {
            degeneracies.push(Degeneracy::ZeroMarketVariance);
            f64::NAN
        };

        let var_95 = -self.var_z_score * rr.volatility / self.trading_days.sqrt();
        let max_drawdown = max_drawdown(&self.value_series(&weights));

        PortfolioMetrics {
            expected_return: rr.expected_return,
            volatility: rr.volatility,
            sharpe_ratio: rr.sharpe_ratio,
            beta,
            var_95,
            max_drawdown,
            weights,
            degeneracies,
        }
    }

    /// Return, volatility and Sharpe for normalized `weights`.
    pub fn risk_return(&self, weights: &[f64]) -> RiskReturn {
        let expected_return: f64 = weights
            .iter()
            .zip(&self.annual_means)
            .map(|(w, r)| w * r)
            .sum();

        let n = weights.len();
        let mut variance = 0.0_f64;
        for i in 0..n {
            for j in 0..n {
                variance += weights[i] * weights[j] * self.covariance[i][j];
            }
        }
        // Rounding can push a near-zero variance slightly negative, or leave a
        // riskless mix with a few ulps of volatility; both count as zero.
        let volatility = variance.max(0.0).sqrt();
        let volatility = if volatility <= self.zero_volatility_tolerance {
            0.0
        } else {
            volatility
        };

        RiskReturn {
            expected_return,
            volatility,
            sharpe_ratio: sharpe_ratio(expected_return - self.risk_free_rate, volatility),
        }
    }

    /// Sum of (portfolio deviation × market deviation) over the return periods.
    /// Divided by the market sum of squares this is the population-style beta.
    fn portfolio_market_covariance(&self, weights: &[f64]) -> f64 {
        let periods = self.market_deviations.len();
        let portfolio_returns: Vec<f64> = (0..periods)
            .map(|t| {
                weights
                    .iter()
                    .zip(self.assets)
                    .map(|(w, a)| w * a.returns[t])
                    .sum()
            })
            .collect();
        let portfolio_mean = mean(&portfolio_returns);

        portfolio_returns
            .iter()
            .zip(&self.market_deviations)
            .map(|(p, dm)| (p - portfolio_mean) * dm)
            .sum()
    }

    /// Weighted sum of raw prices at each observation.
    fn value_series(&self, weights: &[f64]) -> Vec<f64> {
        let observations = self.assets[0].prices.len();
        (0..observations)
            .map(|t| {
                weights
                    .iter()
                    .zip(self.assets)
                    .map(|(w, a)| w * a.prices[t])
                    .sum()
            })
            .collect()
    }
}

fn sharpe_ratio(excess_return: f64, volatility: f64) -> f64 {
    if volatility > 0.0 {
        excess_return / volatility
    } else if excess_return > 0.0 {
        f64::INFINITY
    } else if excess_return < 0.0 {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

/// Stored and recomputed returns may differ only by rounding.
fn returns_agree(stored: f64, derived: f64) -> bool {
    stored.is_finite() && (stored - derived).abs() <= RETURN_MATCH_TOLERANCE * derived.abs().max(1.0)
}

/// Checks the universe is non-empty, uniquely keyed and aligned; returns the
/// shared number of return periods.
fn validate_assets(assets: &[Asset]) -> Result<usize> {
    let first = assets
        .first()
        .ok_or_else(|| PortfolioError::invalid("asset list is empty"))?;
    let observations = first.prices.len();

    let mut seen = HashSet::with_capacity(assets.len());
    for asset in assets {
        if !seen.insert(asset.symbol.as_str()) {
            return Err(PortfolioError::invalid(format!(
                "duplicate symbol {}",
                asset.symbol
            )));
        }
        validate_prices(&asset.prices).map_err(|e| match e {
            PortfolioError::InvalidInput(msg) => {
                PortfolioError::invalid(format!("{}: {}", asset.symbol, msg))
            }
            other => other,
        })?;
        if asset.prices.len() != observations {
            return Err(PortfolioError::invalid(format!(
                "{} has {} price observations, expected {}",
                asset.symbol,
                asset.prices.len(),
                observations
            )));
        }
        if asset.returns.len() != observations - 1 {
            return Err(PortfolioError::invalid(format!(
                "{} has {} returns for {} prices",
                asset.symbol,
                asset.returns.len(),
                observations
            )));
        }
        if let Some(t) = asset
            .prices
            .windows(2)
            .zip(&asset.returns)
            .position(|(w, r)| !returns_agree(*r, (w[1] - w[0]) / w[0]))
        {
            return Err(PortfolioError::invalid(format!(
                "{} return at period {} does not match its prices",
                asset.symbol, t
            )));
        }
    }

    Ok(observations - 1)
}
