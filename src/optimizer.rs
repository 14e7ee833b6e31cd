use crate::config::EngineConfig;
use crate::error::{PortfolioError, Result};
use crate::metrics::{Asset, PortfolioMetrics, PortfolioModel, RiskReturn, WeightVector};
use crate::search::{self, CancellationToken, SearchControl, sample_weights};
use tracing::{debug, info, warn};

/// Stream id mixed into the optimizer's chunk seeds.
const OPTIMIZER_STREAM: u64 = 0;

// ──────────────────────────────────────────────────────────────────────────────
// Optimizer: Monte Carlo Sampling for Maximum Sharpe
// ──────────────────────────────────────────────────────────────────────────────

/// Approximates the maximum-Sharpe long-only portfolio by random sampling.
///
/// Each trial draws uniform [0, 1) weights, normalizes them onto the simplex and
/// scores the candidate's Sharpe ratio; the best candidate wins (ties keep the
/// earliest trial). This is an approximation: more iterations improve the
/// expected result but nothing guarantees the true optimum is found.
///
/// Runs are reproducible when [`EngineConfig::seed`] is set.
#[derive(Clone, Debug, Default)]
pub struct RandomSearchOptimizer {
    config: EngineConfig,
    cancel: Option<CancellationToken>,
}

impl RandomSearchOptimizer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, cancel: None }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Searches using the equal-weighted average of the assets as benchmark
    /// for the reported beta.
    pub fn optimize(&self, assets: &[Asset], iterations: usize) -> Result<PortfolioMetrics> {
        let model = PortfolioModel::with_benchmark_proxy(assets, &self.config)?;
        self.optimize_model(&model, iterations)
    }

    pub fn optimize_against(
        &self,
        assets: &[Asset],
        market_returns: &[f64],
        iterations: usize,
    ) -> Result<PortfolioMetrics> {
        let model = PortfolioModel::new(assets, market_returns.to_vec(), &self.config)?;
        self.optimize_model(&model, iterations)
    }

    pub fn optimize_model(&self, model: &PortfolioModel<'_>, iterations: usize) -> Result<PortfolioMetrics> {
        if iterations == 0 {
            return Err(PortfolioError::invalid("optimizer needs at least one iteration"));
        }

        let n = model.num_assets();
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let control = SearchControl::new(self.config.deadline, self.cancel.clone());

        info!(
            "Optimizing portfolio with {} assets, {} random samples (seed {})...",
            n, iterations, seed
        );
        for (asset, mean) in model.assets().iter().zip(model.annual_means()) {
            debug!("  {}: E[r]={:.4}", asset.symbol, mean);
        }

        let outcome = search::run(
            iterations,
            seed,
            OPTIMIZER_STREAM,
            &control,
            |rng| {
                let weights = sample_weights(n, rng);
                let rr = model.risk_return(&weights);
                Some((weights, rr))
            },
            |(_, rr): &(WeightVector, RiskReturn)| rr.sharpe_ratio,
        );

        let best = outcome.best.ok_or_else(|| control.stop_error())?;
        if outcome.evaluated < iterations {
            warn!(
                "Optimizer stopped early after {} of {} samples",
                outcome.evaluated, iterations
            );
        }

        let (weights, rr) = best.value;
        info!(
            "Best portfolio at sample {}: E[r]={:.4}, σ={:.4}, Sharpe={:.3}",
            best.index, rr.expected_return, rr.volatility, rr.sharpe_ratio
        );

        Ok(model.evaluate_normalized(weights))
    }
}

/// Convenience entry point with the default regime.
pub fn optimize(assets: &[Asset], iterations: usize) -> Result<PortfolioMetrics> {
    RandomSearchOptimizer::default().optimize(assets, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use std::time::Duration;

    /// Prices whose returns follow `pattern` repeated `periods` times.
    fn prices_from(pattern: &[f64], periods: usize) -> Vec<f64> {
        let mut prices = vec![100.0];
        for t in 0..periods {
            let last = *prices.last().unwrap();
            prices.push(last * (1.0 + pattern[t % pattern.len()]));
        }
        prices
    }

    /// Three perfectly correlated assets offset by a constant daily return:
    /// every mix has the same volatility, so Sharpe rises with weight on AAAA.
    fn dominated_universe() -> Vec<Asset> {
        vec![
            Asset::new("AAAA", "Leader", prices_from(&[0.02, 0.0], 60)).unwrap(),
            Asset::new("BBBB", "Laggard", prices_from(&[0.01, -0.01], 60)).unwrap(),
            Asset::new("CCCC", "Middle", prices_from(&[0.015, -0.005], 60)).unwrap(),
        ]
    }

    fn seeded(seed: u64) -> RandomSearchOptimizer {
        RandomSearchOptimizer::new(EngineConfig::default().with_seed(seed))
    }

    #[test]
    fn test_optimizer_beats_equal_weight() {
        let assets = dominated_universe();
        let market = crate::metrics::equal_weight_benchmark(&assets).unwrap();
        let baseline = compute_metrics(&assets, &[1.0, 1.0, 1.0], &market).unwrap();

        for seed in 1..=5 {
            let best = seeded(seed).optimize(&assets, 1_000).unwrap();
            assert!(
                best.sharpe_ratio >= baseline.sharpe_ratio,
                "seed {}: optimized Sharpe {} below equal-weight {}",
                seed,
                best.sharpe_ratio,
                baseline.sharpe_ratio
            );
        }
    }

    #[test]
    fn test_optimizer_finds_dominant_asset() {
        let assets = dominated_universe();
        let best = seeded(42).optimize(&assets, 10_000).unwrap();
        assert!(best.weights[0] > 0.7, "weights: {:?}", best.weights);
    }

    #[test]
    fn test_optimizer_weights_on_simplex() {
        let assets = dominated_universe();
        for iterations in [1, 7, 300] {
            let best = seeded(9).optimize(&assets, iterations).unwrap();
            let sum: f64 = best.weights.iter().sum();
            assert_eq!(best.weights.len(), 3);
            assert!((sum - 1.0).abs() < 1e-10, "Weights should sum to 1.0, got {}", sum);
            assert!(best.weights.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_optimizer_is_reproducible_with_seed() {
        let assets = dominated_universe();
        let a = seeded(1234).optimize(&assets, 2_000).unwrap();
        let b = seeded(1234).optimize(&assets, 2_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_optimize_against_explicit_market() {
        let assets = dominated_universe();
        let market = assets[0].returns.clone();
        let best = seeded(5).optimize_against(&assets, &market, 500).unwrap();
        assert!(best.beta.is_finite());
        assert!(optimize(&assets, 50).is_ok());
    }

    #[test]
    fn test_optimizer_rejects_zero_iterations() {
        let assets = dominated_universe();
        assert!(matches!(
            seeded(1).optimize(&assets, 0),
            Err(PortfolioError::InvalidInput(_))
        ));
        assert!(seeded(1).optimize(&[], 100).is_err());
    }

    #[test]
    fn test_cancelled_optimizer() {
        let assets = dominated_universe();
        let token = CancellationToken::new();
        token.cancel();
        let result = seeded(1).with_cancellation(token).optimize(&assets, 10_000);
        assert_eq!(result, Err(PortfolioError::Cancelled));
    }

    #[test]
    fn test_expired_deadline_optimizer() {
        let assets = dominated_universe();
        let cfg = EngineConfig {
            deadline: Some(Duration::ZERO),
            ..EngineConfig::default().with_seed(1)
        };
        let result = RandomSearchOptimizer::new(cfg).optimize(&assets, 10_000);
        assert_eq!(result, Err(PortfolioError::DeadlineExceeded));
    }
}
