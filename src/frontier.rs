use crate::config::EngineConfig;
use crate::error::{PortfolioError, Result};
use crate::metrics::{Asset, PortfolioModel, RiskReturn, WeightVector};
use crate::search::{self, CancellationToken, SearchControl, sample_weights};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Stream ids for frontier points start here so they never collide with the
/// optimizer's stream.
const FRONTIER_STREAM_BASE: u64 = 1;

/// One sampled point on the efficient frontier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EfficientFrontierPoint {
    #[serde(rename = "return")]
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub weights: WeightVector,
}

/// Sweeps target returns and, for each, keeps the lowest-volatility random
/// portfolio whose return lands within tolerance of the target.
///
/// Points whose search finds no acceptable candidate are dropped, so the
/// frontier may come back shorter than requested.
#[derive(Clone, Debug, Default)]
pub struct EfficientFrontierSampler {
    config: EngineConfig,
    cancel: Option<CancellationToken>,
}

impl EfficientFrontierSampler {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, cancel: None }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Evenly spaced targets from `frontier_min_return` to `frontier_max_return`
    /// inclusive.
    pub fn target_returns(&self, num_points: usize) -> Vec<f64> {
        let lo = self.config.frontier_min_return;
        let hi = self.config.frontier_max_return;
        match num_points {
            0 => Vec::new(),
            1 => vec![lo],
            _ => {
                let step = (hi - lo) / (num_points - 1) as f64;
                (0..num_points).map(|i| lo + step * i as f64).collect()
            }
        }
    }

    pub fn generate_frontier(
        &self,
        assets: &[Asset],
        num_points: usize,
        iterations_per_point: usize,
    ) -> Result<Vec<EfficientFrontierPoint>> {
        let model = PortfolioModel::with_benchmark_proxy(assets, &self.config)?;
        self.generate_for_model(&model, num_points, iterations_per_point)
    }

    pub fn generate_for_model(
        &self,
        model: &PortfolioModel<'_>,
        num_points: usize,
        iterations_per_point: usize,
    ) -> Result<Vec<EfficientFrontierPoint>> {
        if iterations_per_point == 0 {
            return Err(PortfolioError::invalid("frontier needs at least one iteration per point"));
        }

        let seed = self.config.seed.unwrap_or_else(rand::random);
        let control = SearchControl::new(self.config.deadline, self.cancel.clone());
        let targets = self.target_returns(num_points);

        info!(
            "Sampling efficient frontier: {} targets in [{:.2}, {:.2}], {} samples each (seed {})",
            targets.len(),
            self.config.frontier_min_return,
            self.config.frontier_max_return,
            iterations_per_point,
            seed
        );

        let results: Vec<Result<EfficientFrontierPoint>> = targets
            .par_iter()
            .enumerate()
            .map(|(idx, &target)| self.search_point(model, target, idx, iterations_per_point, seed, &control))
            .collect();

        let mut points = Vec::with_capacity(results.len());
        let mut stopped: Option<PortfolioError> = None;
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(point) => points.push(point),
                Err(e @ (PortfolioError::Cancelled | PortfolioError::DeadlineExceeded)) => {
                    if stopped.is_none() {
                        stopped = Some(e);
                    }
                }
                Err(e) => debug!("Frontier target {:.4} skipped: {}", target, e),
            }
        }

        if let Some(e) = stopped {
            if points.is_empty() {
                return Err(e);
            }
            warn!("Frontier stopped early: {}; returning {} points", e, points.len());
        }

        points.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));

        info!(
            "Frontier sampled: {} of {} points converged",
            points.len(),
            targets.len()
        );
        Ok(points)
    }

    fn search_point(
        &self,
        model: &PortfolioModel<'_>,
        target: f64,
        idx: usize,
        iterations: usize,
        seed: u64,
        control: &SearchControl,
    ) -> Result<EfficientFrontierPoint> {
        let n = model.num_assets();
        let tolerance = self.config.frontier_tolerance;

        let outcome = search::run(
            iterations,
            seed,
            FRONTIER_STREAM_BASE + idx as u64,
            control,
            |rng| {
                let weights = sample_weights(n, rng);
                let rr = model.risk_return(&weights);
                ((rr.expected_return - target).abs() <= tolerance).then_some((weights, rr))
            },
            |(_, rr): &(WeightVector, RiskReturn)| -rr.volatility,
        );

        let best = outcome.best.ok_or_else(|| {
            if outcome.evaluated < iterations {
                control.stop_error()
            } else {
                PortfolioError::NoConvergence { target, iterations }
            }
        })?;

        let (weights, rr) = best.value;
        Ok(EfficientFrontierPoint {
            expected_return: rr.expected_return,
            volatility: rr.volatility,
            sharpe_ratio: rr.sharpe_ratio,
            weights,
        })
    }
}

/// Convenience entry point with the default regime.
pub fn generate_frontier(
    assets: &[Asset],
    num_points: usize,
    iterations_per_point: usize,
) -> Result<Vec<EfficientFrontierPoint>> {
    EfficientFrontierSampler::default().generate_frontier(assets, num_points, iterations_per_point)
}
