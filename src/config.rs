use rayon::ThreadPoolBuilder;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Risk-free annual rate used in Sharpe calculations.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Annual trading days for annualization.
pub const DEFAULT_TRADING_DAYS: f64 = 252.0;

/// One-sided 95% z-score for parametric VaR.
pub const DEFAULT_VAR_Z_SCORE: f64 = 1.645;

/// Random samples drawn when searching for the maximum-Sharpe portfolio.
pub const DEFAULT_OPTIMIZER_ITERATIONS: usize = 10_000;

pub const DEFAULT_FRONTIER_POINTS: usize = 50;
pub const DEFAULT_FRONTIER_ITERATIONS: usize = 1_000;
pub const DEFAULT_FRONTIER_MIN_RETURN: f64 = 0.05;
pub const DEFAULT_FRONTIER_MAX_RETURN: f64 = 0.30;

/// Absolute distance from a frontier target return a candidate may sit at.
pub const DEFAULT_FRONTIER_TOLERANCE: f64 = 0.01;

/// Annualized volatility at or below this is rounding noise and counts as zero.
pub const DEFAULT_ZERO_VOLATILITY_TOLERANCE: f64 = 1e-10;

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

/// Tunable constants of the engine. `Default` is the standard regime: 2% risk-free rate, 252 trading days, 95% VaR.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub risk_free_rate: f64,
    pub trading_days: f64,
    pub var_z_score: f64,
    pub optimizer_iterations: usize,
    pub frontier_points: usize,
    pub frontier_iterations: usize,
    pub frontier_min_return: f64,
    pub frontier_max_return: f64,
    pub frontier_tolerance: f64,
    pub zero_volatility_tolerance: f64,
    /// Base seed for the random search. `None` draws a fresh one per call.
    pub seed: Option<u64>,
    /// Wall-clock budget for a single optimizer or frontier call.
    pub deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            trading_days: DEFAULT_TRADING_DAYS,
            var_z_score: DEFAULT_VAR_Z_SCORE,
            optimizer_iterations: DEFAULT_OPTIMIZER_ITERATIONS,
            frontier_points: DEFAULT_FRONTIER_POINTS,
            frontier_iterations: DEFAULT_FRONTIER_ITERATIONS,
            frontier_min_return: DEFAULT_FRONTIER_MIN_RETURN,
            frontier_max_return: DEFAULT_FRONTIER_MAX_RETURN,
            frontier_tolerance: DEFAULT_FRONTIER_TOLERANCE,
            zero_volatility_tolerance: DEFAULT_ZERO_VOLATILITY_TOLERANCE,
            seed: None,
            deadline: None,
        }
    }
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Defaults overlaid with `PORTFOLIO_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `PORTFOLIO_*` key.
    /// Unparsable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        override_from(&lookup, "PORTFOLIO_RISK_FREE_RATE", &mut cfg.risk_free_rate);
        override_from(&lookup, "PORTFOLIO_TRADING_DAYS", &mut cfg.trading_days);
        override_from(&lookup, "PORTFOLIO_VAR_Z_SCORE", &mut cfg.var_z_score);
        override_from(&lookup, "PORTFOLIO_ITERATIONS", &mut cfg.optimizer_iterations);
        override_from(&lookup, "PORTFOLIO_FRONTIER_POINTS", &mut cfg.frontier_points);
        override_from(&lookup, "PORTFOLIO_FRONTIER_ITERATIONS", &mut cfg.frontier_iterations);
        override_from(&lookup, "PORTFOLIO_FRONTIER_MIN_RETURN", &mut cfg.frontier_min_return);
        override_from(&lookup, "PORTFOLIO_FRONTIER_MAX_RETURN", &mut cfg.frontier_max_return);
        override_from(&lookup, "PORTFOLIO_FRONTIER_TOLERANCE", &mut cfg.frontier_tolerance);
        override_from(&lookup, "PORTFOLIO_ZERO_VOL_TOLERANCE", &mut cfg.zero_volatility_tolerance);

        let mut seed: Option<u64> = None;
        override_from(&lookup, "PORTFOLIO_SEED", &mut seed);
        if seed.is_some() {
            cfg.seed = seed;
        }

        let mut deadline_ms: Option<u64> = None;
        override_from(&lookup, "PORTFOLIO_DEADLINE_MS", &mut deadline_ms);
        if let Some(ms) = deadline_ms {
            cfg.deadline = Some(Duration::from_millis(ms));
        }

        if cfg.trading_days <= 0.0 {
            warn!(
                "PORTFOLIO_TRADING_DAYS={} is not positive; defaulting to {}",
                cfg.trading_days, DEFAULT_TRADING_DAYS
            );
            cfg.trading_days = DEFAULT_TRADING_DAYS;
        }
        if cfg.var_z_score < 0.0 {
            warn!(
                "PORTFOLIO_VAR_Z_SCORE={} is negative; defaulting to {}",
                cfg.var_z_score, DEFAULT_VAR_Z_SCORE
            );
            cfg.var_z_score = DEFAULT_VAR_Z_SCORE;
        }
        if cfg.frontier_tolerance < 0.0 {
            warn!(
                "PORTFOLIO_FRONTIER_TOLERANCE={} is negative; defaulting to {}",
                cfg.frontier_tolerance, DEFAULT_FRONTIER_TOLERANCE
            );
            cfg.frontier_tolerance = DEFAULT_FRONTIER_TOLERANCE;
        }
        if cfg.zero_volatility_tolerance < 0.0 {
            warn!(
                "PORTFOLIO_ZERO_VOL_TOLERANCE={} is negative; defaulting to {}",
                cfg.zero_volatility_tolerance, DEFAULT_ZERO_VOLATILITY_TOLERANCE
            );
            cfg.zero_volatility_tolerance = DEFAULT_ZERO_VOLATILITY_TOLERANCE;
        }
        if cfg.frontier_min_return > cfg.frontier_max_return {
            warn!(
                "Frontier bounds inverted ({} > {}); swapping",
                cfg.frontier_min_return, cfg.frontier_max_return
            );
            std::mem::swap(&mut cfg.frontier_min_return, &mut cfg.frontier_max_return);
        }

        cfg
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: Parse,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    match T::parse(trimmed) {
        Some(v) => *slot = v,
        None => warn!("Unparsable {}={} ; keeping default", key, trimmed),
    }
}

trait Parse: Sized {
    fn parse(raw: &str) -> Option<Self>;
}

impl Parse for f64 {
    fn parse(raw: &str) -> Option<Self> {
        f64::from_str(raw).ok().filter(|v| v.is_finite())
    }
}

impl Parse for usize {
    fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl Parse for Option<u64> {
    fn parse(raw: &str) -> Option<Self> {
        raw.parse::<u64>().ok().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.risk_free_rate, 0.02);
        assert_eq!(cfg.trading_days, 252.0);
        assert_eq!(cfg.var_z_score, 1.645);
        assert_eq!(cfg.optimizer_iterations, 10_000);
        assert_eq!(cfg.frontier_points, 50);
        assert_eq!(cfg.frontier_iterations, 1_000);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_lookup_overrides() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PORTFOLIO_RISK_FREE_RATE", "0.045"),
            ("PORTFOLIO_ITERATIONS", "2500"),
            ("PORTFOLIO_SEED", "99"),
            ("PORTFOLIO_DEADLINE_MS", "1500"),
        ]));

        assert_eq!(cfg.risk_free_rate, 0.045);
        assert_eq!(cfg.optimizer_iterations, 2500);
        assert_eq!(cfg.seed, Some(99));
        assert_eq!(cfg.deadline, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.trading_days, DEFAULT_TRADING_DAYS);
    }

    #[test]
    fn test_lookup_ignores_garbage() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PORTFOLIO_TRADING_DAYS", "lots"),
            ("PORTFOLIO_ITERATIONS", "-3"),
            ("PORTFOLIO_VAR_Z_SCORE", "NaN"),
            ("PORTFOLIO_SEED", ""),
        ]));

        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_lookup_rejects_negative_tolerances() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PORTFOLIO_FRONTIER_TOLERANCE", "-0.01"),
            ("PORTFOLIO_VAR_Z_SCORE", "-1.645"),
            ("PORTFOLIO_ZERO_VOL_TOLERANCE", "-1"),
        ]));

        assert_eq!(cfg.frontier_tolerance, DEFAULT_FRONTIER_TOLERANCE);
        assert_eq!(cfg.var_z_score, DEFAULT_VAR_Z_SCORE);
        assert_eq!(cfg.zero_volatility_tolerance, DEFAULT_ZERO_VOLATILITY_TOLERANCE);

        let cfg = EngineConfig::from_lookup(lookup_from(&[("PORTFOLIO_FRONTIER_TOLERANCE", "0.02")]));
        assert_eq!(cfg.frontier_tolerance, 0.02);
    }

    #[test]
    fn test_lookup_swaps_inverted_frontier_bounds() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("PORTFOLIO_FRONTIER_MIN_RETURN", "0.4"),
            ("PORTFOLIO_FRONTIER_MAX_RETURN", "0.1"),
        ]));
        assert_eq!(cfg.frontier_min_return, 0.1);
        assert_eq!(cfg.frontier_max_return, 0.4);
    }
}
