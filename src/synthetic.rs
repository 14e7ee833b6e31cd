//! Synthetic price histories for demos and tests. Not used by the metrics core.

use crate::error::{PortfolioError, Result};
use crate::metrics::Asset;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Daily returns are floored here so a random walk never reaches a zero price.
const MIN_DAILY_RETURN: f64 = -0.95;

const DEMO_SYMBOLS: &[(&str, &str)] = &[
    ("NVDA", "NVIDIA"),
    ("MSFT", "Microsoft"),
    ("AAPL", "Apple"),
    ("GOOGL", "Alphabet"),
    ("AMZN", "Amazon"),
    ("META", "Meta Platforms"),
    ("TLT", "20+ Year Treasury"),
    ("IAU", "Gold Trust"),
];

/// Drift/volatility profile of one synthetic asset, in annual terms.
#[derive(Clone, Debug)]
pub struct SyntheticAssetSpec {
    pub symbol: String,
    pub name: String,
    pub start_price: f64,
    pub annual_drift: f64,
    pub annual_vol: f64,
    /// Loading on the shared market shock.
    pub market_beta: f64,
}

/// Random walk with drift: every asset's daily return is its own drift plus
/// `market_beta` times a shared market shock plus an idiosyncratic shock.
#[derive(Clone, Debug)]
pub struct SyntheticMarket {
    /// Number of return periods; each asset gets `days + 1` prices.
    pub days: usize,
    pub annual_market_drift: f64,
    pub annual_market_vol: f64,
    pub trading_days: f64,
    pub seed: u64,
}

impl SyntheticMarket {
    pub fn new(days: usize, seed: u64) -> Self {
        Self {
            days,
            annual_market_drift: 0.08,
            annual_market_vol: 0.18,
            trading_days: 252.0,
            seed,
        }
    }

    /// A mixed equity/bond/gold universe of up to eight assets.
    pub fn demo_universe(num_assets: usize) -> Vec<SyntheticAssetSpec> {
        DEMO_SYMBOLS
            .iter()
            .take(num_assets)
            .enumerate()
            .map(|(i, (symbol, name))| {
                let defensive = matches!(*symbol, "TLT" | "IAU");
                SyntheticAssetSpec {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    start_price: 50.0 + 25.0 * i as f64,
                    annual_drift: if defensive { 0.01 } else { 0.03 + 0.03 * i as f64 },
                    annual_vol: if defensive { 0.10 } else { 0.15 + 0.04 * i as f64 },
                    market_beta: if defensive { 0.1 } else { 0.8 + 0.1 * i as f64 },
                }
            })
            .collect()
    }

    /// Generates the assets and the market return series they were driven by.
    pub fn generate(&self, specs: &[SyntheticAssetSpec]) -> Result<(Vec<Asset>, Vec<f64>)> {
        if self.days < 2 {
            return Err(PortfolioError::invalid("synthetic history needs at least 2 days"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let daily = |annual: f64| annual / self.trading_days;
        let daily_vol = |annual: f64| annual / self.trading_days.sqrt();

        let market_shock = Normal::new(0.0, daily_vol(self.annual_market_vol))
            .map_err(|e| PortfolioError::invalid(format!("market volatility: {}", e)))?;
        let market: Vec<f64> = (0..self.days)
            .map(|_| daily(self.annual_market_drift) + market_shock.sample(&mut rng))
            .collect();
        let market_excess: Vec<f64> = market
            .iter()
            .map(|m| m - daily(self.annual_market_drift))
            .collect();

        let mut assets = Vec::with_capacity(specs.len());
        for spec in specs {
            let shock = Normal::new(0.0, daily_vol(spec.annual_vol))
                .map_err(|e| PortfolioError::invalid(format!("{} volatility: {}", spec.symbol, e)))?;

            let mut prices = Vec::with_capacity(self.days + 1);
            let mut current_price = spec.start_price;
            prices.push(current_price);
            for m in &market_excess {
                let r = daily(spec.annual_drift) + spec.market_beta * m + shock.sample(&mut rng);
                current_price *= 1.0 + r.max(MIN_DAILY_RETURN);
                prices.push(current_price);
            }

            assets.push(Asset::new(spec.symbol.clone(), spec.name.clone(), prices)?);
        }

        Ok((assets, market))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shapes() {
        let market = SyntheticMarket::new(252, 1);
        let (assets, market_returns) = market.generate(&SyntheticMarket::demo_universe(5)).unwrap();

        assert_eq!(assets.len(), 5);
        assert_eq!(market_returns.len(), 252);
        for a in &assets {
            assert_eq!(a.prices.len(), 253);
            assert_eq!(a.returns.len(), 252);
            assert!(a.prices.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_generate_is_seeded() {
        let specs = SyntheticMarket::demo_universe(3);
        let a = SyntheticMarket::new(60, 42).generate(&specs).unwrap();
        let b = SyntheticMarket::new(60, 42).generate(&specs).unwrap();
        let c = SyntheticMarket::new(60, 43).generate(&specs).unwrap();

        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
        assert_ne!(a.1, c.1);
    }

    #[test]
    fn test_demo_universe_caps_at_known_symbols() {
        assert_eq!(SyntheticMarket::demo_universe(3).len(), 3);
        assert_eq!(SyntheticMarket::demo_universe(100).len(), DEMO_SYMBOLS.len());
    }

    #[test]
    fn test_rejects_short_history_and_bad_vol() {
        assert!(SyntheticMarket::new(1, 1).generate(&SyntheticMarket::demo_universe(2)).is_err());

        let mut specs = SyntheticMarket::demo_universe(1);
        specs[0].annual_vol = -1.0;
        assert!(SyntheticMarket::new(30, 1).generate(&specs).is_err());
    }

    #[test]
    fn test_synthetic_assets_feed_metrics() {
        let (assets, market) = SyntheticMarket::new(252, 8)
            .generate(&SyntheticMarket::demo_universe(4))
            .unwrap();
        let m = crate::metrics::compute_metrics(&assets, &[1.0; 4], &market).unwrap();
        assert!(m.volatility > 0.0);
        assert!(m.beta.is_finite());
        assert!(m.max_drawdown >= 0.0 && m.max_drawdown < 1.0);
    }
}
