use crate::frontier::EfficientFrontierPoint;
use crate::metrics::{Asset, PortfolioMetrics};
use serde::Serialize;

/// Everything one CLI run produces, for `--json` output.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub symbols: Vec<&'a str>,
    pub equal_weight: &'a PortfolioMetrics,
    pub optimized: &'a PortfolioMetrics,
    pub frontier: &'a [EfficientFrontierPoint],
}

pub fn to_json(report: &RunReport<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Pretty-prints a metrics bundle with its per-asset weights.
pub fn print_metrics(title: &str, assets: &[Asset], metrics: &PortfolioMetrics) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║  {:<58}║", title);
    println!("╠════════════════════════════════════════════════════════════╣");
    println!(
        "║  Expected Annual Return : {:>+8.2}%                        ║",
        metrics.expected_return * 100.0
    );
    println!(
        "║  Annual Volatility      : {:>8.2}%                        ║",
        metrics.volatility * 100.0
    );
    println!(
        "║  Sharpe Ratio           : {:>8.3}                         ║",
        metrics.sharpe_ratio
    );
    println!(
        "║  Beta                   : {:>8.3}                         ║",
        metrics.beta
    );
    println!(
        "║  1-Day VaR (95%)        : {:>+8.2}%                        ║",
        metrics.var_95 * 100.0
    );
    println!(
        "║  Max Drawdown           : {:>8.2}%                        ║",
        metrics.max_drawdown * 100.0
    );
    if metrics.is_degenerate() {
        println!(
            "║  Degenerate             : {:<33}║",
            format!("{:?}", metrics.degeneracies)
        );
    }
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Symbol   Weight    Last Price                             ║");
    println!("╠════════════════════════════════════════════════════════════╣");

    let mut sorted: Vec<(&Asset, f64)> = assets.iter().zip(metrics.weights.iter().copied()).collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (asset, w) in sorted {
        let last = asset.prices.last().copied().unwrap_or_default();
        println!(
            "║  {:<7} {:>7.2}%   ${:>9.2}                             ║",
            asset.symbol,
            w * 100.0,
            last
        );
    }
    println!("╚════════════════════════════════════════════════════════════╝");
}

pub fn print_frontier(points: &[EfficientFrontierPoint]) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║  Efficient Frontier ({:>3} points)                          ║", points.len());
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║     Return    Volatility    Sharpe                         ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    for p in points {
        println!(
            "║  {:>+8.2}%    {:>8.2}%   {:>7.3}                         ║",
            p.expected_return * 100.0,
            p.volatility * 100.0,
            p.sharpe_ratio
        );
    }
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("⚠  Random-search approximation on synthetic data. Not financial advice.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;

    #[test]
    fn test_report_serializes_frontier_return_key() {
        let assets = vec![
            Asset::new("AAAA", "A", vec![100.0, 101.0, 99.0, 103.0]).unwrap(),
            Asset::new("BBBB", "B", vec![20.0, 20.5, 20.1, 20.2]).unwrap(),
        ];
        let m = compute_metrics(&assets, &[0.5, 0.5], &[0.01, -0.01, 0.02]).unwrap();
        let frontier = vec![EfficientFrontierPoint {
            expected_return: 0.1,
            volatility: 0.2,
            sharpe_ratio: 0.4,
            weights: vec![0.5, 0.5],
        }];
        let report = RunReport {
            symbols: assets.iter().map(|a| a.symbol.as_str()).collect(),
            equal_weight: &m,
            optimized: &m,
            frontier: &frontier,
        };

        let json = to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frontier"][0]["return"], 0.1);
        assert_eq!(value["symbols"][1], "BBBB");
        assert!(value["optimized"]["sharpe_ratio"].is_number());

        print_metrics("Test", &assets, &m);
        print_frontier(&frontier);
    }
}
