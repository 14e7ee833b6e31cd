//! Portfolio risk/return statistics and random-search allocation.
//!
//! Prices flow one way: prices → returns → covariance and means → portfolio
//! metrics → optimizer decisions → frontier points. Every operation is a pure
//! function of its inputs apart from the optimizer's seeded random stream.

pub mod config;
pub mod covariance;
pub mod error;
pub mod frontier;
pub mod metrics;
pub mod optimizer;
pub mod report;
pub mod returns;
pub mod search;
pub mod synthetic;

pub use config::EngineConfig;
pub use covariance::{CovarianceMatrix, compute_covariance};
pub use error::{PortfolioError, Result};
pub use frontier::{EfficientFrontierPoint, EfficientFrontierSampler, generate_frontier};
pub use metrics::{Asset, Degeneracy, PortfolioMetrics, PortfolioModel, WeightVector, compute_metrics};
pub use optimizer::{RandomSearchOptimizer, optimize};
pub use returns::compute_returns;
pub use search::CancellationToken;
