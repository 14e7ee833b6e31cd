use thiserror::Error;

/// Errors raised by the portfolio engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    /// Malformed input rejected before any computation runs.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A division by zero in Sharpe or beta, surfaced on request by
    /// [`crate::metrics::PortfolioMetrics::ensure_well_defined`].
    #[error("Degenerate computation: {0}")]
    DegenerateComputation(String),

    #[error("No candidate within tolerance of target return {target:.4} after {iterations} iterations")]
    NoConvergence { target: f64, iterations: usize },

    #[error("Search cancelled before any candidate was evaluated")]
    Cancelled,

    #[error("Deadline expired before any candidate was evaluated")]
    DeadlineExceeded,
}

impl PortfolioError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
