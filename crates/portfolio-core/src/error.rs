use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    /// Malformed or mismatched inputs: empty ticker lists, duplicate tickers,
    /// ticker sets that disagree between a price table and a weight vector.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A zero denominator in return or growth math. Never replaced by ±inf.
    #[error("Division by zero: {0}")]
    DivideByZero(String),

    /// The weighting optimizer did not converge or the covariance is singular.
    #[error("Optimization error: {0}")]
    Optimization(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type PortfolioResult<T> = Result<T, PortfolioError>;
