use portfolio_core::PortfolioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allocation policy used to derive portfolio weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeightingPolicy {
    #[default]
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "inverse_vol")]
    InverseVolatility,
    #[serde(rename = "sharpe_opt")]
    SharpeOptimal,
}

impl WeightingPolicy {
    pub const ALL: [WeightingPolicy; 3] = [
        WeightingPolicy::Equal,
        WeightingPolicy::InverseVolatility,
        WeightingPolicy::SharpeOptimal,
    ];

    /// Short identifier used in configuration and file names.
    pub fn key(&self) -> &'static str {
        match self {
            WeightingPolicy::Equal => "equal",
            WeightingPolicy::InverseVolatility => "inverse_vol",
            WeightingPolicy::SharpeOptimal => "sharpe_opt",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WeightingPolicy::Equal => "Equal Weighting",
            WeightingPolicy::InverseVolatility => "Inverse Volatility Weighting",
            WeightingPolicy::SharpeOptimal => "Sharpe-Optimized Weighting",
        }
    }

    /// Plain-language explanation printed in reports.
    pub fn description(&self) -> &'static str {
        match self {
            WeightingPolicy::Equal => {
                "Every asset receives the same share of the portfolio regardless of its \
                 volatility or expected return. No price history is needed, and the \
                 allocation stays diversified by construction."
            }
            WeightingPolicy::InverseVolatility => {
                "Each asset is weighted in proportion to the inverse of its recent daily \
                 return volatility. Calmer assets receive larger weights, which tends to \
                 lower the overall risk of the portfolio."
            }
            WeightingPolicy::SharpeOptimal => {
                "Weights are chosen by an optimizer that maximizes the ratio of expected \
                 return to downside risk, estimated from the historical mean returns and \
                 co-movements of the assets. Only long positions are allowed."
            }
        }
    }

    pub fn requires_prices(&self) -> bool {
        !matches!(self, WeightingPolicy::Equal)
    }
}

impl fmt::Display for WeightingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for WeightingPolicy {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        WeightingPolicy::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| {
                PortfolioError::InvalidInput(format!(
                    "invalid weighting method '{}', choose from equal, inverse_vol or sharpe_opt",
                    s
                ))
            })
    }
}
