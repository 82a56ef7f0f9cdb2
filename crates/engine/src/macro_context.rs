//! Macro context: latest CPI and nonfarm payrolls, reduced to impact tags.
//! Informational only; the strategy does not read it.

use serde::{Deserialize, Serialize};

use crate::api::{MacroSeries, MarketDataProvider};
use crate::error::SignalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
}

impl Impact {
    pub fn from_reading(value: f64) -> Self {
        if value > 0.0 {
            Impact::Positive
        } else {
            Impact::Negative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroReading {
    pub cpi: f64,
    pub nfp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroImpact {
    pub cpi_impact: Impact,
    pub nfp_impact: Impact,
}

/// Fetch the latest CPI and NFP readings concurrently
pub async fn latest_cpi_nfp(provider: &dyn MarketDataProvider) -> SignalResult<MacroReading> {
    let (cpi, nfp) = tokio::try_join!(
        provider.macro_series(MacroSeries::Cpi),
        provider.macro_series(MacroSeries::NonfarmPayroll),
    )?;
    Ok(MacroReading { cpi, nfp })
}

pub fn impact(cpi: f64, nfp: f64) -> MacroImpact {
    MacroImpact {
        cpi_impact: Impact::from_reading(cpi),
        nfp_impact: Impact::from_reading(nfp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_tags() {
        let tags = impact(310.3, -12.0);
        assert_eq!(tags.cpi_impact, Impact::Positive);
        assert_eq!(tags.nfp_impact, Impact::Negative);
    }

    #[test]
    fn test_zero_is_negative() {
        assert_eq!(Impact::from_reading(0.0), Impact::Negative);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_value(impact(1.0, 1.0)).unwrap();
        assert_eq!(json["cpi_impact"], "positive");
    }
}
