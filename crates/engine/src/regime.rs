//! Market regime classification

use serde::{Deserialize, Serialize};

use crate::types::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Upside,
    Downside,
    Consolidation,
}

/// Label the market from price, the reference EMA and the daily bounds.
///
/// Upside needs price above the EMA and above support; downside needs price
/// below the EMA and below resistance. Anything else is consolidation.
pub fn classify(current_price: f64, ema: f64, bounds: &Bounds) -> Regime {
    if current_price > ema && current_price > bounds.support {
        Regime::Upside
    } else if current_price < ema && current_price < bounds.resistance {
        Regime::Downside
    } else {
        Regime::Consolidation
    }
}
