//! Rule-based strategy: sniper entries, indicator confirmation, pattern override
//!
//! Decision order, later rules overriding earlier ones:
//! 1. Consolidation holds and re-centres the consolidation price on the bounds.
//! 2. Sniper entry: trend regime with price within `sniper_range` of the near bound.
//! 3. Indicator confirmation, only when step 2 abstained.
//! 4. Pattern override: `double_top` forces a sell, then `double_bottom` forces a buy.
//!
//! Take-profit and stop-loss come from [`StrategyParams`] and exist only for
//! buy and sell decisions.

use serde::{Deserialize, Serialize};

use crate::patterns::{ChartPattern, Patterns};
use crate::regime::Regime;
use crate::types::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Exit multipliers applied to the entry price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitMultipliers {
    pub take_profit: f64,
    pub stop_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Max fractional distance from the near bound for a trend entry
    pub sniper_range: f64,
    pub long_exit: ExitMultipliers,
    pub short_exit: ExitMultipliers,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            sniper_range: 0.005,
            long_exit: ExitMultipliers {
                take_profit: 1.03,
                stop_loss: 0.99,
            },
            short_exit: ExitMultipliers {
                take_profit: 0.97,
                stop_loss: 1.01,
            },
        }
    }
}

/// Everything the strategy looks at
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub regime: Regime,
    pub current_price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bounds: Bounds,
    /// Mid-point of the short and long EMAs
    pub consolidation_price: f64,
    pub patterns: &'a Patterns,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub signal: Signal,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub consolidation_price: f64,
}

/// Pure decision function; never fails
pub fn decide(input: &StrategyInput<'_>, params: &StrategyParams) -> Decision {
    let price = input.current_price;
    let mut consolidation_price = input.consolidation_price;
    let mut signal = Signal::Hold;

    if input.regime == Regime::Consolidation {
        consolidation_price = input.bounds.midpoint();
    } else {
        signal = sniper_entry(input, params.sniper_range);
        if signal == Signal::Hold {
            signal = indicator_confirmation(input, consolidation_price);
        }
    }

    if input.patterns.contains(&ChartPattern::DoubleTop) {
        signal = Signal::Sell;
    }
    if input.patterns.contains(&ChartPattern::DoubleBottom) {
        signal = Signal::Buy;
    }

    let exit = match signal {
        Signal::Buy => Some(params.long_exit),
        Signal::Sell => Some(params.short_exit),
        Signal::Hold => None,
    };

    Decision {
        signal,
        take_profit: exit.map(|e| price * e.take_profit),
        stop_loss: exit.map(|e| price * e.stop_loss),
        consolidation_price,
    }
}

fn sniper_entry(input: &StrategyInput<'_>, sniper_range: f64) -> Signal {
    let price = input.current_price;
    let Bounds { support, resistance } = input.bounds;

    match input.regime {
        Regime::Upside if support > 0.0 && (price - support) / support < sniper_range => Signal::Buy,
        Regime::Downside if resistance > 0.0 && (resistance - price) / resistance < sniper_range => {
            Signal::Sell
        }
        _ => Signal::Hold,
    }
}

fn indicator_confirmation(input: &StrategyInput<'_>, consolidation_price: f64) -> Signal {
    let price = input.current_price;
    if price > consolidation_price && input.macd > input.macd_signal && input.rsi > 50.0 {
        Signal::Buy
    } else if price < consolidation_price && input.macd < input.macd_signal && input.rsi < 50.0 {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        regime: Regime,
        price: f64,
        ema: f64,
        bounds: (f64, f64),
        rsi: f64,
        macd: (f64, f64),
        patterns: &'a Patterns,
    ) -> StrategyInput<'a> {
        StrategyInput {
            regime,
            current_price: price,
            rsi,
            macd: macd.0,
            macd_signal: macd.1,
            bounds: Bounds::new(bounds.0, bounds.1),
            consolidation_price: ema,
            patterns,
        }
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("level should be present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_hold_in_consolidation() {
        let none = Patterns::new();
        let d = decide(
            &input(Regime::Consolidation, 100.0, 100.0, (98.0, 102.0), 50.0, (0.0, 0.0), &none),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Hold);
        assert_eq!(d.consolidation_price, 100.0);
        assert_eq!(d.take_profit, None);
        assert_eq!(d.stop_loss, None);
    }

    #[test]
    fn test_sniper_buy_on_uptrend() {
        let none = Patterns::new();
        let d = decide(
            &input(Regime::Upside, 100.3, 99.0, (100.0, 110.0), 60.0, (0.5, 0.2), &none),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Buy);
        assert_close(d.take_profit, 103.309);
        assert_close(d.stop_loss, 99.297);
    }

    #[test]
    fn test_sniper_sell_on_downtrend() {
        let none = Patterns::new();
        let d = decide(
            &input(Regime::Downside, 109.7, 111.0, (90.0, 110.0), 40.0, (-0.5, -0.2), &none),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Sell);
        assert_close(d.take_profit, 106.409);
        assert_close(d.stop_loss, 110.797);
    }

    #[test]
    fn test_double_top_overrides_buy() {
        let patterns: Patterns = [ChartPattern::DoubleTop].into();
        let d = decide(
            &input(Regime::Upside, 100.3, 99.0, (100.0, 110.0), 60.0, (0.5, 0.2), &patterns),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Sell);
        assert_close(d.take_profit, 100.3 * 0.97);
        assert_close(d.stop_loss, 100.3 * 1.01);
    }

    #[test]
    fn test_double_bottom_beats_double_top() {
        let patterns: Patterns = [ChartPattern::DoubleTop, ChartPattern::DoubleBottom].into();
        let d = decide(
            &input(Regime::Consolidation, 100.0, 100.0, (98.0, 102.0), 50.0, (0.0, 0.0), &patterns),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Buy);
        assert_close(d.take_profit, 103.0);
        assert_close(d.stop_loss, 99.0);
        assert_eq!(d.consolidation_price, 100.0);
    }

    #[test]
    fn test_indicator_confirmation_when_sniper_abstains() {
        let none = Patterns::new();
        // Upside but far from support: sniper abstains, indicators agree on buy
        let d = decide(
            &input(Regime::Upside, 105.0, 101.0, (100.0, 110.0), 62.0, (0.4, 0.1), &none),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Buy);

        // Same setup with bearish momentum: mixed evidence holds
        let d = decide(
            &input(Regime::Upside, 105.0, 101.0, (100.0, 110.0), 45.0, (0.1, 0.4), &none),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Hold);
        assert_eq!(d.take_profit, None);
    }

    #[test]
    fn test_triple_patterns_do_not_override() {
        let patterns: Patterns = [ChartPattern::TripleTop].into();
        let d = decide(
            &input(Regime::Consolidation, 100.0, 100.0, (98.0, 102.0), 50.0, (0.0, 0.0), &patterns),
            &StrategyParams::default(),
        );
        assert_eq!(d.signal, Signal::Hold);
    }

    #[test]
    fn test_custom_params() {
        let none = Patterns::new();
        let params = StrategyParams {
            sniper_range: 0.01,
            ..StrategyParams::default()
        };
        // 0.8% above support: outside the default range, inside 1%
        let i = input(Regime::Upside, 100.8, 99.0, (100.0, 110.0), 40.0, (0.0, 0.1), &none);
        assert_eq!(decide(&i, &StrategyParams::default()).signal, Signal::Hold);
        assert_eq!(decide(&i, &params).signal, Signal::Buy);
    }
}
