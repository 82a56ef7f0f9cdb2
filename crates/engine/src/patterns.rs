//! Chart-pattern evidence
//!
//! The strategy only sees a set of [`ChartPattern`] tags. Detection sits
//! behind [`PatternDetector`] so any detector can be plugged in;
//! [`SwingPatternDetector`] is the one shipped with the service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::types::{Candle, CandleSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPattern {
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
}

pub type Patterns = BTreeSet<ChartPattern>;

/// Detects chart patterns on a daily series
pub trait PatternDetector: Send + Sync {
    fn detect(&self, daily: &CandleSeries) -> Patterns;
}

/// Run a detector over the daily series
pub fn detect_patterns(detector: &dyn PatternDetector, daily: &CandleSeries) -> Patterns {
    let patterns = detector.detect(daily);
    debug!(bars = daily.len(), ?patterns, "Pattern detection done");
    patterns
}

// ============================================================================
// Swing-point detector
// ============================================================================

/// Finds repeated swing highs (tops) or swing lows (bottoms).
///
/// A swing high is a bar whose high is at least the previous `swing_width`
/// highs and above the next `swing_width` highs. The most recent swing highs
/// form a top when they sit within `tolerance` of each other, each pair is
/// split by a pullback of at least `tolerance`, and the last close has fallen
/// below the mid-point between the top and the neckline. Bottoms mirror this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPatternDetector {
    pub swing_width: usize,
    pub tolerance: f64,
}

impl Default for SwingPatternDetector {
    fn default() -> Self {
        Self {
            swing_width: 2,
            tolerance: 0.015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
}

impl Side {
    fn level(self, c: &Candle) -> f64 {
        match self {
            Side::Top => c.high,
            Side::Bottom => c.low,
        }
    }

    /// Extreme of the opposite side between two swings (the neckline candidate)
    fn pullback(self, between: &[Candle]) -> f64 {
        match self {
            Side::Top => between.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
            Side::Bottom => between
                .iter()
                .map(|c| c.high)
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// `a` is at least as extreme as `b` in this side's direction
    fn at_least(self, a: f64, b: f64) -> bool {
        match self {
            Side::Top => a >= b,
            Side::Bottom => a <= b,
        }
    }
}

impl SwingPatternDetector {
    fn swings(&self, candles: &[Candle], side: Side) -> Vec<usize> {
        let w = self.swing_width;
        if w == 0 || candles.len() < 2 * w + 1 {
            return Vec::new();
        }
        (w..candles.len() - w)
            .filter(|&i| {
                let level = side.level(&candles[i]);
                let left_ok = candles[i - w..i]
                    .iter()
                    .all(|c| side.at_least(level, side.level(c)));
                let right_ok = candles[i + 1..=i + w]
                    .iter()
                    .all(|c| !side.at_least(side.level(c), level));
                left_ok && right_ok
            })
            .collect()
    }

    /// Number of matching recent swings (1..=3) and the neckline they define
    fn repeated_swings(&self, candles: &[Candle], swings: &[usize], side: Side) -> (usize, f64) {
        let Some(&last) = swings.last() else {
            return (0, f64::NAN);
        };
        let anchor = side.level(&candles[last]);
        let mut count = 1;
        let mut neckline = f64::NAN;

        for pair in swings.windows(2).rev() {
            let (a, b) = (pair[0], pair[1]);
            let level = side.level(&candles[a]);
            let spread = (level - anchor).abs() / level.abs().max(anchor.abs());
            if spread > self.tolerance {
                break;
            }

            let pullback = side.pullback(&candles[a + 1..b]);
            let depth = (level - pullback).abs() / level.abs();
            if !depth.is_finite() || depth < self.tolerance {
                break;
            }

            neckline = match (side, neckline.is_nan()) {
                (_, true) => pullback,
                (Side::Top, false) => neckline.min(pullback),
                (Side::Bottom, false) => neckline.max(pullback),
            };
            count += 1;
            if count == 3 {
                break;
            }
        }
        (count, neckline)
    }

    fn detect_side(&self, candles: &[Candle], side: Side, patterns: &mut Patterns) {
        let swings = self.swings(candles, side);
        let (count, neckline) = self.repeated_swings(candles, &swings, side);
        if count < 2 {
            return;
        }

        let Some(last) = candles.last() else {
            return;
        };
        let anchor = side.level(&candles[swings[swings.len() - 1]]);
        let midpoint = (anchor + neckline) / 2.0;
        let confirmed = match side {
            Side::Top => last.close < midpoint,
            Side::Bottom => last.close > midpoint,
        };
        if !confirmed {
            return;
        }

        let (double, triple) = match side {
            Side::Top => (ChartPattern::DoubleTop, ChartPattern::TripleTop),
            Side::Bottom => (ChartPattern::DoubleBottom, ChartPattern::TripleBottom),
        };
        patterns.insert(double);
        if count >= 3 {
            patterns.insert(triple);
        }
    }
}

impl PatternDetector for SwingPatternDetector {
    fn detect(&self, daily: &CandleSeries) -> Patterns {
        let mut patterns = Patterns::new();
        self.detect_side(daily.candles(), Side::Top, &mut patterns);
        self.detect_side(daily.candles(), Side::Bottom, &mut patterns);
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Piecewise-linear closes through `points`, five bars per leg
    fn zigzag(points: &[f64]) -> Vec<f64> {
        let mut closes = vec![points[0]];
        for leg in points.windows(2) {
            for k in 1..=5 {
                closes.push(leg[0] + (leg[1] - leg[0]) * k as f64 / 5.0);
            }
        }
        closes
    }

    fn daily(closes: &[f64]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1.0,
            })
            .collect();
        CandleSeries::new(candles).unwrap()
    }

    #[test]
    fn test_double_top() {
        let series = daily(&zigzag(&[100.0, 110.0, 100.0, 110.2, 104.0]));
        let patterns = SwingPatternDetector::default().detect(&series);
        assert!(patterns.contains(&ChartPattern::DoubleTop));
        assert!(!patterns.contains(&ChartPattern::DoubleBottom));
        assert!(!patterns.contains(&ChartPattern::TripleTop));
    }

    #[test]
    fn test_double_bottom_mirrors_top() {
        let closes: Vec<f64> = zigzag(&[100.0, 110.0, 100.0, 110.2, 104.0])
            .into_iter()
            .map(|c| 210.0 - c)
            .collect();
        let patterns = SwingPatternDetector::default().detect(&daily(&closes));
        assert!(patterns.contains(&ChartPattern::DoubleBottom));
        assert!(!patterns.contains(&ChartPattern::DoubleTop));
    }

    #[test]
    fn test_triple_top_also_reports_double() {
        let series = daily(&zigzag(&[100.0, 110.0, 100.0, 110.0, 100.0, 110.1, 104.0]));
        let patterns = SwingPatternDetector::default().detect(&series);
        assert!(patterns.contains(&ChartPattern::TripleTop));
        assert!(patterns.contains(&ChartPattern::DoubleTop));
    }

    #[test]
    fn test_unconfirmed_top_is_ignored() {
        // Second peak matches but price is still near the highs
        let series = daily(&zigzag(&[100.0, 110.0, 100.0, 110.2, 109.0]));
        assert!(SwingPatternDetector::default().detect(&series).is_empty());
    }

    #[test]
    fn test_peaks_too_far_apart_in_price() {
        let series = daily(&zigzag(&[100.0, 110.0, 100.0, 120.0, 104.0]));
        assert!(!SwingPatternDetector::default()
            .detect(&series)
            .contains(&ChartPattern::DoubleTop));
    }

    #[test]
    fn test_flat_and_short_series() {
        let detector = SwingPatternDetector::default();
        assert!(detector.detect(&daily(&[100.0; 30])).is_empty());
        assert!(detector.detect(&daily(&[100.0, 101.0])).is_empty());
    }

    #[test]
    fn test_serializes_snake_case() {
        let set: Patterns = [ChartPattern::DoubleBottom, ChartPattern::DoubleTop].into();
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            "[\"double_top\",\"double_bottom\"]"
        );
    }
}
