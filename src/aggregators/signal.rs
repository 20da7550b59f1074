use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading classification derived from the deviation of price vs moving average
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Bullish => "BULLISH",
            Signal::Bearish => "BEARISH",
            Signal::Neutral => "NEUTRAL",
        }
    }

    /// Whether downstream consumers should be told about this signal
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Neutral)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BULLISH" => Ok(Signal::Bullish),
            "BEARISH" => Ok(Signal::Bearish),
            "NEUTRAL" => Ok(Signal::Neutral),
            other => Err(format!("unknown signal '{}'", other)),
        }
    }
}

/// Result of classifying one price against its moving average
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classification {
    pub signal: Signal,
    /// Percentage deviation rounded to 2 decimals, absent when there is no average
    pub pct_change: Option<BigDecimal>,
}

/// `(current - avg) / avg * 100`, rounded half-even to 2 decimals.
///
/// `None` for a zero average: there is no meaningful deviation from nothing.
pub fn pct_change(current_price: &BigDecimal, avg: &BigDecimal) -> Option<BigDecimal> {
    if *avg == BigDecimal::from(0) {
        return None;
    }

    let raw = (current_price - avg) / avg * BigDecimal::from(100);
    Some(raw.with_scale_round(2, RoundingMode::HalfEven))
}

/// Classifies `current_price` against `avg` using a strictly positive `threshold_pct`.
///
/// The rounded deviation is what gets compared, so a reported `2.00` never reads as bullish
/// under a 2.0 threshold.
pub fn classify(
    current_price: &BigDecimal,
    avg: Option<&BigDecimal>,
    threshold_pct: &BigDecimal,
) -> Classification {
    let Some(pct) = avg.and_then(|avg| pct_change(current_price, avg)) else {
        return Classification {
            signal: Signal::Neutral,
            pct_change: None,
        };
    };

    let signal = if pct > *threshold_pct {
        Signal::Bullish
    } else if pct < -threshold_pct.clone() {
        Signal::Bearish
    } else {
        Signal::Neutral
    };

    Classification {
        signal,
        pct_change: Some(pct),
    }
}
