/*
[INPUT]:  Signal engine schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When the engine emits new signal kinds
*/

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSignal {
    Buy,
    SellProfit,
    SellStop,
    Hold,
    #[serde(other)]
    Other,
}

impl TradingSignal {
    /// Whether the engine records this signal in its history table.
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            TradingSignal::Buy | TradingSignal::SellProfit | TradingSignal::SellStop
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradingSignal::Buy => "BUY",
            TradingSignal::SellProfit => "SELL_PROFIT",
            TradingSignal::SellStop => "SELL_STOP",
            TradingSignal::Hold => "HOLD",
            TradingSignal::Other => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_signal_maps_to_other() {
        let signal: TradingSignal = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(signal, TradingSignal::Other);
        assert!(!signal.is_actionable());
    }

    #[test]
    fn sell_variants_are_actionable() {
        let signal: TradingSignal = serde_json::from_str("\"SELL_PROFIT\"").unwrap();
        assert_eq!(signal, TradingSignal::SellProfit);
        assert!(signal.is_actionable());
        assert!(!TradingSignal::Hold.is_actionable());
    }
}
