/*
[INPUT]:  Signal engine market_data / signal_history payload schema
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for streamed market data
[UPDATE]: When the engine adds indicator fields that need typed access
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::TradingSignal;

/// One computed bar broadcast by the engine (`market_data.data`).
///
/// The indicator set grows over time, so only the fields consumers rely on
/// are typed; everything else is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_opt",
        serialize_with = "serde_helpers::serialize_decimal_opt"
    )]
    pub close: Option<Decimal>,
    #[serde(default)]
    pub trading_signal: Option<TradingSignal>,
    #[serde(default)]
    pub directional_indicator: Option<f64>,
    #[serde(default)]
    pub phi_sigma: Option<f64>,
    #[serde(default)]
    pub svc_delta_pct: Option<f64>,
    #[serde(default)]
    pub tf_crit: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MarketSnapshot {
    /// Look up an untyped indicator field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// A recorded BUY / SELL signal, as stored by the engine's signal table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    #[serde(default)]
    pub recorded_at: Option<String>,
    pub signal: TradingSignal,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_opt",
        serialize_with = "serde_helpers::serialize_decimal_opt"
    )]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub directional_indicator: Option<f64>,
    #[serde(default)]
    pub phi_sigma: Option<f64>,
    #[serde(default)]
    pub svc_delta_pct: Option<f64>,
    #[serde(default)]
    pub tf_crit: Option<f64>,
}

mod serde_helpers {
    use super::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    /// Accepts numbers, numeric strings and `null` (the engine sends NaN/Inf as `null`).
    pub fn deserialize_decimal_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let raw = match value {
            Value::Null => return Ok(None),
            Value::String(raw) => raw,
            Value::Number(number) => number.to_string(),
            _ => return Err(serde::de::Error::custom("invalid decimal value")),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        Ok(Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .ok())
    }

    pub fn serialize_decimal_opt<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }
}
