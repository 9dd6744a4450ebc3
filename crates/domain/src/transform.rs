//! Per-signal transforms referenced from the entity mapping file.
//!
//! Transforms are a closed set of named, pure, total functions over the
//! decoded signal map. They perform no IO, mutate nothing, and an
//! [`Unavailable`](SignalValue::Unavailable) input always passes through
//! as "no value".

use std::collections::HashMap;

use serde::Deserialize;

use crate::decode::SignalValue;

/// A named transform applied to a descriptor's signal before projection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// `value * factor + offset`.
    Scale {
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
    /// `round(value / divisor * 100)` where the divisor is a sibling
    /// signal (tank level against its resolution counter).
    RatioPercent { divisor_field: String },
    /// Degrees Celsius to Fahrenheit, rounded to one decimal.
    CelsiusToFahrenheit,
    /// Round to the given number of decimals.
    Round { decimals: u8 },
}

impl Transform {
    /// Apply the transform to `value`, consulting sibling `signals` where
    /// the transform needs them. Returns `None` when the input (or a
    /// required sibling) carries no usable number.
    #[must_use]
    pub fn apply(
        &self,
        value: &SignalValue,
        signals: &HashMap<String, SignalValue>,
    ) -> Option<SignalValue> {
        if matches!(value, SignalValue::Unavailable) {
            return None;
        }
        match self {
            Self::Scale { factor, offset } => {
                Some(SignalValue::Float(value.as_f64()? * factor + offset))
            }
            Self::RatioPercent { divisor_field } => {
                let divisor = signals.get(divisor_field)?.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                let percent = (value.as_f64()? / divisor * 100.0).round();
                Some(SignalValue::Uint(percent.max(0.0) as u64))
            }
            Self::CelsiusToFahrenheit => {
                let fahrenheit = value.as_f64()? * 9.0 / 5.0 + 32.0;
                Some(SignalValue::Float((fahrenheit * 10.0).round() / 10.0))
            }
            Self::Round { decimals } => {
                let factor = 10f64.powi(i32::from(*decimals));
                Some(SignalValue::Float(
                    (value.as_f64()? * factor).round() / factor,
                ))
            }
        }
    }
}
