//! Events — entity state updates emitted toward the publisher and command
//! feedback records (acknowledgements and structured errors).

use serde::Serialize;

use crate::command::{CommandAction, Family};
use crate::entity::EntityKind;
use crate::error::ErrorCode;

/// The channel a state update belongs to. Climate entities fan out over
/// four channels; lights add a brightness channel; everything else uses
/// the default channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Default,
    Brightness,
    Mode,
    CurrentTemperature,
    SetpointTemperature,
    FanMode,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "state",
            Self::Brightness => "brightness",
            Self::Mode => "mode",
            Self::CurrentTemperature => "temperature",
            Self::SetpointTemperature => "setpoint",
            Self::FanMode => "fan",
        }
    }
}

/// A published state value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StateValue {
    /// Convenience constructor for ON/OFF style values.
    #[must_use]
    pub fn on_off(on: bool) -> Self {
        Self::Text(if on { "ON" } else { "OFF" }.to_string())
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// One entity state update, keyed by entity and channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStateEvent {
    pub entity_id: String,
    pub kind: EntityKind,
    pub channel: Channel,
    pub value: StateValue,
}

/// Success acknowledgement for one accepted, transmitted command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandAck {
    pub entity_id: String,
    pub family: Family,
    pub action: CommandAction,
    pub value: serde_json::Value,
    pub latency_ms: u64,
}

/// Structured failure record for one rejected or failed command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandFailure {
    pub entity_id: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Everything the bridge publishes toward the broker side.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    State(EntityStateEvent),
    Ack(CommandAck),
    Failure(CommandFailure),
}
