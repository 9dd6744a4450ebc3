//! Command types — candidate commands as received from the broker side and
//! the normalized form produced by the validator.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;

/// The controllable device family a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Light,
    Climate,
    Switch,
}

impl Family {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Climate => "climate",
            Self::Switch => "switch",
        }
    }

    /// Parse a topic segment into a family.
    #[must_use]
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "light" => Some(Self::Light),
            "climate" => Some(Self::Climate),
            "switch" => Some(Self::Switch),
            _ => None,
        }
    }

    /// Whether an entity of `kind` belongs to this family.
    #[must_use]
    pub const fn matches_kind(self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::Light, EntityKind::Light)
                | (Self::Climate, EntityKind::Climate)
                | (Self::Switch, EntityKind::Switch)
        )
    }

    /// Whether the family carries more than one action and therefore
    /// requires the action to be explicit.
    #[must_use]
    pub const fn requires_action(self) -> bool {
        matches!(self, Self::Climate)
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    State,
    Brightness,
    Mode,
    Temperature,
    FanMode,
}

impl CommandAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Brightness => "brightness",
            Self::Mode => "mode",
            Self::Temperature => "temperature",
            Self::FanMode => "fan_mode",
        }
    }

    /// Parse a topic segment into an action.
    #[must_use]
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "state" => Some(Self::State),
            "brightness" => Some(Self::Brightness),
            "mode" => Some(Self::Mode),
            "temperature" => Some(Self::Temperature),
            "fan_mode" => Some(Self::FanMode),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thermostat operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateMode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl ClimateMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Auto => "auto",
        }
    }

    /// Case-insensitive parse.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "heat" => Some(Self::Heat),
            "cool" => Some(Self::Cool),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Whether the compressor/furnace is running (fan commands use a
    /// different form while the system is off or fan-only).
    #[must_use]
    pub const fn is_operating(self) -> bool {
        matches!(self, Self::Heat | Self::Cool)
    }
}

/// Thermostat fan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    Auto,
    Low,
    High,
}

impl FanMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Low => "low",
            Self::High => "high",
        }
    }

    /// Case-insensitive parse.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A command as it arrives from the broker side, before validation.
///
/// The value is kept loosely typed so the validator can report precise
/// type errors instead of dropping malformed input on the floor.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateCommand {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub family: Option<Family>,
    #[serde(default)]
    pub action: Option<CommandAction>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// A typed command value; the `(family, action)` pair determines which
/// variant is admissible.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    /// Light/switch state, true for ON.
    OnOff(bool),
    /// Light brightness, percent.
    Brightness(u8),
    Mode(ClimateMode),
    /// Setpoint in Fahrenheit.
    Temperature(f64),
    FanMode(FanMode),
}

impl CommandValue {
    /// JSON form used in acknowledgement records.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::OnOff(on) => {
                serde_json::Value::String(if *on { "ON" } else { "OFF" }.to_string())
            }
            Self::Brightness(pct) => serde_json::Value::from(*pct),
            Self::Mode(mode) => serde_json::Value::String(mode.as_str().to_string()),
            Self::Temperature(f) => serde_json::Value::from(*f),
            Self::FanMode(mode) => serde_json::Value::String(mode.as_str().to_string()),
        }
    }
}

/// A command that passed stages 1–4 of validation.
#[derive(Debug, Clone)]
pub struct NormalizedCommand {
    pub entity_id: String,
    pub family: Family,
    pub action: CommandAction,
    pub value: CommandValue,
    /// Monotonic enqueue timestamp, used for latency measurement.
    pub enqueued_at: Instant,
}
