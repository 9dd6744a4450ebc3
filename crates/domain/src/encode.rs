//! Command codec — encode a normalized command into the timed CAN frame
//! sequence its device family requires.
//!
//! All arbitration ids carry priority 6 and the configured source address
//! (99 by default); vent-class and ceiling-fan-class loads transmit from
//! the auxiliary source address 96.

use crate::command::{ClimateMode, CommandValue, FanMode, Family, NormalizedCommand};
use crate::entity::{EntityDescriptor, LoadClass};
use crate::error::EncodeError;
use crate::frame::CanId;

/// DC dimmer / load command DGN.
pub const DGN_DC_DIMMER: u32 = 0x1FEDB;
/// Thermostat command DGN.
pub const DGN_THERMOSTAT: u32 = 0x1FEF9;

/// Command priority used for everything the bridge transmits.
const PRIORITY: u8 = 6;
/// Source address for vent-class and ceiling-fan-class loads.
const SOURCE_AUXILIARY: u8 = 96;

/// Duration byte meaning "indefinite".
const DURATION_INDEFINITE: u8 = 0xFF;
/// Full brightness in RV-C units (0..200).
const LEVEL_FULL: u8 = 0xC8;

// DC dimmer command codes.
const CMD_SET_LEVEL: u8 = 0;
const CMD_ON_WITH_DURATION: u8 = 2;
const CMD_OFF_WITH_DELAY: u8 = 3;
const CMD_STOP: u8 = 4;
const CMD_RAMP_UP_OR_DOWN: u8 = 21;

/// Delay before the ramp frame of the dimmer cleanup sequence.
const CLEANUP_DELAY_MS: u32 = 5;

/// One frame of a command sequence: where to send it, what to send, and
/// the minimum delay to observe before sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedFrame {
    pub can_id: CanId,
    pub payload: [u8; 8],
    /// Milliseconds to wait before this frame. Zero for the first frame
    /// of every sequence.
    pub pre_delay_ms: u32,
}

/// An ordered, finite frame sequence produced for one command.
pub type FrameSequence = Vec<SequencedFrame>;

/// Device-family command encoder.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    source_address: u8,
}

impl CommandEncoder {
    /// Create an encoder transmitting from the given source address.
    #[must_use]
    pub const fn new(source_address: u8) -> Self {
        Self { source_address }
    }

    /// Encode a normalized command against its entity descriptor.
    ///
    /// `current_mode` is an optional hint for thermostat fan commands,
    /// whose wire form differs between operating and off/fan-only modes;
    /// without a hint the operating form is used.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the descriptor lacks the RV-C mapping
    /// the action needs. Every encoder failure surfaces as code E100.
    pub fn encode(
        &self,
        cmd: &NormalizedCommand,
        desc: &EntityDescriptor,
        current_mode: Option<ClimateMode>,
    ) -> Result<FrameSequence, EncodeError> {
        let instance = desc.instance.ok_or_else(|| EncodeError::MissingInstance {
            entity_id: cmd.entity_id.clone(),
        })?;

        match (cmd.family, &cmd.value) {
            (Family::Light, CommandValue::OnOff(true)) => Ok(self.light_level(instance, LEVEL_FULL)),
            (Family::Light, CommandValue::OnOff(false)) => Ok(self.light_off(instance)),
            (Family::Light, CommandValue::Brightness(pct)) => {
                let level = u8::try_from(u16::from(*pct) * 2).unwrap_or(200).min(200);
                Ok(self.light_level(instance, level))
            }
            (Family::Switch, CommandValue::OnOff(on)) => self.switch(cmd, desc, instance, *on),
            (Family::Climate, CommandValue::Mode(mode)) => {
                Ok(vec![self.thermostat_frame(instance, mode_byte(*mode), 0xFF)])
            }
            (Family::Climate, CommandValue::FanMode(fan)) => {
                let (b1, b2) = fan_bytes(*fan, current_mode);
                Ok(vec![self.thermostat_frame(instance, b1, b2)])
            }
            (Family::Climate, CommandValue::Temperature(fahrenheit)) => {
                Ok(self.thermostat_temperature(instance, *fahrenheit))
            }
            _ => Err(EncodeError::UnsupportedAction {
                entity_id: cmd.entity_id.clone(),
            }),
        }
    }

    fn dimmer_id(&self, source_address: u8) -> CanId {
        CanId::from_parts(PRIORITY, DGN_DC_DIMMER, source_address)
    }

    /// Set-level followed by the ramp/stop cleanup pair certain RV-C
    /// dimmer implementations need to terminate the implicit ramp.
    fn light_level(&self, instance: u8, level: u8) -> FrameSequence {
        let can_id = self.dimmer_id(self.source_address);
        vec![
            SequencedFrame {
                can_id,
                payload: dimmer_payload(instance, level, CMD_SET_LEVEL, DURATION_INDEFINITE),
                pre_delay_ms: 0,
            },
            SequencedFrame {
                can_id,
                payload: dimmer_payload(instance, 0, CMD_RAMP_UP_OR_DOWN, 0),
                pre_delay_ms: CLEANUP_DELAY_MS,
            },
            SequencedFrame {
                can_id,
                payload: dimmer_payload(instance, 0, CMD_STOP, 0),
                pre_delay_ms: 0,
            },
        ]
    }

    fn light_off(&self, instance: u8) -> FrameSequence {
        vec![SequencedFrame {
            can_id: self.dimmer_id(self.source_address),
            payload: dimmer_payload(instance, 0, CMD_OFF_WITH_DELAY, 0),
            pre_delay_ms: 0,
        }]
    }

    fn switch(
        &self,
        cmd: &NormalizedCommand,
        desc: &EntityDescriptor,
        instance: u8,
        on: bool,
    ) -> Result<FrameSequence, EncodeError> {
        if desc.load_class == LoadClass::CeilingFan {
            let pair = desc.fan_pair.ok_or_else(|| EncodeError::MissingFanPair {
                entity_id: cmd.entity_id.clone(),
            })?;
            let speed = if on { desc.fan_speed.unwrap_or(1).min(2) } else { 0 };
            return Ok(self.ceiling_fan(pair.loads(), speed));
        }

        let source = match desc.load_class {
            LoadClass::Vent => SOURCE_AUXILIARY,
            _ => self.source_address,
        };
        let payload = if on {
            dimmer_payload(instance, LEVEL_FULL, CMD_ON_WITH_DURATION, DURATION_INDEFINITE)
        } else {
            dimmer_payload(instance, 0, CMD_OFF_WITH_DELAY, 0)
        };
        Ok(vec![SequencedFrame {
            can_id: self.dimmer_id(source),
            payload,
            pre_delay_ms: 0,
        }])
    }

    /// Dual-load ceiling fan: speed 0 turns both loads off; a positive
    /// speed turns the non-selected load off first, then the selected
    /// load on.
    fn ceiling_fan(&self, (primary, secondary): (u8, u8), speed: u8) -> FrameSequence {
        let can_id = self.dimmer_id(SOURCE_AUXILIARY);
        let off = |load| SequencedFrame {
            can_id,
            payload: dimmer_payload(load, 0, CMD_OFF_WITH_DELAY, 0),
            pre_delay_ms: 0,
        };
        let on = |load| SequencedFrame {
            can_id,
            payload: dimmer_payload(load, LEVEL_FULL, CMD_ON_WITH_DURATION, DURATION_INDEFINITE),
            pre_delay_ms: 0,
        };

        match speed {
            0 => vec![off(primary), off(secondary)],
            1 => vec![off(secondary), on(primary)],
            _ => vec![off(primary), on(secondary)],
        }
    }

    fn thermostat_frame(&self, instance: u8, b1: u8, b2: u8) -> SequencedFrame {
        SequencedFrame {
            can_id: CanId::from_parts(PRIORITY, DGN_THERMOSTAT, self.source_address),
            payload: [instance, b1, b2, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            pre_delay_ms: 0,
        }
    }

    /// Setpoint frame(s). The raw value is written little-endian at both
    /// byte pairs; an even zone instance additionally emits the furnace
    /// setpoint frame at instance + 3.
    fn thermostat_temperature(&self, instance: u8, fahrenheit: f64) -> FrameSequence {
        let raw = fahrenheit_to_raw(fahrenheit);
        let [lo, hi] = raw.to_le_bytes();
        let can_id = CanId::from_parts(PRIORITY, DGN_THERMOSTAT, self.source_address);
        let payload_for = |zone: u8| [zone, 0xFF, 0xFF, lo, hi, lo, hi, 0xFF];

        let mut frames = vec![SequencedFrame {
            can_id,
            payload: payload_for(instance),
            pre_delay_ms: 0,
        }];
        if instance % 2 == 0 {
            frames.push(SequencedFrame {
                can_id,
                payload: payload_for(instance + 3),
                pre_delay_ms: 0,
            });
        }
        frames
    }
}

fn dimmer_payload(instance: u8, level: u8, command: u8, duration: u8) -> [u8; 8] {
    [instance, 0xFF, level, command, duration, 0x00, 0xFF, 0xFF]
}

const fn mode_byte(mode: ClimateMode) -> u8 {
    match mode {
        ClimateMode::Off => 0xC0,
        ClimateMode::Cool => 0xC1,
        ClimateMode::Heat => 0xC2,
        ClimateMode::Auto => 0xCF,
    }
}

/// Fan command bytes. The wire form depends on whether the zone is
/// heating/cooling or idle; without a mode hint the operating form is
/// assumed.
fn fan_bytes(fan: FanMode, current_mode: Option<ClimateMode>) -> (u8, u8) {
    let operating = current_mode.is_none_or(ClimateMode::is_operating);
    match fan {
        FanMode::Auto => {
            if operating {
                (0xCF, 0xFF)
            } else {
                (0xC0, 0xFF)
            }
        }
        FanMode::Low => (if operating { 0xDF } else { 0xD4 }, 0x64),
        FanMode::High => (if operating { 0xDF } else { 0xD4 }, 0xC8),
    }
}

/// Fahrenheit → RV-C u16 (0.03125 K per bit). The additive 0.999 keeps
/// truncation from undershooting exact half-degree steps.
fn fahrenheit_to_raw(fahrenheit: f64) -> u16 {
    let kelvin = (fahrenheit - 32.0) * 5.0 / 9.0 + 273.0;
    let raw = (kelvin / 0.03125 + 0.999).floor();
    raw.clamp(0.0, f64::from(u16::MAX)) as u16
}
