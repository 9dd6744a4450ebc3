//! Frame decoder — 29-bit identifier parsing and signal extraction against
//! the spec registry.
//!
//! The decoder is a stateless, reentrant pure function. Per-frame work is
//! O(number of signals); a malformed frame is dropped with an error and
//! never stalls decoding of subsequent frames.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::DecodeError;
use crate::frame::RawFrame;
use crate::spec::{DgnDef, SignalDef, SignalKind, SpecRegistry};

/// A decoded signal value.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Uint(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Enumerated value; `label` is `None` when the raw integer is not in
    /// the enumeration (reported as unknown).
    Enum { raw: u64, label: Option<String> },
    Raw(u64),
    /// The reserved "not available" sentinel for the signal's width.
    /// Never scaled or transformed further.
    Unavailable,
}

impl SignalValue {
    /// Numeric view of the value, when it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Uint(v) | Self::Raw(v) | Self::Enum { raw: v, .. } => {
                Some(*v as f64)
            }
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(v) => Some(f64::from(u8::from(*v))),
            Self::Unavailable => None,
        }
    }

    /// Whether the value reads as logically on (non-zero / true).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            other => other.as_f64().is_some_and(|v| v != 0.0),
        }
    }
}

/// A fully decoded RV-C message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub dgn: u32,
    pub dgn_name: String,
    /// The instance byte disambiguating devices within the DGN family.
    pub instance: u8,
    pub source_addr: u8,
    pub signals: HashMap<String, SignalValue>,
    pub rx_ts: Instant,
}

impl DecodedMessage {
    /// Look up a decoded signal by name.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&SignalValue> {
        self.signals.get(name)
    }
}

/// Extract `width` bits starting at `start_bit`, little-endian byte order
/// with bit 0 as the LSB of its byte. The caller guarantees the buffer
/// holds the full span.
fn extract_bits(data: &[u8], start_bit: usize, width: u8) -> u64 {
    let mut result: u64 = 0;
    let mut bits_read: usize = 0;

    while bits_read < usize::from(width) {
        let byte_index = (start_bit + bits_read) / 8;
        let bit_offset = (start_bit + bits_read) % 8;
        let take = (8 - bit_offset).min(usize::from(width) - bits_read);

        let mask = ((1u16 << take) - 1) as u8;
        let chunk = (data[byte_index] >> bit_offset) & mask;
        result |= u64::from(chunk) << bits_read;

        bits_read += take;
    }

    result
}

/// Sign-extend a `width`-bit raw value into an `i64`.
fn sign_extend(raw: u64, width: u8) -> i64 {
    if width == 64 {
        return raw as i64;
    }
    let shift = 64 - u32::from(width);
    ((raw << shift) as i64) >> shift
}

/// Whether `raw` is the all-ones "not available" sentinel for the width.
/// Sentinels are defined for byte-multiple widths only (u8, u16, …).
fn is_unavailable(raw: u64, width: u8) -> bool {
    width % 8 == 0
        && raw
            == if width == 64 {
                u64::MAX
            } else {
                (1u64 << width) - 1
            }
}

fn decode_signal(registry: &SpecRegistry, signal: &SignalDef, raw: u64) -> SignalValue {
    match signal.kind {
        SignalKind::Uint => {
            if is_unavailable(raw, signal.bit_length) {
                return SignalValue::Unavailable;
            }
            match signal.scale {
                Some(scale) => SignalValue::Float(
                    raw as f64 * scale + signal.offset.unwrap_or(0.0),
                ),
                None => SignalValue::Uint(raw),
            }
        }
        SignalKind::Int => {
            if is_unavailable(raw, signal.bit_length) {
                return SignalValue::Unavailable;
            }
            let value = sign_extend(raw, signal.bit_length);
            match signal.scale {
                Some(scale) => SignalValue::Float(
                    value as f64 * scale + signal.offset.unwrap_or(0.0),
                ),
                None => SignalValue::Int(value),
            }
        }
        SignalKind::Bool => SignalValue::Bool(raw != 0),
        SignalKind::Enum => {
            let label = signal
                .lookup
                .as_deref()
                .and_then(|name| registry.enum_def(name))
                .and_then(|def| def.label(raw))
                .map(str::to_string);
            SignalValue::Enum { raw, label }
        }
        SignalKind::Raw => SignalValue::Raw(raw),
    }
}

fn instance_of(def: &DgnDef, data: &[u8], signals: &HashMap<String, SignalValue>) -> u8 {
    if let Some(name) = &def.instance_signal {
        if let Some(value) = signals.get(name) {
            if let Some(v) = value.as_f64() {
                return v as u8;
            }
        }
    }
    // Canonical instance: the integer at bit offset 0, width 8.
    data.first().copied().unwrap_or(0)
}

/// Decode a raw frame into a typed message.
///
/// # Errors
///
/// Returns [`DecodeError::NotExtended`] for standard frames,
/// [`DecodeError::UnknownDgn`] when the registry has no definition for the
/// frame's DGN, and [`DecodeError::Truncated`] when the payload is shorter
/// than the furthest signal requires. All three leave the decoder ready
/// for the next frame.
pub fn decode_frame(
    registry: &SpecRegistry,
    frame: &RawFrame,
) -> Result<DecodedMessage, DecodeError> {
    if !frame.extended {
        return Err(DecodeError::NotExtended {
            id: frame.can_id.raw(),
        });
    }

    let dgn = frame.can_id.dgn();
    let def = registry
        .dgn_by_number(dgn)
        .ok_or(DecodeError::UnknownDgn { dgn })?;

    let needed = def.bytes_required();
    if frame.data.len() < needed {
        return Err(DecodeError::Truncated {
            dgn,
            needed,
            actual: frame.data.len(),
        });
    }

    let mut signals = HashMap::with_capacity(def.signals.len());
    for signal in &def.signals {
        let raw = extract_bits(&frame.data, signal.start_bit(), signal.bit_length);
        signals.insert(signal.name.clone(), decode_signal(registry, signal, raw));
    }

    Ok(DecodedMessage {
        dgn,
        dgn_name: def.name.clone(),
        instance: instance_of(def, &frame.data, &signals),
        source_addr: frame.can_id.source_address(),
        signals,
        rx_ts: frame.rx_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CanId;
    use crate::spec::SpecDocument;

    fn registry() -> SpecRegistry {
        let doc: SpecDocument = toml::from_str(
            r#"
            [[dgns]]
            dgn = 0x1FFB7
            name = "TANK_STATUS"

            [[dgns.signals]]
            name = "instance"
            byte_offset = 0
            bit_length = 8
            kind = "uint"

            [[dgns.signals]]
            name = "relative_level"
            byte_offset = 1
            bit_length = 2
            kind = "uint"

            [[dgns.signals]]
            name = "resolution"
            byte_offset = 1
            bit_offset = 2
            bit_length = 2
            kind = "uint"

            [[dgns]]
            dgn = 0x1FF9C
            name = "THERMOSTAT_AMBIENT_STATUS"

            [[dgns.signals]]
            name = "instance"
            byte_offset = 0
            bit_length = 8
            kind = "uint"

            [[dgns.signals]]
            name = "ambient_temp"
            byte_offset = 1
            bit_length = 16
            kind = "uint"
            unit = "deg C"
            scale = 0.03125
            offset = -273.0

            [[dgns]]
            dgn = 0x1FEDA
            name = "DC_DIMMER_STATUS_3"

            [[dgns.signals]]
            name = "instance"
            byte_offset = 0
            bit_length = 8
            kind = "uint"

            [[dgns.signals]]
            name = "load_status"
            byte_offset = 2
            bit_length = 8
            kind = "uint"

            [[dgns]]
            dgn = 0x1FFDC
            name = "GENERATOR_STATUS_1"
            instance_signal = "status"

            [[dgns.signals]]
            name = "status"
            byte_offset = 0
            bit_length = 8
            kind = "enum"
            lookup = "generator_status"

            [[enums]]
            name = "generator_status"
            [enums.values]
            0 = "stopped"
            1 = "running"
            "#,
        )
        .unwrap();
        SpecRegistry::from_document(doc).unwrap()
    }

    fn frame(id: u32, data: &[u8]) -> RawFrame {
        RawFrame::extended(CanId::new(id), data.to_vec())
    }

    #[test]
    fn should_decode_tank_status_frame() {
        let registry = registry();
        // Fresh tank (instance 0), relative level 3.
        let frame = frame(0x19FF_B700, &[0x00, 0x03, 0xFF]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(msg.dgn, 0x1FFB7);
        assert_eq!(msg.dgn_name, "TANK_STATUS");
        assert_eq!(msg.instance, 0);
        assert_eq!(msg.source_addr, 0x00);
        assert_eq!(msg.signal("relative_level"), Some(&SignalValue::Uint(3)));
    }

    #[test]
    fn should_extract_packed_sub_byte_signals() {
        let registry = registry();
        // Byte 1 = 0b0000_1011: level = 0b11 (3), resolution = 0b10 (2).
        let frame = frame(0x19FF_B701, &[0x01, 0x0B]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(msg.signal("relative_level"), Some(&SignalValue::Uint(3)));
        assert_eq!(msg.signal("resolution"), Some(&SignalValue::Uint(2)));
    }

    #[test]
    fn should_apply_scale_and_offset_to_wide_signals() {
        let registry = registry();
        // 0x24E8 = 9448 → 9448 * 0.03125 - 273 = 22.25 °C.
        let frame = frame(0x19FF_9C00, &[0x00, 0xE8, 0x24]);

        let msg = decode_frame(&registry, &frame).unwrap();
        let Some(SignalValue::Float(celsius)) = msg.signal("ambient_temp") else {
            panic!("expected scaled float");
        };
        assert!((celsius - 22.25).abs() < 1e-9);
    }

    #[test]
    fn should_decode_all_ones_wide_signal_as_unavailable() {
        let registry = registry();
        let frame = frame(0x19FF_9C00, &[0x00, 0xFF, 0xFF]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(msg.signal("ambient_temp"), Some(&SignalValue::Unavailable));
    }

    #[test]
    fn should_not_treat_sub_byte_all_ones_as_unavailable() {
        let registry = registry();
        // relative_level = 0b11 is a real reading, not a sentinel.
        let frame = frame(0x19FF_B700, &[0x00, 0x0F]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(msg.signal("relative_level"), Some(&SignalValue::Uint(3)));
    }

    #[test]
    fn should_decode_enum_label_when_defined() {
        let registry = registry();
        let frame = frame(0x19FF_DC00, &[0x01]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(
            msg.signal("status"),
            Some(&SignalValue::Enum {
                raw: 1,
                label: Some("running".to_string())
            })
        );
    }

    #[test]
    fn should_flag_enum_value_outside_enumeration_as_unknown() {
        let registry = registry();
        let frame = frame(0x19FF_DC00, &[0x07]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(
            msg.signal("status"),
            Some(&SignalValue::Enum { raw: 7, label: None })
        );
    }

    #[test]
    fn should_take_instance_from_named_signal() {
        let registry = registry();
        let frame = frame(0x19FF_DC00, &[0x01]);

        let msg = decode_frame(&registry, &frame).unwrap();
        assert_eq!(msg.instance, 1);
    }

    #[test]
    fn should_reject_standard_frame() {
        let registry = registry();
        let mut f = frame(0x19FF_B700, &[0x00, 0x03]);
        f.extended = false;

        let result = decode_frame(&registry, &f);
        assert!(matches!(result, Err(DecodeError::NotExtended { .. })));
    }

    #[test]
    fn should_report_unknown_dgn() {
        let registry = registry();
        let f = frame(0x19EE_0000, &[0x00; 8]);

        let result = decode_frame(&registry, &f);
        assert!(matches!(
            result,
            Err(DecodeError::UnknownDgn { dgn: 0x1EE00 })
        ));
    }

    #[test]
    fn should_drop_truncated_frame() {
        let registry = registry();
        // DC_DIMMER_STATUS_3 needs 3 bytes; give it 2.
        let f = frame(0x19FE_DA00, &[0x01, 0xFF]);

        let result = decode_frame(&registry, &f);
        assert!(matches!(
            result,
            Err(DecodeError::Truncated {
                needed: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn should_keep_decoding_after_a_bad_frame() {
        let registry = registry();
        let bad = frame(0x19FE_DA00, &[0x01]);
        assert!(decode_frame(&registry, &bad).is_err());

        let good = frame(0x19FF_B700, &[0x00, 0x07]);
        assert!(decode_frame(&registry, &good).is_ok());
    }

    #[test]
    fn should_sign_extend_negative_int_signals() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0b10, 2), -2);
    }

    #[test]
    fn should_extract_bits_across_byte_boundary() {
        // 12 bits starting at bit 4: low nibble of byte 1 ++ byte 0 high nibble.
        let data = [0xAB, 0xCD];
        assert_eq!(extract_bits(&data, 4, 12), 0xCDA);
    }

    #[test]
    fn should_report_truthiness_of_values() {
        assert!(SignalValue::Uint(1).is_truthy());
        assert!(!SignalValue::Uint(0).is_truthy());
        assert!(SignalValue::Bool(true).is_truthy());
        assert!(!SignalValue::Unavailable.is_truthy());
    }
}
