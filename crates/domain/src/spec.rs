//! Spec registry — the loaded, read-only index of RV-C DGN definitions
//! and named enumerations.
//!
//! The registry is built once at startup from a deserialized spec document
//! and is immutable for the process lifetime; readers need no locking.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::SpecLoadError;

/// How a signal's raw bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Unsigned integer, optionally scaled into a float.
    Uint,
    /// Two's-complement signed integer, optionally scaled.
    Int,
    /// Non-zero raw means true.
    Bool,
    /// Index into a named enumeration (`lookup` names it).
    Enum,
    /// Raw bits passed through untouched.
    Raw,
}

/// Layout and interpretation of one signal within a DGN payload.
///
/// Bit indexing follows RV-C conventions: little-endian byte order and,
/// within a byte, bit 0 is the least-significant bit.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalDef {
    pub name: String,
    pub byte_offset: u8,
    #[serde(default)]
    pub bit_offset: u8,
    pub bit_length: u8,
    pub kind: SignalKind,
    #[serde(default)]
    pub unit: Option<String>,
    /// When present, `value = raw * scale + offset`.
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,
    /// Denominator for ratio-style counters (tank level and similar).
    #[serde(default)]
    pub resolution: Option<f64>,
    /// Enum name for `kind = "enum"` signals.
    #[serde(default)]
    pub lookup: Option<String>,
}

impl SignalDef {
    /// First bit of the signal, counted from bit 0 of byte 0.
    #[must_use]
    pub fn start_bit(&self) -> usize {
        usize::from(self.byte_offset) * 8 + usize::from(self.bit_offset)
    }

    /// Number of payload bytes required to hold this signal.
    #[must_use]
    pub fn bytes_required(&self) -> usize {
        (self.start_bit() + usize::from(self.bit_length)).div_ceil(8)
    }
}

/// One DGN definition: message name and signal layout.
#[derive(Debug, Clone, Deserialize)]
pub struct DgnDef {
    /// The 17-bit Data Group Number.
    pub dgn: u32,
    pub name: String,
    /// Signal naming the instance key, when it is not the first byte.
    #[serde(default)]
    pub instance_signal: Option<String>,
    pub signals: Vec<SignalDef>,
}

impl DgnDef {
    /// Payload bytes required by the furthest-reaching signal.
    #[must_use]
    pub fn bytes_required(&self) -> usize {
        self.signals
            .iter()
            .map(SignalDef::bytes_required)
            .max()
            .unwrap_or(0)
    }
}

/// A named enumeration as written in the spec document. Value keys are
/// decimal integer strings.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumDoc {
    pub name: String,
    pub values: BTreeMap<String, String>,
}

/// The deserialized spec document, prior to validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecDocument {
    #[serde(default)]
    pub dgns: Vec<DgnDef>,
    #[serde(default)]
    pub enums: Vec<EnumDoc>,
}

/// A validated named enumeration.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    values: HashMap<u64, String>,
}

impl EnumDef {
    /// The label for a raw value, when defined.
    #[must_use]
    pub fn label(&self, raw: u64) -> Option<&str> {
        self.values.get(&raw).map(String::as_str)
    }
}

/// The read-only index of DGN definitions and enumerations, keyed by the
/// numeric 17-bit DGN with a derived name → DGN reverse index.
#[derive(Debug)]
pub struct SpecRegistry {
    by_dgn: HashMap<u32, DgnDef>,
    name_to_dgn: HashMap<String, u32>,
    enums: HashMap<String, EnumDef>,
}

impl SpecRegistry {
    /// Validate a spec document and build the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SpecLoadError`] on duplicate DGNs or message names,
    /// out-of-range DGN numbers, signals extending past byte 8, invalid
    /// bit widths, references to undefined enums, or non-integer enum
    /// value keys.
    pub fn from_document(doc: SpecDocument) -> Result<Self, SpecLoadError> {
        let mut enums = HashMap::with_capacity(doc.enums.len());
        for entry in doc.enums {
            let mut values = HashMap::with_capacity(entry.values.len());
            for (key, label) in entry.values {
                let raw: u64 =
                    key.parse()
                        .map_err(|_| SpecLoadError::InvalidEnumKey {
                            name: entry.name.clone(),
                            key: key.clone(),
                        })?;
                values.insert(raw, label);
            }
            enums.insert(
                entry.name.clone(),
                EnumDef {
                    name: entry.name,
                    values,
                },
            );
        }

        let mut by_dgn = HashMap::with_capacity(doc.dgns.len());
        let mut name_to_dgn = HashMap::with_capacity(doc.dgns.len());
        for def in doc.dgns {
            if def.dgn > 0x1_FFFF {
                return Err(SpecLoadError::DgnOutOfRange { dgn: def.dgn });
            }
            for signal in &def.signals {
                if signal.bit_length == 0 || signal.bit_length > 64 {
                    return Err(SpecLoadError::InvalidBitLength {
                        signal: signal.name.clone(),
                        bits: signal.bit_length,
                    });
                }
                if signal.start_bit() + usize::from(signal.bit_length) > 64 {
                    return Err(SpecLoadError::SignalOutOfRange {
                        dgn: def.dgn,
                        signal: signal.name.clone(),
                    });
                }
                if signal.kind == SignalKind::Enum {
                    let lookup = signal.lookup.as_ref().ok_or_else(|| {
                        SpecLoadError::MissingLookup {
                            signal: signal.name.clone(),
                        }
                    })?;
                    if !enums.contains_key(lookup) {
                        return Err(SpecLoadError::UndefinedEnum {
                            signal: signal.name.clone(),
                            lookup: lookup.clone(),
                        });
                    }
                }
            }
            if let Some(instance_signal) = &def.instance_signal {
                if !def.signals.iter().any(|s| &s.name == instance_signal) {
                    return Err(SpecLoadError::UnknownInstanceSignal {
                        dgn: def.dgn,
                        signal: instance_signal.clone(),
                    });
                }
            }
            if name_to_dgn.insert(def.name.clone(), def.dgn).is_some() {
                return Err(SpecLoadError::DuplicateName { name: def.name });
            }
            if let Some(previous) = by_dgn.insert(def.dgn, def) {
                return Err(SpecLoadError::DuplicateDgn { dgn: previous.dgn });
            }
        }

        Ok(Self {
            by_dgn,
            name_to_dgn,
            enums,
        })
    }

    /// Look up a DGN definition by its 17-bit number.
    #[must_use]
    pub fn dgn_by_number(&self, dgn: u32) -> Option<&DgnDef> {
        self.by_dgn.get(&dgn)
    }

    /// Look up a DGN definition by its message name (the derived reverse
    /// index, so mapping files never carry DGN numerics).
    #[must_use]
    pub fn dgn_by_name(&self, name: &str) -> Option<&DgnDef> {
        self.name_to_dgn
            .get(name)
            .and_then(|dgn| self.by_dgn.get(dgn))
    }

    /// Look up a named enumeration.
    #[must_use]
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    /// Number of DGN definitions loaded.
    #[must_use]
    pub fn dgn_count(&self) -> usize {
        self.by_dgn.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank_doc() -> SpecDocument {
        toml::from_str(
            r#"
            [[dgns]]
            dgn = 0x1FFB7
            name = "TANK_STATUS"

            [[dgns.signals]]
            name = "instance"
            byte_offset = 0
            bit_length = 8
            kind = "enum"
            lookup = "tank_instance"

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

            [[enums]]
            name = "tank_instance"
            [enums.values]
            0 = "fresh"
            1 = "black"
            2 = "grey"
            3 = "propane"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn should_build_registry_from_valid_document() {
        let registry = SpecRegistry::from_document(tank_doc()).unwrap();
        assert_eq!(registry.dgn_count(), 1);

        let def = registry.dgn_by_number(0x1FFB7).unwrap();
        assert_eq!(def.name, "TANK_STATUS");
        assert_eq!(def.signals.len(), 3);
        assert_eq!(def.bytes_required(), 2);
    }

    #[test]
    fn should_resolve_message_name_through_reverse_index() {
        let registry = SpecRegistry::from_document(tank_doc()).unwrap();
        let def = registry.dgn_by_name("TANK_STATUS").unwrap();
        assert_eq!(def.dgn, 0x1FFB7);
    }

    #[test]
    fn should_resolve_enum_labels() {
        let registry = SpecRegistry::from_document(tank_doc()).unwrap();
        let tank = registry.enum_def("tank_instance").unwrap();
        assert_eq!(tank.label(0), Some("fresh"));
        assert_eq!(tank.label(3), Some("propane"));
        assert_eq!(tank.label(9), None);
    }

    #[test]
    fn should_return_none_for_unknown_dgn() {
        let registry = SpecRegistry::from_document(tank_doc()).unwrap();
        assert!(registry.dgn_by_number(0x1FEDA).is_none());
        assert!(registry.dgn_by_name("NOPE").is_none());
    }

    #[test]
    fn should_reject_duplicate_dgn_numbers() {
        let mut doc = tank_doc();
        doc.dgns.push(DgnDef {
            dgn: 0x1FFB7,
            name: "OTHER".to_string(),
            instance_signal: None,
            signals: Vec::new(),
        });
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::DuplicateDgn { .. })));
    }

    #[test]
    fn should_reject_duplicate_message_names() {
        let mut doc = tank_doc();
        doc.dgns.push(DgnDef {
            dgn: 0x1FFB8,
            name: "TANK_STATUS".to_string(),
            instance_signal: None,
            signals: Vec::new(),
        });
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::DuplicateName { .. })));
    }

    #[test]
    fn should_reject_dgn_wider_than_17_bits() {
        let mut doc = tank_doc();
        doc.dgns[0].dgn = 0x2_0000;
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::DgnOutOfRange { .. })));
    }

    #[test]
    fn should_reject_signal_extending_past_byte_8() {
        let mut doc = tank_doc();
        doc.dgns[0].signals[1].byte_offset = 7;
        doc.dgns[0].signals[1].bit_offset = 7;
        doc.dgns[0].signals[1].bit_length = 2;
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(
            result,
            Err(SpecLoadError::SignalOutOfRange { .. })
        ));
    }

    #[test]
    fn should_reject_zero_width_signal() {
        let mut doc = tank_doc();
        doc.dgns[0].signals[1].bit_length = 0;
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(
            result,
            Err(SpecLoadError::InvalidBitLength { .. })
        ));
    }

    #[test]
    fn should_reject_reference_to_undefined_enum() {
        let mut doc = tank_doc();
        doc.dgns[0].signals[0].lookup = Some("missing".to_string());
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::UndefinedEnum { .. })));
    }

    #[test]
    fn should_reject_enum_signal_without_lookup() {
        let mut doc = tank_doc();
        doc.dgns[0].signals[0].lookup = None;
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::MissingLookup { .. })));
    }

    #[test]
    fn should_reject_non_integer_enum_key() {
        let mut doc = tank_doc();
        doc.enums[0]
            .values
            .insert("full".to_string(), "oops".to_string());
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(result, Err(SpecLoadError::InvalidEnumKey { .. })));
    }

    #[test]
    fn should_reject_unknown_instance_signal() {
        let mut doc = tank_doc();
        doc.dgns[0].instance_signal = Some("zone".to_string());
        let result = SpecRegistry::from_document(doc);
        assert!(matches!(
            result,
            Err(SpecLoadError::UnknownInstanceSignal { .. })
        ));
    }
}
