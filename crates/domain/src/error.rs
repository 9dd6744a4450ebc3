//! Common error types used across the workspace.
//!
//! Each layer defines its own concrete error types. The domain layer owns
//! the registry/decoder/codec errors and the stable command error codes.
//! Adapter layers define their own (e.g. `SlcanError` wrapping IO failures)
//! and surface them through the app-layer ports.

/// Stable, user-visible error codes carried by every rejected command.
///
/// The numeric identity of each code is part of the feedback contract and
/// must never change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001 — a required field is missing from the candidate command.
    MissingField,
    /// E004 — the family requires an explicit action and none was given.
    MissingAction,
    /// E006 — the entity id does not resolve to a known descriptor.
    UnknownEntity,
    /// E008 — the command family does not match the entity's kind.
    FamilyMismatch,
    /// E011 — the value has the wrong type for the `(family, action)` pair.
    WrongValueType,
    /// E012 — the value is not in the enumerated set of accepted values.
    ValueNotAllowed,
    /// E013 — the numeric value is below the accepted minimum.
    BelowMinimum,
    /// E014 — the numeric value is above the accepted maximum.
    AboveMaximum,
    /// E015 — the entity id is denylisted.
    Denylisted,
    /// E017 — an allowlist is configured and the entity id is not on it.
    NotAllowlisted,
    /// E018 — the command family is not in the allowed-families set.
    FamilyNotAllowed,
    /// E019 — the global or per-entity rate budget is exhausted.
    RateExceeded,
    /// E020 — the per-entity cooldown has not elapsed.
    CooldownActive,
    /// E100 — the entity has no RV-C mapping for the requested action.
    NoRvcMapping,
    /// E101 — transmission failed after retries.
    TransmitFailed,
}

impl ErrorCode {
    /// The stable wire form of the code (e.g. `"E014"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "E001",
            Self::MissingAction => "E004",
            Self::UnknownEntity => "E006",
            Self::FamilyMismatch => "E008",
            Self::WrongValueType => "E011",
            Self::ValueNotAllowed => "E012",
            Self::BelowMinimum => "E013",
            Self::AboveMaximum => "E014",
            Self::Denylisted => "E015",
            Self::NotAllowlisted => "E017",
            Self::FamilyNotAllowed => "E018",
            Self::RateExceeded => "E019",
            Self::CooldownActive => "E020",
            Self::NoRvcMapping => "E100",
            Self::TransmitFailed => "E101",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Raised while building the [`SpecRegistry`](crate::spec::SpecRegistry).
/// Fatal at startup; the registry is never partially constructed.
#[derive(Debug, thiserror::Error)]
pub enum SpecLoadError {
    /// The spec document itself could not be parsed.
    #[error("spec document is not valid: {0}")]
    Syntax(String),

    /// Two DGN definitions share the same number.
    #[error("duplicate DGN 0x{dgn:05X}")]
    DuplicateDgn { dgn: u32 },

    /// Two DGN definitions share the same message name.
    #[error("duplicate message name {name}")]
    DuplicateName { name: String },

    /// A DGN number does not fit in 17 bits.
    #[error("DGN 0x{dgn:X} does not fit in 17 bits")]
    DgnOutOfRange { dgn: u32 },

    /// A signal's bit width is zero or larger than 64.
    #[error("signal {signal} has invalid bit length {bits}")]
    InvalidBitLength { signal: String, bits: u8 },

    /// A signal extends past the 8-byte payload boundary.
    #[error("signal {signal} of DGN 0x{dgn:05X} extends past byte 8")]
    SignalOutOfRange { dgn: u32, signal: String },

    /// An enum-kind signal references an enum that is not defined.
    #[error("signal {signal} references undefined enum {lookup}")]
    UndefinedEnum { signal: String, lookup: String },

    /// An enum-kind signal carries no `lookup` reference at all.
    #[error("enum signal {signal} is missing its lookup reference")]
    MissingLookup { signal: String },

    /// An enum value key is not a non-negative integer.
    #[error("enum {name} has non-integer value key {key:?}")]
    InvalidEnumKey { name: String, key: String },

    /// A DGN names an instance signal that is not among its signals.
    #[error("DGN 0x{dgn:05X} names unknown instance signal {signal}")]
    UnknownInstanceSignal { dgn: u32, signal: String },
}

/// Per-frame decode failures. These are warnings: one bad frame never
/// stalls decoding of subsequent frames.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not an extended (29-bit) frame.
    #[error("frame 0x{id:08X} is not an extended frame")]
    NotExtended { id: u32 },

    /// No DGN definition exists for the frame's DGN.
    #[error("unknown DGN 0x{dgn:05X}")]
    UnknownDgn { dgn: u32 },

    /// The payload is shorter than the furthest signal requires.
    #[error("DGN 0x{dgn:05X} payload truncated: need {needed} bytes, got {actual}")]
    Truncated {
        dgn: u32,
        needed: usize,
        actual: usize,
    },
}

/// Raised while building the [`EntityIndex`](crate::entity::EntityIndex).
/// Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// The mapping document itself could not be parsed.
    #[error("mapping document is not valid: {0}")]
    Syntax(String),

    /// Two descriptors share the same entity id.
    #[error("duplicate entity id {entity_id}")]
    DuplicateEntityId { entity_id: String },

    /// A non-climate descriptor is missing its signal field.
    #[error("entity {entity_id} is missing signal_field")]
    MissingSignalField { entity_id: String },
}

/// A command rejected by one of the validation stages.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ValidatorError {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidatorError {
    /// Build a validator error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A normalized command the codec could not express as RV-C frames.
/// Always surfaced to the feedback channel as code E100.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The descriptor has no load/zone instance for this action.
    #[error("entity {entity_id} has no RV-C instance mapping")]
    MissingInstance { entity_id: String },

    /// A ceiling-fan load without its pair-id mapping.
    #[error("entity {entity_id} has no fan pair mapping")]
    MissingFanPair { entity_id: String },

    /// The `(family, action)` pair is not encodable for this entity.
    #[error("entity {entity_id} does not support this action")]
    UnsupportedAction { entity_id: String },
}

impl EncodeError {
    /// The stable feedback code for encoder failures.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::NoRvcMapping
    }
}
