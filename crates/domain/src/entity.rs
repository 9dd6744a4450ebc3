//! Entity descriptors — the configured mapping from `(message, instance)`
//! tuples onto home-automation entities, and the constant-time lookup
//! index built from the mapping file.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::MappingError;
use crate::transform::Transform;

/// The home-automation kind of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    BinarySensor,
    Light,
    Climate,
    Switch,
}

impl EntityKind {
    /// The discovery component name for this kind.
    #[must_use]
    pub const fn component(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Light => "light",
            Self::Climate => "climate",
            Self::Switch => "switch",
        }
    }

    /// Whether commands may target this kind.
    #[must_use]
    pub const fn is_controllable(self) -> bool {
        matches!(self, Self::Light | Self::Climate | Self::Switch)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.component())
    }
}

/// The RV-C load class, selecting the codec's source address and frame
/// shape for switch-family entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadClass {
    /// A dimmable DC load (the default for lights).
    #[default]
    Dimmer,
    /// A plain on/off load (pumps, water heaters).
    Switch,
    /// A vent fan load; commands carry the auxiliary source address.
    Vent,
    /// A dual-load ceiling fan; commands resolve through the pair table.
    CeilingFan,
}

/// Documented ceiling-fan pair ids. Each pair resolves to the two RV-C
/// load ids `(primary, secondary)` that together implement the speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanPairId {
    /// Bedroom fan, pre-2018 coaches.
    Bedroom,
    /// Bedroom fan, 2018-and-later coaches.
    Bedroom2018,
}

impl FanPairId {
    /// The `(primary, secondary)` load ids for this pair.
    #[must_use]
    pub const fn loads(self) -> (u8, u8) {
        match self {
            Self::Bedroom => (35, 36),
            Self::Bedroom2018 => (33, 34),
        }
    }
}

/// Inclusive numeric bounds a sensor value is expected to stay within.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AllowedRange {
    pub min: f64,
    pub max: f64,
}

/// One configured entity: how to find its state in decoded traffic and,
/// for controllable kinds, how to address it on the bus.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDescriptor {
    /// Globally unique entity id (enforced at index build).
    pub entity_id: String,
    pub kind: EntityKind,
    /// RV-C message name the entity listens to.
    pub source_message: String,
    /// Instance to match; `None` matches any instance. Doubles as the
    /// load/zone id for outbound commands.
    #[serde(default)]
    pub instance: Option<u8>,
    /// Signal carrying the entity's state (per-channel fields below take
    /// over for climate).
    #[serde(default)]
    pub signal_field: Option<String>,
    #[serde(default)]
    pub transform: Option<Transform>,
    /// Device grouping key for discovery payloads.
    pub device_id: String,
    /// Friendly name for discovery; defaults to the entity id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub on_label: Option<String>,
    #[serde(default)]
    pub off_label: Option<String>,
    #[serde(default)]
    pub allowed_range: Option<AllowedRange>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default)]
    pub supports_brightness: bool,
    #[serde(default)]
    pub load_class: LoadClass,
    #[serde(default)]
    pub fan_pair: Option<FanPairId>,
    /// Ceiling-fan speed selected by switch-family ON (1 = low, 2 = high).
    #[serde(default)]
    pub fan_speed: Option<u8>,
    /// Climate channels: signals feeding mode, current temperature,
    /// setpoint, and fan mode.
    #[serde(default)]
    pub mode_field: Option<String>,
    #[serde(default)]
    pub current_temperature_field: Option<String>,
    #[serde(default)]
    pub setpoint_field: Option<String>,
    #[serde(default)]
    pub fan_mode_field: Option<String>,
    /// Pre-add 0.5 °F to setpoint commands (half-degree thermostats).
    #[serde(default)]
    pub half_degree_setpoint: bool,
    /// Discovery extras.
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl EntityDescriptor {
    /// The friendly name used in discovery payloads.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.entity_id)
    }
}

/// A device definition from the mapping file, grouping entities for
/// discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDef {
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub suggested_area: Option<String>,
}

/// The deserialized entity mapping document.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub devices: HashMap<String, DeviceDef>,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
}

/// Constant-time lookup index over the configured entities.
///
/// Immutable after construction; readers need no locking.
#[derive(Debug)]
pub struct EntityIndex {
    descriptors: Vec<EntityDescriptor>,
    devices: HashMap<String, DeviceDef>,
    by_message: HashMap<String, HashMap<Option<u8>, Vec<usize>>>,
    by_entity_id: HashMap<String, usize>,
}

impl EntityIndex {
    /// Validate a mapping document and build the index.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] on duplicate entity ids or non-climate
    /// descriptors missing their signal field.
    pub fn from_document(doc: MappingDocument) -> Result<Self, MappingError> {
        let mut by_message: HashMap<String, HashMap<Option<u8>, Vec<usize>>> = HashMap::new();
        let mut by_entity_id = HashMap::with_capacity(doc.entities.len());

        for (idx, desc) in doc.entities.iter().enumerate() {
            if desc.kind != EntityKind::Climate && desc.signal_field.is_none() {
                return Err(MappingError::MissingSignalField {
                    entity_id: desc.entity_id.clone(),
                });
            }
            if by_entity_id.insert(desc.entity_id.clone(), idx).is_some() {
                return Err(MappingError::DuplicateEntityId {
                    entity_id: desc.entity_id.clone(),
                });
            }
            by_message
                .entry(desc.source_message.clone())
                .or_default()
                .entry(desc.instance)
                .or_default()
                .push(idx);
        }

        Ok(Self {
            descriptors: doc.entities,
            devices: doc.devices,
            by_message,
            by_entity_id,
        })
    }

    /// All descriptors mapped to `(message, instance)` — exact-instance
    /// entries plus any-instance wildcards. Two hash probes.
    pub fn lookup(
        &self,
        message: &str,
        instance: u8,
    ) -> impl Iterator<Item = &EntityDescriptor> {
        let per_message = self.by_message.get(message);
        let exact = per_message.and_then(|m| m.get(&Some(instance)));
        let wildcard = per_message.and_then(|m| m.get(&None));
        exact
            .into_iter()
            .chain(wildcard)
            .flatten()
            .map(|&idx| &self.descriptors[idx])
    }

    /// Resolve an entity id to its descriptor.
    #[must_use]
    pub fn entity(&self, entity_id: &str) -> Option<&EntityDescriptor> {
        self.by_entity_id
            .get(entity_id)
            .map(|&idx| &self.descriptors[idx])
    }

    /// All configured descriptors, in mapping-file order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.descriptors.iter()
    }

    /// A device definition by its grouping key.
    #[must_use]
    pub fn device(&self, device_id: &str) -> Option<&DeviceDef> {
        self.devices.get(device_id)
    }

    /// Number of configured entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
