//! Discovery config payloads — retained messages that let the
//! home-automation consumer auto-configure every mapped entity.
//!
//! One `(topic, payload)` pair per entity on
//! `{prefix}/{component}/{base}_{entity_id}/config`, with a shared
//! availability topic and a device info block from the mapping file.

use serde_json::{json, Value};

use rvcbridge_domain::entity::{EntityDescriptor, EntityIndex, EntityKind};

use crate::topic;

/// Generate the discovery messages for every configured entity.
#[must_use]
pub fn discovery_messages(index: &EntityIndex, base: &str, prefix: &str) -> Vec<(String, Value)> {
    index
        .entities()
        .map(|desc| {
            let topic = format!(
                "{prefix}/{}/{base}_{}/config",
                desc.kind.component(),
                desc.entity_id
            );
            (topic, config_payload(index, desc, base))
        })
        .collect()
}

/// The discovery payload for one entity.
#[must_use]
pub fn config_payload(index: &EntityIndex, desc: &EntityDescriptor, base: &str) -> Value {
    let mut payload = common_fields(desc, base);
    let entity_id = &desc.entity_id;

    match desc.kind {
        EntityKind::Sensor => {
            payload["state_topic"] = json!(format!("{base}/sensor/{entity_id}/state"));
            if let Some(unit) = &desc.unit_of_measurement {
                payload["unit_of_measurement"] = json!(unit);
            }
        }
        EntityKind::BinarySensor => {
            payload["state_topic"] = json!(format!("{base}/binary_sensor/{entity_id}/state"));
            payload["payload_on"] = json!("ON");
            payload["payload_off"] = json!("OFF");
        }
        EntityKind::Switch => {
            payload["state_topic"] = json!(format!("{base}/switch/{entity_id}/state"));
            payload["command_topic"] = json!(format!("{base}/switch/{entity_id}/set"));
            payload["payload_on"] = json!("ON");
            payload["payload_off"] = json!("OFF");
        }
        EntityKind::Light => {
            payload["state_topic"] = json!(format!("{base}/light/{entity_id}/state"));
            payload["command_topic"] = json!(format!("{base}/light/{entity_id}/set"));
            payload["payload_on"] = json!("ON");
            payload["payload_off"] = json!("OFF");
            if desc.supports_brightness {
                payload["brightness_state_topic"] =
                    json!(format!("{base}/light/{entity_id}/brightness"));
                payload["brightness_command_topic"] =
                    json!(format!("{base}/light/{entity_id}/brightness/set"));
                payload["brightness_scale"] = json!(100);
            }
        }
        EntityKind::Climate => {
            let root = format!("{base}/climate/{entity_id}");
            payload["mode_state_topic"] = json!(format!("{root}/mode"));
            payload["mode_command_topic"] = json!(format!("{root}/mode/set"));
            payload["current_temperature_topic"] = json!(format!("{root}/temperature"));
            payload["temperature_state_topic"] = json!(format!("{root}/setpoint"));
            payload["temperature_command_topic"] = json!(format!("{root}/temperature/set"));
            payload["fan_mode_state_topic"] = json!(format!("{root}/fan"));
            payload["fan_mode_command_topic"] = json!(format!("{root}/fan_mode/set"));
            payload["modes"] = json!(["off", "heat", "cool", "auto"]);
            payload["fan_modes"] = json!(["auto", "low", "high"]);
            payload["temperature_unit"] = json!("F");
            payload["min_temp"] = json!(50);
            payload["max_temp"] = json!(100);
        }
    }

    if let Some(device_class) = &desc.device_class {
        payload["device_class"] = json!(device_class);
    }
    if let Some(icon) = &desc.icon {
        payload["icon"] = json!(icon);
    }
    if let Some(device) = index.device(&desc.device_id) {
        let mut info = json!({
            "identifiers": [format!("{base}_{}", desc.device_id)],
            "name": device.name,
        });
        if let Some(manufacturer) = &device.manufacturer {
            info["manufacturer"] = json!(manufacturer);
        }
        if let Some(model) = &device.model {
            info["model"] = json!(model);
        }
        if let Some(area) = &device.suggested_area {
            info["suggested_area"] = json!(area);
        }
        payload["device"] = info;
    }

    payload
}

fn common_fields(desc: &EntityDescriptor, base: &str) -> Value {
    json!({
        "name": desc.display_name(),
        "unique_id": format!("{base}_{}", desc.entity_id),
        "availability_topic": topic::availability_topic(base),
        "payload_available": "online",
        "payload_not_available": "offline",
    })
}
