//! Entity projector — translate a decoded message into zero or more
//! entity state events.
//!
//! Duplicate suppression is deliberately not performed here; the
//! publisher layer owns retention semantics.

use crate::decode::{DecodedMessage, SignalValue};
use crate::entity::{EntityDescriptor, EntityIndex, EntityKind};
use crate::event::{Channel, EntityStateEvent, StateValue};

/// Project a decoded message onto every matching entity descriptor.
#[must_use]
pub fn project(index: &EntityIndex, msg: &DecodedMessage) -> Vec<EntityStateEvent> {
    let mut events = Vec::new();
    for desc in index.lookup(&msg.dgn_name, msg.instance) {
        match desc.kind {
            EntityKind::Sensor => project_sensor(desc, msg, &mut events),
            EntityKind::BinarySensor | EntityKind::Switch => {
                project_binary(desc, msg, &mut events);
            }
            EntityKind::Light => project_light(desc, msg, &mut events),
            EntityKind::Climate => project_climate(desc, msg, &mut events),
        }
    }
    events
}

/// The descriptor's signal after its optional transform. `None` when the
/// signal is absent, unavailable, or the transform yields nothing.
fn extract(desc: &EntityDescriptor, msg: &DecodedMessage) -> Option<SignalValue> {
    let field = desc.signal_field.as_deref()?;
    let value = msg.signal(field)?;
    if matches!(value, SignalValue::Unavailable) {
        return None;
    }
    match &desc.transform {
        Some(transform) => transform.apply(value, &msg.signals),
        None => Some(value.clone()),
    }
}

/// Text form of a value, for label comparison and string states.
fn text_of(value: &SignalValue) -> Option<String> {
    match value {
        SignalValue::Enum { label: Some(l), .. } => Some(l.clone()),
        SignalValue::Enum { raw, label: None } => Some(raw.to_string()),
        SignalValue::Uint(v) | SignalValue::Raw(v) => Some(v.to_string()),
        SignalValue::Int(v) => Some(v.to_string()),
        SignalValue::Float(v) => Some(v.to_string()),
        SignalValue::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
        SignalValue::Unavailable => None,
    }
}

fn state_value(value: &SignalValue) -> Option<StateValue> {
    match value {
        SignalValue::Uint(v) => Some(StateValue::Int(i64::try_from(*v).ok()?)),
        SignalValue::Raw(v) => Some(StateValue::Int(i64::try_from(*v).ok()?)),
        SignalValue::Int(v) => Some(StateValue::Int(*v)),
        SignalValue::Float(v) => Some(StateValue::Float(*v)),
        SignalValue::Bool(v) => Some(StateValue::Int(i64::from(*v))),
        SignalValue::Enum { label: Some(l), .. } => Some(StateValue::Text(l.clone())),
        SignalValue::Enum { raw, label: None } => Some(StateValue::Text(raw.to_string())),
        SignalValue::Unavailable => None,
    }
}

fn push(
    events: &mut Vec<EntityStateEvent>,
    desc: &EntityDescriptor,
    channel: Channel,
    value: StateValue,
) {
    events.push(EntityStateEvent {
        entity_id: desc.entity_id.clone(),
        kind: desc.kind,
        channel,
        value,
    });
}

fn project_sensor(
    desc: &EntityDescriptor,
    msg: &DecodedMessage,
    events: &mut Vec<EntityStateEvent>,
) {
    let Some(value) = extract(desc, msg) else {
        return;
    };
    if let Some(state) = state_value(&value) {
        push(events, desc, Channel::Default, state);
    }
}

/// ON when the value equals the on-label or reads truthy; OFF when it
/// equals the off-label or reads zero; otherwise nothing.
fn project_binary(
    desc: &EntityDescriptor,
    msg: &DecodedMessage,
    events: &mut Vec<EntityStateEvent>,
) {
    let Some(value) = extract(desc, msg) else {
        return;
    };
    let text = text_of(&value);

    let on = if let (Some(on_label), Some(text)) = (&desc.on_label, &text) {
        if text == on_label {
            Some(true)
        } else if desc.off_label.as_ref() == Some(text) {
            Some(false)
        } else {
            value.as_f64().map(|_| value.is_truthy())
        }
    } else if let (Some(off_label), Some(text)) = (&desc.off_label, &text) {
        if text == off_label {
            Some(false)
        } else {
            value.as_f64().map(|_| value.is_truthy())
        }
    } else {
        value.as_f64().map(|_| value.is_truthy())
    };

    if let Some(on) = on {
        push(events, desc, Channel::Default, StateValue::on_off(on));
    }
}

/// ON/OFF from the brightness field being non-zero; when the light
/// supports brightness, additionally emit 0..100 derived from the RV-C
/// 0..200 range by halving with round-to-nearest.
fn project_light(
    desc: &EntityDescriptor,
    msg: &DecodedMessage,
    events: &mut Vec<EntityStateEvent>,
) {
    let Some(value) = extract(desc, msg) else {
        return;
    };
    let Some(level) = value.as_f64() else {
        return;
    };

    push(
        events,
        desc,
        Channel::Default,
        StateValue::on_off(level != 0.0),
    );

    if desc.supports_brightness {
        let percent = (level / 2.0).round().clamp(0.0, 100.0) as i64;
        push(events, desc, Channel::Brightness, StateValue::Int(percent));
    }
}

/// Up to four sub-states, each on its own channel, driven by the
/// descriptor's designated signals.
fn project_climate(
    desc: &EntityDescriptor,
    msg: &DecodedMessage,
    events: &mut Vec<EntityStateEvent>,
) {
    if let Some(value) = desc.mode_field.as_deref().and_then(|f| msg.signal(f)) {
        if let Some(text) = text_of(value) {
            push(
                events,
                desc,
                Channel::Mode,
                StateValue::Text(text.to_ascii_lowercase()),
            );
        }
    }

    if let Some(value) = desc
        .current_temperature_field
        .as_deref()
        .and_then(|f| msg.signal(f))
    {
        if let Some(temp) = value.as_f64() {
            push(
                events,
                desc,
                Channel::CurrentTemperature,
                StateValue::Float((temp * 10.0).round() / 10.0),
            );
        }
    }

    if let Some(value) = desc.setpoint_field.as_deref().and_then(|f| msg.signal(f)) {
        if let Some(setpoint) = value.as_f64() {
            push(
                events,
                desc,
                Channel::SetpointTemperature,
                StateValue::Int(setpoint.round() as i64),
            );
        }
    }

    if let Some(value) = desc.fan_mode_field.as_deref().and_then(|f| msg.signal(f)) {
        if let Some(text) = text_of(value) {
            push(
                events,
                desc,
                Channel::FanMode,
                StateValue::Text(text.to_ascii_lowercase()),
            );
        }
    }
}
