//! Topic layout — the mapping between bridge events and MQTT topics,
//! and command-topic parsing back into candidate commands.
//!
//! Pure functions over topic strings; the broker client stays in
//! `lib.rs`.
//!
//! | Direction | Topic | Payload |
//! |-----------|-------|---------|
//! | out | `{base}/{component}/{entity}/state` | state value |
//! | out | `{base}/light/{entity}/brightness` | 0..100 |
//! | out | `{base}/climate/{entity}/{mode,temperature,setpoint,fan}` | per channel |
//! | out | `{base}/command/status` / `{base}/command/error` | JSON feedback |
//! | out | `{base}/status` | `online` / `offline` |
//! | in | `{base}/{family}/{entity}/set` | state value |
//! | in | `{base}/{family}/{entity}/{action}/set` | action value |

use rvcbridge_domain::command::{CandidateCommand, CommandAction, Family};
use rvcbridge_domain::entity::EntityKind;
use rvcbridge_domain::event::{Channel, EntityStateEvent};

/// The availability topic carrying `online`/`offline`.
#[must_use]
pub fn availability_topic(base: &str) -> String {
    format!("{base}/status")
}

/// The feedback topic for successful commands.
#[must_use]
pub fn ack_topic(base: &str) -> String {
    format!("{base}/command/status")
}

/// The feedback topic for rejected or failed commands.
#[must_use]
pub fn error_topic(base: &str) -> String {
    format!("{base}/command/error")
}

/// The state topic for one entity state event.
#[must_use]
pub fn state_topic(base: &str, event: &EntityStateEvent) -> String {
    let component = event.kind.component();
    let entity_id = &event.entity_id;
    match (event.kind, event.channel) {
        (EntityKind::Climate, channel) => {
            format!("{base}/climate/{entity_id}/{}", channel.as_str())
        }
        (_, Channel::Brightness) => format!("{base}/{component}/{entity_id}/brightness"),
        _ => format!("{base}/{component}/{entity_id}/state"),
    }
}

/// The subscription filters covering every command topic.
#[must_use]
pub fn command_filters(base: &str) -> [String; 2] {
    [format!("{base}/+/+/set"), format!("{base}/+/+/+/set")]
}

/// Parse a command topic and payload into a candidate command.
///
/// Returns `None` for topics outside the command tree; malformed values
/// still produce a candidate so the validator can answer with a coded
/// error instead of silence.
#[must_use]
pub fn parse_command(base: &str, topic: &str, payload: &str) -> Option<CandidateCommand> {
    let rest = topic.strip_prefix(base)?.strip_prefix('/')?;
    let segments: Vec<&str> = rest.split('/').collect();

    let (family_seg, entity_id, action) = match segments.as_slice() {
        [family, entity_id, "set"] => (*family, *entity_id, None),
        [family, entity_id, action, "set"] => {
            (*family, *entity_id, Some(CommandAction::parse(action)?))
        }
        _ => return None,
    };

    let family = Family::parse(family_seg)?;
    if entity_id.is_empty() {
        return None;
    }

    Some(CandidateCommand {
        entity_id: entity_id.to_string(),
        family: Some(family),
        action,
        value: Some(parse_payload(payload, action)),
    })
}

/// Best-effort payload typing: numbers become JSON numbers for the
/// numeric actions, everything else stays a string.
fn parse_payload(payload: &str, action: Option<CommandAction>) -> serde_json::Value {
    let trimmed = payload.trim();
    match action {
        Some(CommandAction::Brightness | CommandAction::Temperature) => {
            if let Ok(int) = trimmed.parse::<i64>() {
                return serde_json::Value::from(int);
            }
            if let Ok(float) = trimmed.parse::<f64>() {
                return serde_json::Value::from(float);
            }
            serde_json::Value::String(trimmed.to_string())
        }
        _ => serde_json::Value::String(trimmed.to_string()),
    }
}
