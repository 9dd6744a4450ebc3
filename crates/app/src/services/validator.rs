//! Command validator — stages 1 to 4 of the outbound pipeline.
//!
//! Stages run in strict order and the first failure short-circuits:
//! schema → entity → range → policy. All four are pure functions of the
//! candidate, the entity index and the configuration, so distinct
//! commands may validate concurrently. Stage 5 (rate) consults shared
//! state and lives in [`RateLimiter`](crate::services::rate_limiter).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rvcbridge_domain::command::{
    CandidateCommand, ClimateMode, CommandAction, CommandValue, FanMode, Family,
    NormalizedCommand,
};
use rvcbridge_domain::entity::EntityIndex;
use rvcbridge_domain::error::{ErrorCode, ValidatorError};

/// Policy configuration for stage 4.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    /// Entity ids that are always rejected.
    pub denylist: HashSet<String>,
    /// When non-empty, only these entity ids are accepted.
    pub allowlist: HashSet<String>,
    /// Families commands may target.
    pub allowed_families: HashSet<Family>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            denylist: HashSet::new(),
            allowlist: HashSet::new(),
            allowed_families: [Family::Light, Family::Climate, Family::Switch]
                .into_iter()
                .collect(),
        }
    }
}

/// The staged command validator.
pub struct CommandValidator {
    index: Arc<EntityIndex>,
    policy: CommandPolicy,
}

impl CommandValidator {
    /// Create a validator over the entity index with the given policy.
    #[must_use]
    pub fn new(index: Arc<EntityIndex>, policy: CommandPolicy) -> Self {
        Self { index, policy }
    }

    /// Run stages 1–4, producing a normalized command stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError`] with the stable code of the first
    /// failing stage.
    pub fn validate(
        &self,
        cmd: &CandidateCommand,
        now: Instant,
    ) -> Result<NormalizedCommand, ValidatorError> {
        // Stage 1 — schema.
        let (family, action, value) = self.check_schema(cmd)?;
        // Stage 2 — entity.
        self.check_entity(&cmd.entity_id, family)?;
        // Stage 3 — range.
        let value = check_range(&cmd.entity_id, family, action, value)?;
        // Stage 4 — policy.
        self.check_policy(&cmd.entity_id, family)?;

        Ok(NormalizedCommand {
            entity_id: cmd.entity_id.clone(),
            family,
            action,
            value,
            enqueued_at: now,
        })
    }

    fn check_schema<'a>(
        &self,
        cmd: &'a CandidateCommand,
    ) -> Result<(Family, CommandAction, &'a serde_json::Value), ValidatorError> {
        if cmd.entity_id.is_empty() {
            return Err(ValidatorError::new(
                ErrorCode::MissingField,
                "missing required field: entity_id",
            ));
        }
        let family = cmd.family.ok_or_else(|| {
            ValidatorError::new(ErrorCode::MissingField, "missing required field: family")
        })?;
        let value = cmd.value.as_ref().ok_or_else(|| {
            ValidatorError::new(ErrorCode::MissingField, "missing required field: value")
        })?;

        let action = match cmd.action {
            Some(action) => action,
            // Light and switch commands default to a state change; the
            // multi-action climate family must be explicit.
            None if family.requires_action() => {
                return Err(ValidatorError::new(
                    ErrorCode::MissingAction,
                    format!("family {family} requires an action"),
                ));
            }
            None => CommandAction::State,
        };

        Ok((family, action, value))
    }

    fn check_entity(&self, entity_id: &str, family: Family) -> Result<(), ValidatorError> {
        let desc = self.index.entity(entity_id).ok_or_else(|| {
            ValidatorError::new(
                ErrorCode::UnknownEntity,
                format!("unknown entity: {entity_id}"),
            )
        })?;

        if !desc.kind.is_controllable() || !family.matches_kind(desc.kind) {
            return Err(ValidatorError::new(
                ErrorCode::FamilyMismatch,
                format!(
                    "entity {entity_id} is a {}, command family is {family}",
                    desc.kind
                ),
            ));
        }
        Ok(())
    }

    fn check_policy(&self, entity_id: &str, family: Family) -> Result<(), ValidatorError> {
        if self.policy.denylist.contains(entity_id) {
            return Err(ValidatorError::new(
                ErrorCode::Denylisted,
                format!("entity {entity_id} is denied"),
            ));
        }
        if !self.policy.allowlist.is_empty() && !self.policy.allowlist.contains(entity_id) {
            return Err(ValidatorError::new(
                ErrorCode::NotAllowlisted,
                format!("entity {entity_id} is not in the allowlist"),
            ));
        }
        if !self.policy.allowed_families.contains(&family) {
            return Err(ValidatorError::new(
                ErrorCode::FamilyNotAllowed,
                format!("family {family} is not allowed"),
            ));
        }
        Ok(())
    }
}

/// Stage 3 — type and domain checks per `(family, action)`.
fn check_range(
    entity_id: &str,
    family: Family,
    action: CommandAction,
    value: &serde_json::Value,
) -> Result<CommandValue, ValidatorError> {
    match (family, action) {
        (Family::Light | Family::Switch, CommandAction::State) => {
            let text = as_text(value)?;
            match text.to_ascii_uppercase().as_str() {
                "ON" => Ok(CommandValue::OnOff(true)),
                "OFF" => Ok(CommandValue::OnOff(false)),
                other => Err(ValidatorError::new(
                    ErrorCode::ValueNotAllowed,
                    format!("invalid state {other:?}, allowed: ON, OFF"),
                )),
            }
        }
        (Family::Light, CommandAction::Brightness) => {
            let pct = as_integer(value)?;
            if pct < 0 {
                return Err(ValidatorError::new(
                    ErrorCode::BelowMinimum,
                    format!("value {pct} below minimum 0"),
                ));
            }
            if pct > 100 {
                return Err(ValidatorError::new(
                    ErrorCode::AboveMaximum,
                    format!("value {pct} above maximum 100"),
                ));
            }
            Ok(CommandValue::Brightness(pct as u8))
        }
        (Family::Climate, CommandAction::Mode) => {
            let text = as_text(value)?;
            ClimateMode::parse(text).map(CommandValue::Mode).ok_or_else(|| {
                ValidatorError::new(
                    ErrorCode::ValueNotAllowed,
                    format!("invalid mode {text:?}, allowed: off, heat, cool, auto"),
                )
            })
        }
        (Family::Climate, CommandAction::Temperature) => {
            let fahrenheit = as_number(value)?;
            if fahrenheit < 50.0 {
                return Err(ValidatorError::new(
                    ErrorCode::BelowMinimum,
                    format!("value {fahrenheit} below minimum 50"),
                ));
            }
            if fahrenheit > 100.0 {
                return Err(ValidatorError::new(
                    ErrorCode::AboveMaximum,
                    format!("value {fahrenheit} above maximum 100"),
                ));
            }
            Ok(CommandValue::Temperature(fahrenheit))
        }
        (Family::Climate, CommandAction::FanMode) => {
            let text = as_text(value)?;
            FanMode::parse(text).map(CommandValue::FanMode).ok_or_else(|| {
                ValidatorError::new(
                    ErrorCode::ValueNotAllowed,
                    format!("invalid fan mode {text:?}, allowed: auto, low, high"),
                )
            })
        }
        _ => Err(ValidatorError::new(
            ErrorCode::WrongValueType,
            format!("entity {entity_id}: family {family} has no action {action}"),
        )),
    }
}

fn as_text(value: &serde_json::Value) -> Result<&str, ValidatorError> {
    value.as_str().ok_or_else(|| {
        ValidatorError::new(
            ErrorCode::WrongValueType,
            format!("expected a string value, got {value}"),
        )
    })
}

fn as_integer(value: &serde_json::Value) -> Result<i64, ValidatorError> {
    value.as_i64().ok_or_else(|| {
        ValidatorError::new(
            ErrorCode::WrongValueType,
            format!("expected an integer value, got {value}"),
        )
    })
}

fn as_number(value: &serde_json::Value) -> Result<f64, ValidatorError> {
    value.as_f64().ok_or_else(|| {
        ValidatorError::new(
            ErrorCode::WrongValueType,
            format!("expected a number value, got {value}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvcbridge_domain::entity::MappingDocument;

    fn index() -> Arc<EntityIndex> {
        let doc: MappingDocument = toml::from_str(
            r#"
            [[entities]]
            entity_id = "light_ceiling"
            kind = "light"
            source_message = "DC_DIMMER_STATUS_3"
            instance = 1
            signal_field = "load_status"
            device_id = "lighting"
            supports_brightness = true

            [[entities]]
            entity_id = "hvac_front"
            kind = "climate"
            source_message = "THERMOSTAT_STATUS_1"
            instance = 0
            device_id = "hvac"

            [[entities]]
            entity_id = "water_pump"
            kind = "switch"
            source_message = "DC_DIMMER_STATUS_3"
            instance = 93
            signal_field = "load_status"
            device_id = "plumbing"

            [[entities]]
            entity_id = "tank_fresh_0"
            kind = "sensor"
            source_message = "TANK_STATUS"
            instance = 0
            signal_field = "relative_level"
            device_id = "tanks"
            "#,
        )
        .unwrap();
        Arc::new(EntityIndex::from_document(doc).unwrap())
    }

    fn validator() -> CommandValidator {
        CommandValidator::new(index(), CommandPolicy::default())
    }

    fn candidate(
        entity_id: &str,
        family: Option<Family>,
        action: Option<CommandAction>,
        value: Option<serde_json::Value>,
    ) -> CandidateCommand {
        CandidateCommand {
            entity_id: entity_id.to_string(),
            family,
            action,
            value,
        }
    }

    fn code_of(result: Result<NormalizedCommand, ValidatorError>) -> ErrorCode {
        result.unwrap_err().code
    }

    #[test]
    fn should_normalize_light_on_command() {
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            None,
            Some(serde_json::json!("on")),
        );

        let normalized = validator().validate(&cmd, Instant::now()).unwrap();
        assert_eq!(normalized.family, Family::Light);
        assert_eq!(normalized.action, CommandAction::State);
        assert_eq!(normalized.value, CommandValue::OnOff(true));
    }

    #[test]
    fn should_reject_missing_entity_id_with_e001() {
        let cmd = candidate(
            "",
            Some(Family::Light),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::MissingField
        );
    }

    #[test]
    fn should_reject_missing_family_with_e001() {
        let cmd = candidate("light_ceiling", None, None, Some(serde_json::json!("ON")));
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::MissingField
        );
    }

    #[test]
    fn should_reject_missing_value_with_e001() {
        let cmd = candidate("light_ceiling", Some(Family::Light), None, None);
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::MissingField
        );
    }

    #[test]
    fn should_reject_climate_without_action_with_e004() {
        let cmd = candidate(
            "hvac_front",
            Some(Family::Climate),
            None,
            Some(serde_json::json!("cool")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::MissingAction
        );
    }

    #[test]
    fn should_reject_unknown_entity_with_e006() {
        let cmd = candidate(
            "light_imaginary",
            Some(Family::Light),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::UnknownEntity
        );
    }

    #[test]
    fn should_reject_family_kind_mismatch_with_e008() {
        let cmd = candidate(
            "water_pump",
            Some(Family::Light),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::FamilyMismatch
        );
    }

    #[test]
    fn should_reject_commands_at_sensor_entities_with_e008() {
        let cmd = candidate(
            "tank_fresh_0",
            Some(Family::Switch),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::FamilyMismatch
        );
    }

    #[test]
    fn should_reject_wrong_value_type_with_e011() {
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            Some(CommandAction::Brightness),
            Some(serde_json::json!("bright")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::WrongValueType
        );
    }

    #[test]
    fn should_reject_unknown_state_with_e012() {
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            None,
            Some(serde_json::json!("DIM")),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::ValueNotAllowed
        );
    }

    #[test]
    fn should_accept_case_insensitive_climate_mode() {
        let cmd = candidate(
            "hvac_front",
            Some(Family::Climate),
            Some(CommandAction::Mode),
            Some(serde_json::json!("AUTO")),
        );
        let normalized = validator().validate(&cmd, Instant::now()).unwrap();
        assert_eq!(normalized.value, CommandValue::Mode(ClimateMode::Auto));
    }

    #[test]
    fn should_reject_brightness_above_maximum_with_e014() {
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            Some(CommandAction::Brightness),
            Some(serde_json::json!(150)),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::AboveMaximum
        );
    }

    #[test]
    fn should_reject_brightness_below_minimum_with_e013() {
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            Some(CommandAction::Brightness),
            Some(serde_json::json!(-1)),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::BelowMinimum
        );
    }

    #[test]
    fn should_accept_temperature_as_integer_or_float() {
        for value in [serde_json::json!(72), serde_json::json!(72.5)] {
            let cmd = candidate(
                "hvac_front",
                Some(Family::Climate),
                Some(CommandAction::Temperature),
                Some(value),
            );
            let normalized = validator().validate(&cmd, Instant::now()).unwrap();
            assert!(matches!(normalized.value, CommandValue::Temperature(_)));
        }
    }

    #[test]
    fn should_reject_temperature_outside_bounds() {
        let low = candidate(
            "hvac_front",
            Some(Family::Climate),
            Some(CommandAction::Temperature),
            Some(serde_json::json!(45.0)),
        );
        assert_eq!(
            code_of(validator().validate(&low, Instant::now())),
            ErrorCode::BelowMinimum
        );

        let high = candidate(
            "hvac_front",
            Some(Family::Climate),
            Some(CommandAction::Temperature),
            Some(serde_json::json!(104)),
        );
        assert_eq!(
            code_of(validator().validate(&high, Instant::now())),
            ErrorCode::AboveMaximum
        );
    }

    #[test]
    fn should_reject_action_foreign_to_family_with_e011() {
        let cmd = candidate(
            "water_pump",
            Some(Family::Switch),
            Some(CommandAction::Brightness),
            Some(serde_json::json!(50)),
        );
        assert_eq!(
            code_of(validator().validate(&cmd, Instant::now())),
            ErrorCode::WrongValueType
        );
    }

    #[test]
    fn should_reject_denylisted_entity_with_e015() {
        let mut policy = CommandPolicy::default();
        policy.denylist.insert("water_pump".to_string());
        let validator = CommandValidator::new(index(), policy);

        let cmd = candidate(
            "water_pump",
            Some(Family::Switch),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator.validate(&cmd, Instant::now())),
            ErrorCode::Denylisted
        );
    }

    #[test]
    fn should_reject_entity_outside_allowlist_with_e017() {
        let mut policy = CommandPolicy::default();
        policy.allowlist.insert("light_ceiling".to_string());
        let validator = CommandValidator::new(index(), policy);

        let allowed = candidate(
            "light_ceiling",
            Some(Family::Light),
            None,
            Some(serde_json::json!("ON")),
        );
        assert!(validator.validate(&allowed, Instant::now()).is_ok());

        let outside = candidate(
            "water_pump",
            Some(Family::Switch),
            None,
            Some(serde_json::json!("ON")),
        );
        assert_eq!(
            code_of(validator.validate(&outside, Instant::now())),
            ErrorCode::NotAllowlisted
        );
    }

    #[test]
    fn should_reject_disallowed_family_with_e018() {
        let mut policy = CommandPolicy::default();
        policy.allowed_families.remove(&Family::Climate);
        let validator = CommandValidator::new(index(), policy);

        let cmd = candidate(
            "hvac_front",
            Some(Family::Climate),
            Some(CommandAction::Mode),
            Some(serde_json::json!("cool")),
        );
        assert_eq!(
            code_of(validator.validate(&cmd, Instant::now())),
            ErrorCode::FamilyNotAllowed
        );
    }

    #[test]
    fn should_be_deterministic_for_fixed_inputs() {
        let validator = validator();
        let now = Instant::now();
        let cmd = candidate(
            "light_ceiling",
            Some(Family::Light),
            Some(CommandAction::Brightness),
            Some(serde_json::json!(60)),
        );

        let a = validator.validate(&cmd, now).unwrap();
        let b = validator.validate(&cmd, now).unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.enqueued_at, b.enqueued_at);
    }
}
