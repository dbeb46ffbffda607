//! Turns a resolved instance into a game table command.

use std::sync::Arc;

use critcast_domain::{
    ActionResult, ActionType, CampaignEventConfig, EventDefinition, InstanceId, RollContext,
    StreamerId,
};

use crate::infrastructure::ports::{ActionTransportPort, ConnectionHandle, GameCommand};

/// Effect length when the catalog entry does not set one.
const DEFAULT_EFFECT_SECONDS: u32 = 60;
const DEFAULT_MODIFIER: i32 = 2;
const DEFAULT_USES: u32 = 1;
const DEFAULT_MONSTER_TARGET: &str = "all_hostile";
const DEFAULT_MONSTER_STAT: &str = "ac";

pub const NO_CONNECTION: &str = "no game-table connection";
pub const UNSUPPORTED_ACTION: &str = "unsupported action type";

/// What the executor knows about the instance being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub instance_id: InstanceId,
    pub streamer_id: StreamerId,
    /// The roll that started or confirmed the instance, if any
    pub roll: Option<RollContext>,
}

impl ActionContext {
    fn character(&self) -> Option<String> {
        self.roll.as_ref().and_then(|r| r.character_name.clone())
    }
}

pub struct ActionExecutor {
    transport: Arc<dyn ActionTransportPort>,
}

impl ActionExecutor {
    pub fn new(transport: Arc<dyn ActionTransportPort>) -> Self {
        Self { transport }
    }

    /// Build the command for an event, or `None` for unsupported action types.
    pub fn build_command(event: &EventDefinition, context: &ActionContext) -> Option<GameCommand> {
        let params = &event.action_config;
        let duration_seconds = params.duration_seconds.unwrap_or(DEFAULT_EFFECT_SECONDS);
        let magnitude = params.modifier.unwrap_or(DEFAULT_MODIFIER).saturating_abs();

        let command = match event.action_type {
            ActionType::SpellDisable => GameCommand::DisableSpell {
                character: context.character(),
                spell: params.spell.clone(),
                duration_seconds,
            },
            ActionType::SpellBuff | ActionType::SpellDebuff => GameCommand::ModifySpellRoll {
                character: context.character(),
                modifier: if event.action_type == ActionType::SpellBuff {
                    magnitude
                } else {
                    -magnitude
                },
                uses: params.uses.unwrap_or(DEFAULT_USES),
                duration_seconds,
            },
            ActionType::MonsterBuff | ActionType::MonsterDebuff => GameCommand::ModifyMonster {
                target: params
                    .target
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MONSTER_TARGET.to_string()),
                stat: params
                    .stat
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MONSTER_STAT.to_string()),
                modifier: if event.action_type == ActionType::MonsterBuff {
                    magnitude
                } else {
                    -magnitude
                },
                duration_seconds,
            },
            ActionType::Custom => GameCommand::Custom {
                name: event.slug.clone(),
                payload: serde_json::Value::Object(params.extra.clone()),
            },
            ActionType::Unknown => return None,
        };

        Some(command)
    }

    /// Execute the event's action. Never fails: every problem becomes an
    /// unsuccessful `ActionResult` so the instance can still complete.
    pub async fn execute(
        &self,
        event: &EventDefinition,
        config: &CampaignEventConfig,
        handle: Option<&ConnectionHandle>,
        context: &ActionContext,
    ) -> ActionResult {
        let Some(command) = Self::build_command(event, context) else {
            tracing::warn!(
                instance_id = %context.instance_id,
                event_id = %event.id,
                action_type = %event.action_type,
                "Unsupported action type"
            );
            return ActionResult::failure(UNSUPPORTED_ACTION);
        };

        let Some(handle) = handle else {
            tracing::warn!(
                instance_id = %context.instance_id,
                campaign_id = %config.campaign_id,
                "No game table connection; action not delivered"
            );
            return ActionResult::failure(NO_CONNECTION);
        };

        match self.transport.send(&command, handle).await {
            Ok(reply) => {
                tracing::info!(
                    instance_id = %context.instance_id,
                    command = command.kind(),
                    success = reply.success,
                    "Game table command delivered"
                );
                let message = if reply.message.is_empty() {
                    format!("{} sent", command.kind())
                } else {
                    reply.message
                };
                ActionResult {
                    success: reply.success,
                    message,
                    payload: reply.payload,
                }
            }
            Err(e) => {
                tracing::warn!(
                    instance_id = %context.instance_id,
                    command = command.kind(),
                    error = %e,
                    "Game table command failed"
                );
                ActionResult::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockActionTransportPort, TransportError, TransportReply};
    use crate::test_fixtures::{connection_handle, event_config};
    use critcast_domain::{
        ActionConfig, CampaignId, CriticalType, EventKind, TriggerConfig, TriggerType,
    };

    fn event(action_type: ActionType, action_config: ActionConfig) -> EventDefinition {
        EventDefinition::new(
            "test-event",
            "Test Event",
            EventKind::Individual,
            TriggerType::DiceCritical,
            action_type,
        )
        .with_trigger_config(TriggerConfig::success_only())
        .with_action_config(action_config)
    }

    fn context() -> ActionContext {
        ActionContext {
            instance_id: InstanceId::new(),
            streamer_id: StreamerId::new("s1"),
            roll: Some(RollContext {
                formula: "1d20".to_string(),
                result: 20,
                character_name: Some("Vex".to_string()),
                breakdown: None,
                critical_type: Some(CriticalType::Success),
            }),
        }
    }

    #[test]
    fn debuffs_negate_configured_magnitude() {
        let spell = event(
            ActionType::SpellDebuff,
            ActionConfig {
                modifier: Some(3),
                uses: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(
            ActionExecutor::build_command(&spell, &context()),
            Some(GameCommand::ModifySpellRoll {
                character: Some("Vex".to_string()),
                modifier: -3,
                uses: 2,
                duration_seconds: DEFAULT_EFFECT_SECONDS,
            })
        );

        let monster = event(
            ActionType::MonsterBuff,
            ActionConfig {
                modifier: Some(-4),
                stat: Some("attack".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            ActionExecutor::build_command(&monster, &context()),
            Some(GameCommand::ModifyMonster {
                target: DEFAULT_MONSTER_TARGET.to_string(),
                stat: "attack".to_string(),
                modifier: 4,
                duration_seconds: DEFAULT_EFFECT_SECONDS,
            })
        );
    }

    #[test]
    fn custom_forwards_extra_parameters() {
        let mut extra = serde_json::Map::new();
        extra.insert("sound".to_string(), serde_json::json!("thunder"));
        let custom = event(
            ActionType::Custom,
            ActionConfig {
                extra,
                ..Default::default()
            },
        );
        assert_eq!(
            ActionExecutor::build_command(&custom, &context()),
            Some(GameCommand::Custom {
                name: "test-event".to_string(),
                payload: serde_json::json!({"sound": "thunder"}),
            })
        );
    }

    #[tokio::test]
    async fn missing_handle_is_a_failed_result_without_sending() {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().never();
        let executor = ActionExecutor::new(Arc::new(transport));
        let spell = event(ActionType::SpellDisable, ActionConfig::default());
        let config = event_config(CampaignId::new(), &spell, 1);

        let result = executor.execute(&spell, &config, None, &context()).await;

        assert!(!result.success);
        assert_eq!(result.message, NO_CONNECTION);
    }

    #[tokio::test]
    async fn unknown_action_is_unsupported() {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().never();
        let executor = ActionExecutor::new(Arc::new(transport));
        let unknown = event(ActionType::Unknown, ActionConfig::default());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &unknown, 1);
        let handle = connection_handle(campaign);

        let result = executor
            .execute(&unknown, &config, Some(&handle), &context())
            .await;

        assert_eq!(result, ActionResult::failure(UNSUPPORTED_ACTION));
    }

    #[tokio::test]
    async fn transport_errors_become_failed_results() {
        let mut transport = MockActionTransportPort::new();
        transport
            .expect_send()
            .returning(|_, _| Err(TransportError::Rejected("500: table offline".into())));
        let executor = ActionExecutor::new(Arc::new(transport));
        let spell = event(ActionType::SpellDisable, ActionConfig::default());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &spell, 1);
        let handle = connection_handle(campaign);

        let result = executor
            .execute(&spell, &config, Some(&handle), &context())
            .await;

        assert!(!result.success);
        assert!(result.message.contains("table offline"));
    }

    #[tokio::test]
    async fn delivered_command_reports_table_reply() {
        let mut transport = MockActionTransportPort::new();
        transport
            .expect_send()
            .withf(|command, handle| {
                command.kind() == "disable_spell" && handle.endpoint == "http://table.local"
            })
            .returning(|_, _| {
                Ok(TransportReply {
                    success: true,
                    message: String::new(),
                    payload: serde_json::json!({"spell": "Fireball"}),
                })
            });
        let executor = ActionExecutor::new(Arc::new(transport));
        let spell = event(ActionType::SpellDisable, ActionConfig::default());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &spell, 1);
        let handle = connection_handle(campaign);

        let result = executor
            .execute(&spell, &config, Some(&handle), &context())
            .await;

        assert!(result.success);
        assert_eq!(result.message, "disable_spell sent");
        assert_eq!(result.payload["spell"], "Fireball");
    }
}
