//! Pre-flight health probe for manual triggers.
//!
//! Light mode only looks at local state (configuration and connection
//! registry). Full mode also pings the game table.

use std::sync::Arc;

use async_trait::async_trait;

use crate::infrastructure::ports::{
    ActionTransportPort, CampaignConfigRepo, GameTableConnectionsPort, HealthCheck,
    HealthProbeError, HealthProbePort, HealthProbeRequest, HealthReport, ProbeMode,
};

pub const CHECK_CAMPAIGN_CONFIG: &str = "campaign_config";
pub const CHECK_CONNECTION: &str = "game_table_connection";
pub const CHECK_PING: &str = "game_table_ping";

pub struct PreflightHealthProbe {
    configs: Arc<dyn CampaignConfigRepo>,
    connections: Arc<dyn GameTableConnectionsPort>,
    transport: Arc<dyn ActionTransportPort>,
}

impl PreflightHealthProbe {
    pub fn new(
        configs: Arc<dyn CampaignConfigRepo>,
        connections: Arc<dyn GameTableConnectionsPort>,
        transport: Arc<dyn ActionTransportPort>,
    ) -> Self {
        Self {
            configs,
            connections,
            transport,
        }
    }
}

#[async_trait]
impl HealthProbePort for PreflightHealthProbe {
    async fn run(&self, request: HealthProbeRequest) -> Result<HealthReport, HealthProbeError> {
        let mut checks = Vec::with_capacity(3);

        let enabled = self
            .configs
            .list_enabled(request.campaign_id)
            .await
            .map_err(|e| HealthProbeError::Unavailable(e.to_string()))?;
        checks.push(if enabled.is_empty() {
            HealthCheck::fail(CHECK_CAMPAIGN_CONFIG, "no enabled events for campaign")
        } else {
            HealthCheck::pass(CHECK_CAMPAIGN_CONFIG)
        });

        let handle = self.connections.handle_for(request.campaign_id);
        checks.push(match &handle {
            Some(_) => HealthCheck::pass(CHECK_CONNECTION),
            None => HealthCheck::fail(CHECK_CONNECTION, "no game table connected"),
        });

        if request.mode == ProbeMode::Full {
            checks.push(match &handle {
                Some(handle) => match self.transport.ping(handle).await {
                    Ok(()) => HealthCheck::pass(CHECK_PING),
                    Err(e) => HealthCheck::fail(CHECK_PING, e.to_string()),
                },
                None => HealthCheck::warn(CHECK_PING, "skipped without a connection"),
            });
        }

        let report = HealthReport::from_checks(checks);
        tracing::debug!(
            campaign_id = %request.campaign_id,
            event_type = %request.event_type,
            mode = ?request.mode,
            healthy = report.healthy,
            "Health probe finished"
        );
        Ok(report)
    }
}
