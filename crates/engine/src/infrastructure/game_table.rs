//! Game table connection registry and HTTP command relay.
//!
//! Implements `GameTableConnectionsPort` and `ActionTransportPort`. The relay
//! accepts `POST {endpoint}/commands` and answers with a `TransportReply`.

use std::time::Duration;

use async_trait::async_trait;
use critcast_domain::CampaignId;
use dashmap::DashMap;
use reqwest::Client;
use serde::Serialize;

use crate::infrastructure::ports::{
    ActionTransportPort, ConnectionHandle, GameCommand, GameTableConnectionsPort, TransportError,
    TransportReply,
};

/// Campaigns with a reachable game table.
#[derive(Default)]
pub struct GameTableConnections {
    handles: DashMap<CampaignId, ConnectionHandle>,
}

impl GameTableConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl GameTableConnectionsPort for GameTableConnections {
    fn handle_for(&self, campaign_id: CampaignId) -> Option<ConnectionHandle> {
        self.handles.get(&campaign_id).map(|h| h.value().clone())
    }

    fn register(&self, handle: ConnectionHandle) {
        tracing::info!(
            campaign_id = %handle.campaign_id,
            endpoint = %handle.endpoint,
            "Game table connected"
        );
        self.handles.insert(handle.campaign_id, handle);
    }

    fn unregister(&self, campaign_id: CampaignId) -> bool {
        let removed = self.handles.remove(&campaign_id).is_some();
        if removed {
            tracing::info!(campaign_id = %campaign_id, "Game table disconnected");
        }
        removed
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandEnvelope<'a> {
    campaign_id: CampaignId,
    #[serde(flatten)]
    command: &'a GameCommand,
}

/// Client for the game table relay
#[derive(Clone)]
pub struct HttpGameTableTransport {
    client: Client,
}

impl HttpGameTableTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    fn url(handle: &ConnectionHandle, path: &str) -> String {
        format!("{}/{}", handle.endpoint.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ActionTransportPort for HttpGameTableTransport {
    async fn send(
        &self,
        command: &GameCommand,
        handle: &ConnectionHandle,
    ) -> Result<TransportReply, TransportError> {
        let envelope = CommandEnvelope {
            campaign_id: handle.campaign_id,
            command,
        };

        let response = self
            .client
            .post(Self::url(handle, "commands"))
            .json(&envelope)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Rejected(format!("{status}: {error_text}")));
        }

        response
            .json::<TransportReply>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    async fn ping(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let response = self
            .client
            .get(Self::url(handle, "health"))
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::fixed_time;

    fn handle(campaign_id: CampaignId) -> ConnectionHandle {
        ConnectionHandle {
            campaign_id,
            endpoint: "http://table.local/".to_string(),
            connected_at: fixed_time(),
        }
    }

    #[test]
    fn register_replaces_previous_handle() {
        let connections = GameTableConnections::new();
        let campaign = CampaignId::new();

        connections.register(handle(campaign));
        let mut moved = handle(campaign);
        moved.endpoint = "http://other.local".to_string();
        connections.register(moved.clone());

        assert_eq!(connections.len(), 1);
        assert_eq!(connections.handle_for(campaign), Some(moved));
        assert!(connections.unregister(campaign));
        assert!(!connections.unregister(campaign));
        assert!(connections.handle_for(campaign).is_none());
    }

    #[test]
    fn envelope_flattens_command_tag() {
        let campaign = CampaignId::new();
        let command = GameCommand::DisableSpell {
            character: Some("Vex".to_string()),
            spell: None,
            duration_seconds: 60,
        };
        let json = serde_json::to_value(CommandEnvelope {
            campaign_id: campaign,
            command: &command,
        })
        .unwrap();

        assert_eq!(json["command"], "disable_spell");
        assert_eq!(json["campaignId"], campaign.to_string());
        assert_eq!(json["duration_seconds"], 60);
        assert!(json.get("spell").is_none());
        assert_eq!(
            HttpGameTableTransport::url(&handle(campaign), "commands"),
            "http://table.local/commands"
        );
    }
}
