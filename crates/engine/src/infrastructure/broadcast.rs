//! Overlay broadcast over a tokio broadcast channel.
//!
//! Every lifecycle event goes onto one channel; WebSocket subscribers filter by
//! campaign. Lagging subscribers lose old events rather than slowing the engine.

use async_trait::async_trait;
use critcast_domain::{CampaignId, LifecycleEvent};
use tokio::sync::broadcast;

use crate::infrastructure::ports::BroadcastPort;

/// One published lifecycle event, tagged with its campaign.
#[derive(Debug, Clone)]
pub struct CampaignEvent {
    pub campaign_id: CampaignId,
    pub event: LifecycleEvent,
}

pub struct ChannelBroadcaster {
    sender: broadcast::Sender<CampaignEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl BroadcastPort for ChannelBroadcaster {
    async fn publish(&self, campaign_id: CampaignId, event: LifecycleEvent) {
        let kind = event.kind();
        match self.sender.send(CampaignEvent { campaign_id, event }) {
            Ok(receivers) => {
                tracing::debug!(
                    campaign_id = %campaign_id,
                    event = kind,
                    receivers,
                    "Published lifecycle event"
                );
            }
            Err(_) => {
                // Nobody is watching; overlays pick up state on reconnect.
                tracing::debug!(campaign_id = %campaign_id, event = kind, "No overlay subscribers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::new_instance;
    use critcast_domain::EventKind;

    #[tokio::test]
    async fn publish_without_subscribers_drops_the_event() {
        let broadcaster = ChannelBroadcaster::new(8);
        let instance = new_instance(EventKind::Individual, 3);

        broadcaster
            .publish(
                instance.campaign_id(),
                LifecycleEvent::Created {
                    instance: instance.snapshot(),
                },
            )
            .await;

        assert_eq!(broadcaster.subscriber_count(), 0);
        let mut late = broadcaster.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribers_receive_campaign_tagged_events() {
        let broadcaster = ChannelBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let instance = new_instance(EventKind::Group, 3);

        broadcaster
            .publish(
                instance.campaign_id(),
                LifecycleEvent::Cancelled {
                    instance: instance.snapshot(),
                },
            )
            .await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.campaign_id, instance.campaign_id());
        assert_eq!(received.event.kind(), "cancelled");
    }
}
