//! HTTP routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use critcast_domain::{
    CampaignId, Contribution, CriticalType, DiceRoll, EventId, Instance, InstanceId,
    InstanceStatus, StreamerId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::extractors::ValidatedJson;
use crate::app::App;
use crate::infrastructure::ports::{ConnectionHandle, GameTableConnectionsPort};
use crate::use_cases::gamification::{
    DiceRollOutcome, GamificationError, ManualTrigger, ManualTriggerOutcome, Redemption,
    RedemptionOutcome, SessionStarted, TriggerMode,
};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/campaigns/{id}/dice-rolls", post(dice_roll))
        .route("/api/campaigns/{id}/redemptions", post(redeem))
        .route(
            "/api/campaigns/{id}/events/{event_id}/redemptions",
            post(redeem_legacy),
        )
        .route(
            "/api/campaigns/{id}/events/{event_id}/trigger",
            post(trigger_event),
        )
        .route("/api/campaigns/{id}/session/start", post(start_session))
        .route("/api/campaigns/{id}/cooldowns/reset", post(reset_cooldowns))
        .route("/api/campaigns/{id}/instances", get(list_instances))
        .route(
            "/api/campaigns/{id}/instances/expired/cancel",
            post(cancel_expired),
        )
        .route(
            "/api/campaigns/{id}/game-table",
            put(connect_game_table).delete(disconnect_game_table),
        )
        .route("/api/instances/{id}", get(get_instance))
        .route("/api/instances/{id}/contributions", get(list_contributions))
        .route("/api/instances/{id}/cancel", post(cancel_instance))
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Signals
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct DiceRollRequest {
    #[validate(length(min = 1, max = 128))]
    streamer_id: String,
    #[serde(default)]
    is_critical: bool,
    #[serde(default)]
    critical_type: Option<CriticalType>,
    #[serde(default)]
    #[validate(length(max = 256))]
    formula: String,
    #[serde(default)]
    result: i32,
    #[serde(default)]
    character_name: Option<String>,
    #[serde(default)]
    breakdown: Option<String>,
    #[serde(default)]
    viewer_count: u32,
}

async fn dice_roll(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<DiceRollRequest>,
) -> Result<Json<DiceRollOutcome>, ApiError> {
    let roll = DiceRoll {
        campaign_id: CampaignId::from_uuid(id),
        streamer_id: StreamerId::new(body.streamer_id),
        is_critical: body.is_critical,
        critical_type: body.critical_type,
        formula: body.formula,
        result: body.result,
        character_name: body.character_name,
        breakdown: body.breakdown,
        viewer_count: body.viewer_count,
    };
    Ok(Json(app.gamification.handle_dice_roll(roll).await?))
}

fn default_amount() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RedemptionRequest {
    #[validate(length(min = 1, max = 128))]
    streamer_id: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    reward_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    redemption_id: String,
    #[validate(length(min = 1, max = 128))]
    contributor_id: String,
    #[validate(length(min = 1, max = 64))]
    contributor_name: String,
    #[serde(default = "default_amount")]
    #[validate(range(min = 1, max = 10_000))]
    amount: u32,
    #[serde(default)]
    viewer_count: u32,
}

impl RedemptionRequest {
    fn into_redemption(self, campaign_id: CampaignId) -> Redemption {
        Redemption {
            campaign_id,
            streamer_id: StreamerId::new(self.streamer_id),
            reward_id: self.reward_id,
            redemption_id: self.redemption_id,
            contributor_id: self.contributor_id,
            contributor_name: self.contributor_name,
            amount: self.amount,
            viewer_count: self.viewer_count,
        }
    }
}

async fn redeem(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<RedemptionRequest>,
) -> Result<Json<RedemptionOutcome>, ApiError> {
    let redemption = body.into_redemption(CampaignId::from_uuid(id));
    Ok(Json(app.gamification.handle_redemption(redemption).await?))
}

async fn redeem_legacy(
    State(app): State<Arc<App>>,
    Path((id, event_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<RedemptionRequest>,
) -> Result<Json<RedemptionOutcome>, ApiError> {
    let redemption = body.into_redemption(CampaignId::from_uuid(id));
    let outcome = app
        .gamification
        .handle_legacy_redemption(redemption, EventId::from_uuid(event_id))
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest {
    #[validate(length(min = 1, max = 128))]
    streamer_id: String,
    #[serde(default)]
    mode: TriggerMode,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    requested_by: Option<String>,
    #[serde(default)]
    viewer_count: u32,
}

async fn trigger_event(
    State(app): State<Arc<App>>,
    Path((id, event_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<TriggerRequest>,
) -> Result<Json<ManualTriggerOutcome>, ApiError> {
    let trigger = ManualTrigger {
        campaign_id: CampaignId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        streamer_id: StreamerId::new(body.streamer_id),
        mode: body.mode,
        requested_by: body.requested_by,
        viewer_count: body.viewer_count,
    };
    Ok(Json(app.gamification.trigger_manual(trigger).await?))
}

// =============================================================================
// Campaign administration
// =============================================================================

async fn start_session(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStarted>, ApiError> {
    let started = app
        .gamification
        .start_session(CampaignId::from_uuid(id))
        .await?;
    Ok(Json(started))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetCooldownsQuery {
    streamer_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    count: u64,
}

async fn reset_cooldowns(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ResetCooldownsQuery>,
) -> Result<Json<CountResponse>, ApiError> {
    let streamer = query
        .streamer_id
        .filter(|s| !s.trim().is_empty())
        .map(StreamerId::new);
    let count = app
        .gamification
        .reset_cooldowns(CampaignId::from_uuid(id), streamer)
        .await?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Deserialize)]
struct InstanceListQuery {
    status: Option<InstanceStatus>,
}

async fn list_instances(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<Vec<Instance>>, ApiError> {
    let instances = app
        .gamification
        .list_instances(CampaignId::from_uuid(id), query.status)
        .await?;
    Ok(Json(instances))
}

async fn cancel_expired(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Instance>>, ApiError> {
    let cancelled = app
        .gamification
        .cancel_expired(CampaignId::from_uuid(id))
        .await?;
    Ok(Json(cancelled))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct GameTableRequest {
    /// Falls back to the configured relay when omitted
    #[serde(default)]
    #[validate(url)]
    endpoint: Option<String>,
}

async fn connect_game_table(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<GameTableRequest>,
) -> Result<Json<ConnectionHandle>, ApiError> {
    let endpoint = body
        .endpoint
        .or_else(|| app.config.game_table_relay_url.clone())
        .ok_or_else(|| {
            ApiError::BadRequest("endpoint is required when no relay is configured".into())
        })?;
    let handle = ConnectionHandle {
        campaign_id: CampaignId::from_uuid(id),
        endpoint,
        connected_at: Utc::now(),
    };
    app.connections.register(handle.clone());
    Ok(Json(handle))
}

async fn disconnect_game_table(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if app.connections.unregister(CampaignId::from_uuid(id)) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// =============================================================================
// Instances
// =============================================================================

async fn get_instance(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>, ApiError> {
    let instance = app
        .gamification
        .get_instance(InstanceId::from_uuid(id))
        .await?;
    Ok(Json(instance))
}

async fn list_contributions(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Contribution>>, ApiError> {
    let contributions = app
        .gamification
        .list_contributions(InstanceId::from_uuid(id))
        .await?;
    Ok(Json(contributions))
}

async fn cancel_instance(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>, ApiError> {
    let instance = app
        .gamification
        .cancel_instance(InstanceId::from_uuid(id))
        .await?;
    Ok(Json(instance))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<GamificationError> for ApiError {
    fn from(e: GamificationError) -> Self {
        match e {
            GamificationError::EventNotFound(_) | GamificationError::InstanceNotFound(_) => {
                ApiError::NotFound
            }
            GamificationError::InvalidTransition(_) | GamificationError::Conflict(_) => {
                ApiError::Conflict(e.to_string())
            }
            GamificationError::Domain(e) => ApiError::BadRequest(e.to_string()),
            GamificationError::Repo(e) => {
                tracing::error!(error = %e, "Storage failure");
                ApiError::Internal(e.to_string())
            }
        }
    }
}
