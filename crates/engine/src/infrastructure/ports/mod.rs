//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Storage (in-memory or SQLite)
//! - The game table command channel
//! - Pre-flight health probes
//! - Overlay broadcast
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Errors
// =============================================================================
pub use error::{HealthProbeError, RepoError, TransportError};

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{
    CampaignConfigRepo, ContributionApplied, CooldownRepo, EventCatalogRepo, InsertOutcome,
    InstanceRepo, SessionRepo,
};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    ActionTransportPort, BroadcastPort, CheckStatus, ConnectionHandle, GameCommand,
    GameTableConnectionsPort, HealthCheck, HealthProbePort, HealthProbeRequest, HealthReport,
    ObjectiveCalculator, ProbeMode, TransportReply,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{
    MockCampaignConfigRepo, MockCooldownRepo, MockEventCatalogRepo, MockInstanceRepo,
    MockSessionRepo,
};

#[cfg(test)]
pub use external::{
    MockActionTransportPort, MockBroadcastPort, MockGameTableConnectionsPort,
    MockHealthProbePort, MockObjectiveCalculator,
};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;
