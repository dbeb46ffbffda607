//! Critcast Engine library.
//!
//! Turns dice rolls, viewer redemptions and operator triggers into timed
//! gamification instances, and reports their lifecycle to stream overlays.
//!
//! ## Structure
//!
//! - `use_cases/` - Trigger evaluation and instance lifecycle orchestration
//! - `stores/` - In-process coordination state
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `api/` - HTTP and WebSocket entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

/// Shared builders for unit tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
