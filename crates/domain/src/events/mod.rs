//! Domain Events
//!
//! - `instance_events` holds return types from `Instance` mutations,
//!   communicating what happened when state was modified.
//! - `lifecycle` holds the notifications the engine publishes to overlays.

pub mod instance_events;
pub mod lifecycle;

pub use instance_events::InstanceUpdate;
pub use lifecycle::{InstanceSnapshot, LifecycleEvent};
