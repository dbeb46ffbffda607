//! Aggregate roots - domain objects that own their related data
//!
//! Each aggregate:
//! - Has a unique identity
//! - Exposes behavior through methods, not public fields
//! - Returns domain events from mutations

pub mod instance;

pub use instance::{Instance, InstanceStatus, NewInstance};
