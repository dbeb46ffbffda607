//! In-memory adapters for catalog, instance, cooldown and session storage.

mod catalog;
mod cooldowns;
mod instances;

pub use catalog::{CatalogSeed, InMemoryCatalog};
pub use cooldowns::{InMemoryCooldownRepo, InMemorySessionRepo};
pub use instances::InMemoryInstanceRepo;
