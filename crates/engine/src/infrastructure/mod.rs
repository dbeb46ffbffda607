//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod broadcast;
pub mod clock;
pub mod config;
pub mod game_table;
pub mod health;
pub mod memory;
pub mod objective;
pub mod ports;
pub mod sqlite;
pub mod tasks;
