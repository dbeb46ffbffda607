//! API layer - HTTP and WebSocket entry points.

pub mod extractors;
pub mod http;
pub mod websocket;
