//! HTTP and WebSocket surface (spec §4.G′, §6): connection upgrade, history
//! lookups, health checks, and the root administrative command route, plus
//! the `AppState` composition root that wires each handler to the
//! broker-actor layer.

mod admin;
mod health;
mod history;
mod server;
mod types;
mod ws;

pub use server::{build_router, AppState};
pub use types::ApiError;
