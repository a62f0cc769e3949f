//! HTTP surface of the diagnostics service.
//!
//! Exposes retrieval, registry administration and configuration endpoints
//! under `/api/v1`, plus a root-level health check. Wiring of the pool,
//! registry, orchestrator and GC loop happens in `main.rs`.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod response;
pub mod routes;
pub mod settings;
pub mod state;
