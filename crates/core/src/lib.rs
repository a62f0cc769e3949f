//! Pure domain logic for the diagnostics retrieval service.
//!
//! No I/O and no database access — everything here is deterministic and
//! unit-testable. Async orchestration lives in `vmdiag-service`, persistence
//! in `vmdiag-db`, and the admin HTTP surface in `vmdiag-api`.

pub mod error;
pub mod fileset;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod types;
