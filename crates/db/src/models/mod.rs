//! Entity structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus `Deserialize` DTOs for inserts where needed.

pub mod configuration;
pub mod diagnostics_key;
pub mod managed_vm;
