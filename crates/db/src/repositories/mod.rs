//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod configuration_repo;
pub mod diagnostics_key_repo;
pub mod managed_vm_repo;

pub use configuration_repo::ConfigurationRepo;
pub use diagnostics_key_repo::DiagnosticsKeyRepo;
pub use managed_vm_repo::ManagedVmRepo;
