pub mod configuration;
pub mod diagnostics;
