//! Background tasks spawned by the binary.

pub mod gc_config;
