//! Domain models used by the herd services.

pub mod herd;
pub mod lineage;
pub mod metrics;
