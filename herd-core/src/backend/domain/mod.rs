//! # Domain Module
//!
//! Herd genealogy and zootechnical calculations.
//!
//! ## Key Responsibilities
//!
//! - **Identity Resolution**: matching loose parent references (id, ear tag, name) to animals
//! - **Lineage**: ancestor trees with FIV handling and bounded descendant generations
//! - **Derived Metrics**: per-animal GMD, DEP, progeny, siblings and pregnancy, plus herd KPIs
//! - **Growth Projection**: weight at a future date and slaughter-date estimates
//! - **Quota Admission**: rate limiting every call to the external assistant
//!
//! All computations run over an immutable [`HerdSnapshot`](models::herd::HerdSnapshot);
//! after a write the caller loads a new snapshot.

pub mod assistant_gateway;
pub mod derived_metrics_service;
pub mod growth_service;
pub mod herd_service;
pub mod identity_resolver;
pub mod lineage_service;
pub mod models;
pub mod rate_limiter;

pub use assistant_gateway::{AdmissionMode, AssistantError, AssistantGateway, AssistantProvider};
pub use derived_metrics_service::DerivedMetricsService;
pub use growth_service::GrowthService;
pub use herd_service::HerdService;
pub use lineage_service::LineageService;
pub use rate_limiter::{RateLimitError, RateLimiter};
