//! # CSV Storage Module
//!
//! File-based herd storage. Every collection lives in one CSV file in the
//! data directory; history rows reference their animal by `animal_id` and
//! coverages reference their season by `season_id`.
//!
//! ## Features
//!
//! - Atomic rewrites through a temp file and rename
//! - Malformed rows are skipped with a warning instead of failing the load
//! - Implements the same [`HerdStorage`](crate::backend::storage::HerdStorage) trait the domain uses

pub mod animal_repository;
pub mod breeding_season_repository;
pub mod connection;
pub mod herd_repository;

pub use animal_repository::AnimalRepository;
pub use breeding_season_repository::BreedingSeasonRepository;
pub use connection::CsvConnection;
pub use herd_repository::HerdRepository;
