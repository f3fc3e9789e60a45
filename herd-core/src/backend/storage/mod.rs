//! # Storage Module
//!
//! Persistence for herd records.
//!
//! The domain layer talks to [`HerdStorage`] and obtains repositories from a
//! [`Connection`]; the only backend today is the CSV one in [`csv`].
//!
//! ## Key Responsibilities
//!
//! - **Data Persistence**: saving animals, their histories and breeding seasons
//! - **Data Retrieval**: loading full collections for a herd snapshot
//! - **Storage Abstraction**: the same trait regardless of file format

pub mod csv;
pub mod traits;

pub use self::csv::CsvConnection;
pub use traits::{Connection, HerdStorage};
