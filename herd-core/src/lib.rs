//! Herd genealogy and derived-metrics core.
//!
//! `backend` holds the domain services and storage; `config` loads the YAML
//! settings shared by both.

pub mod backend;
pub mod config;
