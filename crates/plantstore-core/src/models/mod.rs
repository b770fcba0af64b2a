//! Data models for storefront entities.
//!
//! - `Plant`: a plant record as listed by the server
//! - `PlantDraft`: validated create/update payload

pub mod plant;

pub use plant::{parse_frequency, Plant, PlantDraft};
