//! Quest Engine: grammar-driven side-quest generation for roguelikes.
//!
//! Quest shapes come from a BNF-like grammar expanded under structural
//! constraints. Each shape is then bound to actors, items and places of a
//! freshly revealed zone, and committed as components on those entities
//! once every quest of the zone has bound or been rolled back.

pub mod core;
pub mod schema;
