//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **overpass**: reqwest client for the Overpass map data API
//! - **persistence**: PostGIS-backed repositories using Diesel
//! - **memory**: process-local repositories for tests and database-less runs
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod memory;
pub mod overpass;
pub mod persistence;
