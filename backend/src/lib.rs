//! Food-access coverage and accessibility engine.
//!
//! Fetches food retail locations from an Overpass map data source, persists
//! them idempotently, remembers which regions have been fetched, and answers
//! accessibility questions: nearest store, stores in range, access class and
//! walking-distance coverage of an administrative boundary.
//!
//! - [`domain`]: entities, geometry kernel, ports and services.
//! - [`outbound`]: Overpass, PostGIS and in-memory adapters.
//! - [`config`]: OrthoConfig-backed runtime settings.

pub mod config;
pub mod domain;
pub mod outbound;
