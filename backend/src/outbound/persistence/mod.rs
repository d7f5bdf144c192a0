//! PostGIS persistence adapters using Diesel.
//!
//! Repositories talk to PostgreSQL through `diesel-async` with `bb8`
//! pooling. Spatial predicates run in PostGIS (`ST_Within`, `ST_DWithin`,
//! `ST_Contains`); geometries cross the boundary as GeoJSON text so row
//! structs stay plain `QueryableByName` types private to this module.
//!
//! The schema lives in `backend/migrations`.
//!
//! # Example
//!
//! ```ignore
//! use food_access::outbound::persistence::{DbPool, DieselStoreRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/food_access")).await?;
//! let stores = DieselStoreRepository::new(pool);
//! ```

mod diesel_boundary_repository;
mod diesel_coverage_repository;
pub(crate) mod diesel_helpers;
mod diesel_store_repository;
mod json_serializers;
mod pool;

pub use diesel_boundary_repository::DieselBoundaryRepository;
pub use diesel_coverage_repository::DieselCoverageRepository;
pub use diesel_store_repository::DieselStoreRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
