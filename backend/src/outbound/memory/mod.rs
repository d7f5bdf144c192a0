//! Process-local adapters for the persistence ports.
//!
//! These back the command-line tool when no database is configured and give
//! integration tests a real repository without PostgreSQL. State lives behind
//! a `std::sync::Mutex`; a poisoned lock surfaces as a connection error.

mod boundary_repository;
mod coverage_repository;
mod store_repository;

pub use boundary_repository::InMemoryBoundaryRepository;
pub use coverage_repository::InMemoryCoverageRepository;
pub use store_repository::InMemoryStoreRepository;
