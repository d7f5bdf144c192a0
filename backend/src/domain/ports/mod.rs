//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod boundary_repository;
mod coverage_repository;
mod map_data_source;
mod store_repository;

#[cfg(test)]
pub use boundary_repository::MockBoundaryRepository;
pub use boundary_repository::{
    BoundaryRepository, BoundaryRepositoryError, FixtureBoundaryRepository,
};
#[cfg(test)]
pub use coverage_repository::MockCoverageRepository;
pub use coverage_repository::{
    CoverageRecord, CoverageRepository, CoverageRepositoryError, FixtureCoverageRepository,
};
#[cfg(test)]
pub use map_data_source::MockMapDataSource;
pub use map_data_source::{
    FetchRegion, FetchRequest, FixtureMapDataSource, MapDataSource, MapDataSourceError,
    RawFeature, RawGeometry, TagFilter,
};
#[cfg(test)]
pub use store_repository::MockStoreRepository;
pub use store_repository::{FixtureStoreRepository, StoreRepository, StoreRepositoryError};

#[cfg(test)]
mod tests;
