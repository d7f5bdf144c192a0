//! Overpass outbound adapter.
//!
//! A thin HTTP implementation of the `MapDataSource` port: query
//! rendering, transport error mapping and JSON decoding into raw features.

mod dto;
mod http_source;

pub use http_source::{OverpassHttpIdentity, OverpassHttpSource};
