//! Immutable parts and table metadata for the Granite storage engine.
//!
//! A table is a set of date-partitioned, primary-key-sorted immutable
//! parts. Each part carries inclusive date bounds and a sparse index: one
//! order-encoded key tuple per granule of `index_granularity` rows. This
//! crate owns those structures plus the catalog that hands out atomic part
//! snapshots; deciding what to read from them lives in `granite-scan`.

pub mod cache;
pub mod catalog;
pub mod codecs;
pub mod meta;
pub mod part;

pub use cache::UncompressedCache;
pub use catalog::PartCatalog;
pub use meta::TableMeta;
pub use part::{DataPart, SparseIndex};
