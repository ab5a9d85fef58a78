//! SQLite-backed key-value cache for rendered Open Graph images.
//!
//! Entries are keyed by the exact URL that was captured and carry a fixed
//! expiration. The module provides:
//!
//! - The [`ImageStore`] seam that the request path talks to
//! - A SQLite implementation with automatic schema migrations and WAL mode
//! - [`CacheGateway`], which turns store failures into misses
//! - Content hashing for `ETag` values

pub mod connection;
pub mod gateway;
pub mod hash;
pub mod images;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use gateway::CacheGateway;
pub use images::CachedImage;
pub use store::ImageStore;
