//! Core types and shared functionality for ogshot.
//!
//! This crate provides:
//! - Image cache backed by SQLite, with TTL-based expiry
//! - The fail-open cache gateway used by the request path
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheGateway, CachedImage, ImageStore};
pub use config::{AppConfig, ConfigError, WaitStrategy};
pub use error::Error;
