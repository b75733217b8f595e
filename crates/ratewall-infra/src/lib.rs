//! # Ratewall Infrastructure
//!
//! Concrete implementations of the `Store` port defined in `ratewall-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All backends enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis-backed store shared across processes

pub mod store;

pub use store::InMemoryStore;

#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
