//! # Ratewall Core
//!
//! The rate limiting engine of Ratewall.
//! This crate holds the identity model, the fixed-window limiter and the
//! `Store` port it runs against. It has no infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use domain::Identity;
pub use error::{ConfigError, UnknownFailurePolicy};
pub use limiter::{Decision, DenyReason, FailurePolicy, LimiterConfig, RateLimiter};
