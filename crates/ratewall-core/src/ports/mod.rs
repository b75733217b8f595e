//! Ports - trait definitions for external dependencies.
//! Infrastructure crates provide the concrete backends.

mod store;

pub use store::{Store, StoreError};
