//! Domain entities - the subjects being rate limited.

mod identity;

pub use identity::{API_KEY_HEADER, Identity};
