//! Fixed-window rate limiter.
//!
//! Each identity gets a counter that lives for one second from its first
//! increment. Going over the threshold installs a block flag that rejects the
//! identity outright until it expires. All state lives in the [`Store`]; the
//! limiter itself is plain logic and can be shared freely.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Identity;
use crate::error::UnknownFailurePolicy;
use crate::ports::{Store, StoreError};

/// Length of a counting window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// Value written under a block key. Only its presence matters.
const BLOCK_MARKER: &str = "1";

/// How the limiter treats a store that cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Let the request through as if the failed call never happened.
    #[default]
    Open,
    /// Reject the request.
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = UnknownFailurePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            _ => Err(UnknownFailurePolicy(s.to_string())),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Open => f.write_str("open"),
            FailurePolicy::Closed => f.write_str("closed"),
        }
    }
}

/// Limiter configuration. Fixed for the lifetime of a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Requests allowed per window for address identities.
    pub ip_threshold: u64,
    /// Requests allowed per window for API key identities.
    pub token_threshold: u64,
    /// How long an identity stays blocked after going over its threshold.
    pub block_duration: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            ip_threshold: 100,
            token_threshold: 100,
            block_duration: Duration::from_secs(60),
            failure_policy: FailurePolicy::Open,
        }
    }
}

impl LimiterConfig {
    /// Threshold that applies to `identity`.
    pub fn threshold_for(&self, identity: &Identity) -> u64 {
        if identity.is_token() {
            self.token_threshold
        } else {
            self.ip_threshold
        }
    }
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A block flag from an earlier overflow is still live.
    Blocked,
    /// This request pushed the counter past the threshold.
    ThresholdExceeded,
    /// The store failed and the failure policy is closed.
    StoreUnavailable,
}

/// Fixed-window limiter over a shared [`Store`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn Store>,
    config: LimiterConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, config: LimiterConfig) -> Self {
        Self { store, config }
    }

    /// Count one request for `identity` and decide whether it may proceed.
    ///
    /// Blocked identities are rejected before their counter is touched. When
    /// two first hits race, both may see a count above one and skip the expiry
    /// call; the window then lasts until a later window's first hit registers
    /// one. That only ever lengthens a window.
    pub async fn check(&self, identity: &Identity) -> Decision {
        let key = identity.key();
        let block_key = identity.block_key();
        let threshold = self.config.threshold_for(identity);

        match self.store.exists(&block_key).await {
            Ok(true) => {
                tracing::debug!(identity = %identity, "Identity is blocked");
                return Decision::Deny(DenyReason::Blocked);
            }
            Ok(false) => {}
            Err(e) => {
                if let Some(decision) = self.on_store_error("exists", &block_key, &e) {
                    return decision;
                }
            }
        }

        let count = match self.store.incr(&key).await {
            Ok(count) => count,
            Err(e) => match self.on_store_error("incr", &key, &e) {
                Some(decision) => return decision,
                None => 0,
            },
        };

        if count == 1 {
            if let Err(e) = self.store.expire(&key, WINDOW).await {
                tracing::warn!(key = %key, error = %e, "Failed to start counting window");
            }
        }

        if count.max(0) as u64 > threshold {
            if let Err(e) = self
                .store
                .set(&block_key, BLOCK_MARKER, self.config.block_duration)
                .await
            {
                tracing::warn!(key = %block_key, error = %e, "Failed to install block");
            }

            tracing::info!(
                identity = %identity,
                count,
                threshold,
                block_secs = self.config.block_duration.as_secs(),
                "Rate limit exceeded, identity blocked"
            );
            return Decision::Deny(DenyReason::ThresholdExceeded);
        }

        Decision::Allow
    }

    /// Returns the decision to short-circuit with, or `None` to carry on as if
    /// the call had not happened.
    fn on_store_error(&self, op: &str, key: &str, error: &StoreError) -> Option<Decision> {
        match self.config.failure_policy {
            FailurePolicy::Open => {
                tracing::warn!(op, key = %key, error = %error, "Store error, failing open");
                None
            }
            FailurePolicy::Closed => {
                tracing::warn!(op, key = %key, error = %error, "Store error, failing closed");
                Some(Decision::Deny(DenyReason::StoreUnavailable))
            }
        }
    }
}
