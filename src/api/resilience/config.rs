//! Resilience configuration with builder pattern
//!
//! Unified configuration for the two retry layers wrapped around every request:
//! exponential backoff for transient failures and server-dictated waits for rate limiting.

use super::retry::{Backoff, RetryConfig, RetryPolicy};
use crate::api::error::DynamicsError;
use std::time::Duration;

/// Global resilience configuration for API operations
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    /// Wait used when a 429 arrives without a usable `Retry-After`
    pub fallback_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            fallback_delay: Duration::from_secs(2),
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Single attempt, no waiting
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(0),
                max_delay: Duration::from_millis(0),
                backoff_multiplier: 1.0,
                jitter: false,
            },
            rate_limit: RateLimitConfig {
                max_attempts: 1,
                fallback_delay: Duration::from_millis(0),
            },
        }
    }

    pub fn transient_policy(&self) -> RetryPolicy {
        RetryPolicy::transient(&self.retry)
    }

    pub fn rate_limit_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            "rate_limit",
            self.rate_limit.max_attempts,
            DynamicsError::is_rate_limited,
            Backoff::RetryAfter {
                fallback: self.rate_limit.fallback_delay,
            },
        )
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Set max attempts for transient failures
    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set the first backoff delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set max attempts for rate-limited requests
    pub fn max_rate_limit_retries(mut self, attempts: u32) -> Self {
        self.config.rate_limit.max_attempts = attempts;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
