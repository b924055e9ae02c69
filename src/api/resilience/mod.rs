//! Resilience features for Dynamics 365 API operations
//!
//! Retry policies for transient failures and server-dictated rate limiting.

pub mod config;
pub mod retry;

pub use config::{RateLimitConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use retry::{Backoff, RetryConfig, RetryPolicy, Sleeper, TokioSleeper};
