//! Retry policies with exponential backoff
//!
//! Provides retry logic for transient failures and rate limiting in Dynamics 365 API calls.
//! A policy is a predicate over [`DynamicsError`], a delay strategy and an attempt ceiling;
//! the client nests two of them around each request.

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::api::error::DynamicsError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

/// How long to wait before the next attempt
#[derive(Debug, Clone)]
pub enum Backoff {
    /// `base * multiplier^(attempt - 1)`, capped at `max`
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
        jitter: bool,
    },
    /// Whatever the server asked for in `Retry-After`; `fallback` when it sent nothing usable
    RetryAfter { fallback: Duration },
}

/// Suspension point used between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy: which errors to retry, how long to wait, how often to try
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    name: &'static str,
    max_attempts: u32,
    should_retry: fn(&DynamicsError) -> bool,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(
        name: &'static str,
        max_attempts: u32,
        should_retry: fn(&DynamicsError) -> bool,
        backoff: Backoff,
    ) -> Self {
        Self {
            name,
            max_attempts: max_attempts.max(1),
            should_retry,
            backoff,
        }
    }

    /// Exponential backoff for server errors, client errors and connection failures
    pub fn transient(config: &RetryConfig) -> Self {
        Self::new(
            "transient",
            config.max_attempts,
            DynamicsError::is_transient,
            Backoff::Exponential {
                base: config.base_delay,
                multiplier: config.backoff_multiplier,
                max: config.max_delay,
                jitter: config.jitter,
            },
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute an operation, retrying matching errors until the attempt ceiling
    pub async fn execute<F, Fut, T>(
        &self,
        sleeper: &dyn Sleeper,
        mut operation: F,
    ) -> Result<T, DynamicsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DynamicsError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !(self.should_retry)(&error) {
                        return Err(error);
                    }

                    if attempt >= self.max_attempts {
                        warn!(
                            "Giving up after {} attempts ({} policy): {}",
                            attempt, self.name, error
                        );
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    if error.is_rate_limited() {
                        info!(
                            "API rate limit exceeded -- sleeping for {} seconds",
                            delay.as_secs()
                        );
                    }
                    info!(
                        "{} detected, triggering backoff: {} try",
                        error_label(&error),
                        attempt
                    );
                    debug!("Waiting {:?} before retry", delay);
                    sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32, error: &DynamicsError) -> Duration {
        match &self.backoff {
            Backoff::RetryAfter { fallback } => error.retry_after().unwrap_or(*fallback),
            Backoff::Exponential {
                base,
                multiplier,
                max,
                jitter,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let delay_ms = (base.as_millis() as f64) * multiplier.powi(exponent);

                let mut delay = if delay_ms.is_finite() && delay_ms < max.as_millis() as f64 {
                    Duration::from_millis(delay_ms as u64)
                } else {
                    *max
                };

                if *jitter {
                    let jitter_factor = rand::rng().random_range(0.5..=1.5);
                    delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
                }

                delay
            }
        }
    }
}

fn error_label(error: &DynamicsError) -> &'static str {
    match error {
        DynamicsError::Server { .. } => "ServerError",
        DynamicsError::Client { .. } => "ClientError",
        DynamicsError::RateLimited { .. } => "RateLimited",
        DynamicsError::Connection(_) => "ConnectionError",
        _ => "Error",
    }
}
