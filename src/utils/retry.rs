use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Strategy
// ============================================================================
//
// Used for two kinds of failures:
// - lost compare-and-swap races on an order (retry only transient errors)
// - the database not being reachable yet at startup (retry everything)
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Short delays for re-reading an order after a version conflict
    pub fn conflicts() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    /// Connecting to a database that may still be starting up
    pub fn startup(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry every failure until `max_attempts` is reached.
pub async fn retry_with_backoff<F, Fut, T, E>(config: RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    run(config, operation, |_| true).await
}

/// Retry only failures that report themselves as transient.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    run(config, operation, |error: &E| error.is_transient()).await
}

async fn run<F, Fut, T, E, P>(config: RetryConfig, mut operation: F, retryable: P) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !retryable(&error) {
                    return Err(error);
                }

                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return Err(error);
                }

                tracing::warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying after delay"
                );

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
