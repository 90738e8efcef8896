//! services/worker/src/adapters/throttle.rs
//!
//! Token-bucket throttle for the completion API. Two buckets refill
//! continuously: one counts requests per minute, the other tokens per
//! minute. `acquire` waits (it never errors) so a burst of generation jobs
//! smears out instead of tripping the provider's rate limits.

use async_trait::async_trait;
use cat_tales_core::ports::Throttle;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    /// Units replenished per second.
    rate: f64,
    available: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(per_minute: u32) -> Self {
        Self {
            capacity: per_minute as f64,
            rate: per_minute as f64 / 60.0,
            available: per_minute as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.available = (self.available + elapsed * self.rate).min(self.capacity);
    }

    /// Takes `amount` units if available; otherwise returns how long until
    /// they will be.
    fn try_take(&mut self, amount: f64) -> Result<(), Duration> {
        self.refill();
        if self.available >= amount {
            self.available -= amount;
            return Ok(());
        }
        let deficit = amount - self.available;
        Err(Duration::from_secs_f64(deficit / self.rate))
    }
}

/// Process-wide request/token budget shared across all AI lane workers.
pub struct RateBudget {
    requests: Mutex<Bucket>,
    tokens: Mutex<Bucket>,
}

impl RateBudget {
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32) -> Self {
        Self {
            requests: Mutex::new(Bucket::new(requests_per_minute)),
            tokens: Mutex::new(Bucket::new(tokens_per_minute)),
        }
    }
}

#[async_trait]
impl Throttle for RateBudget {
    async fn acquire(&self, estimated_tokens: u32) {
        loop {
            let wait = {
                let mut requests = self.requests.lock().await;
                match requests.try_take(1.0) {
                    Ok(()) => None,
                    Err(wait) => Some(wait),
                }
            };
            if let Some(wait) = wait {
                debug!(?wait, "request budget exhausted, waiting");
                tokio::time::sleep(wait).await;
                continue;
            }
            break;
        }

        // A single job's estimate can exceed the per-minute budget; cap the
        // charge at capacity so acquire always terminates.
        loop {
            let wait = {
                let mut tokens = self.tokens.lock().await;
                let charge = (estimated_tokens as f64).min(tokens.capacity);
                match tokens.try_take(charge) {
                    Ok(()) => None,
                    Err(wait) => Some(wait),
                }
            };
            match wait {
                Some(wait) => {
                    debug!(?wait, estimated_tokens, "token budget exhausted, waiting");
                    tokio::time::sleep(wait).await;
                }
                None => break,
            }
        }
    }
}
