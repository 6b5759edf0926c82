use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Process-wide token bucket guarding the provider's per-minute call budget.
///
/// Holds up to `burst` tokens and refills at `requests_per_minute / 60` per
/// second. Callers that find it empty sleep until a token is due.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    per_second: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            per_second: f64::from(requests_per_minute.max(1)) / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Waits for and takes one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.per_second).min(self.capacity);
                state.refilled_at = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.per_second)
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiter is empty, waiting.");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_is_free_then_calls_are_spaced() {
        let bucket = TokenBucket::new(60, 2);
        let start = Instant::now();

        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(990));

        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1990));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_refills_up_to_capacity() {
        let bucket = TokenBucket::new(60, 3);
        for _ in 0..3 {
            bucket.acquire().await;
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        let start = Instant::now();
        for _ in 0..3 {
            bucket.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
