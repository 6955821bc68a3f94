use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::debug;

use crate::TransportError;

/// Политика повторов: ограниченный экспоненциальный backoff
/// с потолком задержки и джиттером.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Максимальное число попыток (включая первую)
    pub max_attempts: u32,
    /// Базовая задержка перед второй попыткой
    pub base_delay: Duration,
    /// Потолок задержки
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Задержка перед повтором номер `attempt` (считая с нуля).
    ///
    /// Джиттер вычитается из капированного значения, поэтому задержка
    /// никогда не превышает `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        capped.mul_f64(1.0 - fastrand::f64() * 0.25)
    }
}

/// Выполняет операцию с ограниченным числом повторов.
///
/// Повторяются только временные ошибки (`is_retryable`); исчерпание
/// попыток поднимается как `RetriesExhausted`, а не зависает.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(TransportError::RetriesExhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                let delay = policy.delay_for(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, %err, "transport operation failed, retrying");
                sleep(delay).await;
            }
        }
    }
}
