//! Gateway broadcast policies.
//!
//! Every adapter fans its signed transaction out over the configured
//! gateway URLs, but the retry shape differs per chain and must be
//! preserved. The policies are generic over the submit operation so tests
//! can count attempts without a network.

use std::time::Duration;

use url::Url;

use router_types::SwapError;

/// Rounds a retry-loop broadcast makes over the full URL list.
pub const RPC_RETRY_TIMES: usize = 3;
/// Pause between retry-loop rounds.
pub const RPC_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Try each URL in order and return the first successful submission.
pub async fn first_success<F, Fut>(urls: &[Url], mut submit: F) -> Result<String, SwapError>
where
    F: FnMut(Url) -> Fut,
    Fut: Future<Output = Result<String, SwapError>>,
{
    let mut last_err = SwapError::BroadcastTx;
    for url in urls {
        match submit(url.clone()).await {
            Ok(hash) => return Ok(hash),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "submit failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Submit to every URL; succeed when at least one submission succeeded,
/// returning the last successful hash. Only the last error is reported.
pub async fn best_effort_all<F, Fut>(urls: &[Url], mut submit: F) -> Result<String, SwapError>
where
    F: FnMut(Url) -> Fut,
    Fut: Future<Output = Result<String, SwapError>>,
{
    let mut last_err = SwapError::BroadcastTx;
    let mut last_hash = None;
    for url in urls {
        match submit(url.clone()).await {
            Ok(hash) => last_hash = Some(hash),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "submit failed");
                last_err = e;
            }
        }
    }
    last_hash.ok_or(last_err)
}

/// `rounds` passes over every URL with a pause between rounds; each round
/// keeps the last successful hash and stops the loop once any submission
/// in the round succeeded.
pub async fn retry_rounds<F, Fut>(
    urls: &[Url],
    rounds: usize,
    interval: Duration,
    mut submit: F,
) -> Result<String, SwapError>
where
    F: FnMut(Url) -> Fut,
    Fut: Future<Output = Result<String, SwapError>>,
{
    let mut last_err = SwapError::BroadcastTx;
    for round in 0..rounds {
        let mut round_hash = None;
        for url in urls {
            match submit(url.clone()).await {
                Ok(hash) => round_hash = Some(hash),
                Err(e) => {
                    tracing::warn!(url = %url, round, error = %e, "submit failed");
                    last_err = e;
                }
            }
        }
        if let Some(hash) = round_hash {
            return Ok(hash);
        }
        if round + 1 < rounds {
            tokio::time::sleep(interval).await;
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn urls(n: usize) -> Vec<Url> {
        (0..n)
            .map(|i| format!("http://node{i}.example/").parse().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn first_success_stops_at_first_ok() {
        let urls = urls(3);
        let attempts = RefCell::new(0usize);
        let result = first_success(&urls, |_| {
            let n = {
                let mut a = attempts.borrow_mut();
                *a += 1;
                *a
            };
            async move {
                if n == 2 {
                    Ok("hash2".to_string())
                } else {
                    Err(SwapError::BroadcastTx)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "hash2");
        assert_eq!(*attempts.borrow(), 2);
    }

    #[tokio::test]
    async fn best_effort_all_returns_last_success() {
        let urls = urls(3);
        let attempts = RefCell::new(0usize);
        let result = best_effort_all(&urls, |_| {
            let n = {
                let mut a = attempts.borrow_mut();
                *a += 1;
                *a
            };
            async move {
                match n {
                    1 => Ok("hash1".to_string()),
                    2 => Err(SwapError::BroadcastTx),
                    _ => Ok("hash3".to_string()),
                }
            }
        })
        .await;
        // every URL is tried, the last successful hash wins
        assert_eq!(result.unwrap(), "hash3");
        assert_eq!(*attempts.borrow(), 3);
    }

    #[tokio::test]
    async fn best_effort_all_fails_only_when_all_fail() {
        let urls = urls(2);
        let result = best_effort_all(&urls, |_| async { Err(SwapError::CommitMessage) }).await;
        assert_eq!(result.unwrap_err(), SwapError::CommitMessage);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_rounds_counts_attempts() {
        // 2 URLs, 3 rounds; both fail in rounds 1-2, the first URL succeeds
        // in round 3: 5 attempts before the successful submission.
        let urls = urls(2);
        let attempts = RefCell::new(0usize);
        let result = retry_rounds(&urls, RPC_RETRY_TIMES, RPC_RETRY_INTERVAL, |_| {
            let n = {
                let mut a = attempts.borrow_mut();
                *a += 1;
                *a
            };
            async move {
                if n == 5 {
                    Ok("round3hash".to_string())
                } else {
                    Err(SwapError::BroadcastTx)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "round3hash");
        // the succeeding round still visits every URL
        assert_eq!(*attempts.borrow(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_rounds_exhausts() {
        let urls = urls(2);
        let attempts = RefCell::new(0usize);
        let result = retry_rounds(&urls, 3, Duration::from_millis(10), |_| {
            *attempts.borrow_mut() += 1;
            async { Err(SwapError::BroadcastTx) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(*attempts.borrow(), 6);
    }
}
