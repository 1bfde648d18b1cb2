use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Url};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::FetchError;
use crate::settings::Settings;

/// Network transport used by the pipeline. One attempt per call, no retry.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;

    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Enforces a minimum gap between requests to the same host, across all workers.
pub struct HostRateLimiter {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        HostRateLimiter {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next slot for `host` and sleep until it arrives.
    pub async fn wait(&self, host: &str) {
        if self.min_interval.is_zero() {
            return;
        }
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(host).map_or(now, |next| (*next).max(now));
            slots.insert(host.to_string(), slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: HostRateLimiter,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher {
            client,
            limiter: HostRateLimiter::new(settings.delay()),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.limiter.wait(&host_of(url)).await;
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://topheroes.info/hero/warlock"), "topheroes.info");
        assert_eq!(host_of("not a url"), "");
    }

    #[tokio::test]
    async fn limiter_spaces_requests_to_same_host() {
        let limiter = Arc::new(HostRateLimiter::new(Duration::from_millis(100)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.wait("a.io").await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn limiter_hosts_are_independent() {
        let limiter = HostRateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.wait("a.io").await;
        limiter.wait("b.io").await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let limiter = HostRateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait("a.io").await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
