//! Rate-limited fetcher wrapper.
//!
//! Wraps any Fetcher with a shared request quota using the governor crate.
//! With parallel sources the quota is global across all of them.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::traits::fetcher::{FetchedPage, Fetcher, RenderHint};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// A fetcher wrapper that enforces a request rate.
pub struct RateLimitedFetcher<F: Fetcher> {
    inner: F,
    limiter: Arc<DefaultRateLimiter>,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    /// Wrap `fetcher` with `requests_per_second` (0 is treated as 1).
    pub fn new(fetcher: F, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(non_zero(requests_per_second));
        Self {
            inner: fetcher,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        hint: &RenderHint,
    ) -> FetchResult<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.fetch(url, headers, hint).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait FetcherExt: Fetcher + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedFetcher<Self> {
        RateLimitedFetcher::new(self, requests_per_second)
    }
}

impl<F: Fetcher + Sized> FetcherExt for F {}
