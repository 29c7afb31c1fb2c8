//! Page acquisition: plain HTTP, rendering and rate limiting.

pub mod fallback;
#[cfg(feature = "headless")]
pub mod headless;
pub mod http;
pub mod rate_limited;
pub mod remote;

pub use fallback::FallbackRenderer;
#[cfg(feature = "headless")]
pub use headless::HeadlessRenderer;
pub use http::{needs_rendering, visible_text_len, HttpFetcher};
pub use rate_limited::{FetcherExt, RateLimitedFetcher};
pub use remote::RemoteRenderer;
