//! Tokio-based sleeping for azblob.
//!
//! Token acquisition backs off between retries by sleeping through `Context`.
//! Plug `TokioSleep` in for real delays:
//!
//! ```no_run
//! use azblob_core::Context;
//! use azblob_sleep_tokio::TokioSleep;
//!
//! let ctx = Context::new().with_sleep(TokioSleep);
//! ```

use async_trait::async_trait;
use azblob_core::Sleep;
use std::time::Duration;

/// Tokio-based implementation of the `Sleep` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await
    }
}
