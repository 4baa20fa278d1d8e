//! Periodic refresh loops
//!
//! Used for the unread notification count and the broadcast banner. Each
//! loop runs on its own task until its token is cancelled or the [`Poller`]
//! is stopped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

pub struct Poller {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Run `refresh` now and then every `period` until cancelled.
    ///
    /// A failed refresh is logged and the loop carries on; the refresh
    /// itself is responsible for any user-visible notice.
    pub fn spawn<F, Fut, T>(name: &'static str, period: Duration, token: CancellationToken, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        info!(name, ?period, "Starting poller");
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut runs = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    result = refresh() => {
                        runs += 1;
                        if let Err(e) = result {
                            warn!(name, error = %e, "Poll failed");
                        }
                    }
                }
            }

            debug!(name, runs, "Poller stopped");
        });

        Self { name, token, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to finish
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(name = self.name, error = %e, "Poller task ended abnormally");
        }
    }
}
