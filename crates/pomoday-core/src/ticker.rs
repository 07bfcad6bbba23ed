//! Periodic driver for [`DayEngine::tick`].
//!
//! The ticker owns a tokio task that calls `tick()` on a fixed period and
//! stops when its cancellation token fires. Cancellation is only observed
//! between ticks; a tick in progress always completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::DayEngine;
use crate::error::{CoreError, Result};

pub struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Ticker {
    /// Start ticking `engine` every `period`. Must be called inside a tokio
    /// runtime.
    pub fn spawn(engine: Arc<DayEngine>, period: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(engine, period, cancel_token.clone()));
        Self {
            handle,
            cancel_token,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel the loop and wait for it to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancel_token.cancel();
        self.handle
            .await
            .map_err(|e| CoreError::Custom(format!("ticker task failed to join: {e}")))
    }
}

async fn tick_loop(engine: Arc<DayEngine>, period: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    // After a suspend, one tick covers the whole gap.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(namespace = %engine.namespace(), period_ms = period.as_millis() as u64, "ticker started");

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                info!(namespace = %engine.namespace(), "ticker shutting down");
                break;
            }
            _ = ticker.tick() => {
                match engine.tick() {
                    Ok(outcome) if !outcome.events.is_empty() => {
                        debug!(count = outcome.events.len(), at = %outcome.at, "tick crossed boundaries");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "tick failed"),
                }
            }
        }
    }
}
