//! Refresh Loop
//!
//! Polls the quote source for every subscribed symbol: once immediately
//! when armed, then every `refresh_interval`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{Inner, cancel_slot};
use crate::application::events::RealtimeEvent;
use crate::domain::connection::ConnectionState;
use crate::infrastructure::metrics::{self, RefreshOutcome};

impl Inner {
    /// Arm the refresh loop. No-op if already armed or nothing is
    /// subscribed.
    pub(super) fn start_price_updates(self: &Arc<Self>) {
        let (token, symbols) = {
            let mut st = self.state.lock();
            if self.is_destroyed() || st.refresh_task.is_some() || st.subscriptions.is_empty() {
                return;
            }
            let token = self.shutdown.child_token();
            st.refresh_task = Some(token.clone());
            (token, st.subscriptions.to_vec())
        };

        let interval_ms = u64::try_from(self.config.refresh_interval.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(symbols = symbols.len(), interval_ms, "Starting price updates");
        self.emit(RealtimeEvent::PriceUpdatesStarted {
            symbols,
            interval_ms,
            timestamp: Utc::now(),
        });

        tokio::spawn(Arc::clone(self).refresh_loop(token));
    }

    /// Disarm the refresh loop, announcing it only if one was running.
    pub(super) fn stop_price_updates(&self) {
        let stopped = cancel_slot(&mut self.state.lock().refresh_task);
        if stopped {
            tracing::info!("Price updates stopped");
            self.emit(RealtimeEvent::PriceUpdatesStopped {
                timestamp: Utc::now(),
            });
        }
    }

    async fn refresh_loop(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("Refresh loop cancelled");
                    break;
                }
                _ = interval.tick() => self.refresh_cycle(&token).await,
            }
        }
    }

    async fn refresh_cycle(self: &Arc<Self>, token: &CancellationToken) {
        let symbols = {
            let st = self.state.lock();
            if self.is_destroyed() || !st.is_online || st.connection != ConnectionState::Connected {
                None
            } else {
                Some(st.subscriptions.to_vec())
            }
        };
        let Some(symbols) = symbols.filter(|s| !s.is_empty()) else {
            tracing::debug!("Skipping refresh cycle");
            return;
        };

        self.emit(RealtimeEvent::PriceUpdateStarted {
            symbols: symbols.clone(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let result = tokio::select! {
            () = token.cancelled() => return,
            result = self.source.multiple_quotes(&symbols) => result,
        };
        if self.is_destroyed() {
            return;
        }

        let batch = match result {
            Ok(batch) => batch,
            Err(error) => {
                metrics::record_refresh_cycle(RefreshOutcome::Failed, started.elapsed());
                tracing::warn!(error = %error, "Price update failed");
                self.emit(RealtimeEvent::PriceUpdateError {
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                if error.is_connectivity() {
                    self.mark_connection_lost(error.to_string());
                }
                return;
            }
        };

        let now = Utc::now();
        self.state.lock().last_update = Some(now);

        let any_succeeded = batch.quotes().next().is_some();
        if any_succeeded {
            for (symbol, quote) in batch.quotes() {
                self.emit(RealtimeEvent::PriceUpdate {
                    symbol: symbol.clone(),
                    quote: quote.clone(),
                    timestamp: now,
                });
            }
            self.emit(RealtimeEvent::PriceUpdateCompleted {
                quotes: batch.clone(),
                timestamp: now,
            });
        }

        let Some(message) = batch.error_message() else {
            metrics::record_refresh_cycle(RefreshOutcome::Success, started.elapsed());
            tracing::debug!(symbols = batch.len(), "Price update completed");
            return;
        };

        let outcome = if any_succeeded {
            RefreshOutcome::Partial
        } else {
            RefreshOutcome::Failed
        };
        metrics::record_refresh_cycle(outcome, started.elapsed());
        tracing::warn!(error = %message, "Price update had failures");
        self.emit(RealtimeEvent::PriceUpdateError {
            error: message.clone(),
            timestamp: Utc::now(),
        });

        if batch.all_failed_connectivity() {
            self.mark_connection_lost(message);
        }
    }
}
