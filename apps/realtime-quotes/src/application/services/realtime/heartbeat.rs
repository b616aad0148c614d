//! Heartbeat
//!
//! Re-probes the quote source on a fixed period while connected. A failed
//! probe drops the connection and schedules a reconnect.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Inner;
use crate::application::events::RealtimeEvent;
use crate::infrastructure::metrics;

impl Inner {
    /// Arm the heartbeat, replacing any running one. First probe fires one
    /// full period from now.
    pub(super) fn start_heartbeat(self: &Arc<Self>) {
        let token = {
            let mut st = self.state.lock();
            if self.is_destroyed() {
                return;
            }
            let token = self.shutdown.child_token();
            if let Some(previous) = st.heartbeat_task.replace(token.clone()) {
                previous.cancel();
            }
            token
        };

        tokio::spawn(Arc::clone(self).heartbeat_loop(token));
    }

    async fn heartbeat_loop(self: Arc<Self>, token: CancellationToken) {
        let period = self.config.heartbeat_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("Heartbeat cancelled");
                    break;
                }
                _ = interval.tick() => self.beat(&token).await,
            }
        }
    }

    async fn beat(self: &Arc<Self>, token: &CancellationToken) {
        let result = tokio::select! {
            () = token.cancelled() => return,
            result = self.source.market_status() => result,
        };
        if self.is_destroyed() {
            return;
        }

        match result {
            Ok(market_status) => {
                let now = Utc::now();
                self.state.lock().last_heartbeat = Some(now);
                metrics::record_heartbeat(true);
                tracing::debug!(session = market_status.session.label(), "Heartbeat");
                self.emit(RealtimeEvent::Heartbeat {
                    market_status,
                    timestamp: now,
                });
            }
            Err(error) => {
                metrics::record_heartbeat(false);
                tracing::warn!(error = %error, "Heartbeat failed");
                self.emit(RealtimeEvent::HeartbeatFailed {
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                self.mark_connection_lost(error.to_string());
            }
        }
    }
}
