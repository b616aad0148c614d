//! TCP reachability monitor.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::NetworkStatus;
use crate::infrastructure::config::NetworkSettings;

/// Marks the host online while `probe_addr` accepts TCP connections.
///
/// Optimistically online until the first probe answers.
#[derive(Debug)]
pub struct TcpReachabilityMonitor {
    tx: watch::Sender<bool>,
}

impl TcpReachabilityMonitor {
    /// Spawn the probe loop. It stops when `cancel` fires.
    #[must_use]
    pub fn spawn(settings: NetworkSettings, cancel: CancellationToken) -> Arc<Self> {
        let (tx, _rx) = watch::channel(true);
        let monitor = Arc::new(Self { tx });

        let task_monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(settings.probe_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let online = probe(&settings.probe_addr, settings.probe_timeout).await;
                        task_monitor.publish(online);
                    }
                }
            }
            tracing::debug!("Reachability monitor stopped");
        });

        monitor
    }

    fn publish(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            tracing::info!(online, "Host reachability changed");
        }
    }
}

async fn probe(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(addr, error = %e, "Reachability probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(addr, "Reachability probe timed out");
            false
        }
    }
}

impl NetworkStatus for TcpReachabilityMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn settings(addr: String) -> NetworkSettings {
        NetworkSettings {
            probe_addr: addr,
            probe_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn reports_offline_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let cancel = CancellationToken::new();
        let monitor = TcpReachabilityMonitor::spawn(settings(addr), cancel.clone());
        let mut rx = monitor.watch();

        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|online| !*online))
            .await
            .unwrap()
            .unwrap();
        assert!(!monitor.is_online());
        cancel.cancel();
    }

    #[tokio::test]
    async fn stays_online_while_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let cancel = CancellationToken::new();
        let monitor = TcpReachabilityMonitor::spawn(settings(addr), cancel.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(monitor.is_online());
        cancel.cancel();
        drop(listener);
    }
}
