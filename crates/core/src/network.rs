//! Network reachability.

use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Whether the network is believed to be reachable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// Reachable.
    #[default]
    Online,
    /// Not reachable.
    Offline,
}

impl NetworkStatus {
    /// Returns whether this is [`NetworkStatus::Online`].
    #[inline]
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Observes network reachability.
///
/// Clones observe the same source.
#[derive(Clone, Debug)]
pub struct NetworkMonitor {
    rx: watch::Receiver<NetworkStatus>,
}

/// Reports network status to the [`NetworkMonitor`]s created with it.
///
/// Hosts that learn about connectivity from their platform (rather than
/// probing) push changes through this.
#[derive(Debug)]
pub struct NetworkSwitch {
    tx: watch::Sender<NetworkStatus>,
}

impl NetworkSwitch {
    /// Reports the current status. Repeated reports of the same status are
    /// not treated as changes.
    pub fn set(&self, status: NetworkStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            info!("network status changed: {status:?}");
            *current = status;
            true
        });
    }
}

impl NetworkMonitor {
    /// Creates a monitor that is always online.
    pub fn always_online() -> Self {
        let (_, rx) = watch::channel(NetworkStatus::Online);
        Self { rx }
    }

    /// Creates a monitor driven by the returned switch.
    pub fn manual(initial: NetworkStatus) -> (NetworkSwitch, Self) {
        let (tx, rx) = watch::channel(initial);
        (NetworkSwitch { tx }, Self { rx })
    }

    /// Creates a monitor that probes `addr` with a TCP connect every
    /// `interval`.
    ///
    /// The probe task exits once every monitor created from it is dropped.
    pub fn probe(addr: String, interval: Duration) -> (Self, JoinHandle<()>) {
        let (switch, monitor) = Self::manual(NetworkStatus::Online);
        let task = tokio::spawn(async move {
            while !switch.tx.is_closed() {
                let status =
                    match timeout(interval, TcpStream::connect(&addr)).await {
                        Ok(Ok(_)) => NetworkStatus::Online,
                        Ok(Err(err)) => {
                            debug!("probing {addr} failed: {err}");
                            NetworkStatus::Offline
                        }
                        Err(_) => {
                            debug!("probing {addr} timed out");
                            NetworkStatus::Offline
                        }
                    };
                switch.set(status);
                sleep(interval).await;
            }
        });
        (monitor, task)
    }

    /// Returns the last known status.
    #[inline]
    pub fn status(&self) -> NetworkStatus {
        *self.rx.borrow()
    }

    /// Waits for the next status change.
    ///
    /// Returns `None` once the source is gone; the status is frozen from
    /// then on.
    pub async fn changed(&mut self) -> Option<NetworkStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Waits until the network is online.
    ///
    /// Returns immediately if it already is. If the source goes away while
    /// offline, this never returns.
    pub async fn wait_online(&mut self) {
        if self.rx.wait_for(|status| status.is_online()).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
