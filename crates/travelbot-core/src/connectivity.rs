//! Network reachability tracking.
//!
//! The monitor only observes: it records the current state and broadcasts
//! transitions. It never retries or replays anything on reconnect.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared reachability flag. Clones observe and update the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the platform's current state. Only actual changes notify
    /// subscribers.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
    }

    /// Receive transitions. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Background reachability probe. Aborted when dropped.
pub struct Probe {
    handle: JoinHandle<()>,
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Host and port a TCP probe should dial for an `http(s)://host[:port]/...` URL.
pub fn probe_target(endpoint: &str) -> Option<(String, u16)> {
    let (scheme, rest) = endpoint.split_once("://")?;
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit('@').next()?;
    if authority.is_empty() {
        return None;
    }

    // bracketed IPv6 literal
    if let Some(stripped) = authority.strip_prefix('[') {
        let (host, tail) = stripped.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None => default_port,
        };
        return Some((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), default_port)),
    }
}

async fn reachable(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Dial the chat endpoint once. An endpoint that cannot be probed counts as
/// reachable, so a bad URL shows up as a transport failure instead.
pub async fn probe_once(endpoint: &str, timeout: Duration) -> bool {
    match probe_target(endpoint) {
        Some((host, port)) => reachable(&host, port, timeout).await,
        None => true,
    }
}

/// Periodically dial the chat endpoint and feed the result into `monitor`.
/// An endpoint the probe cannot parse leaves the monitor untouched.
pub fn spawn_probe(monitor: ConnectivityMonitor, endpoint: &str, interval: Duration) -> Probe {
    let target = probe_target(endpoint);
    if target.is_none() {
        tracing::warn!(endpoint, "cannot probe endpoint; assuming online");
    }

    let handle = tokio::spawn(async move {
        let Some((host, port)) = target else {
            return;
        };
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let online = reachable(&host, port, interval.min(Duration::from_secs(3))).await;
            tracing::trace!(%host, port, online, "probe");
            monitor.set_online(online);
        }
    });

    Probe { handle }
}
