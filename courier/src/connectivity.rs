//! Connectivity gate used before any network-dependent action
//!
//! There is no cheap way to tell "network down" from "target unreachable", so
//! the guard retries a probe against a known-reachable endpoint until it
//! succeeds. The loop is unbounded unless its cancellation token fires.

use crate::config::{ConnectivityConfig, ProbeKind};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// One bounded-latency reachability check.
    async fn probe(&self) -> Result<(), String>;

    /// What is being probed, for logs
    fn target(&self) -> String;
}

/// Probes an HTTP endpoint; any response at all counts as online.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build probe client: {e}"))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> Result<(), String> {
        self.client
            .head(&self.url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// Probes by opening a TCP connection, e.g. to a public DNS resolver.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> Result<(), String> {
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr)).await
        {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("no answer within {:?}", self.timeout)),
        }
    }

    fn target(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// How a call to [`ConnectivityGuard::ensure_connectivity`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Cancelled,
}

pub struct ConnectivityGuard {
    probe: Box<dyn ConnectivityProbe>,
    backoff: Duration,
    cancel: CancellationToken,
}

impl ConnectivityGuard {
    pub fn new(
        probe: Box<dyn ConnectivityProbe>,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            probe,
            backoff,
            cancel,
        }
    }

    /// Guard running the configured probe.
    pub fn from_config(
        config: &ConnectivityConfig,
        cancel: CancellationToken,
    ) -> Result<Self, String> {
        let timeout = Duration::from_secs(config.probe_timeout_secs);
        let probe: Box<dyn ConnectivityProbe> = match config.probe {
            ProbeKind::Http => Box::new(HttpProbe::new(config.probe_url.clone(), timeout)?),
            ProbeKind::Tcp => Box::new(TcpProbe::new(config.probe_addr.clone(), timeout)),
        };
        Ok(Self::new(
            probe,
            Duration::from_secs(config.backoff_secs),
            cancel,
        ))
    }

    /// What the probe targets
    pub fn target(&self) -> String {
        self.probe.target()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Probe once, without retrying.
    pub async fn check_once(&self) -> Result<(), String> {
        self.probe.probe().await
    }

    /// Block until the probe succeeds. Never fails; only cancellation ends it early.
    #[instrument(level = "debug", skip(self), fields(target = %self.probe.target()))]
    pub async fn ensure_connectivity(&self) -> Connectivity {
        let mut failures: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Connectivity::Cancelled;
            }
            match self.probe.probe().await {
                Ok(()) => {
                    if failures > 0 {
                        info!(failures, "Internet connection restored");
                    } else {
                        debug!("Connectivity confirmed");
                    }
                    return Connectivity::Online;
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        failures,
                        error = %e,
                        retry_in = ?self.backoff,
                        "No internet connection, waiting to retry"
                    );
                }
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Connectivity::Cancelled,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails a fixed number of times, then succeeds.
    struct FlakyProbe {
        failures_left: AtomicUsize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ConnectivityProbe for FlakyProbe {
        async fn probe(&self) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                Err("network unreachable".into())
            } else {
                Ok(())
            }
        }

        fn target(&self) -> String {
            "flaky".into()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_retries_until_online() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guard = ConnectivityGuard::new(
            Box::new(FlakyProbe {
                failures_left: AtomicUsize::new(3),
                calls: calls.clone(),
            }),
            Duration::from_secs(5),
            CancellationToken::new(),
        );

        let started = tokio::time::Instant::now();
        assert_eq!(guard.ensure_connectivity().await, Connectivity::Online);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let guard = ConnectivityGuard::new(
            Box::new(FlakyProbe {
                failures_left: AtomicUsize::new(usize::MAX),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Duration::from_secs(5),
            cancel.clone(),
        );

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            cancel.cancel();
        });
        assert_eq!(guard.ensure_connectivity().await, Connectivity::Cancelled);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_check_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.probe().await.is_ok());

        let config = ConnectivityConfig {
            probe: ProbeKind::Tcp,
            probe_addr: addr.to_string(),
            ..Default::default()
        };
        let guard = ConnectivityGuard::from_config(&config, CancellationToken::new()).unwrap();
        assert_eq!(guard.target(), format!("tcp://{addr}"));
        assert!(guard.check_once().await.is_ok());

        drop(listener);
        let closed = TcpProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(closed.probe().await.is_err());
    }
}
