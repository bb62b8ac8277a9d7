//! Reachability checks.
//!
//! Being flagged online is necessary but not sufficient: a captive portal or
//! a dead upstream still lets the device claim connectivity. The prober makes
//! a real HTTP request every time it is asked, and reports any failure as
//! "not reachable" rather than an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::ApiError;
use crate::connectivity::ConnectivityMonitor;

/// Probe timeout in seconds. Probes gate every network read, so they must
/// fail fast.
const PROBE_TIMEOUT_SECS: u64 = 5;

#[async_trait]
pub trait Reachability: Send + Sync {
    /// Whether the network is usable right now. Never cached, never fails.
    async fn is_reachable(&self) -> bool;
}

pub struct HttpProber {
    client: Client,
    probe_url: Url,
    connectivity: ConnectivityMonitor,
}

impl HttpProber {
    pub fn new(probe_url: &str, connectivity: ConnectivityMonitor) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        let probe_url = Url::parse(probe_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", probe_url, e)))?;
        Ok(Self {
            client,
            probe_url,
            connectivity,
        })
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Issue the probe request, ignoring the connectivity flag.
    pub async fn probe(&self) -> bool {
        match self.client.head(self.probe_url.clone()).send().await {
            Ok(response) if response.status().is_server_error() => {
                debug!(status = %response.status(), "Probe reached a failing server");
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl Reachability for HttpProber {
    async fn is_reachable(&self) -> bool {
        if self.connectivity.is_offline() {
            return false;
        }
        let reachable = self.probe().await;
        if reachable {
            self.connectivity.network_online();
        }
        reachable
    }
}

/// Probe on a fixed period and feed the results to the connectivity state
/// machine as network online/offline events.
pub fn spawn_network_watch(prober: Arc<HttpProber>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if prober.probe().await {
                prober.connectivity.network_online();
            } else {
                prober.connectivity.network_offline();
            }
        }
    })
}
