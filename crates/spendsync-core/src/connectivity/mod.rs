//! Connectivity oracle: "is the network usable right now?"

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Connectivity probe failed: {0}")]
    Failed(String),
    #[error("Connectivity probe HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Platform reachability signal consulted by the oracle.
#[allow(async_fn_in_trait)]
pub trait ConnectivityProbe {
    /// Report whether the network currently looks usable.
    ///
    /// Timeouts belong to the probe; the oracle adds none of its own.
    async fn check(&self) -> ProbeResult<bool>;
}

/// Probe that treats any HTTP answer from the server as "online".
#[derive(Clone)]
pub struct HttpProbe {
    target: Option<String>,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Probe `target` (usually the API base URL) with the given timeout.
    ///
    /// Without a target the probe always reports offline.
    pub fn new(target: Option<String>, timeout: Duration) -> ProbeResult<Self> {
        let target = match normalize_text_option(target) {
            Some(url) if is_http_url(&url) => Some(url),
            Some(url) => {
                return Err(ProbeError::Failed(format!(
                    "probe target must include http:// or https://, got {url}"
                )))
            }
            None => None,
        };

        Ok(Self {
            target,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> ProbeResult<bool> {
        let Some(target) = &self.target else {
            tracing::debug!("No connectivity probe target configured; reporting offline");
            return Ok(false);
        };

        match self.client.head(target).send().await {
            Ok(_) => Ok(true),
            Err(error) if error.is_connect() || error.is_timeout() => {
                tracing::debug!("Server unreachable: {}", error);
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Combines the probe with the user's forced-offline switch.
pub struct ConnectivityOracle<P> {
    probe: P,
    force_offline: AtomicBool,
}

impl<P: ConnectivityProbe> ConnectivityOracle<P> {
    pub const fn new(probe: P, force_offline: bool) -> Self {
        Self {
            probe,
            force_offline: AtomicBool::new(force_offline),
        }
    }

    pub fn set_force_offline(&self, value: bool) {
        self.force_offline.store(value, Ordering::SeqCst);
        tracing::info!("Forced offline mode set to {}", value);
    }

    pub fn is_force_offline(&self) -> bool {
        self.force_offline.load(Ordering::SeqCst)
    }

    /// Best-effort reachability. A failing probe reads as offline.
    pub async fn is_online(&self) -> bool {
        if self.is_force_offline() {
            tracing::debug!("Reporting offline (forced offline mode)");
            return false;
        }

        match self.probe.check().await {
            Ok(online) => {
                tracing::debug!("Connectivity probe reports online={}", online);
                online
            }
            Err(error) => {
                tracing::warn!("Connectivity probe failed, assuming offline: {}", error);
                false
            }
        }
    }
}
