//! Application-level liveness over HTTP.

use reqwest::blocking::Client;
use tracing::{debug, info};

use drover_config::ProbeSettings;

use super::{LifecycleError, PROBE_TARGET};

/// HTTP endpoints exposed by every worker.
#[cfg_attr(test, mockall::automock)]
pub trait HealthProbe {
    /// Whether the worker on `port` answers its health endpoint with a 2xx.
    fn service_alive(&self, port: u16) -> bool;

    /// Asks the worker on `port` to shut itself down, when a stop endpoint is
    /// configured. Failures are logged and otherwise ignored.
    fn request_stop(&self, port: u16);
}

/// Blocking `reqwest` client probing `http://<host>:<port><path>`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    host: String,
    health_path: String,
    stop_path: Option<String>,
}

impl HttpProbe {
    /// Builds a probe with the configured per-request timeout.
    ///
    /// Proxy environment variables are ignored so loopback probes never leave
    /// the host.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ProbeClient`] if the TLS-less client cannot
    /// be constructed.
    pub fn new(settings: &ProbeSettings) -> Result<Self, LifecycleError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .no_proxy()
            .build()
            .map_err(LifecycleError::ProbeClient)?;
        Ok(Self {
            client,
            host: authority_host(&settings.host),
            health_path: settings.health_path.clone(),
            stop_path: settings.stop_path.clone(),
        })
    }

    fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{port}{path}", self.host)
    }
}

impl HealthProbe for HttpProbe {
    fn service_alive(&self, port: u16) -> bool {
        let url = self.url(port, &self.health_path);
        match self.client.get(&url).send() {
            Ok(response) => {
                let status = response.status();
                debug!(target: PROBE_TARGET, port, %url, %status, "health probe answered");
                status.is_success()
            }
            Err(error) => {
                debug!(target: PROBE_TARGET, port, %url, error = %error, "health probe failed");
                false
            }
        }
    }

    fn request_stop(&self, port: u16) {
        let Some(stop_path) = self.stop_path.as_deref() else {
            return;
        };
        let url = self.url(port, stop_path);
        match self.client.get(&url).send() {
            Ok(response) => {
                info!(
                    target: PROBE_TARGET,
                    port,
                    %url,
                    status = %response.status(),
                    "requested worker shutdown"
                );
            }
            Err(error) => {
                debug!(target: PROBE_TARGET, port, %url, error = %error, "stop request failed");
            }
        }
    }
}

/// Wraps bare IPv6 literals in brackets for use in a URL authority.
fn authority_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}
