//! Retried, failover-aware GET requests against config servers.

use super::auth::RequestSigner;
use super::balance::{FirstAvailable, LoadBalance};
use super::server_pool::{DEFAULT_DOWN_WINDOW, ServerPool};
use crate::error::{ConfigError, Result};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Turns a successful response body into a value.
///
/// Decoders may borrow from the caller for the duration of the request.
pub type Decoder<'a, T> = dyn Fn(&[u8]) -> Result<T> + Send + Sync + 'a;

/// Result of a request that reached a server.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// `200 OK` with a decoded body
    Body(T),
    /// `304 Not Modified`
    NotModified,
}

impl<T> Outcome<T> {
    /// The decoded body, if any.
    pub fn into_body(self) -> Option<T> {
        match self {
            Outcome::Body(body) => Some(body),
            Outcome::NotModified => None,
        }
    }
}

/// Tunables for [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Per-request timeout when the caller gives none
    pub connect_timeout: Duration,
    /// Attempts per host for retryable requests
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_interval: Duration,
    /// How long a failing server is skipped
    pub down_window: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            max_retries: 5,
            retry_interval: Duration::from_secs(2),
            down_window: DEFAULT_DOWN_WINDOW,
        }
    }
}

/// Per-call request parameters.
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    /// Path and query appended to the chosen host
    pub uri: String,
    /// Application the request is made for
    pub app_id: String,
    /// Secret handed to the signer
    pub secret: Option<String>,
    /// Overrides [`TransportOptions::connect_timeout`]
    pub timeout: Option<Duration>,
    /// Whether retryable failures are retried on the same host
    pub retry: bool,
}

/// HTTP transport with retries, down-node tracking and failover.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::transport::{ConnectConfig, Transport};
///
/// # async fn example() -> apollo_client::error::Result<()> {
/// let transport = Transport::builder().build()?;
/// let connect = ConnectConfig {
///     uri: "configs/app/default/application".to_string(),
///     app_id: "app".to_string(),
///     retry: true,
///     ..Default::default()
/// };
/// let outcome = transport
///     .request_with_failover("http://localhost:8080/", &connect, &|body| {
///         Ok(body.to_vec())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Transport {
    client: Client,
    options: TransportOptions,
    pool: Arc<ServerPool>,
    balancer: Arc<dyn LoadBalance>,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl Transport {
    /// Create a new builder for constructing a transport.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Active options.
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// The server pool this transport records down nodes in.
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Send one logical request, failing over between servers.
    ///
    /// The primary `config_service` address is used unless it is cooling
    /// down, in which case the load balancer picks from the known servers.
    /// A host that fails with a transient error is marked down and the next
    /// host is tried. Client-side rejections and decode failures are returned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoReachableHost`] when no untried host is left,
    /// or the first non-transient error encountered.
    pub async fn request_with_failover<T>(
        &self,
        config_service: &str,
        connect: &ConnectConfig,
        decode: &Decoder<'_, T>,
    ) -> Result<Outcome<T>> {
        let mut tried = HashSet::new();

        loop {
            let Some(host) = self.resolve_host(config_service) else {
                error!(config_service, "no available config server");
                return Err(ConfigError::NoReachableHost(config_service.to_string()));
            };
            if !tried.insert(host.clone()) {
                error!(config_service, host = %host, "every reachable config server failed");
                return Err(ConfigError::NoReachableHost(config_service.to_string()));
            }

            let url = format!("{}{}", host, connect.uri);
            match self.request_once(&url, connect, decode).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() => {
                    warn!(host = %host, error = %e, "config server failed, trying next");
                    self.pool.set_down_node(config_service, &host);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a GET to `url`, retrying retryable failures on the same host.
    ///
    /// Connection errors and unexpected statuses are retried up to
    /// [`TransportOptions::max_retries`] times (once if `connect.retry` is
    /// false). `400`, `401`, `404` and `405` fail at once.
    ///
    /// # Errors
    ///
    /// When attempts run out, returns [`ConfigError::Transport`] carrying the
    /// last connection error if the final attempt never got a response, or
    /// [`ConfigError::MaxRetriesExceeded`] if it got an unexpected status.
    pub async fn request_once<T>(
        &self,
        url: &str,
        connect: &ConnectConfig,
        decode: &Decoder<'_, T>,
    ) -> Result<Outcome<T>> {
        let attempts = if connect.retry {
            self.options.max_retries.max(1)
        } else {
            1
        };
        let timeout = connect.timeout.unwrap_or(self.options.connect_timeout);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let mut request = self.client.get(url).timeout(timeout);
            if let Some(signer) = &self.signer {
                let secret = connect.secret.as_deref().unwrap_or_default();
                for (name, value) in signer.headers(url, &connect.app_id, secret) {
                    request = request.header(name, value);
                }
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url, attempt, error = %e, "connect config server failed");
                    last_error = Some(e.to_string());
                    self.pause_before_retry(attempt, attempts).await;
                    continue;
                }
            };

            match response.status() {
                StatusCode::OK => match response.bytes().await {
                    Ok(body) => return decode(&body).map(Outcome::Body),
                    Err(e) => {
                        warn!(url, attempt, error = %e, "read config server response failed");
                        last_error = Some(e.to_string());
                        self.pause_before_retry(attempt, attempts).await;
                    }
                },
                StatusCode::NOT_MODIFIED => {
                    debug!(url, "config not modified");
                    return Ok(Outcome::NotModified);
                }
                status @ (StatusCode::BAD_REQUEST
                | StatusCode::UNAUTHORIZED
                | StatusCode::NOT_FOUND
                | StatusCode::METHOD_NOT_ALLOWED) => {
                    error!(url, status = status.as_u16(), "config server rejected request");
                    return Err(ConfigError::ClientStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                status => {
                    warn!(url, attempt, status = status.as_u16(), "config server error");
                    last_error = None;
                    self.pause_before_retry(attempt, attempts).await;
                }
            }
        }

        error!(url, attempts, "over max retries, still failing");
        match last_error {
            Some(message) => Err(ConfigError::Transport {
                url: url.to_string(),
                message,
            }),
            None => Err(ConfigError::MaxRetriesExceeded {
                url: url.to_string(),
                attempts,
            }),
        }
    }

    fn resolve_host(&self, config_service: &str) -> Option<String> {
        if !self.pool.should_failover(config_service) {
            return Some(config_service.to_string());
        }
        self.balancer
            .select(&self.pool.servers(config_service))
            .map(|server| server.homepage_url)
    }

    async fn pause_before_retry(&self, attempt: u32, attempts: u32) {
        if attempt < attempts {
            tokio::time::sleep(self.options.retry_interval).await;
        }
    }
}

/// Builder for constructing a [`Transport`].
pub struct TransportBuilder {
    options: TransportOptions,
    balancer: Arc<dyn LoadBalance>,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl TransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            options: TransportOptions::default(),
            balancer: Arc::new(FirstAvailable),
            signer: None,
        }
    }

    /// Replace the transport options.
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the load-balancing policy used during failover.
    pub fn with_load_balance(mut self, balancer: Arc<dyn LoadBalance>) -> Self {
        self.balancer = balancer;
        self
    }

    /// Sign every request with `signer`.
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<Transport> {
        let client = Client::builder()
            .pool_max_idle_per_host(512)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Transport {
            client,
            pool: Arc::new(ServerPool::new(self.options.down_window)),
            options: self.options,
            balancer: self.balancer,
            signer: self.signer,
        })
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
