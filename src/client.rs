//! HTTP transport to the speed-test server endpoints

#[cfg(test)]
pub(crate) mod mock;


use crate::{
    error::{AppError, Result},
    models::Config,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{
    header::{CACHE_CONTROL, CONTENT_TYPE},
    Client, Response, Url,
};
use serde::Deserialize;
use std::time::Duration;

/// Body of a streaming download, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Server-facing operations used by the measurement engine
#[async_trait]
pub trait SpeedTransport: Send + Sync {
    /// Issue one latency probe; resolves once response headers arrive
    async fn ping(&self) -> Result<()>;

    /// Open one download transfer of up to `bytes` bytes
    async fn open_download(&self, bytes: u64) -> Result<ByteStream>;

    /// Send one payload and wait for the server to acknowledge it
    async fn upload(&self, payload: Bytes) -> Result<UploadReceipt>;
}

/// Acknowledgement of a single upload send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Payload bytes put on the wire
    pub sent: u64,
    /// Byte count echoed back by the server, when it reports one
    pub echoed: Option<u64>,
}

impl UploadReceipt {
    pub fn new(sent: u64, echoed: Option<u64>) -> Self {
        Self { sent, echoed }
    }

    /// Bytes to credit to the session counter
    pub fn credited(&self) -> u64 {
        match self.echoed {
            Some(echoed) => echoed.min(self.sent),
            None => self.sent,
        }
    }
}

/// JSON echo returned by the upload endpoint
#[derive(Debug, Default, Deserialize)]
struct UploadEcho {
    received: Option<u64>,
    uploaded_bytes: Option<u64>,
}

impl UploadEcho {
    fn byte_count(&self) -> Option<u64> {
        self.received.or(self.uploaded_bytes)
    }
}

/// Resolved endpoint URLs for one server
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub ping: Url,
    pub download: Url,
    pub upload: Url,
    pub size_param: String,
}

impl Endpoints {
    /// Resolve the configured paths against the server base URL
    pub fn from_config(config: &Config) -> Result<Self> {
        HttpUtils::validate_url(&config.server_url)?;
        let base = Url::parse(&config.server_url)?;

        Ok(Self {
            ping: HttpUtils::join_endpoint(&base, &config.ping_path)?,
            download: HttpUtils::join_endpoint(&base, &config.download_path)?,
            upload: HttpUtils::join_endpoint(&base, &config.upload_path)?,
            size_param: config.download_size_param.clone(),
        })
    }

    pub fn ping_url(&self) -> Url {
        HttpUtils::with_cache_buster(&self.ping)
    }

    pub fn download_url(&self, bytes: u64) -> Url {
        let mut url = self.download.clone();
        url.query_pairs_mut().append_pair(&self.size_param, &bytes.to_string());
        HttpUtils::with_cache_buster(&url)
    }

    pub fn upload_url(&self) -> Url {
        HttpUtils::with_cache_buster(&self.upload)
    }
}

/// reqwest-backed implementation of [`SpeedTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
}

impl HttpTransport {
    /// Build a transport for the server named in `config`
    pub fn new(config: &Config) -> Result<Self> {
        let endpoints = Endpoints::from_config(config)?;

        // No overall request timeout: download bodies outlive any fixed bound
        // and the engine cancels transfers itself.
        let client = Client::builder()
            .connect_timeout(config.ping_timeout().max(Duration::from_secs(5)))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.download_workers.max(config.upload_workers) + 1)
            .tcp_nodelay(true)
            .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn check_status(response: Response, operation: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(AppError::http_request(format!(
                "{} returned HTTP {}",
                operation,
                status.as_u16()
            )))
        }
    }
}

#[async_trait]
impl SpeedTransport for HttpTransport {
    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoints.ping_url())
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let response = Self::check_status(response, "Ping")?;

        // Headers are in; finish reading the body off the timing path so the
        // connection goes back to the pool.
        tokio::spawn(async move {
            let _ = response.bytes().await;
        });

        Ok(())
    }

    async fn open_download(&self, bytes: u64) -> Result<ByteStream> {
        let response = self
            .client
            .get(self.endpoints.download_url(bytes))
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let response = Self::check_status(response, "Download")?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AppError::from))
            .boxed())
    }

    async fn upload(&self, payload: Bytes) -> Result<UploadReceipt> {
        let sent = payload.len() as u64;
        let response = self
            .client
            .post(self.endpoints.upload_url())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CACHE_CONTROL, "no-store")
            .body(payload)
            .send()
            .await?;
        let response = Self::check_status(response, "Upload")?;

        // The echo is optional; an empty or non-JSON body credits the payload size
        let body = response.bytes().await?;
        let echoed = serde_json::from_slice::<UploadEcho>(&body)
            .ok()
            .and_then(|echo| echo.byte_count());

        Ok(UploadReceipt::new(sent, echoed))
    }
}

/// Utility functions for HTTP operations
pub struct HttpUtils;

impl HttpUtils {
    /// Validate URL format and scheme
    pub fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid URL format: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(AppError::validation(format!("Unsupported URL scheme: {}", scheme))),
        }

        if parsed.host().is_none() {
            return Err(AppError::validation("URL must have a host"));
        }

        Ok(())
    }

    /// Append an endpoint path to the base URL, keeping any base path prefix
    pub fn join_endpoint(base: &Url, endpoint: &str) -> Result<Url> {
        let mut url = base.clone();
        let prefix = base.path().trim_end_matches('/');
        url.set_path(&format!("{}/{}", prefix, endpoint.trim_start_matches('/')));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Add a unique `nocache` query parameter so intermediaries never answer
    /// from cache
    pub fn with_cache_buster(url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("nocache", &uuid::Uuid::new_v4().simple().to_string());
        url
    }

    /// Whether the host is loopback or a private-network address
    pub fn is_local_host(url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        match parsed.host() {
            Some(url::Host::Domain(domain)) => domain == "localhost" || domain.ends_with(".local"),
            Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        }
    }

    /// Check if URL uses HTTPS
    pub fn is_https(url: &str) -> bool {
        url.starts_with("https://")
    }
}
