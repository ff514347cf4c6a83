//! HTTP transport: `GET` a destination, then `POST` the file as multipart.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Url};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{ConfigError, TransportConfig};

use super::{FileHandle, UploadDestination, UploadError, UploadTransport};

/// Destination response returned by the destination endpoint.
#[derive(Debug, Deserialize)]
struct DestinationResponse {
    #[serde(alias = "requestId")]
    uuid: String,
    #[serde(alias = "destinationURL", alias = "destinationUrl")]
    url: String,
}

/// Upload transport speaking the two-step HTTP protocol.
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
    base_url: Url,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::ValidationError(format!("transport.base_url: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Resolve a possibly relative address against the base URL.
    fn resolve(&self, address: &str) -> Result<Url, String> {
        self.base_url.join(address).map_err(|e| e.to_string())
    }

    /// Build the destination address from the step 1 response.
    fn destination_url(&self, response: &DestinationResponse) -> Result<Url, UploadError> {
        let address = format!("{}/{}", response.url.trim_end_matches('/'), response.uuid);
        self.resolve(&address).map_err(|e| {
            UploadError::destination_unavailable(format!("invalid destination {}: {}", address, e))
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn request_destination(&self) -> Result<UploadDestination, UploadError> {
        let url = self
            .resolve(&self.config.destination_path)
            .map_err(UploadError::destination_unavailable)?;

        debug!("Requesting upload destination from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UploadError::destination_unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::destination_unavailable(format!("HTTP {}", status)));
        }

        let body: DestinationResponse = response
            .json()
            .await
            .map_err(|e| UploadError::destination_unavailable(format!("invalid response: {}", e)))?;

        let url = self.destination_url(&body)?;

        Ok(UploadDestination {
            request_id: body.uuid,
            url: url.to_string(),
        })
    }

    async fn submit(
        &self,
        file: &FileHandle,
        destination: &UploadDestination,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            data = file.read_bytes() => data?,
        };
        let size = data.len();

        let mut part = multipart::Part::bytes(data).file_name(file.name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| UploadError::transfer_failed(e.to_string()))?;
        }
        let form = multipart::Form::new().part(self.config.field_name.clone(), part);

        debug!("Submitting {} ({} bytes) to {}", file.name, size, destination.url);

        let request = self.client.post(&destination.url).multipart(form).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = request => result.map_err(|e| {
                if e.is_timeout() {
                    UploadError::transfer_failed("request timed out")
                } else {
                    UploadError::transfer_failed(e.to_string())
                }
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::transfer_failed(format!("HTTP {}", status)));
        }

        Ok(())
    }
}
