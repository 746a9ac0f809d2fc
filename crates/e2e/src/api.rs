//! HTTP client for API-under-test calls
//!
//! Non-success responses are not errors: the call yields `T::default()` and the
//! status is kept in [`ApiClient::last_status`] so a Then step can assert on it.

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::E2eResult;
use crate::url::UrlBuilder;

pub struct ApiClient {
    client: reqwest::Client,
    urls: UrlBuilder,
    last_status: Mutex<Option<StatusCode>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            urls: UrlBuilder::new(config.base_url.clone()),
            last_status: Mutex::new(None),
        })
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Status of the most recent response
    pub fn last_status(&self) -> Option<StatusCode> {
        *self.last_status.lock()
    }

    /// GET `path` and deserialize the JSON body
    pub async fn get<T>(&self, path: &str) -> E2eResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let url = self.urls.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        self.read(response).await
    }

    /// POST `body` as JSON to `path` and deserialize the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> E2eResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let url = self.urls.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        self.read(response).await
    }

    async fn read<T>(&self, response: reqwest::Response) -> E2eResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let status = response.status();
        *self.last_status.lock() = Some(status);

        if !status.is_success() {
            debug!("Non-success status {}, returning default", status);
            return Ok(T::default());
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
