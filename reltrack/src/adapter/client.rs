//! Shared HTTP transport and the adapter factory dispatching on stage
//! kind.

use crate::adapter::{AdapterFactory, GiteaAdapter, MirrorAdapter, ObsAdapter, SourceAdapter};
use crate::cache::FetchCache;
use crate::config::{RunOptions, StageBinding, TrackedComponent};
use crate::errors::{AdapterError, ConfigurationError};
use crate::model::StageKind;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("reltrack/", env!("CARGO_PKG_VERSION"));

/// A thin wrapper over [`reqwest::Client`] mapping transport failures
/// into adapter errors and consulting the optional payload cache.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    cache: Option<Arc<FetchCache>>,
}

impl HttpClient {
    /// Builds a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the underlying client
    /// cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigurationError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache: None,
        })
    }

    /// Attaches a payload cache consulted before every request.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<FetchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetches a URL's body as text.
    ///
    /// Returns `Ok(None)` for a 404, since an absent resource is an
    /// ordinary answer for the adapters; any other non-success status
    /// is `Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Unavailable` for transport failures and
    /// non-404 error statuses.
    pub async fn get_text(&self, url: &str, target: &str) -> Result<Option<String>, AdapterError> {
        if let Some(cache) = &self.cache {
            if let Some(payload) = cache.get(url) {
                return Ok(Some(payload));
            }
        }

        tracing::debug!(url, target, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AdapterError::unavailable(target, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AdapterError::unavailable(
                target,
                format!("HTTP {status} from {url}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::unavailable(target, e.to_string()))?;
        if let Some(cache) = &self.cache {
            cache.put(url, &text);
        }
        Ok(Some(text))
    }
}

/// The production adapter factory: one adapter per stage kind, all
/// sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct HttpAdapterFactory {
    client: HttpClient,
}

impl HttpAdapterFactory {
    /// Builds the factory from the run options, wiring up the fetch
    /// cache when one is configured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the HTTP client cannot be
    /// constructed.
    pub fn new(options: &RunOptions) -> Result<Self, ConfigurationError> {
        let mut client = HttpClient::new(options.fetch_timeout)?;
        if let Some(cache) = &options.cache {
            client = client.with_cache(Arc::new(FetchCache::new(cache)));
        }
        Ok(Self { client })
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn adapter_for(
        &self,
        _component: &TrackedComponent,
        binding: &StageBinding,
    ) -> Result<Arc<dyn SourceAdapter>, ConfigurationError> {
        let adapter: Arc<dyn SourceAdapter> = match binding.kind {
            StageKind::SourceRepo => {
                Arc::new(GiteaAdapter::new(self.client.clone(), binding)?)
            }
            StageKind::BuildService => Arc::new(ObsAdapter::new(self.client.clone(), binding)?),
            StageKind::Mirror => Arc::new(MirrorAdapter::new(self.client.clone(), binding)?),
        };
        Ok(adapter)
    }
}
