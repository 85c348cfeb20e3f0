use crate::{FolioError, FolioResult};
use std::time::Duration;

const DEFAULT_UPLOAD_BASE_URL: &str = "https://api.cloudinary.com";
const DEFAULT_DELIVERY_HOST: &str = "res.cloudinary.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings shared by every client of the backend.
///
/// ```
/// use folio_sdk::FolioConfig;
/// use std::time::Duration;
///
/// let config = FolioConfig::new("https://example.com/api", "acct", "unsigned")
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(config.api_base_url(), "https://example.com/api");
/// ```
#[derive(Debug, Clone)]
pub struct FolioConfig {
    pub(crate) api_base_url: String,
    pub(crate) cloud_name: String,
    pub(crate) upload_preset: String,
    pub(crate) api_key: Option<String>,
    pub(crate) upload_base_url: String,
    pub(crate) delivery_host: String,
    pub(crate) timeout: Duration,
}

impl FolioConfig {
    pub fn new(
        api_base_url: impl Into<String>,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: trim_slash(api_base_url.into()),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            api_key: None,
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            delivery_host: DEFAULT_DELIVERY_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// Required: `FOLIO_API_BASE_URL`, `FOLIO_IMAGE_CLOUD_NAME`,
    /// `FOLIO_IMAGE_UPLOAD_PRESET`. Optional: `FOLIO_IMAGE_API_KEY`,
    /// `FOLIO_REQUEST_TIMEOUT_SECS`, `FOLIO_IMAGE_UPLOAD_BASE_URL`,
    /// `FOLIO_IMAGE_DELIVERY_HOST`.
    pub fn from_env() -> FolioResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> FolioResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| FolioError::Config(format!("{key} must be set")))
        };

        let mut config = Self::new(
            required("FOLIO_API_BASE_URL")?,
            required("FOLIO_IMAGE_CLOUD_NAME")?,
            required("FOLIO_IMAGE_UPLOAD_PRESET")?,
        )
        .with_optional_api_key(lookup("FOLIO_IMAGE_API_KEY"));

        if let Some(secs) = lookup("FOLIO_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                FolioError::Config(format!(
                    "FOLIO_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got {secs:?}"
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(url) = lookup("FOLIO_IMAGE_UPLOAD_BASE_URL") {
            config = config.with_upload_base_url(url);
        }
        if let Some(host) = lookup("FOLIO_IMAGE_DELIVERY_HOST") {
            config = config.with_delivery_host(host);
        }
        Ok(config)
    }

    /// Key sent along with unsigned uploads when the preset requires it.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_optional_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Defaults to `https://api.cloudinary.com`.
    #[must_use]
    pub fn with_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.upload_base_url = trim_slash(url.into());
        self
    }

    /// Host that serves uploaded images. Only URLs on this host (or its
    /// subdomains) are ever sent for deletion.
    #[must_use]
    pub fn with_delivery_host(mut self, host: impl Into<String>) -> Self {
        self.delivery_host = host.into().to_ascii_lowercase();
        self
    }

    /// Request timeout applied to every HTTP call. Defaults to 15 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn delivery_host(&self) -> &str {
        &self.delivery_host
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.upload_base_url, self.cloud_name
        )
    }

    pub(crate) fn http_client(&self) -> FolioResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("folio-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
