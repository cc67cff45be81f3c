use std::time::Duration;

use dropsign_core::{Context, Error, Result};

use crate::constants::*;
use crate::sign_request::SignatureMethod;

/// Config carries all the configuration for the dropbox client.
///
/// Credentials are not part of the config, see [`crate::Credential`] and the
/// credential providers.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// `api_host` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`DROPBOX_API_HOST`]
    /// - default: `api.dropbox.com`
    pub api_host: Option<String>,
    /// `content_host` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`DROPBOX_CONTENT_HOST`]
    /// - default: `api-content.dropbox.com`
    pub content_host: Option<String>,
    /// Host of the authorization page, default: `www.dropbox.com`.
    pub web_host: Option<String>,
    /// API version, only `1.0` is supported.
    pub api_version: Option<String>,
    /// `signature_method` will be loaded from
    ///
    /// - this field if it's `is_some`
    /// - env value: [`DROPBOX_SIGNATURE_METHOD`]
    /// - default: `PLAINTEXT`
    pub signature_method: Option<String>,
    /// How long a caller waits for its own completion, default: 30s.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Create a new Config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set api_host
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set content_host
    pub fn with_content_host(mut self, host: impl Into<String>) -> Self {
        self.content_host = Some(host.into());
        self
    }

    /// Set web_host
    pub fn with_web_host(mut self, host: impl Into<String>) -> Self {
        self.web_host = Some(host.into());
        self
    }

    /// Set api_version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set signature_method
    pub fn with_signature_method(mut self, method: impl Into<String>) -> Self {
        self.signature_method = Some(method.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load config from env.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        if let Some(v) = ctx.env_var(DROPBOX_API_HOST) {
            self.api_host.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(DROPBOX_CONTENT_HOST) {
            self.content_host.get_or_insert(v);
        }
        if let Some(v) = ctx.env_var(DROPBOX_SIGNATURE_METHOD) {
            self.signature_method.get_or_insert(v);
        }

        self
    }

    /// Resolve the config into the settings the client runs with.
    pub(crate) fn resolve(&self) -> Result<Settings> {
        let api_version = self
            .api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        check_api_version(&api_version)?;

        let signature_method = match &self.signature_method {
            Some(v) => v.parse()?,
            None => SignatureMethod::default(),
        };

        let settings = Settings {
            api_host: self
                .api_host
                .clone()
                .unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            content_host: self
                .content_host
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_HOST.to_string()),
            web_host: self
                .web_host
                .clone()
                .unwrap_or_else(|| DEFAULT_WEB_HOST.to_string()),
            api_version,
            signature_method,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        };
        if settings.api_host.is_empty()
            || settings.content_host.is_empty()
            || settings.web_host.is_empty()
        {
            return Err(Error::config_invalid("hosts must not be empty"));
        }

        Ok(settings)
    }
}

/// Resolved configuration.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub api_host: String,
    pub content_host: String,
    pub web_host: String,
    pub api_version: String,
    pub signature_method: SignatureMethod,
    pub timeout: Duration,
}

impl Settings {
    /// Version prefix used in paths, the major digit of the api version.
    pub fn path_version(&self) -> &str {
        &self.api_version[..1]
    }
}

pub(crate) fn check_api_version(version: &str) -> Result<()> {
    if version != DEFAULT_API_VERSION {
        return Err(Error::version_not_supported(format!(
            "only version {DEFAULT_API_VERSION} is supported, got {version}"
        )));
    }
    Ok(())
}
