use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::clock::Clock;
use crate::key_cache::CertificateSource;

/// Google's distribution endpoint for the certificates that sign Firebase ID tokens.
pub const CERTIFICATES_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

const DEFAULT_MAX_AGE_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("{name} must be a positive number of seconds, got '{value}'")]
    InvalidSeconds { name: String, value: String },
}

/// Configuration for the ID token verifier
#[derive(Clone)]
pub struct VerifierConfig {
    /// Firebase project id, matched against both audience and issuer
    pub(crate) project_id: String,
    /// URL serving the key id to PEM certificate map
    pub(crate) certificates_url: String,
    /// Key set lifetime when the response has no usable `max-age` (default: 5 minutes)
    pub(crate) default_max_age: Duration,
    /// Timeout for certificate requests made with the default client (default: 10 seconds)
    pub(crate) request_timeout: Duration,
    /// Optional custom HTTP client for fetching certificates
    pub(crate) http_client: Option<Client>,
    /// Replaces the HTTP fetch entirely
    pub(crate) certificate_source: Option<Arc<dyn CertificateSource>>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
    /// Whether bearer verification rejects unverified emails (default: true)
    pub(crate) require_verified_email: bool,
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("project_id", &self.project_id)
            .field("certificates_url", &self.certificates_url)
            .field("default_max_age", &self.default_max_age)
            .field("request_timeout", &self.request_timeout)
            .field("http_client", &self.http_client.is_some())
            .field("certificate_source", &self.certificate_source.is_some())
            .field("clock", &self.clock.is_some())
            .field("require_verified_email", &self.require_verified_email)
            .finish()
    }
}

impl VerifierConfig {
    /// Create a configuration for the given Firebase project
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id: String = project_id.into();

        Self {
            project_id: project_id.trim().to_string(),
            certificates_url: CERTIFICATES_URL.to_string(),
            default_max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            http_client: None,
            certificate_source: None,
            clock: None,
            require_verified_email: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if `FIREBASE_PROJECT_ID` is missing or a
    /// duration variable is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables.
    ///
    /// Reads `FIREBASE_PROJECT_ID` (required), `FIREBASE_CERTS_URL`,
    /// `FIREBASE_CERTS_TIMEOUT_SECONDS` and `FIREBASE_CERTS_DEFAULT_MAX_AGE_SECONDS`.
    ///
    /// # Errors
    /// See [`VerifierConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let project_id = vars
            .get("FIREBASE_PROJECT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("FIREBASE_PROJECT_ID".to_string()))?;

        let mut config = Self::new(project_id.as_str());

        if let Some(url) = vars.get("FIREBASE_CERTS_URL") {
            config = config.with_certificates_url(url.as_str());
        }

        if let Some(timeout) = seconds_var(vars, "FIREBASE_CERTS_TIMEOUT_SECONDS")? {
            config = config.with_request_timeout(timeout);
        }

        if let Some(max_age) = seconds_var(vars, "FIREBASE_CERTS_DEFAULT_MAX_AGE_SECONDS")? {
            config = config.with_default_max_age(max_age);
        }

        Ok(config)
    }

    /// Set the URL certificates are fetched from
    pub fn with_certificates_url(mut self, url: impl Into<String>) -> Self {
        self.certificates_url = url.into();
        self
    }

    /// Set the key set lifetime used when a response has no usable `max-age`
    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = max_age;
        self
    }

    /// Set the request timeout of the default HTTP client
    ///
    /// Has no effect together with [`VerifierConfig::with_http_client`].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Fetch certificates from a custom source instead of over HTTP
    pub fn with_certificate_source(mut self, source: Arc<dyn CertificateSource>) -> Self {
        self.certificate_source = Some(source);
        self
    }

    /// Judge token and key expiry against a custom clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set whether [`IdTokenVerifier::verify_bearer`](crate::IdTokenVerifier::verify_bearer)
    /// rejects tokens whose email is not verified
    pub fn with_require_verified_email(mut self, require: bool) -> Self {
        self.require_verified_email = require;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

fn seconds_var(vars: &HashMap<String, String>, name: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(None);
    };

    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidSeconds {
            name: name.to_string(),
            value: value.clone(),
        }),
    }
}
