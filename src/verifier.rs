use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::claims::ClaimsValidator;
use crate::claims::TokenClaims;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::config::VerifierConfig;
use crate::error::Error;
use crate::error::Rejection;
use crate::error::Result;
use crate::key_cache::CertificateSource;
use crate::key_cache::HttpCertificateSource;
use crate::key_cache::KeyCache;
use crate::segment;
use crate::signature;

/// Trait for ID token verification
#[async_trait]
pub trait VerifyIdToken {
    /// Verify an ID token and return the identity it asserts
    async fn verify_id_token(&self, token: &str) -> Result<Identity>;
}

/// Identity asserted by a verified ID token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// `user_id` claim when present, otherwise `sub`
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.subject.effective_user_id().to_string(),
            email: claims.email,
            display_name: claims.name,
            email_verified: claims.email_verified,
        }
    }
}

/// Verifier for Firebase ID tokens
///
/// Owns its own key cache; verifiers for different projects share nothing.
pub struct IdTokenVerifier {
    key_cache: KeyCache,
    claims_validator: ClaimsValidator,
    clock: Arc<dyn Clock>,
    require_verified_email: bool,
}

impl IdTokenVerifier {
    /// Create a verifier from the given configuration
    ///
    /// # Errors
    /// Returns `Error::ProjectIdMissing` if the configured project id is empty.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        if config.project_id.is_empty() {
            return Err(Error::ProjectIdMissing);
        }

        let clock = config.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let source = match config.certificate_source {
            Some(source) => source,
            None => {
                let client = config
                    .http_client
                    .unwrap_or_else(|| build_client(config.request_timeout));
                Arc::new(HttpCertificateSource::new(config.certificates_url, client))
                    as Arc<dyn CertificateSource>
            }
        };

        Ok(Self {
            key_cache: KeyCache::new(source, Arc::clone(&clock), config.default_max_age),
            claims_validator: ClaimsValidator::new(&config.project_id),
            clock,
            require_verified_email: config.require_verified_email,
        })
    }

    /// Create a verifier for a project with default settings
    ///
    /// # Errors
    /// Returns `Error::ProjectIdMissing` if `project_id` is blank.
    pub fn for_project(project_id: impl Into<String>) -> Result<Self> {
        Self::new(VerifierConfig::new(project_id))
    }

    pub(crate) fn requires_verified_email(&self) -> bool {
        self.require_verified_email
    }

    /// Create a verifier configured from environment variables
    ///
    /// # Errors
    /// Returns `Error::Config` if the environment is incomplete or invalid, and
    /// `Error::ProjectIdMissing` if the project id is blank.
    pub fn from_env() -> Result<Self> {
        Self::new(VerifierConfig::from_env()?)
    }

    /// The key cache backing this verifier
    pub fn key_cache(&self) -> &KeyCache {
        &self.key_cache
    }

    /// Verify an ID token, giving up on any certificate fetch once `cancel` fires
    ///
    /// # Errors
    /// `Error::InvalidToken` when the input is not a well-formed RS256 token,
    /// `Error::Unauthorized` when it is well formed but not trusted. A
    /// cancelled or failed certificate fetch is `Error::Unauthorized`.
    #[instrument(skip_all)]
    pub async fn verify_with_cancellation(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Identity> {
        self.verify_inner(token, cancel).await.inspect_err(|e| {
            debug!(target: "securetoken.verifier", error = %e, "ID token rejected");
        })
    }

    async fn verify_inner(&self, token: &str, cancel: &CancellationToken) -> Result<Identity> {
        let decoded = segment::decode(token)?;
        let kid = decoded.header.validated_key_id()?;

        self.claims_validator
            .validate(&decoded.claims, self.clock.now().timestamp())?;

        let key = self
            .key_cache
            .resolve(kid, cancel)
            .await
            .map_err(Rejection::KeyUnavailable)?;

        signature::verify(
            decoded.header_segment,
            decoded.claims_segment,
            decoded.signature_segment,
            &key,
        )?;

        Ok(Identity::from(decoded.claims))
    }
}

#[async_trait]
impl VerifyIdToken for IdTokenVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<Identity> {
        self.verify_with_cancellation(token, &CancellationToken::new())
            .await
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        warn!(target: "securetoken.verifier", error = %e, "Failed to build HTTP client with custom config, using defaults");
        Client::new()
    })
}
