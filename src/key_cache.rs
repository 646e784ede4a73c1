use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

use crate::clock::Clock;
use crate::error::decode_certificates_error;
use crate::error::fetch_certificates_error;
use crate::error::KeyCacheError;

/// Raw response of the certificate endpoint.
#[derive(Debug, Clone, Default)]
pub struct CertificateBundle {
    /// Key id to PEM encoded X.509 certificate
    pub certificates: HashMap<String, String>,
    /// Value of the `Cache-Control` response header, if any
    pub cache_control: Option<String>,
}

/// Where the key cache gets its certificates from.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the current certificate bundle.
    async fn fetch(&self) -> Result<CertificateBundle, KeyCacheError>;
}

/// Fetches certificates over HTTP(S) from a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpCertificateSource {
    url: String,
    client: Client,
}

impl HttpCertificateSource {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl CertificateSource for HttpCertificateSource {
    async fn fetch(&self) -> Result<CertificateBundle, KeyCacheError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(fetch_certificates_error)?;

        if response.status() != StatusCode::OK {
            return Err(KeyCacheError::Status(response.status()));
        }

        let cache_control = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let certificates = response
            .json::<HashMap<String, String>>()
            .await
            .map_err(decode_certificates_error)?;

        Ok(CertificateBundle {
            certificates,
            cache_control,
        })
    }
}

/// The currently trusted keys together with their expiry.
///
/// Either empty (never fetched) or the complete result of one successful
/// fetch. Refreshes replace the whole set.
struct KeySet {
    keys: HashMap<String, Arc<DecodingKey>>,
    expires_at: DateTime<Utc>,
}

impl KeySet {
    fn empty() -> Self {
        Self {
            keys: HashMap::new(),
            expires_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.keys.is_empty() || now > self.expires_at
    }

    fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys.get(kid).cloned()
    }
}

/// Cache of the RSA keys trusted to sign ID tokens.
///
/// Refreshed lazily when a lookup finds the set empty or expired, and forced
/// once when a key id is unknown. A single lock serializes lookups and
/// refreshes, so a refresh blocks concurrent lookups until it completes.
pub struct KeyCache {
    key_set: Mutex<KeySet>,
    source: Arc<dyn CertificateSource>,
    clock: Arc<dyn Clock>,
    default_max_age: Duration,
}

impl KeyCache {
    /// Create an empty cache.
    ///
    /// `default_max_age` applies when a response carries no usable
    /// `Cache-Control: max-age`.
    pub fn new(
        source: Arc<dyn CertificateSource>,
        clock: Arc<dyn Clock>,
        default_max_age: Duration,
    ) -> Self {
        Self {
            key_set: Mutex::new(KeySet::empty()),
            source,
            clock,
            default_max_age,
        }
    }

    /// Get the key trusted for `kid`, fetching certificates when needed.
    ///
    /// # Errors
    /// Returns the refresh error if a needed fetch fails or is cancelled, and
    /// `KeyCacheError::UnknownKeyId` if the key id is still unknown after one
    /// forced refresh.
    pub async fn resolve(
        &self,
        kid: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<DecodingKey>, KeyCacheError> {
        let mut key_set = self.key_set.lock().await;

        if key_set.is_stale(self.clock.now()) {
            self.refresh(&mut key_set, cancel).await?;
        }

        if let Some(key) = key_set.get(kid) {
            return Ok(key);
        }

        debug!(target: "securetoken.key_cache", kid = %kid, "Key id not cached, forcing refresh");
        self.refresh(&mut key_set, cancel).await?;

        key_set.get(kid).ok_or_else(|| {
            warn!(target: "securetoken.key_cache", kid = %kid, "Key id unknown after refresh");
            KeyCacheError::UnknownKeyId(kid.to_string())
        })
    }

    /// Expiry of the cached key set, `None` until the first successful fetch.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        let key_set = self.key_set.lock().await;
        (!key_set.keys.is_empty()).then_some(key_set.expires_at)
    }

    /// Replace the key set with a freshly fetched one.
    ///
    /// Must be called with the lock held. On failure the current set is left
    /// untouched.
    async fn refresh(
        &self,
        key_set: &mut KeySet,
        cancel: &CancellationToken,
    ) -> Result<(), KeyCacheError> {
        debug!(target: "securetoken.key_cache", "Fetching signing certificates");

        let bundle = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(target: "securetoken.key_cache", "Certificate fetch cancelled");
                return Err(KeyCacheError::Cancelled);
            }
            bundle = self.source.fetch() => bundle.map_err(|e| {
                warn!(target: "securetoken.key_cache", error = %e, "Failed to fetch signing certificates");
                e
            })?,
        };

        let keys = parse_certificates(&bundle.certificates);
        if keys.is_empty() {
            warn!(
                target: "securetoken.key_cache",
                entries = bundle.certificates.len(),
                "Certificate response contained no usable RSA keys"
            );
            return Err(KeyCacheError::NoUsableKeys);
        }

        let max_age = parse_max_age(bundle.cache_control.as_deref()).unwrap_or(self.default_max_age);
        let now = self.clock.now();
        let expires_at = expiry_after(now, max_age)
            .or_else(|| expiry_after(now, self.default_max_age))
            .unwrap_or(now);

        debug!(
            target: "securetoken.key_cache",
            keys = keys.len(),
            expires_at = %expires_at,
            "Signing certificates refreshed"
        );

        *key_set = KeySet { keys, expires_at };
        Ok(())
    }
}

fn expiry_after(now: DateTime<Utc>, max_age: Duration) -> Option<DateTime<Utc>> {
    now.checked_add_signed(TimeDelta::from_std(max_age).ok()?)
}

fn parse_certificates(certificates: &HashMap<String, String>) -> HashMap<String, Arc<DecodingKey>> {
    certificates
        .iter()
        .filter_map(|(kid, pem)| match rsa_key_from_certificate(pem) {
            Some(key) => Some((kid.clone(), Arc::new(key))),
            None => {
                debug!(target: "securetoken.key_cache", kid = %kid, "Skipping certificate without an RSA public key");
                None
            }
        })
        .collect()
}

/// Extract the RSA public key of a PEM encoded X.509 certificate.
///
/// Returns `None` for anything that is not a certificate with an RSA key.
pub(crate) fn rsa_key_from_certificate(pem: &str) -> Option<DecodingKey> {
    let (_, pem) = parse_x509_pem(pem.as_bytes()).ok()?;
    let certificate = pem.parse_x509().ok()?;

    match certificate.public_key().parsed().ok()? {
        PublicKey::RSA(rsa) => Some(DecodingKey::from_rsa_raw_components(
            strip_leading_zeros(rsa.modulus),
            strip_leading_zeros(rsa.exponent),
        )),
        _ => None,
    }
}

// DER integers carry a sign byte that the RSA verifier rejects
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Parse the `max-age` directive of a `Cache-Control` header.
///
/// Only positive values count; zero, negative or malformed values are
/// treated like a missing directive.
pub(crate) fn parse_max_age(cache_control: Option<&str>) -> Option<Duration> {
    cache_control?
        .split(',')
        .filter_map(|directive| directive.trim().split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("max-age"))
        .find_map(|(_, value)| value.trim().parse::<u64>().ok().filter(|&secs| secs > 0))
        .map(Duration::from_secs)
}
