#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use mockito::{Mock, ServerGuard};
use securetoken::{CertificateBundle, CertificateSource, Clock, KeyCacheError};
use serde::Serialize;

pub const PROJECT_ID: &str = "books-prod";

const KEY_A: &str = include_str!("../fixtures/signing_key_a.pem");
const CERT_A: &str = include_str!("../fixtures/signing_cert_a.pem");
const KEY_B: &str = include_str!("../fixtures/signing_key_b.pem");
const CERT_B: &str = include_str!("../fixtures/signing_cert_b.pem");
pub const EC_CERT: &str = include_str!("../fixtures/ec_cert.pem");

/// Test RSA key pair with its self-signed certificate
#[derive(Clone)]
pub struct TestKeyPair {
    pub encoding_key: EncodingKey,
    pub kid: String,
    pub certificate_pem: String,
}

fn keypair(kid: &str, private_pem: &str, certificate_pem: &str) -> TestKeyPair {
    TestKeyPair {
        encoding_key: EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("Failed to create encoding key"),
        kid: kid.to_string(),
        certificate_pem: certificate_pem.to_string(),
    }
}

/// The primary signing key (fresh test key, DO NOT use in production)
pub fn key_a() -> TestKeyPair {
    keypair("key-a", KEY_A, CERT_A)
}

/// A second signing key, used to model rotation
pub fn key_b() -> TestKeyPair {
    keypair("key-b", KEY_B, CERT_B)
}

/// Certificate endpoint body for the given keys
pub fn certificates_body(keys: &[&TestKeyPair]) -> String {
    let map: HashMap<&str, &str> = keys
        .iter()
        .map(|k| (k.kid.as_str(), k.certificate_pem.as_str()))
        .collect();
    serde_json::to_string(&map).unwrap()
}

/// Create a signed test JWT with custom claims
pub fn create_test_jwt<T: Serialize>(claims: &T, keypair: &TestKeyPair) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(keypair.kid.clone());

    jsonwebtoken::encode(&header, claims, &keypair.encoding_key).expect("Failed to encode JWT")
}

/// Firebase-shaped test claims
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
}

impl TestClaims {
    /// Valid claims for `PROJECT_ID` that expire one hour after `now`
    pub fn valid_at(now: i64) -> Self {
        Self {
            iss: format!("https://securetoken.google.com/{PROJECT_ID}"),
            aud: PROJECT_ID.to_string(),
            sub: "firebase-uid-1".to_string(),
            user_id: Some("firebase-uid-1".to_string()),
            exp: now + 3600,
            iat: now,
            email: "reader@example.com".to_string(),
            name: "Avid Reader".to_string(),
            email_verified: true,
        }
    }

    pub fn valid() -> Self {
        Self::valid_at(Utc::now().timestamp())
    }
}

/// Mock certificate endpoint counting how often it is hit
pub struct CertServer {
    pub server: ServerGuard,
    pub fetches: Arc<AtomicU32>,
    mock: Mock,
}

impl CertServer {
    pub fn url(&self) -> String {
        format!("{}/certs", self.server.url())
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// Setup a mock server serving the certificates of `keys`
pub async fn setup_cert_server(keys: &[&TestKeyPair], cache_control: &str) -> CertServer {
    setup_cert_server_with_body(certificates_body(keys), cache_control).await
}

pub async fn setup_cert_server_with_body(body: String, cache_control: &str) -> CertServer {
    let mut server = mockito::Server::new_async().await;
    let fetches = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fetches);
    let mock = server
        .mock("GET", "/certs")
        .with_status(200)
        .with_header("content-type", "application/json; charset=UTF-8")
        .with_header("cache-control", cache_control)
        .with_body_from_request(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            body.clone().into()
        })
        .create_async()
        .await;

    CertServer {
        server,
        fetches,
        mock,
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn at(timestamp: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(timestamp),
        })
    }

    pub fn timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp(), 0).unwrap()
    }
}

/// Certificate source replaying scripted responses
///
/// Each fetch takes the next scripted response; the last one repeats.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Response>>,
    fetches: AtomicU32,
}

#[derive(Clone)]
pub enum Response {
    Keys(Vec<TestKeyPair>, Option<String>),
    Unavailable,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Response>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            fetches: AtomicU32::new(0),
        })
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateSource for ScriptedSource {
    async fn fetch(&self) -> Result<CertificateBundle, KeyCacheError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            }
        };

        match response {
            Response::Keys(keys, cache_control) => Ok(CertificateBundle {
                certificates: keys
                    .iter()
                    .map(|k| (k.kid.clone(), k.certificate_pem.clone()))
                    .collect(),
                cache_control,
            }),
            Response::Unavailable => Err(KeyCacheError::Status(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            )),
        }
    }
}
