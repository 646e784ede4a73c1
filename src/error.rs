use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the verifier.
///
/// Verification only ever fails with [`Error::InvalidToken`] (the caller sent
/// something that is not a token of the expected shape) or
/// [`Error::Unauthorized`] (the token is well formed but must not be trusted).
/// The remaining variants are raised while constructing a verifier.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] Malformed),
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] Rejection),
    #[error("No Firebase project id configured - tokens cannot be matched against an audience")]
    ProjectIdMissing,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// True when the input was not a well-formed token.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Error::InvalidToken(_))
    }

    /// True when the token was well formed but rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

/// Which of the two decoded segments a decoding failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Header,
    Claims,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Header => f.write_str("header"),
            SegmentKind::Claims => f.write_str("claims"),
        }
    }
}

/// Structural problems with the presented token.
#[derive(Error, Debug)]
pub enum Malformed {
    #[error("Expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),
    #[error("The {0} segment is not valid base64url: {1}")]
    Encoding(SegmentKind, #[source] base64::DecodeError),
    #[error("The {0} segment is not valid JSON: {1}")]
    Json(SegmentKind, #[source] serde_json::Error),
    #[error("Only RS256 signed tokens are accepted, got: {0:?}")]
    AlgorithmNotSupported(String),
    #[error("Missing 'kid' in the header of the provided JWT")]
    KeyIdMissing,
    #[error("The provided JWT carries no subject")]
    SubjectMissing,
    #[error("No bearer token in the Authorization header")]
    BearerMissing,
}

/// Reasons a well-formed token is not trusted.
#[derive(Error, Debug)]
pub enum Rejection {
    #[error("The provided JWT does not match the configured project. Provided audience: {0}")]
    WrongAudience(String),
    #[error("The provided JWT does not match the expected issuer. Provided issuer: {0}")]
    WrongIssuer(String),
    #[error("The provided JWT has no expiration")]
    ExpirationMissing,
    #[error("The provided JWT has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("No trusted signing key: {0}")]
    KeyUnavailable(#[from] KeyCacheError),
    #[error("The signature segment is not valid base64url")]
    SignatureEncoding,
    #[error("The signature does not match the signing input")]
    SignatureMismatch,
    #[error("The email address of the authenticated user is not verified")]
    EmailNotVerified,
    #[error("Signature check failed: {0}")]
    SignatureCheck(#[from] jsonwebtoken::errors::Error),
}

/// Failures inside the signing key cache.
#[derive(Error, Debug)]
pub enum KeyCacheError {
    #[error("Failed to fetch signing certificates: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Failed to decode signing certificates: {0}")]
    Body(#[source] reqwest::Error),
    #[error("Certificate endpoint responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("Certificate response contained no usable RSA keys")]
    NoUsableKeys,
    #[error("Certificate fetch was cancelled")]
    Cancelled,
    #[error("Key {0:?} is not among the trusted signing keys")]
    UnknownKeyId(String),
}

pub(crate) fn fetch_certificates_error(error: reqwest::Error) -> KeyCacheError {
    KeyCacheError::Request(error)
}

pub(crate) fn decode_certificates_error(error: reqwest::Error) -> KeyCacheError {
    KeyCacheError::Body(error)
}
