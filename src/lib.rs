//! # Securetoken
//!
//! Verification of Firebase ID tokens (JWTs issued by `securetoken.google.com`)
//! without a vendor SDK.
//!
//! ## Features
//!
//! - Compact JWT decoding with a strict RS256 header check
//! - Subject, audience, issuer and expiration validation against a Firebase project
//! - RSA PKCS#1 v1.5 / SHA-256 signature verification
//! - Signing certificates fetched from Google and cached for as long as the
//!   response's `Cache-Control: max-age` allows
//! - One forced refresh when a token names an unknown key id, to pick up key rotation
//!
//! Verification fails with one of two kinds of error: [`Error::InvalidToken`]
//! when the input is not a well-formed token, and [`Error::Unauthorized`] when
//! it is well formed but must not be trusted.
//!
//! ## Example
//!
//! ```rust,no_run
//! use securetoken::{IdTokenVerifier, VerifierConfig, VerifyIdToken};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VerifierConfig::new("my-firebase-project")
//!         .with_request_timeout(Duration::from_secs(5));
//!
//!     let verifier = IdTokenVerifier::new(config)?;
//!
//!     let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Ii4uLiJ9...";
//!     let identity = verifier.verify_id_token(token).await?;
//!
//!     println!("User: {}", identity.user_id);
//!     println!("Email: {} (verified: {})", identity.email, identity.email_verified);
//!
//!     Ok(())
//! }
//! ```

mod claims;
mod clock;
mod config;
mod error;
mod extractor;
mod key_cache;
mod segment;
mod signature;
mod verifier;

// Re-exports for public API
pub use claims::SubjectClaims;
pub use claims::TokenClaims;
pub use claims::TokenHeader;
pub use claims::ISSUER_PREFIX;
pub use clock::Clock;
pub use clock::SystemClock;
pub use config::ConfigError;
pub use config::VerifierConfig;
pub use config::CERTIFICATES_URL;
pub use error::Error;
pub use error::KeyCacheError;
pub use error::Malformed;
pub use error::Rejection;
pub use error::Result;
pub use error::SegmentKind;
pub use extractor::bearer_token;
pub use key_cache::CertificateBundle;
pub use key_cache::CertificateSource;
pub use key_cache::HttpCertificateSource;
pub use key_cache::KeyCache;
pub use verifier::IdTokenVerifier;
pub use verifier::Identity;
pub use verifier::VerifyIdToken;
