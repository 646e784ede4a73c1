use serde::Deserialize;
use serde::Deserializer;

use crate::error::Malformed;
use crate::error::Rejection;
use crate::error::Result;

/// Issuer prefix of every Firebase ID token; the project id is appended.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

const SUPPORTED_ALGORITHM: &str = "RS256";

/// JOSE header of an ID token
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenHeader {
    /// Signing algorithm
    #[serde(deserialize_with = "null_as_default")]
    pub alg: String,
    /// Id of the key that signed the token
    #[serde(deserialize_with = "null_as_default")]
    pub kid: String,
    /// Token type, usually "JWT"
    #[serde(deserialize_with = "null_as_default")]
    pub typ: String,
}

impl TokenHeader {
    /// Check the header can only describe an RS256 signature made by a named
    /// key, returning that key id.
    pub(crate) fn validated_key_id(&self) -> std::result::Result<&str, Malformed> {
        if self.alg != SUPPORTED_ALGORITHM {
            return Err(Malformed::AlgorithmNotSupported(self.alg.clone()));
        }

        if self.kid.is_empty() {
            return Err(Malformed::KeyIdMissing);
        }

        Ok(&self.kid)
    }
}

/// The two claims that can identify the user.
///
/// Firebase always sets `sub`, and additionally sets `user_id` which can carry
/// a differently formatted internal id. When `user_id` is present and
/// non-empty it takes precedence over `sub`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubjectClaims {
    #[serde(deserialize_with = "null_as_default")]
    pub sub: String,
    pub user_id: Option<String>,
}

impl SubjectClaims {
    /// The user id the rest of the system should use.
    pub fn effective_user_id(&self) -> &str {
        match self.user_id.as_deref() {
            Some(user_id) if !user_id.is_empty() => user_id,
            _ => &self.sub,
        }
    }
}

/// Payload of a Firebase ID token
///
/// Missing claims deserialize to their empty values and are rejected during
/// validation where they matter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    /// Audience - the Firebase project id
    #[serde(deserialize_with = "null_as_default")]
    pub aud: String,
    /// Issuer - `https://securetoken.google.com/<project id>`
    #[serde(deserialize_with = "null_as_default")]
    pub iss: String,
    /// Expiration time as Unix timestamp
    #[serde(deserialize_with = "null_as_default")]
    pub exp: i64,
    /// Issued at as Unix timestamp
    #[serde(deserialize_with = "null_as_default")]
    pub iat: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email_verified: bool,
    #[serde(flatten)]
    pub subject: SubjectClaims,
}

/// Treats an explicit JSON `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Checks decoded claims against the configured project.
#[derive(Debug, Clone)]
pub(crate) struct ClaimsValidator {
    project_id: String,
    expected_issuer: String,
}

impl ClaimsValidator {
    pub(crate) fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            expected_issuer: format!("{ISSUER_PREFIX}{project_id}"),
        }
    }

    /// Validate claims in order: subject, audience, issuer, expiry.
    ///
    /// `now` is a Unix timestamp. A token whose `exp` equals `now` is still
    /// valid; there is no leeway beyond that.
    pub(crate) fn validate(&self, claims: &TokenClaims, now: i64) -> Result<()> {
        if claims.subject.sub.is_empty() {
            return Err(Malformed::SubjectMissing.into());
        }

        if claims.aud != self.project_id {
            return Err(Rejection::WrongAudience(claims.aud.clone()).into());
        }

        if claims.iss != self.expected_issuer {
            return Err(Rejection::WrongIssuer(claims.iss.clone()).into());
        }

        if claims.exp == 0 {
            return Err(Rejection::ExpirationMissing.into());
        }

        if now > claims.exp {
            return Err(Rejection::TokenExpired(claims.exp).into());
        }

        Ok(())
    }
}
