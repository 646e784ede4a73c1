use tracing::debug;

use crate::error::Malformed;
use crate::error::Rejection;
use crate::error::Result;
use crate::verifier::Identity;
use crate::verifier::IdTokenVerifier;
use crate::verifier::VerifyIdToken;

/// Extract the token from an `Authorization` header value.
///
/// Expects `Bearer <token>`, with the scheme matched case-insensitively.
/// Returns `None` for any other scheme or an empty token.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl IdTokenVerifier {
    /// Verify the bearer token carried by an `Authorization` header
    ///
    /// Unless disabled with `VerifierConfig::with_require_verified_email`, an
    /// identity whose email is not verified is rejected.
    ///
    /// # Errors
    /// Returns `Error::InvalidToken` if the header is absent or carries no
    /// bearer token, `Error::Unauthorized` with `Rejection::EmailNotVerified`
    /// for an unverified email, otherwise whatever verifying the token returns.
    pub async fn verify_bearer(&self, authorization: Option<&str>) -> Result<Identity> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(Malformed::BearerMissing)?;

        let identity = self.verify_id_token(token).await?;

        if self.requires_verified_email() && !identity.email_verified {
            debug!(target: "securetoken.verifier", "Bearer token rejected, email not verified");
            return Err(Rejection::EmailNotVerified.into());
        }

        Ok(identity)
    }
}
