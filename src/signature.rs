use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::crypto;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;

use crate::error::Rejection;

/// Verify the RS256 signature of a token against a resolved key.
///
/// The signing input is `header_segment + "." + claims_segment` exactly as
/// they appeared in the token. The signature is SHA-256 with RSA PKCS#1 v1.5.
pub(crate) fn verify(
    header_segment: &str,
    claims_segment: &str,
    signature_segment: &str,
    key: &DecodingKey,
) -> Result<(), Rejection> {
    // An undecodable signature is reported separately from a mismatch
    URL_SAFE_NO_PAD
        .decode(signature_segment)
        .map_err(|_| Rejection::SignatureEncoding)?;

    let signing_input = format!("{header_segment}.{claims_segment}");

    if crypto::verify(
        signature_segment,
        signing_input.as_bytes(),
        key,
        Algorithm::RS256,
    )? {
        Ok(())
    } else {
        Err(Rejection::SignatureMismatch)
    }
}
