use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;

use crate::claims::TokenClaims;
use crate::claims::TokenHeader;
use crate::error::Malformed;
use crate::error::SegmentKind;

/// A compact token split into its segments, with header and claims decoded.
///
/// The raw segments are kept as they appeared in the input since the
/// signature covers those exact bytes. The signature segment is left encoded.
#[derive(Debug)]
pub(crate) struct DecodedToken<'a> {
    pub(crate) header_segment: &'a str,
    pub(crate) claims_segment: &'a str,
    pub(crate) signature_segment: &'a str,
    pub(crate) header: TokenHeader,
    pub(crate) claims: TokenClaims,
}

/// Split a compact token and decode its header and claims.
///
/// No semantic checks happen here.
pub(crate) fn decode(token: &str) -> Result<DecodedToken<'_>, Malformed> {
    let segments: Vec<&str> = token.split('.').collect();

    let &[header_segment, claims_segment, signature_segment] = segments.as_slice() else {
        return Err(Malformed::SegmentCount(segments.len()));
    };

    let header = decode_segment(header_segment, SegmentKind::Header)?;
    let claims = decode_segment(claims_segment, SegmentKind::Claims)?;

    Ok(DecodedToken {
        header_segment,
        claims_segment,
        signature_segment,
        header,
        claims,
    })
}

fn decode_segment<T: DeserializeOwned>(segment: &str, kind: SegmentKind) -> Result<T, Malformed> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|error| Malformed::Encoding(kind, error))?;

    serde_json::from_slice(&bytes).map_err(|error| Malformed::Json(kind, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    fn token(header: &str, claims: &str, signature: &str) -> String {
        format!("{}.{}.{}", encode(header), encode(claims), signature)
    }

    #[test]
    fn decodes_header_and_claims_without_touching_signature() {
        let token = token(
            r#"{"alg":"RS256","kid":"abc","typ":"JWT"}"#,
            r#"{"sub":"user-1","aud":"books","exp":10}"#,
            "not*base64*at*all",
        );

        let decoded = decode(&token).unwrap();
        assert_eq!(decoded.header.alg, "RS256");
        assert_eq!(decoded.header.kid, "abc");
        assert_eq!(decoded.claims.subject.sub, "user-1");
        assert_eq!(decoded.claims.aud, "books");
        assert_eq!(decoded.signature_segment, "not*base64*at*all");
    }

    #[test]
    fn keeps_raw_segments() {
        let token = token(r#"{"alg":"RS256"}"#, r#"{"sub":"s"}"#, "c2ln");
        let decoded = decode(&token).unwrap();

        let rebuilt = format!(
            "{}.{}.{}",
            decoded.header_segment, decoded.claims_segment, decoded.signature_segment
        );
        assert_eq!(rebuilt, token);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(decode("abc"), Err(Malformed::SegmentCount(1))));
        assert!(matches!(decode("a.b"), Err(Malformed::SegmentCount(2))));
        assert!(matches!(decode("a.b.c.d"), Err(Malformed::SegmentCount(4))));
    }

    #[test]
    fn semantically_empty_token_still_decodes() {
        let token = token("{}", "{}", "");
        let decoded = decode(&token).unwrap();
        assert!(decoded.header.kid.is_empty());
        assert_eq!(decoded.claims.exp, 0);
    }

    #[test]
    fn rejects_non_base64url_header() {
        let token = format!("{}.{}.sig", "eyJ+/=", encode("{}"));
        assert!(matches!(
            decode(&token),
            Err(Malformed::Encoding(SegmentKind::Header, _))
        ));
    }

    #[test]
    fn rejects_padded_segments() {
        // "{}" encodes to "e30" and would be "e30=" with padding
        let token = format!("e30=.{}.sig", encode("{}"));
        assert!(matches!(
            decode(&token),
            Err(Malformed::Encoding(SegmentKind::Header, _))
        ));
    }

    #[test]
    fn rejects_non_json_claims() {
        let token = format!("{}.{}.sig", encode("{}"), encode("not json"));
        assert!(matches!(
            decode(&token),
            Err(Malformed::Json(SegmentKind::Claims, _))
        ));
    }

    #[test]
    fn rejects_claims_with_wrong_types() {
        let token = token("{}", r#"{"exp":"tomorrow"}"#, "sig");
        assert!(matches!(
            decode(&token),
            Err(Malformed::Json(SegmentKind::Claims, _))
        ));
    }
}
