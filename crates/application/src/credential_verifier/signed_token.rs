use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use rpcguard_core::AuthFailure;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RpcTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<TokenAudience>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenAudience {
    Single(String),
    Many(Vec<String>),
}

impl TokenAudience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(value) => value == expected,
            Self::Many(values) => values.iter().any(|value| value == expected),
        }
    }
}

/// Checks the audience, then the signature (and `exp`, when present, with no
/// leeway), and returns the subject claim.
///
/// A foreign audience is rejected before the signature is looked at.
pub(super) fn decode_subject(
    token: &str,
    decoding_key: &DecodingKey,
    expected_audience: &str,
) -> Result<String, AuthFailure> {
    let mut unverified = Validation::new(Algorithm::HS256);
    unverified.insecure_disable_signature_validation();
    unverified.validate_exp = false;
    unverified.validate_aud = false;
    unverified.required_spec_claims.clear();

    let audience_matches = jsonwebtoken::decode::<RpcTokenClaims>(token, decoding_key, &unverified)
        .map_err(|error| AuthFailure::MalformedCredential {
            reason: format!("signed token could not be decoded: {error}"),
        })?
        .claims
        .aud
        .as_ref()
        .is_some_and(|audience| audience.contains(expected_audience));
    if !audience_matches {
        return Err(AuthFailure::WrongAudience {
            expected: expected_audience.to_owned(),
        });
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = jsonwebtoken::decode::<RpcTokenClaims>(token, decoding_key, &validation)
        .map_err(|error| match error.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::ImmatureSignature => AuthFailure::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthFailure::ExpiredCredential,
            _ => AuthFailure::MalformedCredential {
                reason: format!("signed token could not be decoded: {error}"),
            },
        })?
        .claims;

    claims
        .sub
        .filter(|subject| !subject.trim().is_empty())
        .ok_or_else(|| AuthFailure::MalformedCredential {
            reason: "signed token has no subject".to_owned(),
        })
}
