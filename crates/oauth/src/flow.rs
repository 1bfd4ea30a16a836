use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::pkce::{CHALLENGE_METHOD, PkceChallenge};
use crate::types::{AuthorizationRequest, CallbackParams, OAuthConfig};

/// Build the authorization redirect for the code flow.
///
/// Validates the config before any state or PKCE material is generated, so
/// a bad config leaves nothing half-created. The caller must persist
/// `state` and `pkce.verifier` against the session before redirecting.
pub fn build_authorization_request(
    config: &OAuthConfig,
    redirect_uri: &str,
) -> Result<AuthorizationRequest> {
    config.validate()?;
    let mut url =
        Url::parse(&config.auth_url).map_err(|_| Error::Config("auth_url is not a valid URL"))?;

    let state = generate_state();
    let pkce = PkceChallenge::generate();

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &config.scope)
        .append_pair("state", &state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", CHALLENGE_METHOD);

    debug!(auth_url = %config.auth_url, "built authorization request");
    Ok(AuthorizationRequest {
        url: url.into(),
        state,
        pkce,
    })
}

/// Validate the callback against the state stored when the flow started.
///
/// Returns the authorization code on success. A provider-reported error
/// takes precedence over the state check; a state mismatch (or absence)
/// beats a missing code. The stored state/verifier pair is single-use
/// regardless of outcome — callers consume it before invoking this, so a
/// replayed callback fails the state check.
pub fn validate_callback(params: &CallbackParams, expected_state: &str) -> Result<String> {
    if let Some(error) = &params.error {
        return Err(Error::Authorization {
            error: error.clone(),
            description: params.error_description.clone(),
        });
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(Error::StateMismatch);
    }
    match params.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(Error::MissingCode),
    }
}

/// 256 bits of OS entropy, base64url without padding. Independent from the
/// PKCE verifier.
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::FlowType;

    fn config() -> OAuthConfig {
        OAuthConfig {
            auth_url: "https://as.example/authorize".into(),
            token_url: "https://as.example/token".into(),
            client_id: "my-client".into(),
            client_secret: None,
            scope: "read write".into(),
            flow_type: FlowType::AuthorizationCode,
        }
    }

    #[test]
    fn test_build_sets_exact_query() {
        let req = build_authorization_request(&config(), "https://localhost:8443/callback")
            .unwrap();
        let url = Url::parse(&req.url).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "my-client");
        assert_eq!(pairs["redirect_uri"], "https://localhost:8443/callback");
        assert_eq!(pairs["scope"], "read write");
        assert_eq!(pairs["state"], req.state);
        assert_eq!(pairs["code_challenge"], req.pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs.len(), 7);
        // Space in the scope must be percent-encoded in the raw URL.
        assert!(req.url.contains("scope=read+write") || req.url.contains("scope=read%20write"));
    }

    #[test]
    fn test_build_preserves_existing_query() {
        let mut cfg = config();
        cfg.auth_url = "https://as.example/authorize?audience=api".into();
        let req = build_authorization_request(&cfg, "https://localhost/callback").unwrap();
        let url = Url::parse(&req.url).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["audience"], "api");
        assert_eq!(pairs["response_type"], "code");
    }

    #[test]
    fn test_build_rejects_missing_client_id() {
        let mut cfg = config();
        cfg.client_id = String::new();
        let err = build_authorization_request(&cfg, "https://localhost/callback").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_rejects_relative_auth_url() {
        let mut cfg = config();
        cfg.auth_url = "/authorize".into();
        let err = build_authorization_request(&cfg, "https://localhost/callback").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_state_independent_of_verifier() {
        let req = build_authorization_request(&config(), "https://localhost/callback").unwrap();
        assert_eq!(req.state.len(), 43);
        assert_ne!(req.state, req.pkce.verifier);
    }

    #[test]
    fn test_callback_provider_error_wins_over_state() {
        let params = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("user said no".into()),
            state: Some("not-the-stored-state".into()),
            code: Some("abc".into()),
        };
        let err = validate_callback(&params, "stored-state").unwrap_err();
        match err {
            Error::Authorization { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("user said no"));
            },
            other => panic!("expected Authorization, got {other:?}"),
        }
    }

    #[test]
    fn test_callback_state_mismatch_with_valid_code() {
        let params = CallbackParams {
            code: Some("abc".into()),
            state: Some("wrong".into()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&params, "right").unwrap_err(),
            Error::StateMismatch
        ));
    }

    #[test]
    fn test_callback_missing_state() {
        let params = CallbackParams {
            code: Some("abc".into()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&params, "expected").unwrap_err(),
            Error::StateMismatch
        ));
    }

    #[test]
    fn test_callback_missing_code() {
        let params = CallbackParams {
            state: Some("expected".into()),
            ..CallbackParams::default()
        };
        assert!(matches!(
            validate_callback(&params, "expected").unwrap_err(),
            Error::MissingCode
        ));
    }

    #[test]
    fn test_callback_success() {
        let params = CallbackParams {
            code: Some("the-code".into()),
            state: Some("expected".into()),
            ..CallbackParams::default()
        };
        assert_eq!(validate_callback(&params, "expected").unwrap(), "the-code");
    }
}
