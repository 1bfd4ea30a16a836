use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Which grant the operator asked the tool to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[default]
    AuthorizationCode,
    ClientCredentials,
}

/// Operator-supplied OAuth 2.0 client configuration.
///
/// Lives in the session until explicitly cleared; treated as immutable once
/// an authorization request or token exchange has started against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    /// Presence selects confidential-client behavior at the token endpoint.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub flow_type: FlowType,
}

impl OAuthConfig {
    /// Check the fields every flow needs before any material is generated
    /// or any request is sent.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.auth_url.trim().is_empty() {
            return Err(crate::error::Error::Config("auth_url is required"));
        }
        if self.token_url.trim().is_empty() {
            return Err(crate::error::Error::Config("token_url is required"));
        }
        if self.client_id.trim().is_empty() {
            return Err(crate::error::Error::Config("client_id is required"));
        }
        Ok(())
    }
}

/// Serialize a secret by exposing it. Session storage needs the secret to
/// round-trip; it never goes to logs.
pub fn serialize_option_secret<S>(
    value: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Everything the caller must persist before redirecting the user agent.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Fully assembled authorization URL to redirect to.
    pub url: String,
    /// Anti-CSRF token to store against the session.
    pub state: String,
    /// PKCE pair; the verifier is needed again at token exchange.
    pub pkce: crate::pkce::PkceChallenge,
}

/// Query parameters delivered to the redirect URI by the authorization
/// server. `error` and `code` are mutually exclusive in practice; `error`
/// wins during validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A token endpoint response: the RFC 6749 fields plus whatever else the
/// provider sent, kept verbatim for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validate_missing_client_id() {
        let config = OAuthConfig {
            auth_url: "https://as.example/authorize".into(),
            token_url: "https://as.example/token".into(),
            client_id: "".into(),
            client_secret: None,
            scope: String::new(),
            flow_type: FlowType::AuthorizationCode,
        };
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Config("client_id is required"))
        ));
    }

    #[test]
    fn test_config_secret_round_trips_through_json() {
        let config = OAuthConfig {
            auth_url: "https://as.example/authorize".into(),
            token_url: "https://as.example/token".into(),
            client_id: "abc".into(),
            client_secret: Some(SecretString::from("s3cret".to_string())),
            scope: "openid".into(),
            flow_type: FlowType::ClientCredentials,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["client_secret"], "s3cret");
        assert_eq!(value["flow_type"], "client_credentials");

        let back: OAuthConfig = serde_json::from_value(value).unwrap();
        assert_eq!(
            back.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("s3cret")
        );
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = OAuthConfig {
            auth_url: "https://as.example/authorize".into(),
            token_url: "https://as.example/token".into(),
            client_id: "abc".into(),
            client_secret: Some(SecretString::from("s3cret".to_string())),
            scope: String::new(),
            flow_type: FlowType::AuthorizationCode,
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_token_set_keeps_unknown_fields() {
        let body = serde_json::json!({
            "access_token": "at",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": "eyJ...",
            "foo": {"bar": 1},
        });
        let tokens: TokenSet = serde_json::from_value(body).unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.expires_in, Some(3600));
        assert!(tokens.refresh_token.is_none());
        assert_eq!(tokens.extra["id_token"], "eyJ...");
        assert_eq!(tokens.extra["foo"]["bar"], 1);

        // And they survive re-serialization for display.
        let out = serde_json::to_value(&tokens).unwrap();
        assert_eq!(out["id_token"], "eyJ...");
        assert!(out.get("refresh_token").is_none());
    }
}
