/// Errors produced while driving an OAuth flow.
///
/// Every variant carries enough detail to diagnose the failure at the
/// boundary; token endpoint rejections keep the raw response body verbatim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required configuration field is missing, empty, or malformed.
    #[error("invalid OAuth configuration: {0}")]
    Config(&'static str),

    /// The authorization server redirected back with an error code.
    #[error("authorization error: {error}{}", .description.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
    Authorization {
        error: String,
        description: Option<String>,
    },

    /// The callback `state` was absent, already consumed, or did not match.
    #[error("state parameter missing or mismatched")]
    StateMismatch,

    /// The callback carried neither an error nor an authorization code.
    #[error("authorization callback carried no code")]
    MissingCode,

    /// A refresh was requested but the stored token set has no refresh token.
    #[error("stored token set has no refresh token")]
    MissingRefreshToken,

    /// The token endpoint rejected the authorization-code or
    /// client-credentials exchange.
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The token endpoint rejected a refresh.
    #[error("token refresh returned HTTP {status}: {body}")]
    Refresh { status: u16, body: String },

    /// DNS, connect, TLS, or timeout failure before a response was read.
    #[error("transport failure talking to the token endpoint")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
