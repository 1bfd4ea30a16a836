pub mod error;
pub mod exchange;
pub mod flow;
pub mod pkce;
pub mod session;
pub mod types;

pub use {
    error::{Error, Result},
    exchange::TokenClient,
    flow::{build_authorization_request, validate_callback},
    pkce::PkceChallenge,
    session::{FlowSession, PendingAuthorization, SessionStore},
    types::{
        AuthorizationRequest, CallbackParams, FlowType, OAuthConfig, TokenSet,
        serialize_option_secret,
    },
};
