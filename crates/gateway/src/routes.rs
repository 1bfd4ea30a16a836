use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use tokenscope_oauth::{
    CallbackParams, Error as OAuthError, FlowSession, FlowType, OAuthConfig, TokenSet,
    build_authorization_request, session::keys, validate_callback,
};
use tokenscope_sessions::flash::{self, FlashLevel};

use crate::error::AppError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "tokenscope_session";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/authorize", post(authorize))
        .route("/callback", get(callback))
        .route("/token/client-credentials", get(client_credentials))
        .route("/refresh", post(refresh))
        .route("/api/tokens", get(api_tokens))
        .route("/clear-session", post(clear_session))
        .route("/clear-form", post(clear_form))
        .with_state(state)
}

// ── Session cookie ──────────────────────────────────────────────────────────

fn session_from_jar(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| {
            !id.is_empty()
                && id.len() <= 64
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

fn ensure_session(jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = session_from_jar(&jar) {
        return (jar, id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), id)
}

// ── Views ───────────────────────────────────────────────────────────────────

/// Raw form fields, stored verbatim under `form_config` for redisplay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthorizeForm {
    auth_url: String,
    token_url: String,
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    flow_type: FlowType,
}

impl AuthorizeForm {
    /// An empty secret field means a public client.
    fn to_config(&self) -> OAuthConfig {
        OAuthConfig {
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: (!self.client_secret.is_empty())
                .then(|| SecretString::from(self.client_secret.clone())),
            scope: self.scope.clone(),
            flow_type: self.flow_type,
        }
    }
}

struct FlashView {
    level: &'static str,
    text: String,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    redirect_uri: String,
    flashes: Vec<FlashView>,
    form: AuthorizeForm,
    client_credentials: bool,
    tokens_json: Option<String>,
    has_refresh_token: bool,
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn index(State(app): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let (jar, sid) = ensure_session(jar);
    let store = app.store.as_ref();

    let flashes = flash::drain(store, &sid)
        .await?
        .into_iter()
        .map(|m| FlashView {
            level: match m.level {
                FlashLevel::Success => "success",
                FlashLevel::Error => "error",
                FlashLevel::Info => "info",
            },
            text: m.text,
        })
        .collect();

    let form: AuthorizeForm = match store.get(&sid, keys::FORM_CONFIG).await? {
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => AuthorizeForm::default(),
    };

    let tokens = FlowSession::new(store, &sid).tokens().await?;
    let has_refresh_token = tokens
        .as_ref()
        .and_then(|t| t.refresh_token.as_deref())
        .is_some_and(|t| !t.is_empty());
    let tokens_json = tokens
        .as_ref()
        .map(serde_json::to_string_pretty)
        .transpose()?;

    let page = IndexTemplate {
        redirect_uri: app.config.redirect_uri(),
        flashes,
        client_credentials: form.flow_type == FlowType::ClientCredentials,
        form,
        tokens_json,
        has_refresh_token,
    };
    Ok((jar, Html(page.render()?)).into_response())
}

async fn authorize(
    State(app): State<AppState>,
    jar: CookieJar,
    Form(form): Form<AuthorizeForm>,
) -> Result<Response, AppError> {
    let (jar, sid) = ensure_session(jar);
    let store = app.store.as_ref();
    let session = FlowSession::new(store, &sid);
    let config = form.to_config();

    if let Err(e) = config.validate() {
        flash::push(store, &sid, FlashLevel::Error, e.to_string()).await?;
        return Ok((jar, Redirect::to("/")).into_response());
    }

    session.set_config(&config).await?;
    store
        .set(&sid, keys::FORM_CONFIG, serde_json::to_value(&form)?)
        .await?;

    if config.flow_type == FlowType::ClientCredentials {
        return Ok((jar, Redirect::to("/token/client-credentials")).into_response());
    }

    match build_authorization_request(&config, &app.config.redirect_uri()) {
        Ok(request) => {
            session
                .begin_authorization(&request.state, &request.pkce.verifier)
                .await?;
            info!("redirecting to authorization server");
            Ok((jar, Redirect::to(&request.url)).into_response())
        },
        Err(e) => {
            flash::push(store, &sid, FlashLevel::Error, e.to_string()).await?;
            Ok((jar, Redirect::to("/")).into_response())
        },
    }
}

async fn callback(
    State(app): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let (jar, sid) = ensure_session(jar);
    let store = app.store.as_ref();
    let session = FlowSession::new(store, &sid);

    let outcome: Result<TokenSet, OAuthError> = 'flow: {
        // The pending pair is consumed whatever happens next; a duplicate
        // delivery of this callback finds nothing and fails the state check.
        let Some(pending) = session.take_pending().await? else {
            break 'flow Err(OAuthError::StateMismatch);
        };
        let code = match validate_callback(&params, &pending.state) {
            Ok(code) => code,
            Err(e) => break 'flow Err(e),
        };
        let Some(config) = session.config().await? else {
            break 'flow Err(OAuthError::Config("no OAuth configuration in this session"));
        };
        app.token_client
            .exchange_code(&config, &code, &pending.verifier, &app.config.redirect_uri())
            .await
    };

    match outcome {
        Ok(tokens) => {
            session.set_tokens(&tokens).await?;
            flash::push(store, &sid, FlashLevel::Success, "Token acquired").await?;
        },
        Err(e) => {
            warn!(error = %e, "authorization callback failed");
            flash::push(store, &sid, FlashLevel::Error, e.to_string()).await?;
        },
    }
    Ok((jar, Redirect::to("/")).into_response())
}

async fn client_credentials(
    State(app): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let (jar, sid) = ensure_session(jar);
    let store = app.store.as_ref();
    let session = FlowSession::new(store, &sid);

    let outcome: Result<TokenSet, OAuthError> = 'flow: {
        let Some(config) = session.config().await? else {
            break 'flow Err(OAuthError::Config("no OAuth configuration in this session"));
        };
        app.token_client.exchange_client_credentials(&config).await
    };

    match outcome {
        Ok(tokens) => {
            session.set_tokens(&tokens).await?;
            flash::push(store, &sid, FlashLevel::Success, "Token acquired").await?;
        },
        Err(e) => {
            warn!(error = %e, "client credentials exchange failed");
            flash::push(store, &sid, FlashLevel::Error, e.to_string()).await?;
        },
    }
    Ok((jar, Redirect::to("/")).into_response())
}

async fn refresh(State(app): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let Some(sid) = session_from_jar(&jar) else {
        return Ok(bad_request("no session"));
    };
    let session = FlowSession::new(app.store.as_ref(), &sid);

    let (config, tokens) = match (session.config().await?, session.tokens().await?) {
        (Some(config), Some(tokens)) => (config, tokens),
        _ => return Ok(bad_request("no tokens or configuration in this session")),
    };

    match app.token_client.refresh(&config, &tokens).await {
        Ok(renewed) => {
            session.set_tokens(&renewed).await?;
            Ok(Json(json!({ "success": true, "tokens": renewed })).into_response())
        },
        Err(e) => {
            warn!(error = %e, "token refresh failed");
            Ok(bad_request(&e.to_string()))
        },
    }
}

async fn api_tokens(State(app): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let Some(sid) = session_from_jar(&jar) else {
        return Ok(Json(json!({})).into_response());
    };
    let tokens = app
        .store
        .get(&sid, keys::TOKENS)
        .await?
        .unwrap_or_else(|| json!({}));
    Ok(Json(tokens).into_response())
}

async fn clear_session(State(app): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let (jar, sid) = ensure_session(jar);
    let store = app.store.as_ref();
    FlowSession::new(store, &sid).clear().await?;
    flash::push(store, &sid, FlashLevel::Info, "Session cleared").await?;
    Ok((jar, Redirect::to("/")).into_response())
}

async fn clear_form(State(app): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    if let Some(sid) = session_from_jar(&jar) {
        app.store.delete(&sid, keys::FORM_CONFIG).await?;
    }
    Ok(StatusCode::OK.into_response())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
