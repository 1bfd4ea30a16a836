use std::net::SocketAddr;

use tracing::info;

use crate::routes;
use crate::state::AppState;

/// Bind the listener and serve until shutdown.
///
/// TLS is the normal mode: authorization servers redirect to an https
/// callback. Plain HTTP stays available for local poking.
pub async fn serve(bind: SocketAddr, state: AppState, use_tls: bool) -> anyhow::Result<()> {
    if use_tls {
        return serve_tls(bind, state).await;
    }
    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "listening (http)");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "tls")]
async fn serve_tls(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let rustls = crate::tls::rustls_config(&state.config).await?;
    let app = routes::router(state);
    info!(%bind, "listening (https)");
    axum_server::bind_rustls(bind, rustls)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(not(feature = "tls"))]
async fn serve_tls(_bind: SocketAddr, _state: AppState) -> anyhow::Result<()> {
    anyhow::bail!("tokenscope was built without the tls feature; pass --no-tls")
}
