use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Store or template failures bubble up here and become a 500; protocol
/// errors never do — handlers turn those into flash messages so the
/// operator can read the diagnostics.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = ?self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
