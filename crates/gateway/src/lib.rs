pub mod error;
pub mod routes;
pub mod server;
pub mod state;
#[cfg(feature = "tls")]
pub mod tls;

pub use {server::serve, state::AppState};
