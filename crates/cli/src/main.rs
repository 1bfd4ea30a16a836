use std::net::SocketAddr;
use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use tokenscope_config::AppConfig;
use tokenscope_gateway::AppState;
use tokenscope_sessions::FileSessionStore;

#[derive(Parser)]
#[command(name = "tokenscope", about = "tokenscope — OAuth2 flow diagnostic tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web tool.
    Serve {
        /// Interface to listen on.
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Override TOKENSCOPE_PORT.
        #[arg(long)]
        port: Option<u16>,
        /// Serve plain HTTP instead of HTTPS. Most authorization servers
        /// refuse http redirect URIs; useful only for local poking.
        #[arg(long, default_value_t = false)]
        no_tls: bool,
    },
    /// Print the effective configuration and redirect URI.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tokenscope starting");

    match cli.command {
        Commands::Serve { bind, port, no_tls } => {
            let mut config = AppConfig::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }
            let addr: SocketAddr = format!("{bind}:{}", config.port).parse()?;
            info!(redirect_uri = %config.redirect_uri(), "callback endpoint");

            let store = Arc::new(FileSessionStore::new(config.session_dir.clone())?);
            let state = AppState::new(config, store)?;
            tokenscope_gateway::serve(addr, state, !no_tls).await
        },
        Commands::Config => {
            let config = AppConfig::from_env()?;
            println!("host:            {}", config.host);
            println!("port:            {}", config.port);
            println!("redirect URI:    {}", config.redirect_uri());
            println!("session dir:     {}", config.session_dir.display());
            println!("request timeout: {}s", config.request_timeout.as_secs());
            println!("certificate:     {}", config.cert_path.display());
            println!("private key:     {}", config.key_path.display());
            Ok(())
        },
    }
}
