use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

use tokenscope_config::AppConfig;

/// Load the configured certificate pair, self-signing one first if neither
/// file exists yet.
pub async fn rustls_config(config: &AppConfig) -> anyhow::Result<RustlsConfig> {
    if !config.cert_path.exists() || !config.key_path.exists() {
        self_sign(config)?;
    }
    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .with_context(|| {
            format!(
                "loading TLS certificate from {} / {}",
                config.cert_path.display(),
                config.key_path.display()
            )
        })
}

fn self_sign(config: &AppConfig) -> anyhow::Result<()> {
    let certified = rcgen::generate_simple_self_signed(vec![config.host.clone()])
        .context("generating self-signed certificate")?;
    for path in [&config.cert_path, &config.key_path] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(&config.cert_path, certified.cert.pem())
        .with_context(|| format!("writing {}", config.cert_path.display()))?;
    std::fs::write(&config.key_path, certified.key_pair.serialize_pem())
        .with_context(|| format!("writing {}", config.key_path.display()))?;
    info!(
        cert = %config.cert_path.display(),
        host = %config.host,
        "generated self-signed certificate"
    );
    Ok(())
}
