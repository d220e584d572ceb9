/*
newsrewrite - single-binary main.rs
This binary loads configuration and secrets, then starts the Rocket HTTP server.
*/

use anyhow::Result;
use clap::Parser;
use common::{mask, Config, Secrets};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsrewrite::server;

#[derive(Parser, Debug)]
#[command(name = "newsrewrite", about = "News rewrite and publishing server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env is optional; real environment variables win
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if dotenv_loaded {
        info!("loaded environment from .env");
    }

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // Missing CMS credentials or password hash abort startup here
    let secrets = match Secrets::resolve(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "failed to resolve secrets");
            return Err(e);
        }
    };
    info!(
        openrouter_key = %mask(secrets.openrouter_api_key.as_deref()),
        github_token = %mask(secrets.github_token.as_deref()),
        wordpress_site = %secrets.wordpress_site_url,
        wordpress_token = %mask(Some(&secrets.wordpress_api_token)),
        session_token_file = %secrets.session_token_file.display(),
        "secrets resolved"
    );

    let state = server::build_state(&config, &secrets).await?;

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(&config, state).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
