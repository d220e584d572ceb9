use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use common::Config;
use newsrewrite::rewrite::{ProviderKey, RewriteOutcome};
use newsrewrite::server::create_rewriter;

/// Rewrite one article with a single provider and print the result.
#[derive(Parser, Debug)]
#[command(name = "try_rewrite")]
struct Args {
    /// Provider key, e.g. openrouter_gpt35
    #[arg(long, default_value = "openrouter_gpt35")]
    api: String,

    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Article text, or a path to a file containing it
    input: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::load_with_defaults(Some(Path::new("config.default.toml")), args.config.as_deref()).await?;
    let article = if Path::new(&args.input).is_file() {
        tokio::fs::read_to_string(&args.input)
            .await
            .with_context(|| format!("failed to read {}", args.input))?
    } else {
        args.input.clone()
    };

    let key: ProviderKey = args.api.parse()?;
    let route = key.route();

    println!("\n{}", "=".repeat(60));
    println!("Provider: {} ({})", key.display_name(), key);
    println!("Backend:  {:?}", route.backend);
    println!("Model:    {}", route.model);
    println!("{}", "=".repeat(60));

    let rewriter = create_rewriter(
        &config,
        std::env::var(config.openrouter_key_env()).ok(),
        std::env::var(config.azure_token_env()).ok(),
    );

    match rewriter.rewrite(&article, &args.api).await? {
        RewriteOutcome::Success(text) => {
            println!("✓ Success!\n");
            println!("{}", text);
        }
        RewriteOutcome::RateLimited => {
            eprintln!("✗ Rate limit reached for {}", key.display_name());
            std::process::exit(1);
        }
        RewriteOutcome::Failure => {
            eprintln!("✗ No result from {}", key.display_name());
            std::process::exit(1);
        }
    }

    println!("\n{}", "=".repeat(60));
    Ok(())
}
