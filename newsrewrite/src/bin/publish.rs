use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use common::{Config, Secrets};
use newsrewrite::cms::{PublishOutcome, PublishRequest};
use newsrewrite::server::create_publisher;

/// Publish an article (first line title, rest body) to the configured WordPress site.
#[derive(Parser, Debug)]
#[command(name = "publish")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Category names to attach
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Article text, or a path to a file containing it
    input: String,
}

async fn run(args: Args) -> anyhow::Result<PublishOutcome> {
    let config = Config::load_with_defaults(Some(Path::new("config.default.toml")), args.config.as_deref()).await?;
    let secrets = Secrets::resolve(&config)?;
    let (_, publisher) = create_publisher(&config, &secrets)?;

    let article_text = if Path::new(&args.input).is_file() {
        tokio::fs::read_to_string(&args.input).await?
    } else {
        args.input
    };
    if article_text.trim().is_empty() {
        anyhow::bail!("News content is empty");
    }

    let outcome = publisher
        .publish(PublishRequest {
            article_text,
            category_names: args.categories,
            ..Default::default()
        })
        .await?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    match run(args).await {
        Ok(PublishOutcome::Success { permalink, post_id }) => {
            println!("News published successfully: {}", permalink);
            if let Some(id) = post_id {
                println!("Post ID: {}", id);
            }
            ExitCode::SUCCESS
        }
        Ok(PublishOutcome::Error(msg)) => {
            eprintln!("Error publishing news: {}", msg);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
