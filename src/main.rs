use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedwright::config::Config;
use feedwright::feed::{find_subscriptions, parse_feed, FinderOptions};
use feedwright::http::RequestBuilder;
use feedwright::proxy::ImageProxy;
use feedwright::sanitizer::Sanitizer;

/// Default config location (~/.config/feedwright/feedwright.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedwright")
        .join("feedwright.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "feedwright", about = "Fetch, normalize and sanitize syndication feeds")]
struct Args {
    /// Config file (defaults to ~/.config/feedwright/feedwright.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, parse and sanitize a feed, printing JSON
    Fetch {
        url: String,

        /// ETag from the previous fetch
        #[arg(long, default_value = "")]
        etag: String,

        /// Last-Modified from the previous fetch
        #[arg(long, default_value = "")]
        last_modified: String,

        /// Route the request through the configured proxy
        #[arg(long)]
        use_proxy: bool,

        /// Print entry content as published, without sanitizing
        #[arg(long)]
        raw: bool,
    },

    /// Find feeds advertised by a website
    Discover {
        url: String,

        /// Route requests through the configured proxy
        #[arg(long)]
        use_proxy: bool,
    },

    /// Parse a timestamp with the permissive date parser
    ParseDate { value: String },

    /// Sanitize an HTML file
    Sanitize {
        file: PathBuf,

        /// Base URL for relative links
        #[arg(long, default_value = "")]
        base: String,

        /// Rewrite images onto the configured proxy route
        #[arg(long)]
        proxy_images: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::from_env(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(config = ?config, "Configuration ready");

    match args.command {
        Command::Fetch {
            url,
            etag,
            last_modified,
            use_proxy,
            raw,
        } => {
            let response = RequestBuilder::from_config(&config)
                .use_proxy(use_proxy)
                .with_cache_headers(&etag, &last_modified)
                .execute(&url)
                .await
                .with_context(|| format!("Failed to fetch {url}"))?;
            response.check_status()?;

            if !response.is_modified(&etag, &last_modified) {
                println!("Not modified");
                return Ok(());
            }

            let text = response.feed_text()?;
            let mut feed = parse_feed(&response.effective_url, &text)
                .with_context(|| format!("Failed to parse {}", response.effective_url))?;

            if !raw {
                let proxy = ImageProxy::from_config(&config);
                for entry in &mut feed.entries {
                    entry.content = Sanitizer::new(&entry.url)
                        .with_image_proxy(&proxy)
                        .sanitize(&entry.content);
                }
            }

            let output = serde_json::json!({ "response": response, "feed": feed });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Discover { url, use_proxy } => {
            let options = FinderOptions::new(config).use_proxy(use_proxy);
            let subscriptions = find_subscriptions(&url, &options).await?;
            if subscriptions.is_empty() {
                println!("No feeds found");
            }
            for subscription in subscriptions {
                println!(
                    "{}\t{}\t{}",
                    subscription.format, subscription.url, subscription.title
                );
            }
        }

        Command::ParseDate { value } => {
            let date = feedwright::date::parse_date(&value)?;
            println!("{}", date.to_rfc3339());
        }

        Command::Sanitize {
            file,
            base,
            proxy_images,
        } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let proxy = ImageProxy::from_config(&config);
            let mut sanitizer = Sanitizer::new(&base);
            if proxy_images {
                sanitizer = sanitizer.with_image_proxy(&proxy);
            }
            println!("{}", sanitizer.sanitize(&html));
        }
    }

    Ok(())
}
