use clap::{Parser, Subcommand};
use dotenv::dotenv;

use crosspost::models::platform::Platform;
use crosspost::services::settings::init_logging;
use crosspost::{adapt_source, format_report, load_app_config, publish_content, resolve_reference};

/// Crosspost - публикация материалов из CMS в Telegram, VK, Facebook и Instagram
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a content item and record the result on it
    Publish {
        content_id: String,
        /// Repeatable; defaults to publish.default_platforms
        #[arg(short, long = "platform")]
        platforms: Vec<Platform>,
    },
    /// Print the text as it would be posted (no network)
    Adapt {
        #[arg(short, long)]
        platform: Platform,
        #[arg(long = "hashtag")]
        hashtags: Vec<String>,
        /// File with the HTML body, or `-` for stdin
        source: String,
    },
    /// Turn an image reference into a public URL
    Resolve { reference: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    match args.command {
        Command::Adapt { platform, hashtags, source } => {
            let _guard = init_logging(None);
            let adapted = adapt_source(&source, platform, &hashtags)?;
            println!("{}", adapted.text);
            println!("length: {}", adapted.length);
        }
        Command::Publish { content_id, platforms } => {
            let cfg = load_app_config(&args.config)?;
            let _guard = init_logging(cfg.log.as_ref());
            let report = publish_content(&cfg, &content_id, platforms).await?;
            println!("{}", format_report(&report));
        }
        Command::Resolve { reference } => {
            let cfg = load_app_config(&args.config)?;
            let _guard = init_logging(cfg.log.as_ref());
            let media = resolve_reference(&cfg, &reference).await?;
            println!("{}", media.url);
        }
    }
    Ok(())
}
