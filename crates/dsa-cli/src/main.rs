use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dsa_core::identify_problem_url;
use dsa_storage::SqliteProblemStore;
use dsa_sync::IngestConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dsa-cli")]
#[command(about = "DSA problem aggregator command-line interface")]
struct Cli {
    /// Log at info level instead of warn.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every enabled platform once and store the results.
    Ingest {
        /// Print the full run report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create the database if needed and apply migrations.
    Migrate,
    /// Start the HTTP API.
    Serve,
    /// Show which platform problem a URL points at.
    Identify { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "dsa_cli=info,dsa_sync=info,dsa_adapters=info,dsa_storage=info,dsa_web=info"
    } else {
        "dsa_cli=info,dsa_sync=info,dsa_adapters=warn,dsa_storage=warn,dsa_web=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IngestConfig::from_env();
    match cli.command.unwrap_or(Commands::Ingest { json: false }) {
        Commands::Ingest { json } => {
            let report = dsa_sync::run_ingest_once(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("ingest complete: run_id={}", report.run_id);
                for (platform, outcome) in &report.platforms {
                    println!(
                        "  {platform}: total={} new={} updated={} errors={}",
                        outcome.total,
                        outcome.new,
                        outcome.updated,
                        outcome.errors.len()
                    );
                    for err in &outcome.errors {
                        println!("    - {err}");
                    }
                }
            }
        }
        Commands::Migrate => {
            SqliteProblemStore::connect(&config.database_url)
                .await
                .with_context(|| format!("migrating {}", config.database_url))?;
            info!(database_url = %config.database_url, "migrations applied");
            println!("migrations applied to {}", config.database_url);
        }
        Commands::Serve => {
            dsa_web::serve(&config).await?;
        }
        Commands::Identify { url } => match identify_problem_url(&url) {
            Some(identifier) => println!("{} {}", identifier.platform, identifier.id),
            None => println!("unrecognized"),
        },
    }

    Ok(())
}
