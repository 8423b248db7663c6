//! ag-client - submit ad variation jobs and manage their results

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ag_client::{
    ArtifactExporter, Asset, AssetStager, HistoryOrder, HistoryStore, JobSubmissionClient, PollSettings,
    ResultCollector, run_generation,
};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;

#[derive(Parser)]
#[command(name = "ag-client")]
#[command(about = "Generate ad variations from a sample ad", long_about = None)]
#[command(version)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "AG_BACKEND_URL", default_value = "http://localhost:3000")]
    backend: String,

    /// History database directory
    #[arg(long, env = "AG_HISTORY_DB", default_value = ".adgen/history")]
    history: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job and wait for its variations
    Generate {
        /// Sample ad image
        #[arg(long)]
        sample_ad: PathBuf,

        /// Product image (repeatable)
        #[arg(long = "product")]
        products: Vec<PathBuf>,

        /// Product description, one variation per line
        #[arg(long)]
        prompts: Option<String>,

        /// Seconds between status polls
        #[arg(long, default_value_t = 1)]
        poll_secs: u64,

        /// Export the results as a zip into this directory
        #[arg(long)]
        export_to: Option<PathBuf>,
    },

    /// History operations
    #[command(subcommand)]
    History(HistoryCommands),

    /// Export a history entry as a zip archive
    Export {
        /// History record id
        id: u64,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List stored results
    List {
        #[arg(long, value_enum, default_value = "newest")]
        order: OrderArg,
    },
    /// Delete one entry
    Delete { id: u64 },
    /// Delete every entry
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Newest,
    Oldest,
}

impl From<OrderArg> for HistoryOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Newest => HistoryOrder::Newest,
            OrderArg::Oldest => HistoryOrder::Oldest,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let history = HistoryStore::open(&cli.history)
        .await
        .with_context(|| format!("opening history at {}", cli.history.display()))?;

    match cli.command {
        Commands::Generate {
            sample_ad,
            products,
            prompts,
            poll_secs,
            export_to,
        } => {
            let mut stager = AssetStager::new();
            stager.set_reference_asset(vec![Asset::from_path(&sample_ad).await?]);
            let mut assets = Vec::with_capacity(products.len());
            for path in &products {
                assets.push(Asset::from_path(path).await?);
            }
            stager.add_replacement_assets(assets)?;
            stager.set_prompt_text(prompts.unwrap_or_default());

            let client = JobSubmissionClient::new(&cli.backend);
            let collector = ResultCollector::new(
                &cli.backend,
                PollSettings {
                    interval: Duration::from_secs(poll_secs.max(1)),
                    ..PollSettings::default()
                },
            );
            collector.add_sink(Arc::new(history)).await;

            let result = run_generation(&mut stager, &client, &collector).await?;
            for (i, image) in result.images.iter().enumerate() {
                println!("{}\t{}", i + 1, image);
            }

            if let Some(dir) = export_to {
                let name = ArtifactExporter::new(&dir)
                    .export_all(&result.images, result.source, Utc::now())
                    .await?;
                println!("exported {}", dir.join(name).display());
            }
        }
        Commands::History(HistoryCommands::List { order }) => {
            let listing = history.list_all(order.into());
            let mut records = std::pin::pin!(listing.stream());
            while let Some(record) = records.try_next().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{} image(s)",
                    record.id,
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.source,
                    record.reference_name,
                    record.images.len()
                );
            }
        }
        Commands::History(HistoryCommands::Delete { id }) => history.delete_by_id(id).await?,
        Commands::History(HistoryCommands::Clear) => history.clear().await?,
        Commands::Export { id, out } => {
            let Some(record) = history.get(id).await? else {
                bail!("no history entry with id {id}");
            };
            let name = ArtifactExporter::new(&out)
                .export_all(&record.images, record.source, record.timestamp)
                .await?;
            println!("exported {}", out.join(name).display());
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
