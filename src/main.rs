use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use socrata_loader::ingestion::SchemaResolver;
use socrata_loader::{
    FileMetadataSource, LoaderConfig, MetadataSource, SocrataMetadataSource,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "socrata-loader")]
#[command(about = "Load a Socrata dataset export into a local SQLite database")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Dataset resource URL (or set SOCRATA_DATASET_URL)
    #[arg(long, global = true)]
    dataset_url: Option<String>,

    /// Read metadata from a saved views document instead of the API
    #[arg(long, global = true)]
    metadata_file: Option<PathBuf>,

    /// Socrata app token (or set APP_TOKEN)
    #[arg(long, global = true)]
    app_token: Option<String>,

    /// Target table name (default: data)
    #[arg(short, long, global = true)]
    table: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a CSV export into the database
    Load {
        /// CSV export to load (default: out.csv)
        #[arg(short, long)]
        csv: Option<PathBuf>,

        /// SQLite database file (default: data.sqlite)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Rows per insert statement (default: 50000)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Keep the default rollback journal instead of WAL
        #[arg(long)]
        no_wal: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the table definition derived from the metadata
    Schema,
}

impl Args {
    fn apply(&self, config: &mut LoaderConfig) {
        if let Some(url) = &self.dataset_url {
            config.dataset_url = url.clone();
        }
        if let Some(path) = &self.metadata_file {
            config.metadata_file = Some(path.clone());
        }
        if let Some(token) = &self.app_token {
            config.app_token = Some(token.clone());
        }
        if let Some(table) = &self.table {
            config.table_name = table.clone();
        }
    }
}

fn metadata_source(config: &LoaderConfig) -> Result<Box<dyn MetadataSource>> {
    let source: Box<dyn MetadataSource> = match &config.metadata_file {
        Some(path) => Box::new(FileMetadataSource::new(path.clone())),
        None => Box::new(SocrataMetadataSource::new(
            &config.dataset_url,
            config.app_token.clone(),
        )?),
    };
    Ok(source)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = LoaderConfig::from_env()?;
    args.apply(&mut config);

    match args.command {
        Commands::Load {
            csv,
            database,
            batch_size,
            no_wal,
            json,
        } => {
            if let Some(csv) = csv {
                config.csv_path = csv;
            }
            if let Some(database) = database {
                config.database_path = database;
            }
            if let Some(batch_size) = batch_size {
                config.flush_threshold = batch_size;
            }
            if no_wal {
                config.write_ahead_log = false;
            }
            load(config, json).await
        }
        Commands::Schema => print_schema(config).await,
    }
}

async fn load(config: LoaderConfig, json: bool) -> Result<()> {
    config.validate()?;

    let source = metadata_source(&config)?;
    let metadata = source
        .fetch_metadata()
        .await
        .with_context(|| format!("Failed to load metadata from {}", source.describe()))?;

    // rusqlite and the CSV reader block; keep them off the async workers
    let summary = tokio::task::spawn_blocking(move || socrata_loader::run(&config, metadata))
        .await
        .context("Load task panicked")??;

    info!(
        "Run {} loaded {} rows into {} in {} flushes",
        summary.run_id, summary.rows_loaded, summary.table, summary.flushes
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

async fn print_schema(config: LoaderConfig) -> Result<()> {
    config.validate()?;

    let source = metadata_source(&config)?;
    let metadata = source
        .fetch_metadata()
        .await
        .with_context(|| format!("Failed to load metadata from {}", source.describe()))?;

    let schema = SchemaResolver::new(config.table_name.clone()).build_schema(&metadata.columns)?;

    println!("-- {} rows reported by {}", metadata.total_row_count, source.describe());
    println!("{};", schema.ddl());

    Ok(())
}
