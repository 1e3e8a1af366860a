use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use prism_client::{ClientConfig, DirtyValues, ImportAction, NodeConfig, SearchClient};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::import::DocumentSource;

#[derive(Parser, Debug)]
#[command(name = "prism-client")]
#[command(about = "Prism client CLI - bulk import/export against a Prism cluster")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// YAML client configuration file
    #[arg(short, long, global = true, env = "PRISM_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Node URL, repeatable (overrides nodes from the config file)
    #[arg(long = "node", global = true)]
    nodes: Vec<String>,

    /// Preferred node tried before the others
    #[arg(long, global = true)]
    nearest_node: Option<String>,

    /// API key
    #[arg(long, global = true, env = "PRISM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import JSONL documents into a collection
    Import {
        /// Target collection
        #[arg(short = 'C', long)]
        collection: String,

        /// Input JSONL file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write mode: create, upsert, update, emplace
        #[arg(long, value_parser = parse_action, default_value = "create")]
        action: ImportAction,

        /// Handling of values that do not match the schema
        #[arg(long, value_parser = parse_dirty_values)]
        dirty_values: Option<DirtyValues>,

        /// Documents per request
        #[arg(long, default_value = "1000")]
        batch_size: usize,

        /// Send lines unparsed and print the raw per-record results
        #[arg(long)]
        raw: bool,

        /// Keep going after a batch with failed records
        #[arg(long)]
        continue_on_error: bool,

        /// Disable progress output
        #[arg(long)]
        no_progress: bool,
    },

    /// Export a collection as JSONL
    Export {
        /// Source collection
        #[arg(short = 'C', long)]
        collection: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export documents matching this filter
        #[arg(long)]
        filter_by: Option<String>,

        /// Comma-separated fields to include
        #[arg(long)]
        include_fields: Option<String>,

        /// Comma-separated fields to exclude
        #[arg(long)]
        exclude_fields: Option<String>,
    },

    /// Search a collection
    Search {
        #[arg(short = 'C', long)]
        collection: String,

        /// Query text
        #[arg(short, long)]
        q: String,

        /// Comma-separated fields to search in
        #[arg(long)]
        query_by: String,

        #[arg(long)]
        filter_by: Option<String>,

        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Check cluster health and report per-node reachability
    Health,
}

fn parse_action(raw: &str) -> Result<ImportAction, String> {
    match raw {
        "create" => Ok(ImportAction::Create),
        "upsert" => Ok(ImportAction::Upsert),
        "update" => Ok(ImportAction::Update),
        "emplace" => Ok(ImportAction::Emplace),
        other => Err(format!("unknown import action '{}'", other)),
    }
}

fn parse_dirty_values(raw: &str) -> Result<DirtyValues, String> {
    match raw {
        "coerce_or_reject" => Ok(DirtyValues::CoerceOrReject),
        "coerce_or_drop" => Ok(DirtyValues::CoerceOrDrop),
        "drop" => Ok(DirtyValues::Drop),
        "reject" => Ok(DirtyValues::Reject),
        other => Err(format!("unknown dirty_values mode '{}'", other)),
    }
}

fn client_config(args: &ConnectionArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load client config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if !args.nodes.is_empty() {
        config.nodes = args
            .nodes
            .iter()
            .map(|url| NodeConfig::from_url(url))
            .collect::<prism_client::Result<_>>()?;
    }
    if let Some(url) = &args.nearest_node {
        config.nearest_node = Some(NodeConfig::from_url(url)?);
    }
    if args.api_key.is_some() {
        config.api_key = args.api_key.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.connection_timeout_ms = timeout_ms;
    }
    if config.nodes.is_empty() {
        config.nodes.push(NodeConfig::from_url("http://localhost:3080")?);
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = client_config(&cli.connection)?;
    tracing::debug!(
        nodes = config.nodes.len(),
        nearest = config.nearest_node.is_some(),
        "Client configured"
    );
    let client = SearchClient::new(config)?;

    match cli.command {
        Commands::Import {
            collection,
            input,
            action,
            dirty_values,
            batch_size,
            raw,
            continue_on_error,
            no_progress,
        } => {
            let source = match input {
                Some(path) => DocumentSource::FromFile(path),
                None => DocumentSource::FromStdin,
            };
            let options = commands::import::ImportSettings {
                action,
                dirty_values,
                batch_size: batch_size.max(1),
                raw,
                continue_on_error,
                no_progress,
            };
            commands::run_import(&client, &collection, source, options).await?;
        }
        Commands::Export {
            collection,
            output,
            filter_by,
            include_fields,
            exclude_fields,
        } => {
            let options = prism_client::ExportOptions {
                filter_by,
                include_fields,
                exclude_fields,
                ..Default::default()
            };
            commands::run_export(&client, &collection, &options, output).await?;
        }
        Commands::Search {
            collection,
            q,
            query_by,
            filter_by,
            per_page,
        } => {
            let mut params = prism_client::SearchParams::new(q, query_by);
            params.filter_by = filter_by;
            params.per_page = per_page;
            commands::run_search(&client, &collection, &params).await?;
        }
        Commands::Health => {
            commands::run_health(&client).await?;
        }
    }

    Ok(())
}
