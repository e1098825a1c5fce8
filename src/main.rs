//! code-reranker CLI entry point

use clap::{Parser, Subcommand};
use code_reranker::{
    commands::{
        cmd_init, cmd_rerank_file, cmd_status, print_rerank_output, print_status, RerankOptions,
    },
    config::Config,
    error::Result,
    server,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "code-reranker")]
#[command(version, about = "Rerank code search results with a cross-encoder model", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP reranking service
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Rerank documents from a JSON file
    Rerank {
        /// The search query
        #[arg(short, long)]
        query: String,

        /// JSON file with documents ([{id, content}] or {"documents": [...]})
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of results
        #[arg(short, long)]
        max_results: Option<usize>,
    },

    /// Load the model and report its health
    Status,

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Init only needs a target path, not an existing config
    if let Commands::Init { force } = cli.command {
        init_logging(&Config::default(), cli.verbose);
        let path = cli.config.unwrap_or_else(Config::default_config_path);
        let config = cmd_init(path, force)?;
        println!("✓ code-reranker initialized successfully");
        println!("  Config: {}", config.config_file.display());
        return Ok(());
    }

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            server::run(config).await?;
        }

        Commands::Rerank {
            query,
            file,
            max_results,
        } => {
            let options = RerankOptions { max_results };
            let output = cmd_rerank_file(&config, &query, &file, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_rerank_output(&output);
            }
        }

        Commands::Status => {
            let report = cmd_status(&config).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
        }

        Commands::Init { .. } => unreachable!(),
    }

    Ok(())
}
