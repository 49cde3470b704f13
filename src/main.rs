use clap::Parser;

use boltgate::{config, server};

/// boltgate - a stateless HTTP gateway for Neo4j's transactional Cypher API
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP server host address
    #[arg(long)]
    http_host: Option<String>,

    /// HTTP server port
    #[arg(long)]
    http_port: Option<u16>,

    /// Bolt URI of the database (bolt:// or neo4j://)
    #[arg(long)]
    driver_uri: Option<String>,

    /// Load configuration from a YAML file instead of the environment
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Run server in daemon mode (background process)
    #[arg(long)]
    daemon: bool,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            http_host: cli.http_host,
            http_port: cli.http_port,
            driver_uri: cli.driver_uri,
            config_file: cli.config,
            daemon: cli.daemon,
        }
    }
}

#[cfg(all(not(target_env = "msvc"), feature = "jemalloc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("\nboltgate v{}\n", env!("CARGO_PKG_VERSION"));

    // Create configuration from CLI args layered over env / config file
    let cli_config: config::CliConfig = cli.into();
    let config = match config::GatewayConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    server::run_with_config(config).await;
}
