use clap::{Parser, Subcommand};
use sense_core::{SenseConfig, TrainingConfigProvider};
use sense_gateway::{AppState, GatewayServer};
use sense_persona::InMemorySessionStore;
use sense_reasoning::{HttpOracle, OracleBudget};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod train;

#[derive(Parser, Debug)]
#[command(name = "sense", author, version, about, long_about = None)]
struct Cli {
    /// Path to the process config (TOML)
    #[arg(short, long, default_value = "config.toml", env = "SENSE_CONFIG")]
    config: PathBuf,

    /// Training policy file, overrides the config and SENSE_TRAINING_CONFIG
    #[arg(short, long)]
    training: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Verbose logging when RUST_LOG is unset
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Play one training session in the terminal, then print its evaluation
    Train {
        /// Profile id (see `sense profiles`)
        #[arg(short, long, default_value_t = 1)]
        profile: u32,
        /// Scenario id, or "random"
        #[arg(short, long)]
        scenario: Option<String>,
        /// Mental state id, or "random"
        #[arg(short, long)]
        mental_state: Option<String>,
    },
    /// List the available profiles
    Profiles,
}

fn init_tracing(json: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug,hyper=info,reqwest=info,h2=info")
        } else {
            EnvFilter::new("info,hyper=warn,reqwest=warn,h2=warn")
        }
    });
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.debug);

    let mut config = SenseConfig::load_or_default(&cli.config);
    if let Some(path) = cli.training {
        config.training.config_path = path;
    }
    let training = Arc::new(TrainingConfigProvider::new(config.training.config_path.clone()));

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let oracle = Arc::new(HttpOracle::new(&config.llm)?);
            let state = AppState::with_http_oracle(
                Arc::new(InMemorySessionStore::new()),
                oracle,
                training,
            )
            .with_budget(OracleBudget::from_config(&config.llm));
            tracing::info!(
                model = %config.llm.model,
                remote = config.llm.has_api_key(),
                ollama = %config.llm.ollama_base_url,
                "Starting Sense gateway"
            );
            GatewayServer::new(state, &config.gateway).run().await
        }
        Command::Train {
            profile,
            scenario,
            mental_state,
        } => {
            let opts = train::TrainOptions {
                profile_id: profile,
                scenario_id: scenario,
                mental_state_id: mental_state,
            };
            train::run(&config, &training, opts).await
        }
        Command::Profiles => {
            train::print_profiles(&training.resolve());
            Ok(())
        }
    }
}
