//! Concierge command-line entry point

use clap::{Parser, Subcommand};
use concierge::{Config, Dispatcher};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// Concierge: ask questions about your email, code, calendar and files
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "CONCIERGE_CONFIG")]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single natural language query
    Query {
        /// Query text, e.g. "summarize emails from hello@n8n.io"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Read queries from stdin until "exit"
    Interactive,
    /// Show integration, AI provider and cache status
    Status {
        /// Also print session metrics in Prometheus text format
        #[arg(long)]
        prometheus: bool,
    },
    /// Write a configuration template
    Setup {
        /// Where to write the file (defaults to the user config directory)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Setup { output, force }) => {
            let logging = concierge::config::LoggingConfig::default();
            init_logging(&logging.level, args.json_logs || logging.json);
            cli::run_setup(output, force, args.json)
        }
        command => {
            // An explicitly named config file must exist; otherwise fall
            // back to the search path and defaults.
            let config = match &args.config {
                Some(path) => Config::from_file(path)?,
                None => Config::load()?,
            };
            init_logging(&config.logging.level, args.json_logs || config.logging.json);

            let dispatcher = Dispatcher::from_config(&config)?;
            match command {
                Some(Command::Query { query }) => {
                    cli::run_query(&dispatcher, query.join(" "), args.json).await
                }
                Some(Command::Status { prometheus }) => {
                    cli::run_status(&dispatcher, prometheus, args.json).await
                }
                _ => cli::run_interactive(&dispatcher, args.json).await,
            }
        }
    }
}

/// `RUST_LOG` wins over the configured level. Logs always go to stderr.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
