//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod ask;
pub mod key;


use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::cli::ask::{run_ask, AskError};
use crate::cli::key::{clear_key, set_key};
use crate::core::completion::HostedCompletionClient;
use crate::core::config::Config;
use crate::core::constants::COMPLETION_ERROR_BANNER;
use crate::core::context::ContextLoader;
use crate::core::secrets::{resolve_api_key, ApiKeyStore, Credential, API_KEY_ENV};
use crate::core::turn::TurnRunner;
use crate::server::{self, AppState};

#[derive(Parser)]
#[command(name = "nobelforge")]
#[command(about = "A web chat tutor for turning research ideas into Nobel-worthy projects")]
#[command(
    long_about = "Nobelforge serves a single web page where students chat with a hosted LLM \
about their research ideas. Every question is answered against a local reference document \
(data.txt) and ontology (ontology.ttl) when they are present.\n\n\
Authentication:\n\
  Use 'nobelforge set-key' to store the API key in your system keyring.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    API key (takes precedence over the keyring)\n\
  RUST_LOG          Log filter (defaults to info)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server (default)
    Serve {
        /// Address to listen on (e.g., 0.0.0.0:8501)
        #[arg(short = 'b', long)]
        bind: Option<String>,
        /// Model identifier to request completions from
        #[arg(short = 'm', long)]
        model: Option<String>,
    },
    /// Ask a single question and print the streamed answer
    Ask {
        /// Model identifier to request completions from
        #[arg(short = 'm', long)]
        model: Option<String>,
        /// The question (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        question: Vec<String>,
    },
    /// Store the API key in the system keyring
    SetKey,
    /// Remove the API key from the system keyring
    ClearKey,
    /// Print the effective configuration
    ShowConfig,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    crate::logging::init(args.verbose);

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Commands::Serve {
        bind: None,
        model: None,
    }) {
        Commands::Serve { bind, model } => run_server(config.with_overrides(bind, model)).await,
        Commands::Ask { model, question } => {
            let config = config.with_overrides(None, model);
            let runner = build_runner(&config, resolve_credential())?;
            let mut stdout = io::stdout();
            match run_ask(&runner, &question.join(" "), &mut stdout).await {
                Ok(()) => Ok(()),
                Err(err) => match err.downcast_ref::<AskError>() {
                    Some(AskError::EmptyQuestion) => {
                        eprintln!("{err}");
                        std::process::exit(1);
                    }
                    Some(AskError::Completion(_)) => {
                        eprintln!("\n\n❌ {COMPLETION_ERROR_BANNER}");
                        eprintln!("{err}");
                        std::process::exit(1);
                    }
                    None => Err(err),
                },
            }
        }
        Commands::SetKey => set_key(&ApiKeyStore::new()),
        Commands::ClearKey => clear_key(&ApiKeyStore::new()),
        Commands::ShowConfig => {
            config.print_all();
            Ok(())
        }
    }
}

fn resolve_credential() -> Credential {
    let credential = resolve_api_key(&ApiKeyStore::new());
    if !credential.is_configured() {
        warn!("set {API_KEY_ENV} or run 'nobelforge set-key' to enable answers");
    }
    credential
}

/// Wires the configured context sources and completion endpoint into a runner.
pub fn build_runner(
    config: &Config,
    credential: Credential,
) -> Result<TurnRunner, Box<dyn Error>> {
    let client = HostedCompletionClient::new(
        reqwest::Client::builder().build()?,
        config.base_url(),
        config.model(),
        credential,
    );
    let context = ContextLoader::new(config.context_sources());
    Ok(TurnRunner::new(Arc::new(context), Arc::new(client)))
}

async fn run_server(config: Config) -> Result<(), Box<dyn Error>> {
    let credential = resolve_credential();
    let configured = credential.is_configured();
    let runner = build_runner(&config, credential)?;

    // Source problems surface in the log at startup rather than on first request.
    runner.load_context().await;

    let state = AppState::new(runner, configured, config.model());
    server::serve(state, config.bind_address()).await
}
