pub mod cli;
pub mod config;
pub mod corpus;
pub mod llm;
pub mod prompt;
pub mod quota;
pub mod relay;
pub mod server;

use anyhow::Result;
use cli::{CliArgs, Command, run_repl, usage_report};
use config::AppConfig;
use llm::gemini::GeminiProvider;
use quota::{FileQuotaStore, QuotaPolicy};
use relay::RelayService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run(args: CliArgs) -> Result<()> {
    let command = args.command();
    init_tracing(default_log_filter(&command, args.verbose));

    let mut config = AppConfig::load_with_path(args.config.as_deref())?;
    apply_cli_overrides(&mut config, &args);

    match command {
        Command::Chat => {
            let relay = build_relay(&config);
            run_repl(&relay, &config.quota.file).await
        }
        Command::Serve { .. } => {
            let relay = Arc::new(build_relay(&config));
            server::serve(relay, &config.server).await
        }
        Command::Usage { reset } => {
            let ledger = quota_policy(&config).ledger_for(None);
            println!("{}", usage_report(&ledger, &config.quota.file, reset)?);
            Ok(())
        }
    }
}

/// Loads the corpus and composes the instruction once; the result serves
/// every exchange for the lifetime of the process.
pub fn build_relay(config: &AppConfig) -> RelayService<GeminiProvider> {
    let corpus = corpus::load(&config.data.path, &config.data.loader);
    let provider = GeminiProvider::new(
        reqwest::Client::new(),
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    );
    if let Ok(provider) = &provider {
        info!(model = provider.model(), "remote model configured");
    }

    RelayService::assemble(
        &corpus,
        &config.persona,
        provider,
        quota_policy(config),
        config.request_timeout,
    )
}

fn quota_policy(config: &AppConfig) -> QuotaPolicy {
    QuotaPolicy::new(
        Arc::new(FileQuotaStore::new(&config.quota.file)),
        config.quota.max_requests,
        config.quota.scope,
    )
}

fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(data) = &args.data {
        config.data.path = data.clone();
    }
    if let Some(usage_file) = &args.usage_file {
        config.quota.file = usage_file.clone();
    }
    if let Some(Command::Serve { host, port }) = &args.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
}

fn default_log_filter(command: &Command, verbose: bool) -> &'static str {
    if verbose {
        return "debug";
    }
    match command {
        Command::Serve { .. } => "info",
        // Keep the terminal conversation free of routine log lines.
        Command::Chat | Command::Usage { .. } => "warn",
    }
}

fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
