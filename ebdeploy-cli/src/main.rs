use clap::{Parser, Subcommand};
use ebdeploy_aws::AwsClients;
use ebdeploy_core::prompt::notify;
use ebdeploy_core::session::{self, DEFAULT_REGION, REGIONS};
use ebdeploy_core::{
    init_logging, GithubFetcher, LogContext, Orchestrator, Prompter, ProvisionSummary, Providers,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

mod config;
mod daemon;
mod terminal;

use config::{Config, UiMode};
use daemon::DaemonPrompter;
use terminal::{PresetAnswers, TerminalPrompter};

#[cfg(test)]
mod cli_tests;

/// Exit status after an interrupt, as a shell reports SIGINT
const INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "ebdeploy")]
#[command(about = "Deploy a GitHub repository to AWS Elastic Beanstalk")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where prompts are answered
    #[arg(long, value_enum, global = true)]
    ui: Option<UiMode>,

    /// Answer a prompt ahead of time (KEY=VALUE, repeatable)
    #[arg(short, long = "answer", value_name = "KEY=VALUE", global = true)]
    answers: Vec<String>,

    /// Directory for downloaded and repacked archives
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update an Elastic Beanstalk application (default)
    Deploy,

    /// List the AWS regions offered at the region prompt
    Regions,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(mode) = cli.ui {
        config.ui.mode = mode;
    }
    if let Some(work_dir) = &cli.work_dir {
        config.github.work_dir = work_dir.clone();
    }
    config.validate()?;

    init_logging(&config.log_config(cli.verbose))?;
    let context = LogContext::new("main", "ebdeploy-cli");

    match cli.command.unwrap_or(Commands::Deploy) {
        Commands::Deploy => {
            context.info("Starting deployment session");
            let prompter = build_prompter(&config, &cli.answers)?;
            Ok(deploy(&config, prompter.as_ref()).await)
        }
        Commands::Regions => {
            for region in REGIONS {
                if region == DEFAULT_REGION {
                    println!("{} (default)", region);
                } else {
                    println!("{}", region);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_prompter(config: &Config, answers: &[String]) -> anyhow::Result<Box<dyn Prompter>> {
    match config.ui.mode {
        UiMode::Terminal => {
            let presets = PresetAnswers::parse(answers)?.with_env(std::env::vars());
            if !presets.is_empty() {
                info!(count = presets.len(), "Loaded preset answers");
            }
            Ok(Box::new(TerminalPrompter::new(presets)))
        }
        UiMode::Daemon => {
            if !answers.is_empty() {
                anyhow::bail!("--answer is only supported with the terminal UI");
            }
            let prompter = DaemonPrompter::from_env(&config.ui.daemon_url)?;
            info!(url = prompter.base_url(), "Relaying prompts through the prompt daemon");
            Ok(Box::new(prompter))
        }
    }
}

/// Run one session; failures are reported through the prompter.
///
/// Returns `ExitCode::SUCCESS` or `ExitCode::FAILURE`. Ctrl-C exits the
/// process directly with status 130 (`INTERRUPTED`).
async fn deploy(config: &Config, prompter: &dyn Prompter) -> ExitCode {
    session::print_banner(prompter).await;

    let outcome = tokio::select! {
        outcome = provision(config, prompter) => outcome,
        _ = tokio::signal::ctrl_c() => {
            notify(prompter, "\n⚠️  Interrupted. Resources created so far are left in place.").await;
            // Blocking prompt reads cannot be cancelled, so leave without waiting on them.
            std::process::exit(INTERRUPTED);
        }
    };

    match outcome {
        Ok(summary) => {
            info!(
                application = %summary.application,
                environment = %summary.environment,
                version = %summary.version_label,
                "Deployment finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Deployment failed");
            notify(prompter, &format!("❌ {}", err)).await;
            ExitCode::FAILURE
        }
    }
}

async fn provision(config: &Config, prompter: &dyn Prompter) -> ebdeploy_core::Result<ProvisionSummary> {
    let source = session::collect_repository(prompter).await?;
    let credentials = session::collect_aws(prompter).await?;
    let pipeline = session::choose_pipeline(prompter).await?;

    let clients = AwsClients::from_credentials(&credentials).await;
    let fetcher = GithubFetcher::new(config.fetch_settings())?;
    let providers = Providers {
        fetcher: &fetcher,
        store: &clients.s3,
        database: &clients.rds,
        platform: &clients.elasticbeanstalk,
        network: &clients.ec2,
    };

    Orchestrator::new(providers, prompter, config.provision_settings(), clients.region())
        .run(pipeline, &source)
        .await
}
