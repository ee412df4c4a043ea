use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghmirror::config::{self, EnvFile, Overrides};
use ghmirror::sync::plan;
use ghmirror::{
    Config, Discovery, GitHubClient, GitHubDiscovery, Settings, SyncAction, SyncEngine,
    SyncResult, SyncSummary,
};

/// No token from --token, the environment or the .env file
const EXIT_MISSING_TOKEN: u8 = 2;

/// The repository listing could not be retrieved
const EXIT_LISTING_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "ghmirror")]
#[command(about = "Clone or update every GitHub repository visible to a token")]
#[command(version)]
struct Cli {
    /// GitHub token (overrides the GITHUB_TOKEN environment variable)
    #[arg(long)]
    token: Option<String>,

    /// Output directory for mirrors (defaults to `output` next to the executable)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// .env file to read variables from (defaults to `.env` next to the executable)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Show what would be cloned or updated without running git
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
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

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.verbose, &config)?;
    info!("Starting ghmirror v{}", env!("CARGO_PKG_VERSION"));

    let program_dir = config::executable_dir()?;
    let env_path = cli
        .env_file
        .unwrap_or_else(|| program_dir.join(".env"));
    let env_file = EnvFile::load(&env_path)?;

    let overrides = Overrides {
        token: cli.token,
        output: cli.output,
    };
    let settings = match Settings::resolve(overrides, config, &program_dir, |key| {
        env_file.lookup(key)
    }) {
        Ok(settings) => settings,
        Err(missing) => {
            eprintln!("Error: {}", missing);
            return Ok(ExitCode::from(EXIT_MISSING_TOKEN));
        }
    };

    let output_root = config::prepare_output_dir(&settings.output_root)?;
    println!("Output directory: {}", output_root.display());

    let repos = match discover(&settings, &output_root).await {
        Ok(repos) => repos,
        Err(e) => {
            eprintln!("Failed to list repositories: {:#}", e);
            return Ok(ExitCode::from(EXIT_LISTING_FAILED));
        }
    };

    if repos.is_empty() {
        println!("No repositories found or the token has no access.");
        return Ok(ExitCode::SUCCESS);
    }

    if cli.dry_run {
        print_plan(&repos);
        return Ok(ExitCode::SUCCESS);
    }

    let engine = SyncEngine::new(&settings.config.sync);
    let summary = engine.sync_repos(repos).await;
    print_summary(&summary);

    Ok(ExitCode::SUCCESS)
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Initialize logging; stdout is reserved for progress and the summary
fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level: {}", default_level))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

async fn discover(settings: &Settings, output_root: &Path) -> Result<Vec<ghmirror::RepoSpec>> {
    let client = GitHubClient::new(
        &settings.api_url,
        &settings.token,
        settings.config.github.request_timeout(),
    )?;
    let discovery = GitHubDiscovery::new(
        client,
        output_root.to_path_buf(),
        settings.config.github.clone_protocol,
    );

    println!("🔍 Discovering repositories...");
    let repos = discovery
        .discover()
        .await
        .with_context(|| format!("{} listing failed", discovery.provider_name()))?;
    println!("   Found {} repositories", repos.len());

    Ok(repos)
}

fn print_plan(repos: &[ghmirror::RepoSpec]) {
    println!();
    println!("🔍 Dry run - no git commands will be executed");

    let mut to_clone = 0;
    let mut to_update = 0;

    for (repo, action) in plan(repos) {
        match action {
            SyncAction::Clone => {
                to_clone += 1;
                println!("   📥 Clone needed: {} -> {}", repo.full_name(), repo.local_path.display());
            }
            SyncAction::Update => {
                to_update += 1;
                println!("   🔄 Update needed: {}", repo.local_path.display());
            }
        }
    }

    println!();
    println!("📈 Planned:");
    println!("   📥 Repositories to clone : {}", to_clone);
    println!("   🔄 Repositories to update: {}", to_update);
}

fn print_summary(summary: &SyncSummary) {
    println!();
    println!("=== Summary ===");
    println!("Updated (fetch): {}", summary.updated);
    println!("Cloned         : {}", summary.cloned);
    println!("Errored        : {}", summary.errored);
    println!("Duration       : {:.2}s", summary.duration.as_secs_f64());

    if summary.errored > 0 {
        eprintln!();
        eprintln!("Failed repositories:");
        for result in summary.failures() {
            if let SyncResult::Failed { name, error, .. } = result {
                eprintln!("   ❌ {}: {}", name, error);
            }
        }
    }

    println!();
    println!("Done.");
}
