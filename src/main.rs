//! git-label CLI
//!
//! Command line tool for creating, updating and removing labels across
//! GitHub repositories

use clap::{CommandFactory, Parser};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git_label::{
    config::{load_repositories, DEFAULT_API_URL, REPOSITORIES_FILE},
    sync::SyncResult,
    Confirmer, DialoguerConfirmer, Error, GitHubClient, LabelLists, LabelSyncer, Result,
    ScriptedConfirmer, SyncConfig,
};

const WARNING_BANNER: &str = "\
Be careful! Removing a label detaches it from every issue using it.
Labels attached to open issues are backed up to used-labels-*.json.bak
before any change, and deleting a label still in use asks for confirmation.
Prefer labels-to-update.json to rename labels that are in use.

Label lists are read from the working directory (each optional):
  labels-to-create.json   [ { \"name\": \"closed: completed\", \"color\": \"#d93f0b\" } ]
  labels-to-update.json   [ { \"currentName\": \"bug\", \"name\": \"type: bug\", \"color\": \"#d73a4a\" } ]
  labels-to-remove.json   [ { \"name\": \"wontfix\" } ]
(.yaml and .yml variants are accepted too)

Examples:
  $ GITHUB_TOKEN=... git-label my-org/service-a my-org/service-b
  $ GITHUB_TOKEN=... git-label --repositories-json";

/// git-label CLI
///
/// Create, update and remove labels across GitHub repositories
#[derive(Parser, Debug)]
#[command(
    name = "git-label",
    version,
    about = "Create, update and remove labels across GitHub repositories",
    after_help = WARNING_BANNER
)]
struct Cli {
    /// Target repositories (owner/repo format)
    repositories: Vec<String>,

    /// Read target repositories from repositories.json in the working directory
    #[arg(long, conflicts_with_all = ["repositories", "repositories_file"])]
    repositories_json: bool,

    /// Read target repositories from a JSON file
    #[arg(long, value_name = "PATH", conflicts_with = "repositories")]
    repositories_file: Option<PathBuf>,

    /// GitHub access token (defaults to GITHUB_TOKEN)
    #[arg(short = 't', long)]
    access_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Directory for usage snapshot backups
    #[arg(long, value_name = "DIR", default_value = ".")]
    backup_dir: PathBuf,

    /// Dry run mode (take the backup, don't change any label)
    #[arg(long)]
    dry_run: bool,

    /// Answer "no" to delete confirmations without prompting
    #[arg(long)]
    assume_no: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn has_targets(&self) -> bool {
        !self.repositories.is_empty() || self.repositories_json || self.repositories_file.is_some()
    }
}

/// What the command line resolves to once the token is known
#[derive(Debug)]
enum Invocation {
    /// Help, version or a usage error, rendered by clap
    Clap(clap::Error),

    /// No target repository given
    Help,

    /// Synchronize the targets with `token`
    Sync { cli: Cli, token: String },
}

#[tokio::main]
async fn main() {
    let invocation = resolve_invocation(Cli::try_parse(), std::env::var("GITHUB_TOKEN").ok());

    let (cli, token) = match invocation {
        Ok(Invocation::Sync { cli, token }) => (cli, token),
        Ok(Invocation::Help) => {
            if let Err(e) = Cli::command().print_help() {
                fail(&Error::from(e));
            }
            return;
        }
        Ok(Invocation::Clap(e)) => e.exit(),
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e.to_string().red());
            eprintln!("Use {} for help", "git-label --help".cyan());
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);

    if let Err(e) = run(&cli, &token).await {
        fail(&e);
    }
}

/// Check the token first, then decide between help and a sync run
///
/// A missing token fails even for `--help` or an empty command line.
fn resolve_invocation(
    parsed: std::result::Result<Cli, clap::Error>,
    env_token: Option<String>,
) -> Result<Invocation> {
    let arg_token = parsed.as_ref().ok().and_then(|cli| cli.access_token.clone());
    let token = get_access_token(arg_token, env_token)?;

    let cli = match parsed {
        Ok(cli) => cli,
        Err(e) => return Ok(Invocation::Clap(e)),
    };

    if !cli.has_targets() {
        return Ok(Invocation::Help);
    }

    Ok(Invocation::Sync { cli, token })
}

/// Print an error in red and exit 1
fn fail(error: &Error) -> ! {
    eprintln!("{} {}", "✗".red(), error.to_string().red());
    std::process::exit(1);
}

/// Load the label lists and targets from the working directory, then sync
async fn run(cli: &Cli, token: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let repositories = resolve_repositories(cli, &cwd)?;
    let labels = LabelLists::load_from_dir(&cwd)?;

    let config = SyncConfig {
        labels,
        backup_dir: cli.backup_dir.clone(),
        dry_run: cli.dry_run,
    };
    config.validate()?;

    run_sync(cli, token, config, &repositories).await
}

/// Initialize the tracing subscriber (RUST_LOG overrides the default level)
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Execute synchronization
async fn run_sync(
    cli: &Cli,
    token: &str,
    config: SyncConfig,
    repositories: &[String],
) -> Result<()> {
    if cli.verbose {
        println!(
            "{} Syncing {} repositories via {}",
            "•".blue(),
            repositories.len(),
            cli.api_url.cyan()
        );
        println!(
            "  {} to update, {} to create, {} to remove",
            config.labels.to_update.len(),
            config.labels.to_create.len(),
            config.labels.to_remove.len()
        );
    }

    if config.dry_run {
        println!(
            "{} Running in dry-run mode (no labels will be changed)",
            "!".yellow()
        );
    }

    let client = GitHubClient::new(&cli.api_url, token)?;
    let confirmer: Arc<dyn Confirmer> = if cli.assume_no {
        Arc::new(ScriptedConfirmer::new(false))
    } else {
        Arc::new(DialoguerConfirmer::new())
    };

    let syncer = LabelSyncer::new(Arc::new(client), confirmer, config);
    let outcomes = syncer.sync_all(repositories).await;

    let mut failed = 0;
    for (repository, outcome) in &outcomes {
        match outcome {
            Ok(result) => display_sync_result(result, cli.verbose),
            Err(e) => {
                failed += 1;
                eprintln!(
                    "\n{} {}: {}",
                    "✗".red(),
                    repository.cyan(),
                    e.to_string().red()
                );
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Display synchronization results
fn display_sync_result(result: &SyncResult, verbose: bool) {
    if result.dry_run {
        println!("\n{} Sync preview for {} (dry-run mode):", "📋".blue(), result.repository.cyan());
    } else {
        println!("\n{} Sync finished for {}:", "✓".green(), result.repository.cyan());
    }

    println!("  🔄 Updated: {}", result.updated.to_string().yellow());
    println!("  📝 Created: {}", result.created.to_string().green());
    println!("  🗑️ Removed: {}", result.deleted.to_string().red());
    println!("  🔍 Issues backed up: {}", result.issues_recorded);

    if verbose {
        for (i, operation) in result.operations.iter().enumerate() {
            println!("  {}. {}", i + 1, operation.describe());
        }
    }

    if !result.errors.is_empty() {
        eprintln!("  {} {} operations failed:", "✗".red(), result.errors.len());
        for error in &result.errors {
            eprintln!("    {}", error.red());
        }
    }
}

/// Collect target repositories from arguments or a repository file
fn resolve_repositories(cli: &Cli, cwd: &Path) -> Result<Vec<String>> {
    let repositories = if let Some(path) = &cli.repositories_file {
        load_repositories(path)?
    } else if cli.repositories_json {
        load_repositories(cwd.join(REPOSITORIES_FILE))?
    } else {
        for repository in &cli.repositories {
            git_label::config::parse_repository(repository)?;
        }
        cli.repositories.clone()
    };

    if repositories.is_empty() {
        return Err(Error::config_validation("No target repositories given"));
    }

    Ok(repositories)
}

/// Get access token (the argument wins over `GITHUB_TOKEN`)
fn get_access_token(arg_token: Option<String>, env_token: Option<String>) -> Result<String> {
    arg_token
        .or(env_token)
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            Error::config_validation(
                "$GITHUB_TOKEN env variable MUST be provided (or pass --access-token)",
            )
        })
}
