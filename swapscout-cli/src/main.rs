use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::{num::NonZeroUsize, path::PathBuf, thread};
use swapscout::{
    jobs::JobDescriptor,
    pull_request::GitHubClient,
    results::ReplaceSummary,
    vcs::GitCli,
    workflow::{validate_directory, ConfirmProtected, WorkflowOutcome, WorkflowState},
    dry_run, ConfigOverrides, ConsoleProgress, InterruptFlag, SwapError, WorkflowConfig,
    WorkflowController,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, SwapError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CliReplaceArgs {
    /// Directory to work in
    directory: PathBuf,

    /// Text to search for (case-insensitive)
    search: String,

    /// Text to replace it with
    replace: String,

    /// Treat the search text as a regular expression
    #[arg(long)]
    regex: bool,

    /// File extensions to include (e.g. .txt,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Path substrings to exclude (e.g. vendor,target)
    #[arg(short = 'x', long)]
    exclude: Option<String>,

    /// Maximum number of files to scan
    #[arg(long)]
    max_files: Option<usize>,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a directory is a git repository and detect its GitHub remote
    Validate {
        /// Directory to check
        directory: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what a replacement would change without touching any file
    Replace(CliReplaceArgs),

    /// Replace on a new branch, commit, push and open a pull request
    Run {
        #[command(flatten)]
        args: CliReplaceArgs,

        /// Branch to create (default: text-replace-<timestamp>)
        #[arg(short, long)]
        branch: Option<String>,

        /// Commit message
        #[arg(short = 'm', long)]
        commit_message: Option<String>,

        /// Pull request title
        #[arg(long)]
        pr_title: Option<String>,

        /// Pull request description
        #[arg(long)]
        pr_description: Option<String>,

        /// GitHub token (default: $GITHUB_TOKEN)
        #[arg(long)]
        github_token: Option<String>,

        /// Repository owner (default: detected from the remote)
        #[arg(long)]
        repo_owner: Option<String>,

        /// Repository name (default: detected from the remote)
        #[arg(long)]
        repo_name: Option<String>,

        /// Remote to push to
        #[arg(long)]
        remote: Option<String>,

        /// Start from a protected branch without asking
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Asks on the terminal before working from a protected branch
struct StdinConfirm;

impl ConfirmProtected for StdinConfirm {
    fn confirm(&self, branch: &str) -> bool {
        eprintln!(
            "{} You are currently on the '{}' branch!",
            "WARNING:".yellow().bold(),
            branch
        );
        eprintln!("The changes will be made on a new branch created from it.");
        eprint!("Do you want to continue? (y/N): ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(e) => {
                warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = WorkflowConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { directory, json } => {
            let config = config.merge_with_cli(overrides(cli.log_level, None, None, None, false));
            init_tracing(&config.log_level);
            validate(&config, directory, json)
        }
        Commands::Replace(args) => {
            let config = config.merge_with_cli(overrides(
                cli.log_level,
                args.max_files,
                args.threads,
                None,
                false,
            ));
            init_tracing(&config.log_level);
            preview(&config, args)
        }
        Commands::Run {
            args,
            branch,
            commit_message,
            pr_title,
            pr_description,
            github_token,
            repo_owner,
            repo_name,
            remote,
            yes,
        } => {
            let config = config.merge_with_cli(overrides(
                cli.log_level,
                args.max_files,
                args.threads,
                remote,
                yes,
            ));
            init_tracing(&config.log_level);

            let json = args.json;
            let mut descriptor = descriptor(args);
            descriptor.branch = branch;
            descriptor.commit_message = commit_message;
            descriptor.pr_title = pr_title;
            descriptor.pr_description = pr_description;
            descriptor.github_token = github_token;
            descriptor.repo_owner = repo_owner;
            descriptor.repo_name = repo_name;
            descriptor.allow_protected = yes;
            full_workflow(&config, descriptor, json)
        }
    }
}

fn overrides(
    log_level: Option<String>,
    max_files: Option<usize>,
    thread_count: Option<NonZeroUsize>,
    remote: Option<String>,
    allow_protected: bool,
) -> ConfigOverrides {
    ConfigOverrides {
        log_level,
        max_files,
        thread_count,
        remote,
        allow_protected,
        ..Default::default()
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// What a Ctrl-C does, by how many have arrived
#[derive(Debug, PartialEq, Eq)]
enum SignalAction {
    Interrupt,
    Exit,
}

fn on_ctrl_c(count: usize) -> SignalAction {
    if count <= 1 {
        SignalAction::Interrupt
    } else {
        SignalAction::Exit
    }
}

/// Raises `flag` on the first Ctrl-C so the scan stops at its next check.
/// A second Ctrl-C exits the process.
fn install_interrupt_handler(flag: InterruptFlag) {
    let spawned = thread::Builder::new()
        .name("swapscout-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Could not start signal listener: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                let mut count = 0;
                while tokio::signal::ctrl_c().await.is_ok() {
                    count += 1;
                    match on_ctrl_c(count) {
                        SignalAction::Interrupt => {
                            info!("Received ctrl-c, interrupting scan");
                            eprintln!("Interrupting... press Ctrl-C again to exit");
                            flag.raise();
                        }
                        SignalAction::Exit => std::process::exit(130),
                    }
                }
            });
        });
    if let Err(e) = spawned {
        warn!("Could not start signal listener: {}", e);
    }
}

fn split_list(value: Option<String>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn descriptor(args: CliReplaceArgs) -> JobDescriptor {
    let mut descriptor = JobDescriptor::new(args.directory, args.search, args.replace);
    descriptor.use_regex = args.regex;
    descriptor.extensions = split_list(args.extensions);
    descriptor.exclude_dirs = split_list(args.exclude);
    descriptor.max_files = args.max_files;
    descriptor
}

fn pull_request_client(config: &WorkflowConfig) -> Result<GitHubClient> {
    GitHubClient::new(&config.github_api_url).map_err(|e| SwapError::config_error(e.to_string()))
}

fn validate(config: &WorkflowConfig, directory: PathBuf, json: bool) -> Result<()> {
    let result = validate_directory(&directory, &config.remote);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.valid {
        println!(
            "{} {} ({})",
            "valid:".green().bold(),
            directory.display(),
            result.repo_info()
        );
    }

    match result.error {
        Some(error) if !result.valid => Err(SwapError::validation(error)),
        _ => Ok(()),
    }
}

fn preview(config: &WorkflowConfig, args: CliReplaceArgs) -> Result<()> {
    let json = args.json;
    let request = descriptor(args).into_request(config);

    let interrupt = InterruptFlag::new();
    install_interrupt_handler(interrupt.clone());
    let progress = if json {
        ConsoleProgress::hidden()
    } else {
        ConsoleProgress::new()
    };

    let outcome = dry_run(config, &request, &progress, &interrupt);
    progress.finish();
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Dry run - no changes will be made");
        print_summary(&outcome.summary);
        if outcome.truncated {
            print_truncation();
        }
    }
    Ok(())
}

fn full_workflow(config: &WorkflowConfig, descriptor: JobDescriptor, json: bool) -> Result<()> {
    let request = descriptor.into_request(config);
    let vcs = GitCli::new(&request.directory);
    let client = pull_request_client(config)?;

    let interrupt = InterruptFlag::new();
    install_interrupt_handler(interrupt.clone());
    let progress = if json {
        ConsoleProgress::hidden()
    } else {
        ConsoleProgress::new()
    };

    let mut controller = WorkflowController::new(config, &vcs, &client)
        .with_confirm(&StdinConfirm)
        .with_progress(&progress)
        .with_interrupt(interrupt);
    let outcome = controller.run(&request);
    progress.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    outcome.into_result().map(|_| ())
}

fn print_summary(summary: &ReplaceSummary) {
    for change in &summary.changes {
        println!(
            "  {} {} ({} replacements)",
            "+".green(),
            change.file.display().to_string().blue(),
            change.replacements
        );
    }
    println!(
        "Summary: {} files processed, {} files changed, {} total replacements",
        summary.files_processed, summary.files_changed, summary.total_replacements
    );
}

fn print_truncation() {
    println!(
        "{}",
        "Reached the maximum file limit; use --max-files to scan more.".yellow()
    );
}

fn print_outcome(outcome: &WorkflowOutcome) {
    if !outcome.changes.is_empty() {
        for change in &outcome.changes {
            println!(
                "  {} {} ({} replacements)",
                "+".green(),
                change.file.display().to_string().blue(),
                change.replacements
            );
        }
    }
    println!(
        "Summary: {} files processed, {} files changed, {} total replacements",
        outcome.files_processed, outcome.files_changed, outcome.total_replacements
    );
    if outcome.truncated {
        print_truncation();
    }

    match &outcome.state {
        WorkflowState::PrCreated => {
            println!("{}", "Workflow completed successfully!".green().bold());
            if let Some(url) = &outcome.pr_url {
                println!("Pull request: {}", url.blue());
            }
        }
        WorkflowState::Failed(reason) => {
            if let Some(branch) = &outcome.branch_name {
                println!("Changes remain on branch {}", branch.yellow());
            }
            eprintln!("{} {}", "Failed:".red().bold(), reason);
        }
        WorkflowState::Aborted(reason) => {
            eprintln!("{} {}", "Aborted:".yellow().bold(), reason);
        }
        _ => {}
    }
}
