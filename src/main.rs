use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use changelens_core::{progress_channel, ChangelensConfig, ProgressChannels, CONFIG_FILE_NAME};
use changelens_history::engine::{engine_from_config, CommandEngine, DiffEngine};
use changelens_history::github::{is_github_url, parse_github_url, GithubSource};
use changelens_history::local::LocalGitSource;
use changelens_history::pipeline::{HistoryPipeline, PipelineOptions, PipelineOutcome};
use changelens_history::source::{RevisionSource, StaticSource};
use changelens_report::{HistoryReport, ReportOptions};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "changelens",
    version,
    about = "See what changed in an API description across its git history",
    long_about = "changelens walks the history of an OpenAPI document, diffs every revision\n\
                  against its predecessor and reports what changed and what broke.\n\n\
                  Examples:\n  \
                    changelens summary api/openapi.json                 Local git history\n  \
                    changelens summary ./repo api/openapi.json          Repository plus file path\n  \
                    changelens summary old.json new.json                Compare two files\n  \
                    changelens html-report https://github.com/o/r/blob/main/openapi.json\n  \
                    changelens tree api/openapi.json --latest           Tree of the newest change"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .changelens.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of changes per revision
    #[command(long_about = "Print a summary of changes per revision.\n\n\
        Shows a table of changed document elements for every revision and the change\n\
        tree of the newest one. Exits with an error when breaking changes are found,\n\
        unless --allow-breaking is given.")]
    Summary {
        #[command(flatten)]
        history: HistoryArgs,

        /// Print Markdown tables instead of plain text
        #[arg(long)]
        markdown: bool,

        /// Exit successfully even when breaking changes are found
        #[arg(long)]
        allow_breaking: bool,
    },
    /// Print a JSON report of every revision
    Report {
        #[command(flatten)]
        history: HistoryArgs,

        /// Flatten the report to per-revision lists of hashed changes
        #[arg(long)]
        flat: bool,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write a Markdown report
    MarkdownReport {
        #[command(flatten)]
        history: HistoryArgs,

        /// Output file (default: report.md)
        #[arg(long, short, default_value = "report.md")]
        output: PathBuf,

        /// Leave out the text diff of each revision
        #[arg(long)]
        no_diff: bool,
    },
    /// Write a self-contained HTML report
    HtmlReport {
        #[command(flatten)]
        history: HistoryArgs,

        /// Output file (default: report.html)
        #[arg(long, short, default_value = "report.html")]
        output: PathBuf,
    },
    /// Print the change tree of each revision
    Tree {
        #[command(flatten)]
        history: HistoryArgs,

        /// Print the normalized tree and graph as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a default .changelens.toml configuration file
    #[command(long_about = "Create a default .changelens.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .changelens.toml already exists.")]
    Init,
}

/// Where the history comes from and how much of it to process.
#[derive(Args)]
struct HistoryArgs {
    /// A file in a git repository, a GitHub blob URL, a repository path
    /// (with FILE), or the older of two files to compare
    target: String,

    /// File inside the repository given as TARGET, or the newer file to compare
    file: Option<String>,

    /// Process at most this many revisions, newest first
    #[arg(long)]
    limit: Option<usize>,

    /// Ignore revisions older than this many days
    #[arg(long)]
    since_days: Option<u64>,

    /// Diff every revision against this revision instead of its predecessor
    #[arg(long)]
    base: Option<String>,

    /// Only report the newest change
    #[arg(long)]
    latest: bool,

    /// Content budget for remote history in KB
    #[arg(long)]
    max_content_kb: Option<u64>,

    /// External diff program, run as `<program> <old-file> <new-file>`
    #[arg(long)]
    engine: Option<String>,
}

/// Pipeline output plus what it was run on.
struct Collected {
    source: String,
    file_path: String,
    outcome: PipelineOutcome,
}

const DEFAULT_CONFIG: &str = r#"# changelens configuration

[history]
# limit = 50
# since_days = 365
# base = "v1.0.0"
# concurrency = 8
# max_content_kb = 50000
# channel_capacity = 64

[github]
# api_base = "https://api.github.com"
# token = "ghp_..."        # falls back to GH_TOKEN / GITHUB_TOKEN
# per_page = 100

[engine]
# External structural diff program. It receives the old and new documents
# as file paths and must print a JSON diff result on stdout.
# command = "openapi-diff-json"
# args = []

[report]
# title = "API Changes Report"
# disable_timestamp = false
"#;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ChangelensConfig::from_file(path)?,
        None => ChangelensConfig::discover(Path::new("."))?,
    };

    match cli.command {
        Command::Summary {
            ref history,
            markdown,
            allow_breaking,
        } => {
            let collected = collect(history, &config).await?;
            let report = build_report(&collected, &config, false);
            if markdown {
                print!("{}", report.to_summary_markdown());
            } else {
                if let Some(tree) = report.items.iter().find_map(|i| i.tree.as_ref()) {
                    print!("{}", changelens_tree::render_tree(tree));
                    println!();
                }
                print!("{report}");
            }
            print_warnings(&collected.outcome);
            if report.has_breaking() && !allow_breaking {
                miette::bail!(
                    help = "pass --allow-breaking to exit successfully anyway",
                    "{} breaking changes discovered",
                    report.summary.total_breaking
                );
            }
        }
        Command::Report {
            ref history,
            flat,
            ref output,
        } => {
            let collected = collect(history, &config).await?;
            let report = build_report(&collected, &config, false);
            let json = if flat {
                report.to_flat_json()?
            } else {
                report.to_json()?
            };
            match output {
                Some(path) => write_output(path, &json)?,
                None => println!("{json}"),
            }
            print_warnings(&collected.outcome);
        }
        Command::MarkdownReport {
            ref history,
            ref output,
            no_diff,
        } => {
            let collected = collect(history, &config).await?;
            let report = build_report(&collected, &config, !no_diff);
            write_output(output, &report.to_markdown())?;
            print_warnings(&collected.outcome);
        }
        Command::HtmlReport {
            ref history,
            ref output,
        } => {
            let collected = collect(history, &config).await?;
            let report = build_report(&collected, &config, true);
            write_output(output, &report.to_html()?)?;
            print_warnings(&collected.outcome);
        }
        Command::Tree { ref history, json } => {
            let collected = collect(history, &config).await?;
            for revision in &collected.outcome.revisions {
                let Some(diff) = &revision.diff else {
                    continue;
                };
                let normalized = changelens_tree::normalize(diff);
                if json {
                    println!("{}", changelens_tree::format_json(&normalized)?);
                } else {
                    println!("{} {}", revision.descriptor().short_id(), revision.message);
                    print!("{}", changelens_tree::render_tree(&normalized.tree));
                    println!();
                }
            }
            print_warnings(&collected.outcome);
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                miette::bail!("{CONFIG_FILE_NAME} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE_NAME} with default configuration");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Merge command line flags over the configured history settings.
fn pipeline_options(args: &HistoryArgs, config: &ChangelensConfig) -> PipelineOptions {
    let mut history = config.history.clone();
    if args.limit.is_some() {
        history.limit = args.limit;
    }
    if args.since_days.is_some() {
        history.since_days = args.since_days;
    }
    if args.base.is_some() {
        history.base = args.base.clone();
    }
    if args.max_content_kb.is_some() {
        history.max_content_kb = args.max_content_kb;
    }
    if args.latest {
        // the newest revision and its predecessor
        history.limit = Some(2);
    }
    PipelineOptions::from_config(&history)
}

/// Pick a revision source for the arguments and run the pipeline over it.
async fn collect(args: &HistoryArgs, config: &ChangelensConfig) -> Result<Collected> {
    let options = pipeline_options(args, config);

    let mut collected = if is_github_url(&args.target) {
        let file = parse_github_url(&args.target)?;
        let file_path = file.path.clone();
        let source = GithubSource::new(file, &config.github).with_max_commits(options.limit);
        run_source(&source, file_path, args, config, options).await
    } else if let Some(other) = &args.file {
        let first = Path::new(&args.target);
        if first.is_dir() {
            let source = LocalGitSource::discover(&first.join(other))?;
            let file_path = source.file_path().to_string();
            run_source(&source, file_path, args, config, options).await
        } else {
            let source = StaticSource::left_right(first, Path::new(other))?;
            run_source(&source, other.clone(), args, config, options).await
        }
    } else {
        let source = LocalGitSource::discover(Path::new(&args.target))?;
        let file_path = source.file_path().to_string();
        run_source(&source, file_path, args, config, options).await
    };

    if let Some(fatal) = collected.outcome.fatal() {
        miette::bail!(
            help = "check that the file exists at every revision and that the source is reachable",
            "{}",
            fatal.message
        );
    }
    if collected.outcome.revisions.is_empty() {
        miette::bail!("no revisions of {} found", collected.file_path);
    }
    if args.latest {
        collected.outcome.revisions.truncate(1);
    }
    Ok(collected)
}

async fn run_source<S: RevisionSource>(
    source: &S,
    file_path: String,
    args: &HistoryArgs,
    config: &ChangelensConfig,
    options: PipelineOptions,
) -> Collected {
    let engine: Box<dyn DiffEngine + Send + Sync> = match &args.engine {
        Some(program) => Box::new(CommandEngine::new(program.clone())),
        None => engine_from_config(&config.engine),
    };
    let pipeline = HistoryPipeline::new(engine, options);
    let (reporter, channels) = progress_channel(config.history.channel_capacity);
    let (outcome, ()) = tokio::join!(pipeline.run(source, reporter), show_progress(channels));
    Collected {
        source: source.describe(),
        file_path,
        outcome,
    }
}

/// Drive a spinner from progress events until the pipeline closes the
/// channels. Without a terminal, events only go to the debug log.
async fn show_progress(channels: ProgressChannels) {
    let spinner = std::io::stderr().is_terminal().then(|| {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message("Reading history...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb
    });

    channels
        .drain_with(
            |event| {
                tracing::debug!(job = %event.job, warning = event.warning, "{}", event.message);
                if let Some(pb) = &spinner {
                    pb.set_message(event.message);
                }
            },
            |error| {
                tracing::debug!(job = %error.job, fatal = error.fatal, "{}", error.message);
            },
        )
        .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
}

fn build_report(
    collected: &Collected,
    config: &ChangelensConfig,
    include_diff: bool,
) -> HistoryReport {
    let mut options = ReportOptions::from_config(&config.report);
    options.include_diff = include_diff;
    HistoryReport::build(
        collected.source.clone(),
        collected.file_path.clone(),
        &collected.outcome.revisions,
        &options,
    )
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).into_diagnostic()?;
    eprintln!("Report written to {}", path.display());
    Ok(())
}

fn print_warnings(outcome: &PipelineOutcome) {
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }
}
