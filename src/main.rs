use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use histograph_core::{HistographConfig, OutputFormat};
use histograph_extract::language::{extension_of, language_for_extension};
use histograph_extract::{FunctionExtractor, HeuristicExtractor};
use histograph_graph::{
    coupling, evolution, hotspots, ownership, AnalysisProgress, AnalysisResult, AnalysisStatus,
    NodeKind, ProgressSink,
};
use histograph_vcs::GitCli;

#[derive(Parser)]
#[command(
    name = "histograph",
    version,
    about = "Mine git history into a knowledge graph",
    long_about = "Histograph mines a git repository into a knowledge graph of commits, files\n\
                   and functions, then answers questions about it: which files change most,\n\
                   which functions are hotspots, which files change together, who owns what.\n\n\
                   Examples:\n  \
                     histograph analyze --path .              Mine the repository and print stats\n  \
                     histograph analyze --output graph.json   Save the graph for later queries\n  \
                     histograph hotspots --graph graph.json   Rank files from a saved graph\n  \
                     histograph cochange --limit 5            Files that change together\n  \
                     histograph ownership --file src/app.ts   Owners of one file\n  \
                     histograph extract src/app.ts            List functions in a file"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .histograph.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Where a query command gets its graph from.
#[derive(Args)]
struct GraphSource {
    /// Repository path (default: current directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Read a saved analysis result instead of mining the repository
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Expand only the newest N commits into file touches (default: 200)
    #[arg(long)]
    commit_limit: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Mine the repository into a knowledge graph
    #[command(long_about = "Mine the repository into a knowledge graph.\n\n\
        Reads every reachable commit, expands the newest commits into touched files,\n\
        extracts functions from source files and counts their line-range history.\n\
        Text output prints summary statistics; JSON output prints the full result.\n\n\
        Examples:\n  histograph analyze --path .\n  histograph analyze --output graph.json\n  histograph analyze --format json --commit-limit 50")]
    Analyze {
        #[command(flatten)]
        source: GraphSource,

        /// Also write the full result as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rank files by modification frequency and churn
    Hotspots {
        #[command(flatten)]
        source: GraphSource,

        /// Maximum results to show (default: analytics.top_k)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Rank functions by line-range modification count
    Functions {
        #[command(flatten)]
        source: GraphSource,

        /// Maximum results to show (default: analytics.top_k)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show files that change in the same commits
    #[command(long_about = "Show files that change in the same commits.\n\n\
        Pairs are ranked by the number of commits touching both files. Only the\n\
        expanded commits contribute.\n\n\
        Examples:\n  histograph cochange\n  histograph cochange --file src/auth.ts")]
    Cochange {
        #[command(flatten)]
        source: GraphSource,

        /// Maximum pairs to show (default: analytics.co_change_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Only pairs that include this file
        #[arg(long)]
        file: Option<String>,
    },
    /// Show file owners, knowledge silos and the bus factor
    Ownership {
        #[command(flatten)]
        source: GraphSource,

        /// Show the owners of a single file
        #[arg(long)]
        file: Option<String>,

        /// Maximum files to list (default: analytics.top_k)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show month-by-month repository activity
    Evolution {
        #[command(flatten)]
        source: GraphSource,

        /// Months to cover, ending at the newest commit (default: 12)
        #[arg(long)]
        months: Option<u32>,
    },
    /// List nodes connected to a node
    #[command(long_about = "List nodes connected to a node by any edge.\n\n\
        Node ids look like commit:<hash>, file:<path> or function:<path>:<name>.\n\n\
        Examples:\n  histograph neighbors file:src/app.ts\n  histograph neighbors function:src/app.ts:render --graph graph.json")]
    Neighbors {
        /// Node id
        id: String,

        #[command(flatten)]
        source: GraphSource,
    },
    /// List the functions the extractor finds in a file
    Extract {
        /// Source file to scan
        file: PathBuf,
    },
    /// List commits, newest first
    Log {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum commits to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List local and remote branches
    Branches {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Show working tree status
    Status {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Show repository summary information
    Info {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Create a default .histograph.toml configuration file
    #[command(long_about = "Create a default .histograph.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .histograph.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# Histograph Configuration

[vcs]
# git_binary = "git"
# max_output_bytes = 52428800
# field_delimiter = "\u001f"

[mining]
# Only the newest N commits are expanded into touched files
# file_expansion_limit = 200
# source_extensions = ["js", "ts", "jsx", "tsx"]
# lookahead_lines = 100
# max_concurrent_queries = 8

# [mining.progress_every]
# commits = 100
# files = 20
# analysis = 10

[analytics]
# top_k = 10
# co_change_limit = 20
# evolution_months = 12
# silo_threshold = 0.8
"#;

const CONFIG_FILE: &str = ".histograph.toml";

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HISTOGRAPH_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<HistographConfig> {
    match path {
        Some(path) => HistographConfig::from_file(path)
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                HistographConfig::from_file(default_path).wrap_err(format!("loading {CONFIG_FILE}"))
            } else {
                Ok(HistographConfig::default())
            }
        }
    }
}

/// Progress bar on an interactive stderr, nothing otherwise.
#[derive(Clone)]
struct BarProgress(Option<indicatif::ProgressBar>);

impl BarProgress {
    fn new() -> Self {
        if !std::io::stderr().is_terminal() {
            return Self(None);
        }
        let pb = indicatif::ProgressBar::new(0);
        let style = indicatif::ProgressStyle::with_template(
            "{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({elapsed})",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("=> ");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        Self(Some(pb))
    }

    fn finish(&self) {
        if let Some(pb) = &self.0 {
            pb.finish_and_clear();
        }
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, progress: AnalysisProgress) {
        let Some(pb) = &self.0 else {
            return;
        };
        pb.set_length(progress.total as u64);
        pb.set_position(progress.current as u64);
        pb.set_message(format!("[{}] {}", progress.stage, progress.message));
    }
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

/// Mine the repository, or read a saved result when `--graph` is given.
async fn load_result(source: &GraphSource, config: &HistographConfig) -> Result<AnalysisResult> {
    if let Some(path) = &source.graph {
        let content = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?;
        let result: AnalysisResult = serde_json::from_str(&content)
            .into_diagnostic()
            .wrap_err(format!("parsing saved graph {}", path.display()))?;
        return Ok(result);
    }

    let mut config = config.clone();
    if let Some(limit) = source.commit_limit {
        config.mining.file_expansion_limit = limit;
    }

    let progress = BarProgress::new();
    let cancel = cancel_on_ctrl_c();
    let result =
        histograph_graph::analyze_repository(&source.path, &config, progress.clone(), &cancel)
            .await;
    progress.finish();

    match result.status {
        AnalysisStatus::Completed => {
            if !result.skipped.is_empty() {
                eprintln!(
                    "Skipped {} item(s); run with --verbose for details.",
                    result.skipped.len()
                );
            }
            Ok(result)
        }
        AnalysisStatus::Cancelled => miette::bail!("analysis cancelled"),
        AnalysisStatus::Failed => miette::bail!(miette::miette!(
            help = "Run histograph from inside a git repository, or specify --path to one",
            "analysis of {} failed: {}",
            source.path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        )),
    }
}

async fn open_repo(path: &Path, config: &HistographConfig) -> Result<GitCli> {
    let git = GitCli::new(path, &config.vcs);
    git.verify().await.map_err(|e| {
        miette::miette!(
            help = "Run histograph from inside a git repository, or specify --path to one",
            "Not a git repository: {} ({e})",
            path.display()
        )
    })?;
    Ok(git)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn date(value: &chrono::DateTime<chrono::FixedOffset>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn print_analysis(result: &AnalysisResult, format: OutputFormat) -> Result<()> {
    let stats = &result.stats;
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Markdown => {
            println!("# Repository Analysis\n");
            println!("| Metric | Value |");
            println!("|--------|-------|");
            println!("| Commits | {} |", stats.total_commits);
            println!("| Files | {} |", stats.total_files);
            println!("| Functions | {} |", stats.total_functions);
            println!("| Relationships | {} |", stats.total_relationships);
            println!("| Skipped items | {} |", result.skipped.len());
            println!("| Analysis time | {} ms |", stats.analysis_time);
        }
        OutputFormat::Text => {
            println!("Commits:        {}", stats.total_commits);
            println!("Files:          {}", stats.total_files);
            println!("Functions:      {}", stats.total_functions);
            println!("Relationships:  {}", stats.total_relationships);
            println!("Analysis time:  {} ms", stats.analysis_time);
            if !result.skipped.is_empty() {
                println!("\nSkipped ({}):", result.skipped.len());
                for item in &result.skipped {
                    println!("  [{}] {}: {}", item.stage, item.item, item.reason);
                }
            }
        }
    }
    Ok(())
}

fn print_hotspots(files: &[hotspots::FileHotspot], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(files)?,
        OutputFormat::Markdown => {
            println!("## File Hotspots\n");
            if files.is_empty() {
                println!("No file changes recorded.");
                return Ok(());
            }
            println!("| Rank | File | Score | Modifications | Churn |");
            println!("|------|------|-------|---------------|-------|");
            for (i, f) in files.iter().enumerate() {
                println!(
                    "| {} | `{}` | {} | {} | {} |",
                    i + 1,
                    f.path,
                    f.score,
                    f.modify_count,
                    f.churn
                );
            }
        }
        OutputFormat::Text => {
            if files.is_empty() {
                println!("No file changes recorded.");
                return Ok(());
            }
            println!("{:>4}  {:>5}  {:>6}  {:>7}  FILE", "RANK", "SCORE", "MODS", "CHURN");
            for (i, f) in files.iter().enumerate() {
                println!(
                    "{:>4}  {:>5}  {:>6}  {:>7}  {}",
                    i + 1,
                    f.score,
                    f.modify_count,
                    f.churn,
                    f.path
                );
            }
        }
    }
    Ok(())
}

fn print_functions(functions: &[hotspots::FunctionHotspot], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(functions)?,
        OutputFormat::Markdown => {
            println!("## Function Hotspots\n");
            if functions.is_empty() {
                println!("No functions found.");
                return Ok(());
            }
            println!("| Rank | Function | File | Lines | Modifications |");
            println!("|------|----------|------|-------|---------------|");
            for (i, f) in functions.iter().enumerate() {
                println!(
                    "| {} | `{}` | `{}` | {}-{} | {} |",
                    i + 1,
                    f.name,
                    f.file_path,
                    f.start_line,
                    f.end_line,
                    f.modify_count
                );
            }
        }
        OutputFormat::Text => {
            if functions.is_empty() {
                println!("No functions found.");
                return Ok(());
            }
            for (i, f) in functions.iter().enumerate() {
                println!(
                    "{:>4}  {:>4}  {} ({}:{}-{})",
                    i + 1,
                    f.modify_count,
                    f.name,
                    f.file_path,
                    f.start_line,
                    f.end_line
                );
            }
        }
    }
    Ok(())
}

fn print_co_changes(pairs: &[coupling::CoChange], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(pairs)?,
        OutputFormat::Markdown => {
            println!("## Co-change Patterns\n");
            if pairs.is_empty() {
                println!("No files changed together.");
                return Ok(());
            }
            println!("| File A | File B | Co-changes | Coupling |");
            println!("|--------|--------|------------|----------|");
            for p in pairs {
                println!(
                    "| `{}` | `{}` | {} | {:.0}% |",
                    p.file_a,
                    p.file_b,
                    p.count,
                    p.coupling_degree * 100.0
                );
            }
        }
        OutputFormat::Text => {
            if pairs.is_empty() {
                println!("No files changed together.");
                return Ok(());
            }
            for p in pairs {
                println!(
                    "{:>4}  {:>4.0}%  {} <-> {}",
                    p.count,
                    p.coupling_degree * 100.0,
                    p.file_a,
                    p.file_b
                );
            }
        }
    }
    Ok(())
}

fn print_file_ownership(file: &ownership::FileOwnership, format: OutputFormat) -> Result<()> {
    let last = file.last_modified.as_ref().map(date).unwrap_or_default();
    match format {
        OutputFormat::Json => print_json(file)?,
        OutputFormat::Markdown => {
            println!("## Ownership of `{}`\n", file.file_path);
            println!(
                "**Commits:** {} · **Last modified:** {} · **Bus factor:** {}{}\n",
                file.total_commits,
                last,
                file.bus_factor,
                if file.is_knowledge_silo { " · knowledge silo" } else { "" }
            );
            println!("| Author | Commits | Share | Added | Deleted |");
            println!("|--------|---------|-------|-------|---------|");
            for o in &file.owners {
                println!(
                    "| {} <{}> | {} | {:.0}% | {} | {} |",
                    o.author,
                    o.author_email,
                    o.commits,
                    o.percentage,
                    o.lines_added,
                    o.lines_deleted
                );
            }
        }
        OutputFormat::Text => {
            println!("{}", file.file_path);
            println!(
                "  commits: {}  last modified: {}  bus factor: {}{}",
                file.total_commits,
                last,
                file.bus_factor,
                if file.is_knowledge_silo { "  [knowledge silo]" } else { "" }
            );
            for o in &file.owners {
                println!(
                    "  {:>5.1}%  {:>4}  +{:<6} -{:<6} {} <{}>",
                    o.percentage,
                    o.commits,
                    o.lines_added,
                    o.lines_deleted,
                    o.author,
                    o.author_email
                );
            }
        }
    }
    Ok(())
}

fn print_ownership_summary(
    summary: &ownership::OwnershipSummary,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Markdown => {
            println!("## Ownership\n");
            println!("- **Files:** {}", summary.total_files);
            println!("- **Single-author files:** {}", summary.single_author_files);
            println!("- **Knowledge silos:** {}", summary.knowledge_silos);
            println!("- **Project bus factor:** {}\n", summary.project_bus_factor);
            if summary.files.is_empty() {
                return Ok(());
            }
            println!("| File | Top owner | Share | Commits | Silo |");
            println!("|------|-----------|-------|---------|------|");
            for f in summary.files.iter().take(limit) {
                let owner = f.owners.first().map(|o| o.author.as_str()).unwrap_or("");
                println!(
                    "| `{}` | {} | {:.0}% | {} | {} |",
                    f.file_path,
                    owner,
                    f.dominant_share * 100.0,
                    f.total_commits,
                    if f.is_knowledge_silo { "yes" } else { "" }
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "Files: {}  single-author: {}  knowledge silos: {}  bus factor: {}",
                summary.total_files,
                summary.single_author_files,
                summary.knowledge_silos,
                summary.project_bus_factor
            );
            for f in summary.files.iter().take(limit) {
                let owner = f.owners.first().map(|o| o.author.as_str()).unwrap_or("");
                println!(
                    "  {:>5.1}%  {:>4}  {}{}  ({})",
                    f.dominant_share * 100.0,
                    f.total_commits,
                    f.file_path,
                    if f.is_knowledge_silo { " [silo]" } else { "" },
                    owner
                );
            }
        }
    }
    Ok(())
}

fn print_evolution(data: &evolution::EvolutionData, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data)?,
        OutputFormat::Markdown => {
            println!("## Timeline\n");
            println!("| Month | Commits | Files | Added | Deleted | Contributors |");
            println!("|-------|---------|-------|-------|---------|--------------|");
            for p in &data.timeline {
                println!(
                    "| {} | {} | {} | {} | {} | {} |",
                    p.month, p.commits, p.files, p.lines_added, p.lines_deleted, p.contributors
                );
            }
            println!("\n## Authors\n");
            println!("| Author | Commits | First | Last | Added | Deleted |");
            println!("|--------|---------|-------|------|-------|---------|");
            for a in &data.authors {
                println!(
                    "| {} | {} | {} | {} | {} | {} |",
                    a.author,
                    a.total_commits,
                    date(&a.first_commit),
                    date(&a.last_commit),
                    a.lines_added,
                    a.lines_deleted
                );
            }
            println!("\n## File Types\n");
            println!("| Extension | Files | Added | Deleted |");
            println!("|-----------|-------|-------|---------|");
            for t in &data.file_types {
                println!(
                    "| {} | {} | {} | {} |",
                    t.extension, t.count, t.lines_added, t.lines_deleted
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "{:<8} {:>7} {:>6} {:>8} {:>8} {:>8} {:>6}",
                "MONTH", "COMMITS", "FILES", "ADDED", "DELETED", "NET", "AUTHORS"
            );
            for (p, churn) in data.timeline.iter().zip(&data.code_churn) {
                println!(
                    "{:<8} {:>7} {:>6} {:>8} {:>8} {:>8} {:>6}",
                    p.month,
                    p.commits,
                    p.files,
                    p.lines_added,
                    p.lines_deleted,
                    churn.net_change,
                    p.contributors
                );
            }
            if !data.authors.is_empty() {
                println!("\nAuthors:");
                for a in &data.authors {
                    println!(
                        "  {:>4}  {} .. {}  {} <{}>",
                        a.total_commits,
                        date(&a.first_commit),
                        date(&a.last_commit),
                        a.author,
                        a.author_email
                    );
                }
            }
            if !data.file_types.is_empty() {
                println!("\nFile types:");
                for t in &data.file_types {
                    println!(
                        "  {:<8} {:>5} files  +{} -{}",
                        t.extension, t.count, t.lines_added, t.lines_deleted
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_neighbors(result: &AnalysisResult, id: &str, format: OutputFormat) -> Result<()> {
    if result.graph.node(id).is_none() {
        miette::bail!(miette::miette!(
            help = "Node ids look like commit:<hash>, file:<path> or function:<path>:<name>",
            "No node with id {id}"
        ));
    }
    let neighbors = result.graph.connected_nodes(id);
    match format {
        OutputFormat::Json => print_json(&neighbors)?,
        OutputFormat::Markdown => {
            println!("## Neighbors of `{id}`\n");
            println!("| Kind | Id | Label |");
            println!("|------|----|-------|");
            for n in &neighbors {
                println!("| {} | `{}` | {} |", kind_label(n.kind()), n.id, n.label);
            }
        }
        OutputFormat::Text => {
            for n in &neighbors {
                println!("{:<9} {}  ({})", kind_label(n.kind()), n.id, n.label);
            }
        }
    }
    Ok(())
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Commit => "commit",
        NodeKind::File => "file",
        NodeKind::Function => "function",
    }
}

fn run_extract(file: &Path, config: &HistographConfig, format: OutputFormat) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err(format!("reading {}", file.display()))?;
    let extractor = HeuristicExtractor::new(config.mining.lookahead_lines);
    let functions = extractor.extract(&source);
    let path = file.to_string_lossy();
    let language = language_for_extension(&extension_of(&path));

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "file": path,
            "language": language,
            "functions": functions,
        }))?,
        OutputFormat::Markdown => {
            println!("## `{path}` ({language})\n");
            println!("| Function | Lines | Parameters |");
            println!("|----------|-------|------------|");
            for f in &functions {
                println!(
                    "| `{}` | {}-{}{} | {} |",
                    f.name,
                    f.start_line,
                    f.end_line,
                    if f.balanced { "" } else { " (unbalanced)" },
                    f.parameters.join(", ")
                );
            }
        }
        OutputFormat::Text => {
            if functions.is_empty() {
                println!("No functions found in {path}.");
            }
            for f in &functions {
                println!(
                    "{:>5}-{:<5} {}({}){}",
                    f.start_line,
                    f.end_line,
                    f.name,
                    f.parameters.join(", "),
                    if f.balanced { "" } else { "  [unbalanced]" }
                );
            }
        }
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("histograph v{version}: git history as a knowledge graph\n");
    println!("Quick start:");
    println!("  histograph init                 Create a .histograph.toml config file");
    println!("  histograph analyze --path .     Mine the repository and print stats");
    println!("  histograph hotspots             Rank files by change frequency and churn\n");
    println!("All commands:");
    println!("  analyze    Build the knowledge graph");
    println!("  hotspots   File hotspots");
    println!("  functions  Function hotspots");
    println!("  cochange   Files that change together");
    println!("  ownership  Owners, knowledge silos, bus factor");
    println!("  evolution  Month-by-month activity");
    println!("  neighbors  Nodes connected to a node");
    println!("  extract    Functions in a single file");
    println!("  log, branches, status, info");
    println!("             Repository queries\n");
    println!("Run 'histograph <command> --help' for details.");
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;

    match cli.command {
        None => print_welcome(),
        Some(Command::Analyze { source, output }) => {
            let result = load_result(&source, &config).await?;
            if let Some(path) = &output {
                let json = serde_json::to_string_pretty(&result).into_diagnostic()?;
                std::fs::write(path, json)
                    .into_diagnostic()
                    .wrap_err(format!("writing {}", path.display()))?;
                eprintln!("Saved analysis to {}", path.display());
            }
            print_analysis(&result, format)?;
        }
        Some(Command::Hotspots { source, limit }) => {
            let result = load_result(&source, &config).await?;
            let files =
                hotspots::most_modified_files(&result.graph, limit.unwrap_or(config.analytics.top_k));
            print_hotspots(&files, format)?;
        }
        Some(Command::Functions { source, limit }) => {
            let result = load_result(&source, &config).await?;
            let functions =
                hotspots::hotspot_functions(&result.graph, limit.unwrap_or(config.analytics.top_k));
            print_functions(&functions, format)?;
        }
        Some(Command::Cochange { source, limit, file }) => {
            let result = load_result(&source, &config).await?;
            let limit = limit.unwrap_or(config.analytics.co_change_limit);
            let pairs = match &file {
                Some(path) => {
                    let mut pairs = coupling::co_changes_of(&result.graph, path);
                    pairs.truncate(limit);
                    pairs
                }
                None => coupling::co_change_patterns(&result.graph, limit),
            };
            print_co_changes(&pairs, format)?;
        }
        Some(Command::Ownership { source, file, limit }) => {
            let result = load_result(&source, &config).await?;
            let threshold = config.analytics.silo_threshold;
            match &file {
                Some(path) => {
                    let Some(owners) = ownership::file_ownership(&result.graph, path, threshold)
                    else {
                        miette::bail!(miette::miette!(
                            help = "Only files touched by the expanded commits have ownership data",
                            "No history for {path}"
                        ));
                    };
                    print_file_ownership(&owners, format)?;
                }
                None => {
                    let summary = ownership::ownership_summary(&result.graph, threshold);
                    print_ownership_summary(
                        &summary,
                        limit.unwrap_or(config.analytics.top_k),
                        format,
                    )?;
                }
            }
        }
        Some(Command::Evolution { source, months }) => {
            let result = load_result(&source, &config).await?;
            let data = evolution::evolution(
                &result.graph,
                months.unwrap_or(config.analytics.evolution_months),
            );
            print_evolution(&data, format)?;
        }
        Some(Command::Neighbors { id, source }) => {
            let result = load_result(&source, &config).await?;
            print_neighbors(&result, &id, format)?;
        }
        Some(Command::Extract { file }) => {
            run_extract(&file, &config, format)?;
        }
        Some(Command::Log { path, limit }) => {
            let git = open_repo(&path, &config).await?;
            let log = git.commits().await?;
            let commits: Vec<_> = log.commits.into_iter().take(limit).collect();
            match format {
                OutputFormat::Json => print_json(&commits)?,
                OutputFormat::Markdown => {
                    println!("| Commit | Date | Author | Subject |");
                    println!("|--------|------|--------|---------|");
                    for c in &commits {
                        println!(
                            "| `{}` | {} | {} | {} |",
                            c.short_hash,
                            date(&c.date),
                            c.author,
                            c.subject
                        );
                    }
                }
                OutputFormat::Text => {
                    for c in &commits {
                        let refs = if c.refs.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", c.refs.join(", "))
                        };
                        println!(
                            "{} {} {:<20} {}{}  +{} -{}",
                            c.short_hash,
                            date(&c.date),
                            c.author,
                            c.subject,
                            refs,
                            c.insertions,
                            c.deletions
                        );
                    }
                }
            }
        }
        Some(Command::Branches { path }) => {
            let git = open_repo(&path, &config).await?;
            let branches = git.branches().await?;
            match format {
                OutputFormat::Json => print_json(&branches)?,
                _ => {
                    for b in &branches {
                        let marker = if b.is_current { "*" } else { " " };
                        let remote = if b.is_remote { "  (remote)" } else { "" };
                        println!("{marker} {}{remote}", b.name);
                    }
                }
            }
        }
        Some(Command::Status { path }) => {
            let git = open_repo(&path, &config).await?;
            let entries = git.status().await?;
            match format {
                OutputFormat::Json => print_json(&entries)?,
                _ => {
                    if entries.is_empty() {
                        println!("Working tree clean.");
                    }
                    for e in &entries {
                        let area = if e.staged { "staged" } else { "unstaged" };
                        println!("{:<9} {:<10} {}", area, e.status, e.path);
                    }
                }
            }
        }
        Some(Command::Info { path }) => {
            let git = open_repo(&path, &config).await?;
            let info = git.repository_info().await?;
            match format {
                OutputFormat::Json => print_json(&info)?,
                _ => {
                    let first = info.first_commit_date.as_ref().map(date).unwrap_or_default();
                    let last = info.last_commit_date.as_ref().map(date).unwrap_or_default();
                    println!("Name:          {}", info.name);
                    println!("Path:          {}", info.path.display());
                    println!("Branch:        {}", info.current_branch);
                    println!("Commits:       {}", info.total_commits);
                    println!("Contributors:  {}", info.total_contributors);
                    println!("First commit:  {first}");
                    println!("Last commit:   {last}");
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "histograph", &mut std::io::stdout());
        }
    }

    Ok(())
}
