use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use tracing::info;
use photo_dedup::actions::{execute_actions, ActionPlan, Confirmation, KeepPolicy};
use photo_dedup::dedup::{analyze_duplicates, build_report, print_group};
use photo_dedup::logging::{init_logging, DEFAULT_LOG_FILE};
use photo_dedup::{DedupAction, DedupResult, DialoguerPrompter, ExifTool, Scanner};

#[derive(Debug, Clone, ValueEnum)]
enum ActionType {
    /// List duplicate groups without taking any action
    List,
    /// Delete every duplicate except the one kept
    Delete,
    /// Move every duplicate except the one kept into --move-to
    Move,
}

#[derive(Parser)]
#[command(
    name = "photo-dedup",
    version,
    about = "Find duplicate photos by content hash, camera model and resolution",
    long_about = "Scan a photo library (including Sony .ARW files via ExifTool), group images whose content hash, camera model, resolution and size are identical, and optionally delete or relocate all but one file of each group."
)]
struct Cli {
    /// Directory to search for images
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Action to take on duplicate files
    #[arg(short, long, value_enum, default_value = "list")]
    action: ActionType,

    /// Target directory for the move action
    #[arg(long, value_name = "PATH")]
    move_to: Option<PathBuf>,

    /// Keep the highest resolution/quality file of each group without asking
    #[arg(long)]
    auto_select_best: bool,

    /// Ask for confirmation for each group separately
    #[arg(long)]
    group_by_group: bool,

    /// Use ExifTool for every file, failing if it is not installed
    #[arg(long)]
    force_exiftool: bool,

    /// ExifTool executable to run
    #[arg(long, value_name = "PROGRAM", default_value = "exiftool")]
    exiftool: String,

    /// Per-file ExifTool timeout in seconds
    #[arg(long, value_name = "SECS", default_value = "30")]
    tool_timeout: u64,

    /// Number of worker threads (0 = min(32, 4 x cores))
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Answer yes to every confirmation prompt (use with caution)
    #[arg(short, long)]
    yes: bool,

    /// Print the duplicate groups as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Append diagnostic logs to this file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Do not write a log file
    #[arg(long)]
    no_log_file: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_file = (!args.no_log_file).then_some(args.log_file.as_path());
    init_logging(args.verbose, log_file)?;

    if !args.directory.is_dir() {
        eprintln!(
            "{}",
            style(format!("Error: Directory not found: {}", args.directory.display())).red()
        );
        std::process::exit(1);
    }

    let action = match args.action {
        ActionType::List => DedupAction::List,
        ActionType::Delete => DedupAction::Delete,
        ActionType::Move => match &args.move_to {
            Some(dir) => DedupAction::Move(dir.clone()),
            None => {
                eprintln!("{}", style("Error: --move-to is required when using move action").red());
                std::process::exit(1);
            }
        },
    };

    let tool = ExifTool::new()
        .with_program(args.exiftool.clone())
        .with_query_timeout(Duration::from_secs(args.tool_timeout));

    let mut scanner = Scanner::new().with_tool(Arc::new(tool));
    scanner.set_workers(Some(args.workers));
    scanner.set_force_tool(args.force_exiftool);
    scanner.set_show_progress(!args.json);

    info!("Scanning directory: {}", args.directory.display());
    if !args.json {
        println!("{}", style("🔍 Scanning for duplicate images...").cyan().bold());
    }

    let scan_result = scanner
        .scan_directory(&args.directory)
        .with_context(|| format!("Scan of {} failed", args.directory.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&build_report(&scan_result))?);
    } else {
        display_results(&scan_result, &args);
    }

    if scan_result.duplicates.is_empty() {
        return Ok(());
    }

    if let Some(plan) = ActionPlan::for_action(&action) {
        let plan = plan
            .with_keep(if args.auto_select_best {
                KeepPolicy::AutoBest
            } else {
                KeepPolicy::Manual
            })
            .with_confirmation(if args.group_by_group {
                Confirmation::PerGroup
            } else {
                Confirmation::Once
            })
            .with_dry_run(args.dry_run);

        if args.dry_run {
            println!("{}", style("🧪 Dry run mode - no changes will be made").yellow().bold());
        }

        let mut prompter = DialoguerPrompter::new().assume_yes(args.yes);
        let result = execute_actions(&scan_result, &plan, &mut prompter)?;

        if !result.cancelled {
            result.print_summary();
            println!();
            println!("{}", style("✅ Deduplication complete!").green().bold());
        }
    }

    Ok(())
}

fn display_results(result: &DedupResult, args: &Cli) {
    if result.duplicates.is_empty() {
        println!("{}", style("✅ No duplicate images found!").green().bold());
        return;
    }

    println!();
    println!("{}", style("📊 Duplicate Images Found").cyan().bold());
    println!("{}", style("=".repeat(40)).cyan());

    // The executor prints each group again before acting on it
    if matches!(args.action, ActionType::List) || args.verbose {
        for (number, (identifier, records)) in result.sorted_groups().into_iter().enumerate() {
            print_group(number + 1, identifier, records, Some(&args.directory));
        }
    }

    println!();
    println!("Total images scanned: {}", result.total_files);
    analyze_duplicates(result).print_analysis();
}
