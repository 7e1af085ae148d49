use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use clap::Parser;
use log::error;
use audiolink::{
    cli::commands::{Cli, Commands},
    utils::{parallel::configure_thread_pool, reporting::Reporter},
    AssignmentPlan, Inventory, LibraryPaths, LinkReconciler, LoftyTags, Pipeline, ReconcilePlan,
    ReconcileSummary, Result, SkippedFile, UuidGenerator,
};

fn print_scan_stats(inventory: &Inventory) {
    let stats = inventory.stats();
    println!("\nScan Summary:");
    println!("  Files.............. {}", stats.files);
    println!("  Id Valid........... {}", stats.valid);
    println!("  Id Invalid......... {}", stats.invalid);
    println!("  Id Missing......... {}", stats.missing);
    println!("  Id Duplicated...... {}", stats.duplicates);
    print_skipped(&inventory.skipped);
}

fn print_skipped(skipped: &[SkippedFile]) {
    if skipped.is_empty() {
        return;
    }
    println!("  Files skipped...... {}", skipped.len());
    for skip in skipped {
        println!("    {}: {}", skip.path.display(), skip.reason);
    }
}

fn print_assignment_plan(plan: &AssignmentPlan) {
    println!("\nDry run - no tags will be written");
    if plan.writes.is_empty() {
        println!("Every file already holds a unique identifier.");
    }
    for write in &plan.writes {
        println!("  Would write {} to {} ({})", write.identifier, write.path.display(), write.reason);
    }
    print_skipped(&plan.failures);
}

fn print_reconcile_plan(plan: &ReconcilePlan) {
    println!("\nDry run - the mirror will not be changed");
    if plan.is_noop() {
        println!("Mirror is up to date ({} links unchanged).", plan.unchanged);
    }
    for action in &plan.actions {
        println!("  Would {}", action.describe());
    }
    print_skipped(&plan.skipped);
}

fn print_reconcile_summary(summary: &ReconcileSummary) {
    println!("\nLink Summary:");
    println!("  Links created...... {}", summary.created.len());
    println!("  Links replaced..... {}", summary.replaced.len());
    println!("  Links removed...... {}", summary.removed.len());
    println!("  Links unchanged.... {}", summary.unchanged);
    print_skipped(&summary.skipped);
}

/// Anything but an explicit yes aborts, including an empty answer.
fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn scan(tags: &LoftyTags, source: &Path, mirror: Option<&Path>, report: Option<&Path>) -> Result<()> {
    let mut paths = LibraryPaths::new(source);
    if let Some(mirror) = mirror {
        paths = paths.with_mirror(mirror);
    }
    let paths = paths.validate()?;

    println!("Scanning {}", paths.source.display());
    let inventory = Pipeline::new(tags).scan(&paths.source)?;
    print_scan_stats(&inventory);

    let statuses = match paths.mirror.as_deref() {
        Some(mirror) => Some(LinkReconciler::new(mirror).link_statuses(&inventory)?),
        None => None,
    };
    if let Some(report) = report {
        Reporter::new().generate_inventory_report(&inventory, statuses.as_ref(), report)?;
        println!("Report saved to: {}", report.display());
    }
    Ok(())
}

fn assign(tags: &LoftyTags, source: &Path, mirror: Option<&Path>, recover: bool, dry_run: bool) -> Result<()> {
    let mut paths = LibraryPaths::new(source);
    if let Some(mirror) = mirror {
        paths = paths.with_mirror(mirror);
    }
    let paths = paths.validate()?;
    let pipeline = Pipeline::new(tags).recover_from_mirror(recover);

    let inventory = pipeline.scan(&paths.source)?;
    print_scan_stats(&inventory);

    if dry_run {
        let plan = pipeline.plan_identifiers(&inventory, UuidGenerator, paths.mirror.as_deref())?;
        print_assignment_plan(&plan);
        return Ok(());
    }

    let assignment = pipeline.assign_identifiers(inventory, UuidGenerator, paths.mirror.as_deref())?;
    println!("\nIdentifiers written: {}", assignment.written.len());
    for write in &assignment.written {
        println!("  {} -> {} ({})", write.path.display(), write.identifier, write.reason);
    }
    print_skipped(&assignment.skipped);
    Ok(())
}

fn link(tags: &LoftyTags, source: &Path, mirror: &Path, dry_run: bool) -> Result<()> {
    let paths = LibraryPaths::new(source).with_mirror(mirror).validate()?;
    let mirror = paths.mirror()?;
    let pipeline = Pipeline::new(tags);

    let inventory = pipeline.scan(&paths.source)?;
    print_scan_stats(&inventory);

    if dry_run {
        print_reconcile_plan(&LinkReconciler::new(mirror).plan(&inventory)?);
    } else {
        print_reconcile_summary(&pipeline.reconcile_links(&inventory, mirror)?);
    }
    Ok(())
}

fn run(
    tags: &LoftyTags,
    source: &Path,
    mirror: &Path,
    recover: bool,
    dry_run: bool,
    report: Option<&Path>,
) -> Result<()> {
    let paths = LibraryPaths::new(source).with_mirror(mirror);
    let pipeline = Pipeline::new(tags).recover_from_mirror(recover);

    if dry_run {
        let plan = pipeline.dry_run(&paths, UuidGenerator)?;
        print_assignment_plan(&plan.assignments);
        print_reconcile_plan(&plan.links);
        return Ok(());
    }

    let summary = pipeline.run(&paths, UuidGenerator)?;
    summary.print();
    if let Some(report) = report {
        Reporter::new().generate_run_report(&summary, report)?;
        println!("Report saved to: {}", report.display());
    }
    Ok(())
}

fn clear(tags: &LoftyTags, source: &Path, yes: bool) -> Result<()> {
    let paths = LibraryPaths::new(source).validate()?;
    if !yes && !confirm(&format!("Remove every identifier under {}?", paths.source.display()))? {
        println!("Aborted.");
        return Ok(());
    }

    let pipeline = Pipeline::new(tags);
    let inventory = pipeline.scan(&paths.source)?;
    let summary = pipeline.clear_identifiers(&inventory);
    println!("\nIdentifiers cleared: {}", summary.cleared.len());
    print_skipped(&summary.skipped);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match configure_thread_pool(cli.threads) {
        Ok(threads) => log::debug!("Initialized with {} threads", threads),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let tags = LoftyTags::new();
    let result = match cli.command {
        Commands::Scan { source, mirror, report } => {
            scan(&tags, &source.source, mirror.as_deref(), report.as_deref())
        }
        Commands::Assign { source, mirror, recover, dry_run } => {
            assign(&tags, &source.source, mirror.as_deref(), recover, dry_run)
        }
        Commands::Link { source, mirror, dry_run } => link(&tags, &source.source, &mirror.mirror, dry_run),
        Commands::Run { source, mirror, recover, dry_run, report } => {
            run(&tags, &source.source, &mirror.mirror, recover, dry_run, report.as_deref())
        }
        Commands::Clear { source, yes } => clear(&tags, &source.source, yes),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
