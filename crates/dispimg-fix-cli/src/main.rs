//! dispimg-fix CLI - converts DISPIMG in-cell pictures into native drawings

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dispimg_fix::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

#[derive(Parser)]
#[command(name = "dispimg-fix")]
#[command(
    author,
    version,
    about = "Repair WPS in-cell pictures (DISPIMG formulas) in XLSX workbooks"
)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cells holding DISPIMG formulas
    Scan {
        /// Input workbook
        input: PathBuf,
    },

    /// Show the picture identifier -> image mapping
    Index {
        /// Input workbook
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what a repair would do, without writing anything
    Preview {
        /// Input workbook
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert DISPIMG cells into pictures and write a fixed copy
    #[command(alias = "fix")]
    Repair {
        /// Input workbook
        input: PathBuf,

        /// Output file (default: <input>_fixed.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep worksheet extension lists
        #[arg(long)]
        keep_extensions: bool,

        /// Do not print progress
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Scan { input } => show_scan(&input),
        Commands::Index { input, json } => show_index(&input, json),
        Commands::Preview { input, json } => show_preview(&input, json),
        Commands::Repair {
            input,
            output,
            keep_extensions,
            quiet,
        } => run_repair(input, output, !keep_extensions, quiet),
    }
}

fn show_scan(input: &Path) -> Result<()> {
    let found = scan(input).with_context(|| format!("Failed to scan '{}'", input.display()))?;

    if found.is_empty() {
        println!("No DISPIMG formulas found");
        return Ok(());
    }

    for sheet in &found.sheets {
        println!("Sheet \"{}\" ({} cells)", sheet.sheet.name, sheet.cells.len());
        for cell in &sheet.cells {
            println!("  {}\t{}", cell.coordinate(), cell.image_id);
        }
    }
    println!("Total: {}", found.cell_count());
    Ok(())
}

fn show_index(input: &Path, json: bool) -> Result<()> {
    let index = build_image_index(input)
        .with_context(|| format!("Failed to read image mapping from '{}'", input.display()))?;

    let mut entries: Vec<_> = index.iter().collect();
    entries.sort();
    if json {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(id, target)| (id.to_string(), serde_json::Value::from(target)))
            .collect();
        return print_json(&map);
    }
    for (id, target) in entries {
        println!("{}\t{}", id, target);
    }
    Ok(())
}

fn show_preview(input: &Path, json: bool) -> Result<()> {
    let entries =
        preview(input).with_context(|| format!("Failed to preview '{}'", input.display()))?;
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Nothing to repair");
        return Ok(());
    }

    let mut current_sheet = None;
    for entry in &entries {
        if current_sheet != Some(entry.sheet.as_str()) {
            println!("Sheet \"{}\":", entry.sheet);
            current_sheet = Some(entry.sheet.as_str());
        }
        match &entry.image_part {
            Some(part) => println!("  {}: {} -> {}", entry.coordinate, entry.image_id, part),
            None => println!("  {}: {} (mapping missing)", entry.coordinate, entry.image_id),
        }
    }
    let mapped = entries.iter().filter(|e| e.image_part.is_some()).count();
    println!("Total: {} ({} with an image)", entries.len(), mapped);
    Ok(())
}

/// Run the repair on a worker thread and render its progress events
fn run_repair(
    input: PathBuf,
    output: Option<PathBuf>,
    strip_extension_lists: bool,
    quiet: bool,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let options = RepairOptions {
        output,
        strip_extension_lists,
        progress: Some(tx),
    };

    log::debug!("Repairing '{}' on a worker thread", input.display());
    let worker_input = input.clone();
    let worker = thread::spawn(move || repair_with_options(&worker_input, &options));

    // The channel closes when the worker finishes
    for event in rx {
        if !quiet {
            render_progress(&event)?;
        }
    }
    if !quiet {
        eprintln!();
    }

    let outcome = match worker.join() {
        Ok(result) => result.with_context(|| format!("Failed to repair '{}'", input.display()))?,
        Err(_) => bail!("Repair worker panicked"),
    };

    match outcome {
        RepairOutcome::NothingToRepair => {
            println!("No DISPIMG formulas found, nothing written");
        }
        RepairOutcome::Repaired(report) => {
            for cell in report.unrepaired() {
                println!("  {}!{}: {}", cell.sheet, cell.coordinate(), cell.outcome);
            }
            println!(
                "Repaired {} of {} pictures",
                report.repaired(),
                report.processed()
            );
            println!("Output: {}", report.output.display());
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write JSON")?;
    writeln!(stdout).context("Failed to write to stdout")
}

fn render_progress(event: &ProgressEvent) -> Result<()> {
    const WIDTH: usize = 30;
    let filled = WIDTH * event.percent as usize / 100;

    let mut stderr = io::stderr().lock();
    write!(
        stderr,
        "\r[{}{}] {:>3}% {:<60}",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        event.percent,
        truncate(&event.status, 60)
    )
    .and_then(|_| stderr.flush())
    .context("Failed to write progress")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
