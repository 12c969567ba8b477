//! `tilesnap export`: one PNG of a stored change.

use clap::Args;
use std::path::PathBuf;
use tilesnap::export::export_png;
use tilesnap::snapshot::SliceDate;

use super::area::AreaArgs;
use super::snapshot::resolve_area;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments of `tilesnap export`.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Snapshot name
    pub name: String,

    /// Export the earliest change at or after this date instead of the latest
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Output directory (defaults to the configured export directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Image file name without extension
    #[arg(long)]
    pub file_name: Option<String>,

    #[command(flatten)]
    pub area: AreaArgs,
}

/// Run `tilesnap export`.
pub fn run(runner: &CliRunner, args: ExportArgs) -> Result<(), CliError> {
    runner.log_startup("export");
    let store = runner.store();

    let date = match args.date.as_deref() {
        Some(after) => {
            let after = SliceDate::parse_loose(after)?;
            store.resolve_date(&args.name, after)?.ok_or_else(|| {
                CliError::Usage(format!(
                    "Snapshot '{}' has no change at or after {}",
                    args.name,
                    after.formatted()
                ))
            })?
        }
        None => store.latest_slice(&args.name)?.ok_or_else(|| {
            CliError::Usage(format!("Snapshot '{}' has no changes", args.name))
        })?,
    };

    let area = resolve_area(&store, &args.name, &args.area)?;
    let slice_dir = store.slice_dir(&args.name, date)?;
    let out_dir = args
        .output
        .unwrap_or_else(|| runner.config().storage.export_directory.clone());
    let file_name = args
        .file_name
        .unwrap_or_else(|| format!("{}-{}", args.name, date.components().join("-")));

    println!("Exporting {}[{}]...", args.name, date.formatted());
    let max_bytes = runner.config().storage.export_max_size;
    let report = runner.block_on(export_png(&slice_dir, &area, &out_dir, &file_name, max_bytes))?;
    println!(
        "Saved {} ({}x{} px, {} chunk(s)).",
        report.path.display(),
        report.width,
        report.height,
        report.chunks
    );
    Ok(())
}
