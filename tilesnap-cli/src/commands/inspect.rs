//! Read-only commands: `show` and `size`.

use clap::Args;
use tilesnap::config::megabytes;
use tilesnap::snapshot::{ChangeOrder, StoreError};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments of `tilesnap show`.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// List the changes of this snapshot instead of all snapshots
    pub name: Option<String>,

    /// Oldest change first
    #[arg(long, conflicts_with = "desc")]
    pub asc: bool,

    /// Newest change first
    #[arg(long)]
    pub desc: bool,
}

impl ShowArgs {
    fn order(&self) -> ChangeOrder {
        if self.asc {
            ChangeOrder::Ascending
        } else if self.desc {
            ChangeOrder::Descending
        } else {
            ChangeOrder::Unsorted
        }
    }
}

/// Run `tilesnap show`.
pub fn run_show(runner: &CliRunner, args: ShowArgs) -> Result<(), CliError> {
    runner.log_startup("show");
    let store = runner.store();

    match &args.name {
        Some(name) => {
            if !store.exists(name) {
                return Err(StoreError::NotFound(name.clone()).into());
            }
            let dates = store.list_changes(name, args.order())?;
            println!("Dates:");
            for date in &dates {
                println!("  {}", date.formatted());
            }
            if dates.is_empty() {
                println!("  (none)");
            }
        }
        None => {
            let names = store.list_snapshots()?;
            println!("Snapshots:");
            for name in &names {
                println!("  {}", name);
            }
            if names.is_empty() {
                println!("  (none)");
            }
        }
    }
    Ok(())
}

/// Run `tilesnap size`: disk usage of one or every snapshot.
pub fn run_size(runner: &CliRunner, name: Option<String>) -> Result<(), CliError> {
    runner.log_startup("size");
    let store = runner.store();

    match name {
        Some(name) => {
            let bytes = store.compute_size(&name, None)?;
            println!("{} - {:.2} mb", name, megabytes(bytes));
        }
        None => {
            let report = store.usage_report()?;
            let mut total = 0;
            for (name, bytes) in &report {
                println!("{} - {:.2} mb", name, megabytes(*bytes));
                total += bytes;
            }
            println!("Total memory usage of the disk: {:.2} mb.", megabytes(total));
        }
    }
    Ok(())
}
