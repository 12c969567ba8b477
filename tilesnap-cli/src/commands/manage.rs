//! Commands that change stored snapshots: `delete` and `limit`.

use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use tilesnap::snapshot::{SliceDate, StoreError};

use super::snapshot::{settle_quota, QuotaPolicy};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments of `tilesnap delete`.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Snapshot name
    pub name: String,

    /// Delete only the change at this date (YYYY-M-D-H-Min)
    pub date: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Run `tilesnap delete`.
pub fn run_delete(runner: &CliRunner, args: DeleteArgs) -> Result<(), CliError> {
    runner.log_startup("delete");
    let store = runner.store();
    let date = args
        .date
        .as_deref()
        .map(SliceDate::parse_loose)
        .transpose()?;

    let (target, exists) = match date {
        Some(date) => (
            format!("{}[{}]", args.name, date.formatted()),
            store.slice_exists(&args.name, date),
        ),
        None => (
            format!("'{}' and all of its changes", args.name),
            store.exists(&args.name),
        ),
    };
    if !exists {
        return Err(StoreError::NotFound(target).into());
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {}?", target))
            .default(false)
            .interact()
            .map_err(|e| CliError::Prompt(e.to_string()))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_slice(&args.name, date)?;
    println!("Snapshot was deleted.");
    Ok(())
}

/// Run `tilesnap limit`: set a quota and apply it right away.
pub fn run_limit(runner: &CliRunner, name: &str, megabytes: u64, yes: bool) -> Result<(), CliError> {
    runner.log_startup("limit");
    let store = runner.store();

    store.set_quota(name, megabytes * 1024 * 1024)?;
    println!("'{}' was limited.", name);

    let policy = if yes {
        QuotaPolicy::Apply
    } else {
        QuotaPolicy::Prompt
    };
    settle_quota(&store, name, policy)
}
