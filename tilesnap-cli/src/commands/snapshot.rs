//! Snapshot capture commands: `snapshot` and `schedule`.

use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tilesnap::area::Area;
use tilesnap::config::megabytes;
use tilesnap::snapshot::{
    parse_interval, run_schedule, QuotaPlan, SliceReport, SnapshotStore, StoreError,
};

use super::area::AreaArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Arguments of `tilesnap snapshot`.
#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Snapshot name
    pub name: String,

    #[command(flatten)]
    pub area: AreaArgs,

    /// Set the disk quota of the snapshot in megabytes (0 removes it)
    #[arg(long, value_name = "MB")]
    pub limit: Option<u64>,

    /// Delete old changes over the quota without asking
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments of `tilesnap schedule`.
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Snapshot name
    pub name: String,

    /// Time between captures, e.g. 30s, 5m or 2h
    pub interval: String,

    #[command(flatten)]
    pub area: AreaArgs,

    /// Delete old changes over the quota after each capture
    #[arg(short, long)]
    pub yes: bool,
}

/// What to do when a capture pushes a snapshot over its quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPolicy {
    /// Ask before deleting
    Prompt,
    /// Delete without asking
    Apply,
    /// Only report what would be deleted
    Report,
}

/// Run `tilesnap snapshot`.
pub fn run(runner: &CliRunner, args: SnapshotArgs) -> Result<(), CliError> {
    runner.log_startup("snapshot");

    let store = runner.store();
    let area = resolve_area(&store, &args.name, &args.area)?;
    let is_new = !store.exists(&args.name);
    let downloader = runner.downloader()?;
    let options = runner.config().slice_options();

    println!(
        "Capturing {} of '{}' ({} x {} chunks)...",
        area.kind(),
        args.name,
        area.width(),
        area.height()
    );
    let report = runner.block_on(store.create_slice(&downloader, &args.name, &area, options))?;
    print_report(&report);

    if let Some(limit) = args.limit {
        store.set_quota(&args.name, limit * BYTES_PER_MB)?;
        println!("'{}' was limited.", args.name);
    } else if is_new && runner.config().storage.default_quota > 0 {
        store.set_quota(&args.name, runner.config().storage.default_quota)?;
    }

    let policy = if args.yes {
        QuotaPolicy::Apply
    } else {
        QuotaPolicy::Prompt
    };
    settle_quota(&store, &args.name, policy)
}

/// Run `tilesnap schedule` until interrupted.
pub fn run_scheduled(runner: &CliRunner, args: ScheduleArgs) -> Result<(), CliError> {
    runner.log_startup("schedule");

    let interval = parse_interval(&args.interval)?;
    let store = runner.store();
    let area = resolve_area(&store, &args.name, &args.area)?;
    let downloader = runner.downloader()?;
    let options = runner.config().slice_options();
    let policy = if args.yes {
        QuotaPolicy::Apply
    } else {
        QuotaPolicy::Report
    };

    println!(
        "Capturing '{}' every {}. Press Ctrl+C to stop.",
        args.name, args.interval
    );

    let name = args.name.as_str();
    let completed = runner.block_on(async {
        let cancellation = CancellationToken::new();
        let signal_token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping schedule");
            }
            signal_token.cancel();
        });

        run_schedule(interval, cancellation, || {
            let store = &store;
            let downloader = &downloader;
            let area = &area;
            async move {
                let report = store.create_slice(downloader, name, area, options).await?;
                print_report(&report);
                if let Err(e) = settle_quota(store, name, policy) {
                    warn!(snapshot = name, error = %e, "Quota check failed");
                }
                Ok(report)
            }
        })
        .await
    });

    println!("Schedule stopped after {} capture(s).", completed);
    Ok(())
}

/// The area given on the command line, or the one recorded for an existing
/// snapshot.
pub fn resolve_area(
    store: &SnapshotStore,
    name: &str,
    args: &AreaArgs,
) -> Result<Area, CliError> {
    if let Some(area) = args.to_area()? {
        return Ok(area);
    }
    if store.exists(name) {
        let recorded = store.read_metadata(name)?.area;
        if !recorded.is_empty() {
            return Ok(recorded);
        }
    }
    Err(StoreError::NoArea.into())
}

/// Brings `name` back under its quota according to `policy`.
pub fn settle_quota(store: &SnapshotStore, name: &str, policy: QuotaPolicy) -> Result<(), CliError> {
    let plan = store.enforce_quota(name, 0)?;
    if plan.is_empty() {
        return Ok(());
    }

    let confirmed = match policy {
        QuotaPolicy::Apply => true,
        QuotaPolicy::Report => false,
        QuotaPolicy::Prompt => Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(quota_prompt(&plan))
            .default(false)
            .interact()
            .map_err(|e| CliError::Prompt(e.to_string()))?,
    };

    if confirmed {
        let applied = store.apply_quota_plan(&plan)?;
        println!(
            "Deleted {} change(s), freed {:.2} mb.",
            applied.deleted,
            megabytes(applied.freed_bytes)
        );
    } else {
        if policy == QuotaPolicy::Report {
            warn!(
                snapshot = name,
                quota_bytes = plan.quota_bytes,
                projected_bytes = plan.projected_bytes,
                victims = plan.victims.len(),
                "Snapshot over quota, nothing deleted"
            );
        }
        println!("{}", quota_tip(name));
    }
    Ok(())
}

/// Confirmation question for a quota plan.
pub fn quota_prompt(plan: &QuotaPlan) -> String {
    format!(
        "You're going to delete {} change(s) of '{}' to free disk space. Are you sure?",
        plan.victims.len(),
        plan.name
    )
}

fn quota_tip(name: &str) -> String {
    format!(
        "Tip: You can expand limit by command `tilesnap limit {} <your limit in megabytes>`",
        name
    )
}

/// Prints the outcome of one capture.
pub fn print_report(report: &SliceReport) {
    if report.failed == 0 {
        println!("All tiles saved successfully!");
    } else {
        println!(
            "Saved {} of {} tiles, {} failed.",
            report.written,
            report.written + report.failed,
            report.failed
        );
    }
    println!(
        "Change {}[{}] uses {:.2} mb.",
        report.name,
        report.date.formatted(),
        megabytes(report.bytes)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesnap::area::ChunkCoord;
    use tilesnap::snapshot::SliceDate;
    use tempfile::TempDir;

    fn write_slice(store: &SnapshotStore, name: &str, date: SliceDate, bytes: usize) {
        let dir = store.slice_dir(name, date).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("0_0.png"), vec![0u8; bytes]).unwrap();
    }

    fn date(h: u32) -> SliceDate {
        SliceDate::new(2025, 3, 7, h, 0).unwrap()
    }

    #[test]
    fn test_resolve_area_prefers_arguments() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let args = AreaArgs {
            rect: Some(vec![0, 0, 1, 1]),
            polygon: None,
        };
        let area = resolve_area(&store, "city", &args).unwrap();
        assert_eq!(area.width(), 2);
    }

    #[test]
    fn test_resolve_area_falls_back_to_recorded() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        std::fs::create_dir_all(store.snapshot_dir("city").unwrap()).unwrap();
        let mut meta = store.read_metadata("city").unwrap();
        meta.area = Area::rectangle(ChunkCoord::new(5, 5), ChunkCoord::new(7, 7));
        store.write_metadata("city", &meta).unwrap();

        let area = resolve_area(&store, "city", &AreaArgs::default()).unwrap();
        assert_eq!(area, meta.area);
    }

    #[test]
    fn test_resolve_area_without_any() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let err = resolve_area(&store, "nowhere", &AreaArgs::default()).unwrap_err();
        assert!(matches!(err, CliError::Store(StoreError::NoArea)));
    }

    #[test]
    fn test_settle_quota_apply_deletes_oldest() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        write_slice(&store, "city", date(1), 600);
        write_slice(&store, "city", date(2), 600);
        store.set_quota("city", 1000).unwrap();

        settle_quota(&store, "city", QuotaPolicy::Apply).unwrap();

        assert!(!store.slice_exists("city", date(1)));
        assert!(store.slice_exists("city", date(2)));
    }

    #[test]
    fn test_settle_quota_report_keeps_everything() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        write_slice(&store, "city", date(1), 600);
        write_slice(&store, "city", date(2), 600);
        store.set_quota("city", 1000).unwrap();

        settle_quota(&store, "city", QuotaPolicy::Report).unwrap();

        assert!(store.slice_exists("city", date(1)));
        assert!(store.slice_exists("city", date(2)));
    }

    #[test]
    fn test_quota_prompt_wording() {
        let plan = QuotaPlan {
            name: "city".to_string(),
            quota_bytes: 10,
            projected_bytes: 30,
            victims: vec![(date(1), 10), (date(2), 10)],
        };
        assert_eq!(
            quota_prompt(&plan),
            "You're going to delete 2 change(s) of 'city' to free disk space. Are you sure?"
        );
    }
}
