//! On-disk snapshot store.
//!
//! Layout below the store root:
//!
//! ```text
//! <root>/<name>/metadata.json
//! <root>/<name>/<Y>/<M>/<D>/<HH>/<MM>/<cx>_<cy>.png
//! ```

use super::date::SliceDate;
use super::error::StoreError;
use super::lister::{DirectoryLister, FsLister};
use super::metadata::{SnapshotMetadata, METADATA_FILE};
use super::quota::{select_victims, AppliedQuota, QuotaPlan};
use crate::area::{enumerate_chunks, Area, ChunkCoord};
use crate::download::{ChunkFetch, Downloader, Sleeper, DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN};
use crate::provider::ChunkSource;
use chrono::{Local, Timelike};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Number of directory levels between a snapshot root and its slices.
const SLICE_DEPTH: usize = 5;

/// Sort order for [`SnapshotStore::list_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeOrder {
    /// Directory order as returned by the lister
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

/// Download pacing for a new slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceOptions {
    pub concurrency: usize,
    pub cooldown: Duration,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Outcome of [`SnapshotStore::create_slice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceReport {
    pub name: String,
    pub date: SliceDate,
    /// Chunks written to disk
    pub written: usize,
    /// Chunks that failed to download or write
    pub failed: usize,
    /// Bytes of the slice on disk
    pub bytes: u64,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    written: usize,
    failed: usize,
}

/// Time-versioned chunk storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore<L: DirectoryLister = FsLister> {
    root: PathBuf,
    lister: L,
}

impl SnapshotStore<FsLister> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_lister(root, FsLister)
    }
}

impl<L: DirectoryLister> SnapshotStore<L> {
    pub fn with_lister(root: impl Into<PathBuf>, lister: L) -> Self {
        Self {
            root: root.into(),
            lister,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a snapshot. Names must be a single path component.
    pub fn snapshot_dir(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn slice_dir(&self, name: &str, date: SliceDate) -> Result<PathBuf, StoreError> {
        Ok(self.snapshot_dir(name)?.join(date.to_path()))
    }

    pub fn chunk_path(
        &self,
        name: &str,
        date: SliceDate,
        coord: ChunkCoord,
    ) -> Result<PathBuf, StoreError> {
        Ok(self.slice_dir(name, date)?.join(coord.file_name()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.snapshot_dir(name).map(|p| p.is_dir()).unwrap_or(false)
    }

    pub fn slice_exists(&self, name: &str, date: SliceDate) -> bool {
        self.slice_dir(name, date)
            .map(|p| p.is_dir())
            .unwrap_or(false)
    }

    /// Names of all snapshots, sorted. A missing store root yields none.
    pub fn list_snapshots(&self) -> Result<Vec<String>, StoreError> {
        let mut names = match self.lister.subdirectories(&self.root) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };
        names.sort();
        Ok(names)
    }

    /// Reads a snapshot's metadata, writing a default document if absent.
    pub fn read_metadata(&self, name: &str) -> Result<SnapshotMetadata, StoreError> {
        let dir = self.snapshot_dir(name)?;
        if !dir.is_dir() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let path = dir.join(METADATA_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|source| StoreError::Metadata { path, source }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(snapshot = name, "Creating default metadata");
                let meta = SnapshotMetadata::default();
                self.write_metadata(name, &meta)?;
                Ok(meta)
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    pub fn write_metadata(&self, name: &str, meta: &SnapshotMetadata) -> Result<(), StoreError> {
        let path = self.snapshot_dir(name)?.join(METADATA_FILE);
        let content = serde_json::to_string_pretty(meta)
            .map_err(|source| StoreError::Metadata {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&path, content).map_err(|e| StoreError::io(&path, e))
    }

    /// Sets the disk quota of a snapshot in bytes (0 disables it).
    pub fn set_quota(&self, name: &str, quota_bytes: u64) -> Result<(), StoreError> {
        let mut meta = self.read_metadata(name)?;
        meta.quota_bytes = quota_bytes;
        self.write_metadata(name, &meta)?;
        info!(snapshot = name, quota_bytes = quota_bytes, "Quota updated");
        Ok(())
    }

    /// Every slice date of a snapshot.
    ///
    /// Directories whose path does not form a valid date are skipped.
    pub fn list_changes(
        &self,
        name: &str,
        order: ChangeOrder,
    ) -> Result<Vec<SliceDate>, StoreError> {
        let root = self.snapshot_dir(name)?;
        let leaves = self.walk_leaves(name, &root, SLICE_DEPTH)?;

        let mut dates: Vec<SliceDate> = leaves
            .iter()
            .filter_map(|relative| match SliceDate::parse(relative) {
                Ok(date) => Some(date),
                Err(_) => {
                    debug!(snapshot = name, path = %relative, "Skipping non-date directory");
                    None
                }
            })
            .collect();

        match order {
            ChangeOrder::Unsorted => {}
            ChangeOrder::Ascending => dates.sort(),
            ChangeOrder::Descending => dates.sort_by(|a, b| b.cmp(a)),
        }
        Ok(dates)
    }

    /// Earliest slice at or after `after`.
    pub fn resolve_date(
        &self,
        name: &str,
        after: SliceDate,
    ) -> Result<Option<SliceDate>, StoreError> {
        Ok(self
            .list_changes(name, ChangeOrder::Ascending)?
            .into_iter()
            .find(|d| *d >= after))
    }

    /// Most recent slice: the metadata's `latest_date` when it still exists,
    /// otherwise the newest slice on disk.
    pub fn latest_slice(&self, name: &str) -> Result<Option<SliceDate>, StoreError> {
        let meta = self.read_metadata(name)?;
        if let Some(latest) = meta.latest() {
            if self.slice_exists(name, latest) {
                return Ok(Some(latest));
            }
        }
        Ok(self
            .list_changes(name, ChangeOrder::Descending)?
            .into_iter()
            .next())
    }

    /// Disk usage of a snapshot, or of one slice when `date` is given.
    ///
    /// Slice sizes are memoized in the metadata's `size_cache` and the
    /// metadata is written back afterwards.
    pub fn compute_size(&self, name: &str, date: Option<SliceDate>) -> Result<u64, StoreError> {
        let mut meta = self.read_metadata(name)?;
        let total = self.measure(name, date, &mut meta.size_cache)?;
        self.write_metadata(name, &meta)?;
        Ok(total)
    }

    /// Size walk against an explicit cache, without touching metadata.
    ///
    /// Leaves already present in `size_cache` are not listed again.
    pub fn measure(
        &self,
        name: &str,
        date: Option<SliceDate>,
        size_cache: &mut BTreeMap<String, u64>,
    ) -> Result<u64, StoreError> {
        let root = self.snapshot_dir(name)?;
        let (start, levels, prefix) = match date {
            Some(d) => (root.join(d.to_path()), 0, Some(d.to_string())),
            None => (root.clone(), SLICE_DEPTH, None),
        };

        let leaves = match prefix {
            Some(key) => {
                if !size_cache.contains_key(&key) {
                    // Fail early on a missing slice rather than caching zero
                    self.lister
                        .subdirectories(&start)
                        .map_err(|e| map_missing(e, name, &start))?;
                }
                vec![key]
            }
            None => self.walk_leaves(name, &start, levels)?,
        };

        let mut total = 0u64;
        for relative in leaves {
            let key = cache_key(&relative);
            if let Some(size) = size_cache.get(&key) {
                total += size;
                continue;
            }

            let dir = root.join(&relative);
            let sizes = match self.lister.file_sizes(&dir) {
                Ok(sizes) => sizes,
                Err(e) if e.kind() == io::ErrorKind::NotFound && date.is_none() => {
                    debug!(path = %dir.display(), "Slice removed during walk");
                    continue;
                }
                Err(e) => return Err(map_missing(e, name, &dir)),
            };
            let size: u64 = sizes.iter().sum();
            size_cache.insert(key, size);
            total += size;
        }
        Ok(total)
    }

    /// Plans the deletions needed to keep a snapshot under its quota once
    /// `added_bytes` more are stored.
    ///
    /// Slices are taken oldest first until the projection fits. A disabled
    /// quota yields an empty plan.
    pub fn enforce_quota(&self, name: &str, added_bytes: u64) -> Result<QuotaPlan, StoreError> {
        let mut meta = self.read_metadata(name)?;
        if !meta.quota_enabled() {
            return Ok(QuotaPlan::disabled(name));
        }

        let projected = self.measure(name, None, &mut meta.size_cache)? + added_bytes;
        let ascending = self.list_changes(name, ChangeOrder::Ascending)?;
        let cache = &mut meta.size_cache;
        let victims = select_victims(projected, meta.quota_bytes, &ascending, |date| {
            self.measure(name, Some(date), cache)
        })?;
        self.write_metadata(name, &meta)?;

        if !victims.is_empty() {
            info!(
                snapshot = name,
                quota_bytes = meta.quota_bytes,
                projected_bytes = projected,
                victims = victims.len(),
                "Snapshot over quota"
            );
        }

        Ok(QuotaPlan {
            name: name.to_string(),
            quota_bytes: meta.quota_bytes,
            projected_bytes: projected,
            victims,
        })
    }

    /// Deletes the slices of a confirmed plan.
    ///
    /// Slices that are already gone are skipped. Any other failure stops the
    /// deletion and is returned.
    pub fn apply_quota_plan(&self, plan: &QuotaPlan) -> Result<AppliedQuota, StoreError> {
        let mut applied = AppliedQuota::default();
        for &(date, size) in &plan.victims {
            match self.delete_slice(&plan.name, Some(date)) {
                Ok(()) => {
                    applied.deleted += 1;
                    applied.freed_bytes += size;
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(snapshot = %plan.name, date = %date, "Slice already gone");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(applied)
    }

    /// Deletes one slice, or the whole snapshot when `date` is `None`.
    ///
    /// Emptied ancestor directories are removed up to, but not including,
    /// the snapshot root.
    pub fn delete_slice(&self, name: &str, date: Option<SliceDate>) -> Result<(), StoreError> {
        let root = self.snapshot_dir(name)?;
        let Some(date) = date else {
            if !root.is_dir() {
                return Err(StoreError::NotFound(name.to_string()));
            }
            std::fs::remove_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
            info!(snapshot = name, "Snapshot deleted");
            return Ok(());
        };

        let dir = root.join(date.to_path());
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("{}[{}]", name, date)));
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        if let Some(parent) = dir.parent() {
            prune_empty_parents(parent, &root);
        }

        let mut meta = self.read_metadata(name)?;
        meta.size_cache.remove(&date.to_string());
        if meta.latest() == Some(date) {
            meta.latest_date = self
                .list_changes(name, ChangeOrder::Descending)?
                .first()
                .map(|d| d.to_string())
                .unwrap_or_default();
        }
        self.write_metadata(name, &meta)?;

        info!(snapshot = name, date = %date, "Slice deleted");
        Ok(())
    }

    /// Disk usage of every snapshot, in name order.
    pub fn usage_report(&self) -> Result<Vec<(String, u64)>, StoreError> {
        self.list_snapshots()?
            .into_iter()
            .map(|name| {
                let size = self.compute_size(&name, None)?;
                Ok((name, size))
            })
            .collect()
    }

    /// Records a freshly written slice in the metadata and returns its size.
    fn record_slice(&self, name: &str, date: SliceDate, area: &Area) -> Result<u64, StoreError> {
        let mut meta = self.read_metadata(name)?;
        let key = date.to_string();
        meta.size_cache.remove(&key);
        let bytes = self.measure(name, Some(date), &mut meta.size_cache)?;
        meta.latest_date = key;
        meta.area = area.clone();
        self.write_metadata(name, &meta)?;
        Ok(bytes)
    }

    /// Breadth-first walk `levels` deep below `start`, returning leaf paths
    /// relative to `start`.
    fn walk_leaves(&self, name: &str, start: &Path, levels: usize) -> Result<Vec<String>, StoreError> {
        let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::new();
        let mut leaves = Vec::new();

        // The start directory must exist; branches removed mid-walk are skipped
        let top = self
            .lister
            .subdirectories(start)
            .map_err(|e| map_missing(e, name, start))?;
        if levels == 0 {
            return Ok(vec![String::new()]);
        }
        for child in top {
            queue.push_back((PathBuf::from(child), 1));
        }

        while let Some((relative, depth)) = queue.pop_front() {
            if depth == levels {
                leaves.push(relative_to_key(&relative));
                continue;
            }
            let dir = start.join(&relative);
            let children = match self.lister.subdirectories(&dir) {
                Ok(children) => children,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %dir.display(), "Directory removed during walk");
                    continue;
                }
                Err(e) => return Err(StoreError::io(&dir, e)),
            };
            for child in children {
                queue.push_back((relative.join(child), depth + 1));
            }
        }
        Ok(leaves)
    }
}

impl<L: DirectoryLister + Clone + 'static> SnapshotStore<L> {
    /// Runs synchronous store work on the blocking pool.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Fetches a new slice of `area` stamped with the current time.
    ///
    /// When a slice already exists for this minute, waits for the next
    /// minute so every capture gets its own directory.
    pub async fn create_slice<P, S>(
        &self,
        downloader: &Downloader<P, S>,
        name: &str,
        area: &Area,
        options: SliceOptions,
    ) -> Result<SliceReport, StoreError>
    where
        P: ChunkSource,
        S: Sleeper,
    {
        let mut date = SliceDate::now();
        loop {
            match self
                .create_slice_at(downloader, name, area, date, options)
                .await
            {
                Err(StoreError::SliceExists(_)) => {
                    let wait = until_next_minute();
                    debug!(
                        snapshot = name,
                        date = %date,
                        wait_ms = wait.as_millis() as u64,
                        "Change exists for this minute, waiting"
                    );
                    downloader.sleeper().sleep(wait).await;
                    date = SliceDate::now().max(date.next_minute());
                }
                result => return result,
            }
        }
    }

    /// Fetches a new slice stamped with `date`.
    ///
    /// Fails with [`StoreError::SliceExists`] when that slice is already
    /// stored. Failed chunks are logged and skipped; a partially fetched
    /// slice is kept and still becomes the snapshot's latest.
    pub async fn create_slice_at<P, S>(
        &self,
        downloader: &Downloader<P, S>,
        name: &str,
        area: &Area,
        date: SliceDate,
        options: SliceOptions,
    ) -> Result<SliceReport, StoreError>
    where
        P: ChunkSource,
        S: Sleeper,
    {
        if area.is_empty() {
            return Err(StoreError::NoArea);
        }
        let slice_dir = self.slice_dir(name, date)?;
        if let Some(parent) = slice_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        match tokio::fs::create_dir(&slice_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::SliceExists(format!("{}[{}]", name, date.formatted())));
            }
            Err(e) => return Err(StoreError::io(&slice_dir, e)),
        }

        let coords = enumerate_chunks(area);
        info!(
            snapshot = name,
            date = %date,
            chunks = coords.len(),
            source = downloader.source().name(),
            "Fetching slice"
        );

        let outcomes = downloader
            .fetch_batches(&coords, options.concurrency, options.cooldown, |batch| {
                let dir = slice_dir.clone();
                async move { write_batch(&dir, batch).await }
            })
            .await;

        let (written, failed) = outcomes
            .iter()
            .fold((0, 0), |(w, f), o| (w + o.written, f + o.failed));

        let owned_name = name.to_string();
        let owned_area = area.clone();
        let bytes = self
            .run_blocking(move |store| store.record_slice(&owned_name, date, &owned_area))
            .await?;

        info!(
            snapshot = name,
            date = %date,
            written = written,
            failed = failed,
            bytes = bytes,
            "Slice saved"
        );

        Ok(SliceReport {
            name: name.to_string(),
            date,
            written,
            failed,
            bytes,
        })
    }
}

async fn write_batch(dir: &Path, batch: Vec<ChunkFetch>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for fetch in batch {
        let bytes = match fetch.result {
            Ok(bytes) => bytes,
            Err(_) => {
                outcome.failed += 1;
                continue;
            }
        };
        let path = dir.join(fetch.coord.file_name());
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = bytes.len(), "Saved chunk");
                outcome.written += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write chunk");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// Time left until the wall clock enters the next minute.
fn until_next_minute() -> Duration {
    let now = Local::now();
    let elapsed = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    Duration::from_secs(60).saturating_sub(elapsed)
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn map_missing(e: io::Error, name: &str, path: &Path) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::io(path, e)
    }
}

fn relative_to_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalizes a leaf path so padded and unpadded spellings share a key.
fn cache_key(relative: &str) -> String {
    SliceDate::parse(relative)
        .map(|d| d.to_string())
        .unwrap_or_else(|_| relative.to_string())
}

/// Removes empty directories from `start` upwards, stopping at `stop`.
fn prune_empty_parents(start: &Path, stop: &Path) {
    let mut current = start.to_path_buf();
    while current != stop && current.starts_with(stop) {
        let empty = match std::fs::read_dir(&current) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        };
        if !empty {
            break;
        }
        if let Err(e) = std::fs::remove_dir(&current) {
            debug!(path = %current.display(), error = %e, "Failed to remove empty directory");
            break;
        }
        debug!(path = %current.display(), "Removed empty directory");
        if !current.pop() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::RecordingSleeper;
    use crate::provider::{MockChunkSource, ProviderError};
    use crate::snapshot::lister::tests::MemoryLister;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn date(h: u32, m: u32) -> SliceDate {
        SliceDate::new(2025, 3, 7, h, m).unwrap()
    }

    fn downloader(source: MockChunkSource) -> Downloader<MockChunkSource, RecordingSleeper> {
        Downloader::with_sleeper(Arc::new(source), RecordingSleeper::new())
    }

    fn city_area() -> Area {
        Area::rectangle(ChunkCoord::new(1, 9), ChunkCoord::new(3, 7))
    }

    fn city_source() -> MockChunkSource {
        let source = MockChunkSource::new();
        for c in enumerate_chunks(&city_area()) {
            source.respond(c, Ok(vec![0u8; (c.x * 10 + c.y) as usize]));
        }
        source
    }

    fn fill_slice(store: &SnapshotStore, name: &str, d: SliceDate, sizes: &[usize]) {
        let dir = store.slice_dir(name, d).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        for (i, size) in sizes.iter().enumerate() {
            std::fs::write(dir.join(format!("{}_0.png", i)), vec![1u8; *size]).unwrap();
        }
    }

    #[tokio::test]
    async fn test_city_scenario() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let dl = downloader(city_source());

        let report = store
            .create_slice_at(&dl, "city", &city_area(), date(9, 5), SliceOptions::default())
            .await
            .unwrap();

        let expected: u64 = enumerate_chunks(&city_area())
            .iter()
            .map(|c| (c.x * 10 + c.y) as u64)
            .sum();
        assert_eq!(report.written, 9);
        assert_eq!(report.failed, 0);
        assert_eq!(report.bytes, expected);

        assert_eq!(
            store.list_changes("city", ChangeOrder::Unsorted).unwrap(),
            vec![date(9, 5)]
        );
        assert_eq!(store.compute_size("city", None).unwrap(), expected);
        assert!(store
            .chunk_path("city", date(9, 5), ChunkCoord::new(2, 8))
            .unwrap()
            .is_file());

        let meta = store.read_metadata("city").unwrap();
        assert_eq!(meta.latest_date, "2025/3/7/09/05");
        assert_eq!(meta.area, city_area());
        assert_eq!(meta.size_cache.get("2025/3/7/09/05"), Some(&expected));
    }

    #[tokio::test]
    async fn test_create_slice_requires_area() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let dl = downloader(MockChunkSource::new());

        let err = store
            .create_slice(&dl, "city", &Area::empty(), SliceOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoArea));
        assert!(!store.exists("city"));
    }

    #[tokio::test]
    async fn test_partial_failure_is_kept() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let source = MockChunkSource::new();
        for c in enumerate_chunks(&city_area()) {
            let response = if c == ChunkCoord::new(2, 8) {
                Err(ProviderError::Status {
                    status: 500,
                    url: "u".into(),
                })
            } else {
                Ok(vec![1u8; 4])
            };
            source.respond(c, response);
        }
        let dl = downloader(source);

        let report = store
            .create_slice_at(&dl, "city", &city_area(), date(10, 0), SliceOptions::default())
            .await
            .unwrap();

        assert_eq!(report.written, 8);
        assert_eq!(report.failed, 1);
        assert_eq!(store.read_metadata("city").unwrap().latest(), Some(date(10, 0)));
    }

    #[tokio::test]
    async fn test_batches_pause_with_cooldown() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let dl = downloader(city_source());
        let options = SliceOptions {
            concurrency: 4,
            cooldown: Duration::from_millis(400),
        };

        store
            .create_slice_at(&dl, "city", &city_area(), date(9, 5), options)
            .await
            .unwrap();

        assert_eq!(dl.sleeper().waits(), vec![Duration::from_millis(400); 2]);
        assert!(dl.source().peak_in_flight() <= 4);
    }

    #[test]
    fn test_list_changes_orders() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(12, 0), &[1]);
        fill_slice(&store, "s", date(9, 30), &[1]);
        fill_slice(&store, "s", SliceDate::new(2024, 12, 31, 23, 59).unwrap(), &[1]);

        let asc = store.list_changes("s", ChangeOrder::Ascending).unwrap();
        assert_eq!(
            asc,
            vec![
                SliceDate::new(2024, 12, 31, 23, 59).unwrap(),
                date(9, 30),
                date(12, 0)
            ]
        );
        let desc = store.list_changes("s", ChangeOrder::Descending).unwrap();
        assert_eq!(desc.first(), Some(&date(12, 0)));
        assert_eq!(store.list_changes("s", ChangeOrder::Unsorted).unwrap().len(), 3);
    }

    #[test]
    fn test_list_changes_missing_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let err = store.list_changes("nope", ChangeOrder::Ascending).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resolve_date() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[1]);
        fill_slice(&store, "s", date(11, 0), &[1]);

        assert_eq!(store.resolve_date("s", date(8, 0)).unwrap(), Some(date(9, 0)));
        assert_eq!(store.resolve_date("s", date(9, 0)).unwrap(), Some(date(9, 0)));
        assert_eq!(store.resolve_date("s", date(9, 1)).unwrap(), Some(date(11, 0)));
        assert_eq!(store.resolve_date("s", date(12, 0)).unwrap(), None);
    }

    #[test]
    fn test_measure_is_memoized() {
        let mut lister = MemoryLister::new();
        lister.add_file("/virtual/s/2025/3/7/09/00/0_0.png", 100);
        lister.add_file("/virtual/s/2025/3/7/09/00/1_0.png", 50);
        lister.add_file("/virtual/s/2025/3/7/10/00/0_0.png", 25);
        let store = SnapshotStore::with_lister("/virtual", lister);
        let mut cache = BTreeMap::new();

        assert_eq!(store.measure("s", None, &mut cache).unwrap(), 175);
        let listings = store.lister.file_listings();
        assert_eq!(listings, 2);

        assert_eq!(store.measure("s", None, &mut cache).unwrap(), 175);
        assert_eq!(store.lister.file_listings(), listings);
        assert_eq!(cache.get("2025/3/7/09/00"), Some(&150));
    }

    #[test]
    fn test_measure_single_slice() {
        let mut lister = MemoryLister::new();
        lister.add_file("/virtual/s/2025/3/7/09/00/0_0.png", 100);
        lister.add_file("/virtual/s/2025/3/7/10/00/0_0.png", 25);
        let store = SnapshotStore::with_lister("/virtual", lister);
        let mut cache = BTreeMap::new();

        assert_eq!(store.measure("s", Some(date(10, 0)), &mut cache).unwrap(), 25);
        assert_eq!(cache.len(), 1);
        assert!(store
            .measure("s", Some(date(11, 0)), &mut cache)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_compute_size_persists_cache() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[10, 20]);

        assert_eq!(store.compute_size("s", None).unwrap(), 30);
        let meta = store.read_metadata("s").unwrap();
        assert_eq!(meta.size_cache.get("2025/3/7/09/00"), Some(&30));
        assert_eq!(store.compute_size("s", Some(date(9, 0))).unwrap(), 30);
    }

    #[test]
    fn test_quota_disabled_plans_nothing() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[1000]);

        let plan = store.enforce_quota("s", 5000).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.quota_bytes, 0);
    }

    #[test]
    fn test_quota_evicts_earlier_slice() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[600]);
        fill_slice(&store, "s", date(10, 0), &[500]);
        store.set_quota("s", 800).unwrap();

        let plan = store.enforce_quota("s", 0).unwrap();
        assert_eq!(plan.projected_bytes, 1100);
        assert_eq!(plan.victims, vec![(date(9, 0), 600)]);

        let applied = store.apply_quota_plan(&plan).unwrap();
        assert_eq!(applied.deleted, 1);
        assert_eq!(applied.freed_bytes, 600);
        assert_eq!(
            store.list_changes("s", ChangeOrder::Ascending).unwrap(),
            vec![date(10, 0)]
        );
        let meta = store.read_metadata("s").unwrap();
        assert!(!meta.size_cache.contains_key("2025/3/7/09/00"));
    }

    #[test]
    fn test_quota_projection_counts_added_bytes() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[300]);
        fill_slice(&store, "s", date(10, 0), &[300]);
        store.set_quota("s", 700).unwrap();

        assert!(store.enforce_quota("s", 0).unwrap().is_empty());
        let plan = store.enforce_quota("s", 200).unwrap();
        assert_eq!(plan.victims, vec![(date(9, 0), 300)]);
        assert_eq!(plan.remaining_bytes(), 500);
    }

    #[test]
    fn test_delete_slice_prunes_to_root() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", SliceDate::new(2024, 1, 1, 0, 0).unwrap(), &[1]);
        fill_slice(&store, "s", date(9, 0), &[1]);

        store
            .delete_slice("s", Some(SliceDate::new(2024, 1, 1, 0, 0).unwrap()))
            .unwrap();

        let root = store.snapshot_dir("s").unwrap();
        assert!(root.is_dir());
        assert!(!root.join("2024").exists());
        assert!(root.join("2025/3/7/09/00").is_dir());
    }

    #[test]
    fn test_delete_last_slice_keeps_snapshot_root() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[1]);
        let mut meta = store.read_metadata("s").unwrap();
        meta.latest_date = date(9, 0).to_string();
        store.write_metadata("s", &meta).unwrap();

        store.delete_slice("s", Some(date(9, 0))).unwrap();

        let root = store.snapshot_dir("s").unwrap();
        assert!(root.is_dir());
        assert!(!root.join("2025").exists());
        assert_eq!(store.read_metadata("s").unwrap().latest_date, "");
    }

    #[test]
    fn test_delete_moves_latest_back() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[1]);
        fill_slice(&store, "s", date(10, 0), &[1]);
        let mut meta = store.read_metadata("s").unwrap();
        meta.latest_date = date(10, 0).to_string();
        store.write_metadata("s", &meta).unwrap();

        store.delete_slice("s", Some(date(10, 0))).unwrap();
        assert_eq!(store.latest_slice("s").unwrap(), Some(date(9, 0)));
        assert_eq!(store.read_metadata("s").unwrap().latest(), Some(date(9, 0)));
    }

    #[test]
    fn test_delete_whole_snapshot_and_missing() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[1]);

        store.delete_slice("s", None).unwrap();
        assert!(!store.exists("s"));
        assert!(store.delete_slice("s", None).unwrap_err().is_not_found());
        assert!(store
            .delete_slice("s", Some(date(9, 0)))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_read_metadata_creates_default() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        std::fs::create_dir_all(temp.path().join("s")).unwrap();

        let meta = store.read_metadata("s").unwrap();
        assert_eq!(meta, SnapshotMetadata::default());
        assert!(temp.path().join("s").join(METADATA_FILE).is_file());
        assert!(store.read_metadata("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_metadata_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        std::fs::create_dir_all(temp.path().join("s")).unwrap();
        std::fs::write(temp.path().join("s").join(METADATA_FILE), "{not json").unwrap();

        assert!(matches!(
            store.read_metadata("s"),
            Err(StoreError::Metadata { .. })
        ));
    }

    #[test]
    fn test_list_snapshots_and_usage() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("snapshots"));
        assert!(store.list_snapshots().unwrap().is_empty());

        fill_slice(&store, "zeta", date(9, 0), &[5]);
        fill_slice(&store, "alpha", date(9, 0), &[7, 3]);

        assert_eq!(store.list_snapshots().unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(
            store.usage_report().unwrap(),
            vec![("alpha".to_string(), 10), ("zeta".to_string(), 5)]
        );
    }

    #[test]
    fn test_invalid_names_rejected() {
        let store = SnapshotStore::new("/tmp/unused");
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.snapshot_dir(name),
                Err(StoreError::InvalidName(_))
            ));
        }
    }

    /// Lister that fails with `PermissionDenied` below one directory.
    struct DeniedLister {
        inner: MemoryLister,
        denied: PathBuf,
    }

    impl DirectoryLister for DeniedLister {
        fn subdirectories(&self, dir: &Path) -> io::Result<Vec<String>> {
            if dir.starts_with(&self.denied) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.inner.subdirectories(dir)
        }

        fn file_sizes(&self, dir: &Path) -> io::Result<Vec<u64>> {
            if dir.starts_with(&self.denied) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.inner.file_sizes(dir)
        }
    }

    fn denied_store(denied: &str) -> SnapshotStore<DeniedLister> {
        let mut inner = MemoryLister::new();
        inner.add_file("/virtual/s/2025/3/7/09/00/0_0.png", 500);
        inner.add_file("/virtual/s/2025/3/7/10/00/0_0.png", 25);
        SnapshotStore::with_lister(
            "/virtual",
            DeniedLister {
                inner,
                denied: PathBuf::from(denied),
            },
        )
    }

    #[test]
    fn test_measure_fails_on_unreadable_slice() {
        let store = denied_store("/virtual/s/2025/3/7/09/00");
        let mut cache = BTreeMap::new();

        let err = store.measure("s", None, &mut cache).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got {:?}", err);
        let err = store
            .measure("s", Some(date(9, 0)), &mut cache)
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got {:?}", err);
    }

    #[test]
    fn test_walk_fails_on_unreadable_directory() {
        let store = denied_store("/virtual/s/2025/3/7/10");

        let err = store.list_changes("s", ChangeOrder::Ascending).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got {:?}", err);
        assert!(store.measure("s", None, &mut BTreeMap::new()).is_err());
    }

    #[test]
    fn test_apply_quota_plan_reports_failures() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(9, 0), &[600]);
        fill_slice(&store, "s", date(10, 0), &[500]);
        // Metadata that cannot be read makes every deletion fail after removal
        std::fs::create_dir_all(temp.path().join("s").join(METADATA_FILE)).unwrap();

        let plan = QuotaPlan {
            name: "s".to_string(),
            quota_bytes: 100,
            projected_bytes: 1100,
            victims: vec![(date(9, 0), 600), (date(10, 0), 500)],
        };
        let err = store.apply_quota_plan(&plan).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got {:?}", err);
        assert!(store.slice_exists("s", date(10, 0)));
    }

    #[test]
    fn test_apply_quota_plan_skips_missing_slices() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "s", date(10, 0), &[500]);

        let plan = QuotaPlan {
            name: "s".to_string(),
            quota_bytes: 100,
            projected_bytes: 1100,
            victims: vec![(date(9, 0), 600), (date(10, 0), 500)],
        };
        let applied = store.apply_quota_plan(&plan).unwrap();
        assert_eq!(applied.deleted, 1);
        assert_eq!(applied.freed_bytes, 500);
    }

    #[tokio::test]
    async fn test_sequential_slices_get_distinct_dates() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        let area = Area::rectangle(ChunkCoord::new(0, 0), ChunkCoord::new(0, 0));
        let source = MockChunkSource::new();
        source.respond(ChunkCoord::new(0, 0), Ok(vec![1]));
        source.respond(ChunkCoord::new(0, 0), Ok(vec![2, 2]));
        let dl = downloader(source);

        let first = store
            .create_slice(&dl, "s", &area, SliceOptions::default())
            .await
            .unwrap();
        let second = store
            .create_slice(&dl, "s", &area, SliceOptions::default())
            .await
            .unwrap();

        assert!(second.date > first.date);
        assert_eq!(
            store.list_changes("s", ChangeOrder::Ascending).unwrap(),
            vec![first.date, second.date]
        );
        let first_chunk = store
            .chunk_path("s", first.date, ChunkCoord::new(0, 0))
            .unwrap();
        assert_eq!(std::fs::read(first_chunk).unwrap(), vec![1]);
        assert!(dl.sleeper().waits().len() <= 1);
    }

    #[tokio::test]
    async fn test_existing_slice_is_not_rewritten() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path());
        fill_slice(&store, "city", date(9, 5), &[3]);
        let dl = downloader(city_source());

        let err = store
            .create_slice_at(&dl, "city", &city_area(), date(9, 5), SliceOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SliceExists(_)));
        assert!(dl.source().calls().is_empty());
        let dir = store.slice_dir("city", date(9, 5)).unwrap();
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 1);
    }
}
