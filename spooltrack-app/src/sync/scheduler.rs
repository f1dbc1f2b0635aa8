//! Backup sync scheduling
//!
//! A background task checks periodically whether a sync is due, plus one
//! final check as the application closes. The cadence and retention policy
//! live in the settings table so they survive restarts and can be changed
//! at runtime.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use spooltrack_common::db::settings::{get_setting, set_setting};
use spooltrack_common::{Error, Result};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::sync::backup::{snapshot_database, with_retry, RemoteBackup};

/// How often backups are pushed to the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFrequency {
    /// Only when the application closes
    OnClose,
    Hourly,
    Daily,
}

impl FromStr for SyncFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on_close" => Ok(SyncFrequency::OnClose),
            "hourly" => Ok(SyncFrequency::Hourly),
            "daily" => Ok(SyncFrequency::Daily),
            other => Err(Error::Config(format!("Unknown sync frequency: {}", other))),
        }
    }
}

impl std::fmt::Display for SyncFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncFrequency::OnClose => "on_close",
            SyncFrequency::Hourly => "hourly",
            SyncFrequency::Daily => "daily",
        };
        write!(f, "{}", s)
    }
}

/// Sync policy loaded from the settings table
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub frequency: SyncFrequency,
    pub max_backups_to_keep: usize,
    pub last_sync: DateTime<Utc>,
    /// Seconds between due-checks of the background task
    pub check_interval_secs: u64,
}

impl SyncConfig {
    /// Load the current policy; absent keys fall back to their defaults
    pub async fn from_database(db: &Pool<Sqlite>) -> Result<Self> {
        let enabled = get_setting::<bool>(db, "sync_enabled")
            .await?
            .unwrap_or(false);
        let frequency = get_setting::<SyncFrequency>(db, "sync_frequency")
            .await?
            .unwrap_or(SyncFrequency::OnClose);
        let max_backups_to_keep = get_setting::<usize>(db, "max_backups_to_keep")
            .await?
            .unwrap_or(5);
        let last_ms = get_setting::<i64>(db, "last_sync_timestamp_ms")
            .await?
            .unwrap_or(0);
        let last_sync =
            DateTime::<Utc>::from_timestamp_millis(last_ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let check_interval_secs = get_setting::<u64>(db, "sync_check_interval_secs")
            .await?
            .unwrap_or(60);
        Ok(Self {
            enabled,
            frequency,
            max_backups_to_keep,
            last_sync,
            check_interval_secs,
        })
    }

    /// Whether a sync is due at `now`. `at_close` marks the final check run
    /// during application shutdown.
    pub fn is_due(&self, now: DateTime<Utc>, at_close: bool) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = now - self.last_sync;
        match self.frequency {
            SyncFrequency::OnClose => at_close,
            SyncFrequency::Hourly => elapsed >= chrono::Duration::hours(1),
            SyncFrequency::Daily => elapsed >= chrono::Duration::hours(24),
        }
    }
}

/// Current state of the sync machinery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Failed,
}

/// Periodic backup sync service.
///
/// Construct once, then `Arc::new(scheduler).run()` to spawn the background
/// loop; call [`SyncScheduler::close`] during shutdown for the final
/// close-time check.
pub struct SyncScheduler {
    db: Pool<Sqlite>,
    /// Folder the snapshot file is written into before upload
    scratch_dir: PathBuf,
    remote: Arc<dyn RemoteBackup>,
    state: Arc<RwLock<SyncState>>,
}

impl SyncScheduler {
    pub fn new(db: Pool<Sqlite>, scratch_dir: PathBuf, remote: Arc<dyn RemoteBackup>) -> Self {
        Self {
            db,
            scratch_dir,
            remote,
            state: Arc::new(RwLock::new(SyncState::Idle)),
        }
    }

    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Spawn the periodic due-check loop
    pub fn run(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval_secs = match SyncConfig::from_database(&self.db).await {
                Ok(config) => config.check_interval_secs,
                Err(e) => {
                    error!("failed to load sync config, sync disabled: {}", e);
                    return;
                }
            };
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!("sync scheduler running, checking every {}s", interval_secs);

            loop {
                ticker.tick().await;
                if let Err(e) = self.check(false).await {
                    error!("sync failed: {}", e);
                }
            }
        })
    }

    /// One due-check: sync now if the policy says so
    pub async fn check(&self, at_close: bool) -> Result<()> {
        let config = SyncConfig::from_database(&self.db).await?;
        if !config.is_due(Utc::now(), at_close) {
            debug!("sync not due");
            return Ok(());
        }
        self.sync_now(&config).await
    }

    /// Snapshot, upload, then prune old remote backups.
    ///
    /// `last_sync_timestamp_ms` is only advanced on success, so a failed
    /// attempt stays due and is retried at the next check.
    pub async fn sync_now(&self, config: &SyncConfig) -> Result<()> {
        *self.state.write().await = SyncState::Syncing;

        let result = self.upload_snapshot(config).await;
        match &result {
            Ok(()) => {
                set_setting(&self.db, "last_sync_timestamp_ms", Utc::now().timestamp_millis())
                    .await?;
                *self.state.write().await = SyncState::Idle;
                info!("backup sync complete");
            }
            Err(e) => {
                *self.state.write().await = SyncState::Failed;
                error!("backup sync failed: {}", e);
            }
        }
        result
    }

    async fn upload_snapshot(&self, config: &SyncConfig) -> Result<()> {
        with_retry("backup authentication", || self.remote.authenticate()).await?;

        let (snapshot_path, name) = snapshot_database(&self.db, &self.scratch_dir).await?;
        let bytes = tokio::fs::read(&snapshot_path).await?;
        let remote_id = with_retry("backup upload", || self.remote.upload(&name, &bytes)).await?;
        debug!("uploaded backup {} as {}", name, remote_id);
        tokio::fs::remove_file(&snapshot_path).await.ok();

        self.prune_remote(config.max_backups_to_keep).await
    }

    /// Delete the oldest remote backups beyond the retention limit.
    ///
    /// Ordered by timestamp; identical timestamps are tie-broken by remote
    /// id so the prune order is deterministic. A limit of zero turns
    /// retention off entirely, it never means "delete everything".
    pub async fn prune_remote(&self, max_to_keep: usize) -> Result<()> {
        if max_to_keep == 0 {
            return Ok(());
        }
        let mut backups = with_retry("backup listing", || self.remote.list_backups()).await?;
        backups.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.remote_id.cmp(&a.remote_id))
        });
        for stale in backups.iter().skip(max_to_keep) {
            info!("pruning old backup {}", stale.remote_id);
            with_retry("backup deletion", || self.remote.delete(&stale.remote_id)).await?;
        }
        Ok(())
    }

    /// Final check during shutdown. A failure here is logged but never
    /// propagated, so a broken remote cannot block application exit.
    pub async fn close(&self) {
        if let Err(e) = self.check(true).await {
            error!("close-time sync failed, exiting anyway: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::backup::BackupEntry;
    use async_trait::async_trait;
    use spooltrack_common::db::init_memory_database;
    use std::sync::Mutex;

    /// In-memory remote with scripted listing/upload behavior
    struct MockRemote {
        entries: Vec<BackupEntry>,
        fail_uploads: bool,
        deleted: Mutex<Vec<String>>,
        listed: Mutex<bool>,
    }

    impl MockRemote {
        fn new(entries: Vec<BackupEntry>) -> Self {
            Self {
                entries,
                fail_uploads: false,
                deleted: Mutex::new(Vec::new()),
                listed: Mutex::new(false),
            }
        }

        fn entry(remote_id: &str, secs: i64) -> BackupEntry {
            BackupEntry {
                remote_id: remote_id.to_string(),
                timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            }
        }
    }

    #[async_trait]
    impl RemoteBackup for MockRemote {
        async fn authenticate(&self) -> Result<()> {
            Ok(())
        }

        async fn upload(&self, name: &str, _bytes: &[u8]) -> Result<String> {
            if self.fail_uploads {
                return Err(Error::Internal("remote unavailable".to_string()));
            }
            Ok(name.to_string())
        }

        async fn list_backups(&self) -> Result<Vec<BackupEntry>> {
            *self.listed.lock().unwrap() = true;
            Ok(self.entries.clone())
        }

        async fn download(&self, _remote_id: &str) -> Result<Vec<u8>> {
            Err(Error::NotFound("no payloads in this mock".to_string()))
        }

        async fn delete(&self, remote_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(remote_id.to_string());
            Ok(())
        }
    }

    async fn scheduler_with(remote: Arc<MockRemote>) -> (SyncScheduler, tempfile::TempDir) {
        let db = init_memory_database().await.unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let scheduler = SyncScheduler::new(db, scratch.path().to_path_buf(), remote);
        (scheduler, scratch)
    }

    fn config(frequency: SyncFrequency, last_sync: DateTime<Utc>) -> SyncConfig {
        SyncConfig {
            enabled: true,
            frequency,
            max_backups_to_keep: 5,
            last_sync,
            check_interval_secs: 60,
        }
    }

    #[test]
    fn frequency_round_trips_through_settings_encoding() {
        for f in [SyncFrequency::OnClose, SyncFrequency::Hourly, SyncFrequency::Daily] {
            assert_eq!(f.to_string().parse::<SyncFrequency>().unwrap(), f);
        }
        assert!("weekly".parse::<SyncFrequency>().is_err());
    }

    #[test]
    fn hourly_due_rule() {
        let now = Utc::now();
        let c = config(SyncFrequency::Hourly, now - chrono::Duration::minutes(61));
        assert!(c.is_due(now, false));

        let c = config(SyncFrequency::Hourly, now - chrono::Duration::minutes(30));
        assert!(!c.is_due(now, false));
    }

    #[test]
    fn daily_due_rule() {
        let now = Utc::now();
        let c = config(SyncFrequency::Daily, now - chrono::Duration::hours(25));
        assert!(c.is_due(now, false));

        let c = config(SyncFrequency::Daily, now - chrono::Duration::hours(23));
        assert!(!c.is_due(now, false));
    }

    #[test]
    fn on_close_is_due_only_at_close() {
        let now = Utc::now();
        let c = config(SyncFrequency::OnClose, now - chrono::Duration::days(30));
        assert!(!c.is_due(now, false));
        assert!(c.is_due(now, true));
    }

    #[test]
    fn disabled_is_never_due() {
        let now = Utc::now();
        let mut c = config(SyncFrequency::Hourly, now - chrono::Duration::days(1));
        c.enabled = false;
        assert!(!c.is_due(now, false));
        assert!(!c.is_due(now, true));
    }

    #[tokio::test]
    async fn prune_deletes_oldest_beyond_limit_with_id_tie_break() {
        let remote = Arc::new(MockRemote::new(vec![
            MockRemote::entry("old", 100),
            MockRemote::entry("a", 200),
            MockRemote::entry("b", 200),
            MockRemote::entry("new", 300),
        ]));
        let (scheduler, _scratch) = scheduler_with(Arc::clone(&remote)).await;

        scheduler.prune_remote(2).await.unwrap();

        // Newest two survive; the timestamp tie at 200 keeps the higher id
        assert_eq!(
            *remote.deleted.lock().unwrap(),
            vec!["a".to_string(), "old".to_string()]
        );
    }

    #[tokio::test]
    async fn zero_retention_limit_disables_pruning() {
        let remote = Arc::new(MockRemote::new(vec![
            MockRemote::entry("old", 100),
            MockRemote::entry("new", 200),
        ]));
        let (scheduler, _scratch) = scheduler_with(Arc::clone(&remote)).await;

        scheduler.prune_remote(0).await.unwrap();

        assert!(remote.deleted.lock().unwrap().is_empty());
        assert!(!*remote.listed.lock().unwrap());
    }

    #[tokio::test]
    async fn successful_sync_advances_last_sync_and_prunes() {
        let remote = Arc::new(MockRemote::new(vec![]));
        let (scheduler, _scratch) = scheduler_with(Arc::clone(&remote)).await;
        let c = config(SyncFrequency::Hourly, DateTime::<Utc>::UNIX_EPOCH);

        scheduler.sync_now(&c).await.unwrap();

        assert_eq!(scheduler.state().await, SyncState::Idle);
        let last_ms = get_setting::<i64>(&scheduler.db, "last_sync_timestamp_ms")
            .await
            .unwrap()
            .unwrap();
        assert!(last_ms > 0);
        assert!(*remote.listed.lock().unwrap());
    }

    #[tokio::test]
    async fn failed_sync_keeps_last_sync_and_marks_failed() {
        let mut mock = MockRemote::new(vec![]);
        mock.fail_uploads = true;
        let remote = Arc::new(mock);
        let (scheduler, _scratch) = scheduler_with(Arc::clone(&remote)).await;
        let c = config(SyncFrequency::Hourly, DateTime::<Utc>::UNIX_EPOCH);

        assert!(scheduler.sync_now(&c).await.is_err());

        assert_eq!(scheduler.state().await, SyncState::Failed);
        // A failed attempt stays due: the timestamp is untouched
        let last_ms = get_setting::<i64>(&scheduler.db, "last_sync_timestamp_ms")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last_ms, 0);
        assert!(remote.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn config_loads_seeded_defaults() {
        let db = init_memory_database().await.unwrap();
        let c = SyncConfig::from_database(&db).await.unwrap();
        assert!(!c.enabled);
        assert_eq!(c.frequency, SyncFrequency::OnClose);
        assert_eq!(c.max_backups_to_keep, 5);
        assert_eq!(c.last_sync, DateTime::<Utc>::UNIX_EPOCH);
    }
}
