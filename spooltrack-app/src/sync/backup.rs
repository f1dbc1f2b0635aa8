//! Remote backup boundary and snapshot plumbing
//!
//! A backup is a `VACUUM INTO` snapshot of the live database, named with its
//! creation time and a sha-256 prefix so the restore path can verify the
//! download before touching the live file. Transient network failures are
//! retried here with bounded backoff; everything past this boundary sees
//! them as a single failed attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite};
use spooltrack_common::{Error, Result};
use tracing::{debug, warn};

/// One backup on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub remote_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Storage backend for database backups
#[async_trait]
pub trait RemoteBackup: Send + Sync {
    /// Establish/refresh credentials. Called once before the first transfer.
    async fn authenticate(&self) -> Result<()>;

    /// Upload a backup; returns the remote id
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// List existing backups, newest first
    async fn list_backups(&self) -> Result<Vec<BackupEntry>>;

    /// Download a backup by remote id
    async fn download(&self, remote_id: &str) -> Result<Vec<u8>>;

    /// Delete a backup by remote id
    async fn delete(&self, remote_id: &str) -> Result<()>;
}

/// Filesystem-backed [`RemoteBackup`].
///
/// Stores each backup as a file in one folder; the remote id is the file
/// name and the entry timestamp is the file's modification time.
pub struct FolderBackup {
    folder: PathBuf,
}

impl FolderBackup {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn path_of(&self, remote_id: &str) -> Result<PathBuf> {
        // Remote ids are file names; reject anything that walks elsewhere
        if remote_id.contains('/') || remote_id.contains('\\') || remote_id.contains("..") {
            return Err(Error::Validation(format!(
                "Invalid backup id: {}",
                remote_id
            )));
        }
        Ok(self.folder.join(remote_id))
    }
}

#[async_trait]
impl RemoteBackup for FolderBackup {
    async fn authenticate(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;
        Ok(())
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_of(name)?;
        tokio::fs::create_dir_all(&self.folder).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(name.to_string())
    }

    async fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.folder).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            entries.push(BackupEntry {
                remote_id: entry.file_name().to_string_lossy().to_string(),
                timestamp: DateTime::<Utc>::from(modified),
            });
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn download(&self, remote_id: &str) -> Result<Vec<u8>> {
        let path = self.path_of(remote_id)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        let path = self.path_of(remote_id)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

/// Retry a transient-failure-prone operation with bounded backoff.
///
/// Only [`Error::is_transient`] failures are retried; anything else surfaces
/// immediately. Three attempts, 250 ms doubling delay plus up to 100 ms of
/// jitter.
pub async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    const ATTEMPTS: u32 = 3;
    for attempt in 0..ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < ATTEMPTS => {
                let jitter = rand::thread_rng().gen_range(0..100);
                let delay = Duration::from_millis(250 * 2u64.pow(attempt) + jitter);
                warn!(
                    "{} failed ({}), retrying in {:?} (attempt {}/{})",
                    what,
                    e,
                    delay,
                    attempt + 1,
                    ATTEMPTS
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::Network(format!("{}: retries exhausted", what)))
}

/// Snapshot the live database into a standalone file.
///
/// Flushes the WAL first so the snapshot carries every committed write, then
/// `VACUUM INTO` a fresh file. Returns the snapshot path and its backup
/// name, which embeds the creation time and a sha-256 prefix of the bytes.
pub async fn snapshot_database(db: &Pool<Sqlite>, scratch_dir: &Path) -> Result<(PathBuf, String)> {
    sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
        .execute(db)
        .await?;

    let snapshot_path = scratch_dir.join(format!("spooltrack-snapshot-{}.db", std::process::id()));
    if snapshot_path.exists() {
        tokio::fs::remove_file(&snapshot_path).await?;
    }

    // VACUUM INTO takes no bind parameters; single quotes in the path are
    // escaped by doubling
    let escaped = snapshot_path.to_string_lossy().replace('\'', "''");
    sqlx::query(&format!("VACUUM INTO '{}'", escaped))
        .execute(db)
        .await?;

    let bytes = tokio::fs::read(&snapshot_path).await?;
    let hash = Sha256::digest(&bytes);
    let name = format!(
        "spooltrack-{}-{:.16}.db",
        Utc::now().format("%Y%m%dT%H%M%SZ"),
        hex(&hash)
    );
    debug!("database snapshot {} ({} bytes)", name, bytes.len());
    Ok((snapshot_path, name))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse the sha-256 prefix out of a backup name produced by
/// [`snapshot_database`]. Returns `None` for names in any other shape.
fn hash_prefix_of(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".db")?;
    let prefix = stem.rsplit('-').next()?;
    if prefix.len() == 16 && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(prefix)
    } else {
        None
    }
}

/// Download a backup and swap it in as the live database.
///
/// The download lands in a temp file next to the target and is verified
/// twice before the swap: its sha-256 must match the prefix embedded in the
/// backup name, and SQLite's `PRAGMA integrity_check` must pass. Any failure
/// leaves the live database untouched.
pub async fn restore_backup(
    remote: &dyn RemoteBackup,
    remote_id: &str,
    target_db_path: &Path,
) -> Result<()> {
    let bytes = with_retry("backup download", || remote.download(remote_id)).await?;

    if let Some(expected) = hash_prefix_of(remote_id) {
        let actual = hex(&Sha256::digest(&bytes));
        if !actual.starts_with(expected) {
            return Err(Error::Validation(format!(
                "Backup {} failed checksum verification",
                remote_id
            )));
        }
    }

    let temp_path = target_db_path.with_extension("restore-tmp");
    tokio::fs::write(&temp_path, &bytes).await?;

    let verify = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", temp_path.display()))
        .await?;
    let (check,): (String,) = sqlx::query_as("PRAGMA integrity_check")
        .fetch_one(&verify)
        .await?;
    verify.close().await;
    if check != "ok" {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(Error::Validation(format!(
            "Backup {} failed integrity check: {}",
            remote_id, check
        )));
    }

    tokio::fs::rename(&temp_path, target_db_path).await?;
    Ok(())
}
