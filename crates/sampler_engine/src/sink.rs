use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use crate::error::HarvestError;
use crate::types::{CommitRecord, RecordKey, ResultRecord};

/// Result of storing one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// False when the file row already existed (the unique key won).
    pub inserted: bool,
    pub commits_inserted: u64,
}

/// Durable destination for harvested records.
///
/// The orchestrator attempts a write at most once per unique key per run;
/// a failed write must leave the checkpoint untouched (the stratum is not
/// marked done until every record of the stratum is acknowledged).
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    /// Keys already persisted by previous runs, used to seed the dedup set.
    async fn known_keys(&self) -> Result<HashSet<RecordKey>, HarvestError>;

    async fn store(
        &self,
        record: &ResultRecord,
        commits: &[CommitRecord],
    ) -> Result<StoreOutcome, HarvestError>;
}

/// SQLite-backed sink. The schema follows the provider's response shape:
/// one row per repository, per file, and per (commit, file) pair.
///
/// The connection sits behind a mutex and every statement runs on the
/// blocking pool so database writes never stall the async runtime.
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS repo
    ( repo_id INTEGER PRIMARY KEY
    , name TEXT NOT NULL
    , full_name TEXT NOT NULL
    , description TEXT
    , url TEXT NOT NULL
    , fork INTEGER NOT NULL
    , owner_id INTEGER NOT NULL
    , owner_login TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS file
    ( file_id INTEGER PRIMARY KEY
    , name TEXT NOT NULL
    , path TEXT NOT NULL
    , sha TEXT NOT NULL
    , repo_id INTEGER NOT NULL
    , FOREIGN KEY (repo_id) REFERENCES repo(repo_id)
    , UNIQUE(path, repo_id)
    );
    CREATE TABLE IF NOT EXISTS file_commit
    ( commit_id INTEGER PRIMARY KEY
    , sha TEXT NOT NULL
    , message TEXT NOT NULL
    , size INTEGER NOT NULL
    , committed_at TEXT NOT NULL
    , content TEXT
    , parents TEXT NOT NULL
    , file_id INTEGER NOT NULL
    , FOREIGN KEY (file_id) REFERENCES file(file_id)
    , UNIQUE(sha, file_id)
    );
";

impl SqliteSink {
    pub async fn open(path: PathBuf) -> Result<Self, HarvestError> {
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, rusqlite::Error> {
            let conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|err| HarvestError::Persistence(format!("blocking task: {err}")))?
        .map_err(|err| HarvestError::Persistence(err.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run_blocking<F, R>(&self, f: F) -> Result<R, HarvestError>
    where
        F: FnOnce(&Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("sink connection poisoned");
            f(&conn)
        })
        .await
        .map_err(|err| HarvestError::Persistence(format!("blocking task: {err}")))?
        .map_err(|err| HarvestError::Persistence(err.to_string()))
    }
}

#[async_trait::async_trait]
impl RecordSink for SqliteSink {
    async fn known_keys(&self) -> Result<HashSet<RecordKey>, HarvestError> {
        self.run_blocking(|conn| {
            let mut stmt = conn.prepare("SELECT repo_id, path, sha FROM file")?;
            let keys = stmt.query_map([], |row| {
                Ok(RecordKey {
                    repo_id: row.get(0)?,
                    path: row.get(1)?,
                    sha: row.get(2)?,
                })
            })?;
            keys.collect::<Result<HashSet<_>, _>>()
        })
        .await
    }

    async fn store(
        &self,
        record: &ResultRecord,
        commits: &[CommitRecord],
    ) -> Result<StoreOutcome, HarvestError> {
        let record = record.clone();
        let commits = commits.to_vec();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO repo
                   (repo_id, name, full_name, description, url, fork, owner_id, owner_login)
                 VALUES (?,?,?,?,?,?,?,?)",
                params![
                    record.repo.id,
                    record.repo.name,
                    record.repo.full_name,
                    record.repo.description,
                    record.repo.url,
                    record.repo.fork as i64,
                    record.repo.owner_id,
                    record.repo.owner_login,
                ],
            )?;

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO file (name, path, sha, repo_id) VALUES (?,?,?,?)",
                params![record.name, record.path, record.sha, record.repo.id],
            )? > 0;

            let file_id: i64 = conn.query_row(
                "SELECT file_id FROM file WHERE path = ? AND repo_id = ?",
                params![record.path, record.repo.id],
                |row| row.get(0),
            )?;

            let mut commits_inserted = 0u64;
            for commit in &commits {
                let size = commit.content.as_ref().map(|c| c.len() as i64).unwrap_or(0);
                let count = conn.execute(
                    "INSERT OR IGNORE INTO file_commit
                       (sha, message, size, committed_at, content, parents, file_id)
                     VALUES (?,?,?,?,?,?,?)",
                    params![
                        commit.sha,
                        commit.message,
                        size,
                        commit.committed_at,
                        commit.content,
                        commit.parents.join(","),
                        file_id,
                    ],
                )?;
                commits_inserted += count as u64;
            }

            Ok(StoreOutcome {
                inserted,
                commits_inserted,
            })
        })
        .await
    }
}
