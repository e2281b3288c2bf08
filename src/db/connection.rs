use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use log::{debug, error, info};
use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::PersistenceError;

use super::migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open session database at {}: {source:#}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("session database worker is no longer running")]
    Unavailable,
    #[error(transparent)]
    Query(#[from] anyhow::Error),
}

impl DbError {
    pub fn into_persistence(self, operation: &'static str) -> PersistenceError {
        PersistenceError::new(operation, self)
    }
}

pub type DbResult<T> = Result<T, DbError>;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

struct Worker {
    // Dropping the sender lets the thread finish every queued task and exit.
    sender: Mutex<Option<mpsc::Sender<DbTask>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let sender = self.sender.get_mut().unwrap_or_else(|p| p.into_inner()).take();
        drop(sender);

        let thread = self.thread.get_mut().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = thread {
            if let Err(err) = handle.join() {
                error!("Session database thread panicked: {err:?}");
            }
        }
    }
}

/// SQLite-backed session log. Statements run in order on one dedicated
/// thread, so cycle appends land in the order the runner produced them.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

fn open_connection(path: &Path) -> anyhow::Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open SQLite file")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // A committed cycle must survive the process dying right after.
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

impl Database {
    pub fn new(path: PathBuf) -> DbResult<Self> {
        let open_err = |source: anyhow::Error| DbError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))
                .map_err(open_err)?;
        }

        let (task_tx, task_rx) = mpsc::channel::<DbTask>();
        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<()>>();
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name("lumora-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&thread_path) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                let mut executed: u64 = 0;
                while let Ok(task) = task_rx.recv() {
                    task(&mut conn);
                    executed += 1;
                }
                debug!("Session database thread exiting after {executed} statements");
            })
            .context("failed to spawn database thread")
            .map_err(open_err)?;

        ready_rx
            .recv()
            .context("database thread exited before opening")
            .and_then(|opened| opened)
            .map_err(open_err)?;

        info!("Session database ready at {}", path.display());
        Ok(Self {
            worker: Arc::new(Worker {
                sender: Mutex::new(Some(task_tx)),
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the database thread and awaits its result.
    pub async fn execute<F, T>(&self, task: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: DbTask = Box::new(move |conn| {
            // The caller may have been cancelled; the statement still ran.
            let _ = reply_tx.send(task(conn));
        });

        {
            let guard = self.worker.sender.lock().unwrap_or_else(|p| p.into_inner());
            let sender = guard.as_ref().ok_or(DbError::Unavailable)?;
            sender.send(boxed).map_err(|_| DbError::Unavailable)?;
        }

        let result = reply_rx.await.map_err(|_| DbError::Unavailable)?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.execute(|conn| {
                conn.execute_batch("CREATE TABLE log (n INTEGER NOT NULL)")?;
                Ok(())
            })
            .await
            .unwrap();
            for n in 0..10 {
                db.execute(move |conn| {
                    conn.execute("INSERT INTO log (n) VALUES (?1)", [n])?;
                    Ok(())
                })
                .await
                .unwrap();
            }
        }

        let db = Database::new(path).unwrap();
        let seen: Vec<i64> = db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT n FROM log ORDER BY rowid")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                let values = rows.collect::<Result<Vec<i64>, _>>()?;
                Ok(values)
            })
            .await
            .unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn task_errors_become_query_errors() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("err.sqlite3")).unwrap();

        let err = db
            .execute(|conn| {
                conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));

        let persisted = err.into_persistence("append cycle");
        assert_eq!(persisted.operation, "append cycle");
        assert!(persisted.to_string().contains("missing_table"));
    }

    #[test]
    fn unopenable_path_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let err = Database::new(dir.path().to_path_buf()).err().unwrap();
        assert!(matches!(err, DbError::Open { .. }));
    }
}
