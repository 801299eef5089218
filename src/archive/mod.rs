//! Local archive of completed exercise summaries.
//!
//! SQLite runs on its own thread; async callers hand it closures through a
//! channel and await the reply.

use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod migrations;
mod summaries;

pub use summaries::ArchivedSummary;

use migrations::run_migrations;

type ArchiveTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum ArchiveCommand {
    Execute(ArchiveTask),
    Shutdown,
}

struct ArchiveInner {
    sender: mpsc::Sender<ArchiveCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ArchiveInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(ArchiveCommand::Shutdown) {
                error!("Failed to send shutdown to archive thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join archive thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct SummaryArchive {
    inner: Arc<ArchiveInner>,
}

impl SummaryArchive {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create archive directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<ArchiveCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = path.clone();

        let worker = thread::Builder::new()
            .name("formcheck-archive".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite archive")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run archive migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Archive initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        ArchiveCommand::Execute(task) => task(&mut conn),
                        ArchiveCommand::Shutdown => break,
                    }
                }

                info!("Archive thread shutting down");
            })
            .context("failed to spawn archive worker thread")?;

        ready_rx
            .recv()
            .context("archive worker exited before signaling readiness")??;

        info!("Summary archive opened at {}", path.display());

        Ok(Self {
            inner: Arc::new(ArchiveInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = ArchiveCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Archive caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to archive thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("archive thread terminated unexpectedly"))?
    }
}
