use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use warden_common::constants::STDERR_MARKER;
use warden_common::ring::Ring;
use warden_common::types::ApplicationDefinition;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("open redirect target {path}: {source}")]
    Redirect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The supervising task set for one started application: two line
/// readers feeding a single owner task that holds the output ring and
/// the redirect file. The owner is the only task that ever touches
/// either; lines and queries reach it purely by message passing, so a
/// query sent after a line was accepted always observes that line.
pub struct Launcher {
    app_id: i64,
    query_tx: mpsc::Sender<oneshot::Sender<Vec<String>>>,
    cancel: CancellationToken,
}

impl Launcher {
    /// Spawns the application and starts capture. A spawn failure or an
    /// unopenable redirect target fails the whole operation before any
    /// task is started.
    pub async fn launch(
        definition: &ApplicationDefinition,
        history: usize,
    ) -> Result<Launcher, LaunchError> {
        let exe = definition.exec.absolute_path();
        let mut child = Command::new(&exe)
            .args(&definition.exec.args)
            .current_dir(&definition.exec.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: exe.clone(),
                source,
            })?;

        let redirect_path = definition.exec.absolute_redirect_path();
        let redirect = File::create(&redirect_path)
            .await
            .map_err(|source| LaunchError::Redirect {
                path: redirect_path.clone(),
                source,
            })?;

        let app_id = definition.id;
        debug!(app_id, pid = ?child.id(), exe = %exe.display(), "application started");

        let (line_tx, line_rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, line_tx.clone(), ""));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, line_tx, STDERR_MARKER));
        }

        // Reap the child when it exits on its own; terminating the
        // launcher never signals it.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(app_id, %status, "application exited"),
                Err(err) => warn!(app_id, %err, "wait on application"),
            }
        });

        let (query_tx, query_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tokio::spawn(own_output(
            app_id,
            Ring::new(history),
            line_rx,
            query_rx,
            redirect,
            redirect_path,
            cancel.clone(),
        ));

        Ok(Launcher {
            app_id,
            query_tx,
            cancel,
        })
    }

    pub fn app_id(&self) -> i64 {
        self.app_id
    }

    /// Current buffer snapshot, oldest to newest. Empty once the
    /// launcher is terminated or its owner task has died.
    pub async fn query(&self) -> Vec<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.query_tx.send(reply_tx).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Stops capture: the owner loop exits and the redirect handle is
    /// released. The spawned OS process is left running; killing it is a
    /// separate, explicit operation.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }
}

async fn read_lines(
    stream: impl AsyncRead + Unpin,
    lines: mpsc::Sender<String>,
    marker: &'static str,
) {
    let mut reader = BufReader::new(stream).lines();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                // A closed channel means the owner is gone; stop reading.
                if lines.send(format!("{marker}{line}")).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                warn!(%err, "read application output");
                return;
            }
        }
    }
}

/// Sole mutator and reader of the ring and the redirect file. A failed
/// redirect write is fatal to this task, not to the rest of the daemon.
async fn own_output(
    app_id: i64,
    mut ring: Ring<String>,
    mut lines: mpsc::Receiver<String>,
    mut queries: mpsc::Receiver<oneshot::Sender<Vec<String>>>,
    mut redirect: File,
    redirect_path: PathBuf,
    cancel: CancellationToken,
) {
    let mut lines_open = true;
    loop {
        tokio::select! {
            maybe_line = lines.recv(), if lines_open => match maybe_line {
                Some(line) => {
                    ring.add(line.clone());
                    if let Err(err) = write_line(&mut redirect, &line).await {
                        error!(app_id, path = %redirect_path.display(), %err, "redirect write failed, capture stops");
                        cancel.cancel();
                        break;
                    }
                }
                // Both readers hit end of stream; keep answering queries.
                None => lines_open = false,
            },
            maybe_query = queries.recv() => match maybe_query {
                Some(reply) => {
                    // The caller may have gone away; that is its problem.
                    let _ = reply.send(ring.get());
                }
                None => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}

async fn write_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}
