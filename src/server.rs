//! Unix socket server for the daemon
//!
//! Listens on `$TMPDIR/nook.sock` for newline-delimited [`IpcMessage`]s and
//! forwards them to the daemon loop, which owns the overlay.

use crate::ipc::{self, IpcMessage};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Bind the default socket and serve until the receiver side is dropped.
pub async fn start(tx: mpsc::Sender<IpcMessage>) {
    serve(ipc::socket_path(), tx).await;
}

pub async fn serve(path: PathBuf, tx: mpsc::Sender<IpcMessage>) {
    // Remove stale socket if it exists
    if path.exists()
        && let Err(e) = std::fs::remove_file(&path)
    {
        warn!("Failed to remove stale socket {}: {}", path.display(), e);
        return;
    }

    let listener = match UnixListener::bind(&path) {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind Unix socket {}: {}", path.display(), e);
            return;
        }
    };

    info!("IPC server listening on {}", path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                if tx.is_closed() {
                    break;
                }
                tokio::spawn(read_messages(stream, tx.clone()));
            }
            Err(e) => {
                warn!("Failed to accept socket connection: {}", e);
            }
        }
    }
}

async fn read_messages(stream: UnixStream, tx: mpsc::Sender<IpcMessage>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<IpcMessage>(&line) {
            Ok(message) => {
                debug!(?message, "ipc message");
                if tx.send(message).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                trace!("Failed to parse IPC message: {} (line: {})", e, line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InputEvent;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn forwards_parsed_lines_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nook.sock");
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(serve(path.clone(), tx));

        let mut stream = loop {
            match UnixStream::connect(&path).await {
                Ok(s) => break s,
                Err(_) => tokio::task::yield_now().await,
            }
        };
        stream
            .write_all(b"not json\n\n{\"msg\":\"input\",\"event\":{\"type\":\"click\"}}\n")
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(
            message,
            IpcMessage::Input {
                event: InputEvent::Click
            }
        );
    }
}
