//! Unix domain socket server for IPC
//!
//! The server never touches the ledger. Each command is forwarded to the
//! event loop together with a reply channel, so all ledger calls stay
//! serialized with keyboard input and refresh ticks.

use anyhow::{bail, Context, Result};
use std::path::Path;
use stint_ipc::{read_message, write_message, Command, Response};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct IpcRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

/// Binds the control socket. A socket file left by a crashed instance is
/// replaced; one that still accepts connections belongs to a live instance.
pub async fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            bail!("stint is already running (socket {} is live)", path.display());
        }
        debug!(path = %path.display(), "removing stale socket");
        let _ = std::fs::remove_file(path);
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind IPC socket at {:?}", path))?;
    info!("IPC server listening on {}", path.display());
    Ok(listener)
}

pub async fn serve(listener: UnixListener, requests: mpsc::Sender<IpcRequest>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let requests = requests.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, requests).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, requests: mpsc::Sender<IpcRequest>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command: Command = read_message(&mut reader).await?;
    debug!(?command, "IPC command received");

    let (reply, response) = oneshot::channel();
    let response = match requests.send(IpcRequest { command, reply }).await {
        Ok(()) => response
            .await
            .unwrap_or_else(|_| Response::Error("stint dropped the request".to_string())),
        Err(_) => Response::Error("stint is shutting down".to_string()),
    };

    write_message(&mut writer, &response).await?;

    Ok(())
}
