//! Unix domain socket transport.
//!
//! Each channel name maps to one socket path under a root directory
//! (`{root}/{name}.sock`). The request side binds a listener and feeds
//! complete lines from every connected client into an unbounded queue,
//! so the dispatch loop's read stays non-blocking. The reply side runs
//! a dedicated writer task fed over an mpsc channel; queued lines are
//! fanned out to every connected subscriber.
//!
//! Must be used from within a tokio runtime: opening a port spawns its
//! reader or writer task.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{MuxError, Result};

use super::{ReplyPort, RequestPort, Transport};

/// Transport mapping channel names to Unix socket paths.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    root: PathBuf,
}

impl SocketTransport {
    /// Create a transport rooted at `root`.
    ///
    /// Socket files and intermediate directories are created on
    /// demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The socket path for a channel name.
    pub fn socket_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.join(name.trim_start_matches('/'));
        path.set_extension("sock");
        path
    }

    fn bind(&self, name: &str) -> Result<UnixListener> {
        let path = self.socket_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MuxError::Bind {
                name: name.to_string(),
                source: e,
            })?;
        }
        // Remove a stale socket left by a previous run
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| MuxError::Bind {
                name: name.to_string(),
                source: e,
            })?;
        }
        UnixListener::bind(&path).map_err(|e| MuxError::Bind {
            name: name.to_string(),
            source: e,
        })
    }
}

impl Transport for SocketTransport {
    type Rx = SocketRequestPort;
    type Tx = SocketReplyPort;

    fn open_request(&self, name: &str) -> Result<SocketRequestPort> {
        let path = self.socket_path(name);
        let listener = self.bind(name)?;
        let (tx, rx) = unbounded_channel();
        tokio::spawn(accept_request_peers(listener, tx));
        Ok(SocketRequestPort {
            rx: Some(rx),
            _cleanup: SocketCleanup { path },
        })
    }

    fn open_reply(&self, name: &str) -> Result<SocketReplyPort> {
        let path = self.socket_path(name);
        let listener = self.bind(name)?;
        let (tx, rx) = unbounded_channel();
        tokio::spawn(reply_writer(listener, rx));
        Ok(SocketReplyPort {
            tx: Some(tx),
            _cleanup: SocketCleanup { path },
        })
    }
}

/// Removes the socket file when the port is dropped.
struct SocketCleanup {
    path: PathBuf,
}

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Accept clients on the request socket and forward their lines.
async fn accept_request_peers(listener: UnixListener, lines: UnboundedSender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let lines = lines.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream).lines();
                    while let Ok(Some(line)) = reader.next_line().await {
                        if lines.send(line).is_err() {
                            return; // port closed
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("request socket accept failed: {}", e);
                return;
            }
        }
    }
}

/// Writer task: accept subscribers and fan queued lines out to them.
async fn reply_writer(listener: UnixListener, mut lines: UnboundedReceiver<Bytes>) {
    let mut peers: Vec<OwnedWriteHalf> = Vec::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let (_read, write) = stream.into_split();
                    peers.push(write);
                }
                Err(e) => {
                    tracing::error!("reply socket accept failed: {}", e);
                    return;
                }
            },
            line = lines.recv() => match line {
                Some(bytes) => {
                    let mut alive = Vec::with_capacity(peers.len());
                    for mut peer in peers.drain(..) {
                        if peer.write_all(&bytes).await.is_ok() {
                            alive.push(peer);
                        }
                    }
                    peers = alive;
                }
                None => return, // port closed
            },
        }
    }
}

/// Inbound port over a request socket.
pub struct SocketRequestPort {
    rx: Option<UnboundedReceiver<String>>,
    _cleanup: SocketCleanup,
}

impl RequestPort for SocketRequestPort {
    fn try_recv(&mut self) -> Result<Option<String>> {
        let rx = match self.rx.as_mut() {
            Some(rx) => rx,
            None => return Ok(None),
        };
        match rx.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MuxError::ChannelClosed),
        }
    }

    fn close(&mut self) {
        self.rx = None;
    }
}

/// Outbound port over a reply socket.
pub struct SocketReplyPort {
    tx: Option<UnboundedSender<Bytes>>,
    _cleanup: SocketCleanup,
}

impl ReplyPort for SocketReplyPort {
    fn send(&mut self, line: &str) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(MuxError::ChannelClosed)?;
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        tx.send(Bytes::from(framed))
            .map_err(|_| MuxError::ChannelClosed)
    }

    fn close(&mut self) {
        self.tx = None;
    }
}
