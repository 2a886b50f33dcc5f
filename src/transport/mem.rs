//! In-process transport.
//!
//! Channels live in a shared hub keyed by name; each name is one
//! unbounded line queue. The mux side binds a name exclusively
//! (request side takes the receiver, reply side takes the sender);
//! the test or embedding side attaches with [`MemTransport::connect`]
//! and gets the opposite halves.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{MuxError, Result};
use crate::registry::ChannelNames;

use super::{ReplyPort, RequestPort, Transport};

/// One named line queue in the hub.
struct Wire {
    tx: UnboundedSender<String>,
    /// Taken by whichever side reads this wire; `None` once claimed.
    rx: Option<UnboundedReceiver<String>>,
    /// Whether the mux side already bound this name.
    bound: bool,
}

impl Wire {
    fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            bound: false,
        }
    }
}

/// In-memory transport hub.
///
/// Cloning shares the hub, so a clone handed to a client task talks to
/// the same channels.
#[derive(Clone, Default)]
pub struct MemTransport {
    hub: Arc<Mutex<HashMap<String, Wire>>>,
}

impl MemTransport {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Wire>> {
        match self.hub.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bind(&self, name: &str) -> Result<Wire> {
        let mut hub = self.lock();
        let wire = hub.entry(name.to_string()).or_insert_with(Wire::new);
        if wire.bound {
            return Err(MuxError::Bind {
                name: name.to_string(),
                source: io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "channel name already bound",
                ),
            });
        }
        wire.bound = true;
        // hand the caller its own handles; the hub keeps the sender so
        // late-connecting clients can still obtain it
        Ok(Wire {
            tx: wire.tx.clone(),
            rx: wire.rx.take(),
            bound: true,
        })
    }

    /// Attach the client side of a channel pair.
    ///
    /// Returns a handle that writes request lines and reads reply
    /// lines. Connecting works before or after the mux binds the
    /// names; only one client per pair can read replies.
    pub fn connect(&self, names: &ChannelNames) -> MemClient {
        let mut hub = self.lock();
        let req_tx = hub
            .entry(names.request.clone())
            .or_insert_with(Wire::new)
            .tx
            .clone();
        let reply_rx = hub
            .entry(names.reply.clone())
            .or_insert_with(Wire::new)
            .rx
            .take();
        MemClient { req_tx, reply_rx }
    }
}

impl Transport for MemTransport {
    type Rx = MemRequestPort;
    type Tx = MemReplyPort;

    fn open_request(&self, name: &str) -> Result<MemRequestPort> {
        let wire = self.bind(name)?;
        let rx = wire.rx.ok_or_else(|| MuxError::Bind {
            name: name.to_string(),
            source: io::Error::new(
                io::ErrorKind::AddrInUse,
                "request receiver already claimed",
            ),
        })?;
        Ok(MemRequestPort { rx: Some(rx) })
    }

    fn open_reply(&self, name: &str) -> Result<MemReplyPort> {
        let wire = self.bind(name)?;
        Ok(MemReplyPort { tx: Some(wire.tx) })
    }
}

/// Mux-side inbound port over the hub.
pub struct MemRequestPort {
    rx: Option<UnboundedReceiver<String>>,
}

impl RequestPort for MemRequestPort {
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

/// Mux-side outbound port over the hub.
pub struct MemReplyPort {
    tx: Option<UnboundedSender<String>>,
}

impl ReplyPort for MemReplyPort {
    fn send(&mut self, line: &str) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(MuxError::ChannelClosed)?;
        tx.send(line.to_string())
            .map_err(|_| MuxError::ChannelClosed)
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

/// Client side of one channel pair: write requests, read replies.
pub struct MemClient {
    req_tx: UnboundedSender<String>,
    reply_rx: Option<UnboundedReceiver<String>>,
}

impl MemClient {
    /// Send one request line to the mux.
    pub fn send(&self, line: &str) -> Result<()> {
        self.req_tx
            .send(line.to_string())
            .map_err(|_| MuxError::ChannelClosed)
    }

    /// Non-blocking read of one reply line.
    pub fn try_recv(&mut self) -> Option<String> {
        self.reply_rx.as_mut()?.try_recv().ok()
    }

    /// Await the next reply line; `None` when the mux side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.reply_rx.as_mut()?.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> ChannelNames {
        ChannelNames::new("/services", "arm", "grab")
    }

    #[test]
    fn test_request_lines_flow_client_to_mux() {
        let transport = MemTransport::new();
        let mut rx = transport.open_request(&names().request).unwrap();
        let client = transport.connect(&names());

        client.send("7 arm grab").unwrap();
        assert_eq!(rx.try_recv().unwrap().as_deref(), Some("7 arm grab"));
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn test_reply_lines_flow_mux_to_client() {
        let transport = MemTransport::new();
        let mut tx = transport.open_reply(&names().reply).unwrap();
        let mut client = transport.connect(&names());

        tx.send("7 OK true").unwrap();
        assert_eq!(client.try_recv().as_deref(), Some("7 OK true"));
        assert_eq!(client.try_recv(), None);
    }

    #[test]
    fn test_double_bind_is_an_error() {
        let transport = MemTransport::new();
        let _port = transport.open_request(&names().request).unwrap();
        assert!(matches!(
            transport.open_request(&names().request),
            Err(MuxError::Bind { .. })
        ));
    }

    #[test]
    fn test_connect_before_bind_still_pairs_up() {
        let transport = MemTransport::new();
        let client = transport.connect(&names());
        let mut rx = transport.open_request(&names().request).unwrap();

        client.send("x arm grab").unwrap();
        assert_eq!(rx.try_recv().unwrap().as_deref(), Some("x arm grab"));
    }

    #[test]
    fn test_closed_ports_are_inert() {
        let transport = MemTransport::new();
        let mut rx = transport.open_request(&names().request).unwrap();
        let mut tx = transport.open_reply(&names().reply).unwrap();

        rx.close();
        rx.close();
        tx.close();
        tx.close();
        assert_eq!(rx.try_recv().unwrap(), None);
        assert!(matches!(tx.send("x"), Err(MuxError::ChannelClosed)));
    }

    #[test]
    fn test_fifo_order_preserved() {
        let transport = MemTransport::new();
        let mut rx = transport.open_request(&names().request).unwrap();
        let client = transport.connect(&names());

        for i in 0..5 {
            client.send(&format!("line{}", i)).unwrap();
        }
        for i in 0..5 {
            assert_eq!(
                rx.try_recv().unwrap(),
                Some(format!("line{}", i))
            );
        }
    }
}
