//! Channel registry and lifecycle.
//!
//! One [`ChannelPair`] per registered `(component, service)`: the
//! request port it reads from and the reply port it answers on, both
//! opened at registration time and closed at teardown. The registry is
//! an explicit object owned by the mux - there are no process-wide
//! channel tables.

use crate::control::ServiceEntry;
use crate::error::{MuxError, Result};
use crate::transport::{ReplyPort, RequestPort, Transport};

/// Deterministic channel names for one `(component, service)` pair.
///
/// The request channel is `{root}/{component}/{service}/request`, the
/// reply channel the same path with a `/reply` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    /// Name of the inbound request channel.
    pub request: String,
    /// Name of the outbound reply channel.
    pub reply: String,
}

impl ChannelNames {
    /// Build the names for `component`/`service` under `root`.
    pub fn new(root: &str, component: &str, service: &str) -> Self {
        let base = format!(
            "{}/{}/{}",
            root.trim_end_matches('/'),
            component,
            service
        );
        Self {
            request: format!("{}/request", base),
            reply: format!("{}/reply", base),
        }
    }
}

/// A registered channel: identity plus both transport ports.
pub(crate) struct ChannelPair<T: Transport> {
    /// Channel key, `"{component}/{service}"`.
    pub key: String,
    pub component: String,
    pub service: String,
    pub names: ChannelNames,
    pub rx: T::Rx,
    pub tx: T::Tx,
}

/// Owns every channel pair; fixed iteration order.
pub(crate) struct ChannelRegistry<T: Transport> {
    transport: T,
    root: String,
    channels: Vec<ChannelPair<T>>,
    closed: bool,
}

impl<T: Transport> ChannelRegistry<T> {
    pub fn new(transport: T, root: String) -> Self {
        Self {
            transport,
            root,
            channels: Vec::new(),
            closed: false,
        }
    }

    /// Open both channels for `(component, service)`.
    ///
    /// A failure to bind either name is a startup error; callers must
    /// not continue with a half-registered service.
    pub fn register(&mut self, component: &str, service: &str) -> Result<()> {
        let key = format!("{}/{}", component, service);
        if self.channels.iter().any(|c| c.key == key) {
            return Err(MuxError::Bind {
                name: key,
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    "service already registered",
                ),
            });
        }

        let names = ChannelNames::new(&self.root, component, service);
        let rx = self.transport.open_request(&names.request)?;
        let tx = self.transport.open_reply(&names.reply)?;

        tracing::info!("service manager listening on {}", names.request);
        tracing::info!("service manager will reply on {}", names.reply);

        self.channels.push(ChannelPair {
            key,
            component: component.to_string(),
            service: service.to_string(),
            names,
            rx,
            tx,
        });
        Ok(())
    }

    pub fn pairs_mut(&mut self) -> impl Iterator<Item = &mut ChannelPair<T>> {
        self.channels.iter_mut()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Announcement entries for every registered channel.
    pub fn entries(&self) -> Vec<ServiceEntry> {
        self.channels
            .iter()
            .map(|c| ServiceEntry {
                component: c.component.clone(),
                service: c.service.clone(),
                request: c.names.request.clone(),
                reply: c.names.reply.clone(),
            })
            .collect()
    }

    /// Close every open port. Idempotent.
    pub fn close_all(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::info!("closing {} service channel(s)", self.channels.len());
        for pair in &mut self.channels {
            pair.rx.close();
            pair.tx.close();
        }
    }
}
