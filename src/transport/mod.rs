//! Transport abstraction - named duplex channels.
//!
//! A channel is a named endpoint pair: clients write request lines to
//! the request side and read reply lines from the reply side. The
//! dispatch core only needs three things from a transport:
//!
//! - open a named channel (binding its name exclusively),
//! - non-blocking read of one inbound line,
//! - buffered write of one outbound line.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemTransport`] - in-process hub, for tests and embedding
//! - [`SocketTransport`] - one Unix domain socket per channel name
//!   (Unix only)

mod mem;
#[cfg(unix)]
mod socket;

pub use mem::{MemClient, MemTransport};
#[cfg(unix)]
pub use socket::SocketTransport;

use crate::error::Result;

/// Inbound side of a named channel.
pub trait RequestPort: Send + 'static {
    /// Attempt to read one complete line without blocking.
    ///
    /// `Ok(None)` means no data is available this cycle - not an
    /// error.
    fn try_recv(&mut self) -> Result<Option<String>>;

    /// Stop receiving. Idempotent.
    fn close(&mut self);
}

/// Outbound side of a named channel.
pub trait ReplyPort: Send + 'static {
    /// Queue one line for transmission.
    fn send(&mut self, line: &str) -> Result<()>;

    /// Stop transmitting. Idempotent.
    fn close(&mut self);
}

/// Factory for named channel endpoints.
pub trait Transport {
    /// The inbound port type this transport produces.
    type Rx: RequestPort;
    /// The outbound port type this transport produces.
    type Tx: ReplyPort;

    /// Bind the request side of `name` for reading.
    ///
    /// Fails with [`crate::MuxError::Bind`] if the name cannot be
    /// bound (including when it is already bound).
    fn open_request(&self, name: &str) -> Result<Self::Rx>;

    /// Bind the reply side of `name` for writing.
    fn open_reply(&self, name: &str) -> Result<Self::Tx>;
}
