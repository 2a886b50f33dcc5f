//! # portmux
//!
//! Request/reply multiplexer for textual RPC over named per-service
//! channels.
//!
//! Each registered `(component, service)` pair owns a dedicated
//! request channel and reply channel. Clients write one-line requests:
//!
//! ```text
//! <id> <component> <service> [<params>]
//! ```
//!
//! and read one-line responses:
//!
//! ```text
//! <id> OK|FAILED [<payload>]
//! ```
//!
//! The mux polls every request channel once per cycle, hands parsed
//! requests to a [`ServiceHandler`], and routes each result - whether
//! produced on the spot or delivered later through a
//! [`CompletionNotifier`] - back to the exact channel and client id
//! that issued the request.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌─────────────────────────────┐
//! request chans ──►│ poll ─► parse ─► invoke ────┼──► handler
//!                  │           │         │       │
//!                  │      FAIL reply   sync      │   deferred work
//!                  │           │         │       │        │
//!                  │           ▼         ▼       │        ▼
//!                  │      output queues (FIFO) ◄─┼── completion
//!                  │           │                 │    notifier
//!   reply chans ◄──┤  flush ◄──┘                 │
//!                  └─────────────────────────────┘
//! ```
//!
//! Malformed input and handler failures become FAILED replies; an
//! unmatched completion is logged and dropped; nothing takes the loop
//! down.
//!
//! ## Example
//!
//! ```
//! use portmux::{
//!     Invocation, MuxError, ServiceHandler, ServiceMux, ServiceResult,
//!     transport::MemTransport, Value,
//! };
//!
//! struct Arm;
//!
//! impl ServiceHandler for Arm {
//!     fn invoke(
//!         &self,
//!         _component: &str,
//!         _service: &str,
//!         _params: Option<Value>,
//!     ) -> Result<Invocation, MuxError> {
//!         Ok(Invocation::Sync(ServiceResult::ok(true)))
//!     }
//! }
//!
//! let transport = MemTransport::new();
//! let mut mux = ServiceMux::builder(transport.clone(), Arm)
//!     .service("arm", "grab")
//!     .build()
//!     .unwrap();
//!
//! let mut client = transport.connect(&mux.channel_names("arm", "grab"));
//! client.send("7 arm grab").unwrap();
//! mux.cycle();
//! assert_eq!(client.try_recv().as_deref(), Some("7 OK true"));
//! ```

pub mod control;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod params;
pub mod protocol;
pub mod transport;

mod registry;

pub use dispatch::{CompletionNotifier, MuxConfig, ServiceMux, ServiceMuxBuilder};
pub use error::{MuxError, Result};
pub use handler::{Invocation, PendingId, ServiceHandler};
pub use params::Value;
pub use protocol::{Request, Response, ServiceResult, Status};
pub use registry::ChannelNames;
