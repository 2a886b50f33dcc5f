//! The external handler boundary.
//!
//! The mux does not know what a service does. It hands every parsed
//! request to a [`ServiceHandler`], which either finishes the job on
//! the spot ([`Invocation::Sync`]) or accepts it for later completion
//! ([`Invocation::Deferred`]) and reports the result afterwards
//! through [`crate::CompletionNotifier::complete`].
//!
//! # Example
//!
//! ```
//! use portmux::{Invocation, MuxError, ServiceHandler, ServiceResult, Value};
//!
//! struct Arm;
//!
//! impl ServiceHandler for Arm {
//!     fn invoke(
//!         &self,
//!         component: &str,
//!         service: &str,
//!         _params: Option<Value>,
//!     ) -> Result<Invocation, MuxError> {
//!         match (component, service) {
//!             ("arm", "grab") => Ok(Invocation::Sync(ServiceResult::ok(true))),
//!             _ => Err(MuxError::Service(format!(
//!                 "unknown service {}/{}",
//!                 component, service
//!             ))),
//!         }
//!     }
//! }
//! ```

use crate::error::Result;
use crate::params::Value;
use crate::protocol::ServiceResult;

/// Identifier a handler assigns to an in-flight asynchronous request.
///
/// Opaque to the mux; the handler must not reuse an id while its
/// request is still pending.
pub type PendingId = u64;

/// What the handler did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Executed immediately; the result is ready to send.
    Sync(ServiceResult),
    /// Accepted for asynchronous execution; the result will arrive
    /// later via the completion notifier under this id.
    Deferred(PendingId),
}

/// Executes named services on behalf of the mux.
///
/// Invoked from the dispatch loop; implementations that defer work
/// must arrange for exactly one completion per accepted request.
pub trait ServiceHandler: Send + Sync {
    /// Execute `service` on `component` with decoded `params`.
    ///
    /// An `Err` is not fatal: the mux converts it into a FAILED reply
    /// for the issuing request and keeps running.
    fn invoke(
        &self,
        component: &str,
        service: &str,
        params: Option<Value>,
    ) -> Result<Invocation>;
}

impl<H: ServiceHandler + ?Sized> ServiceHandler for std::sync::Arc<H> {
    fn invoke(
        &self,
        component: &str,
        service: &str,
        params: Option<Value>,
    ) -> Result<Invocation> {
        (**self).invoke(component, service, params)
    }
}
