//! Dispatch loop, pending request table, and completion routing.
//!
//! [`ServiceMux`] owns the channel registry and drives one cycle at a
//! time: poll every registered request channel once (non-blocking),
//! parse, invoke the handler, then flush every channel's output queue
//! to its own reply port. The pending table and the output queues are
//! one struct behind one lock, shared with every
//! [`CompletionNotifier`] clone, since completions may arrive from any
//! task or thread.
//!
//! No per-message failure ever terminates the loop: parse and handler
//! errors become FAILED replies, transport faults are logged and the
//! channel is skipped for the cycle.
//!
//! # Example
//!
//! ```no_run
//! use portmux::{
//!     Invocation, MuxError, ServiceHandler, ServiceMux, ServiceResult,
//!     transport::MemTransport, Value,
//! };
//!
//! struct Echo;
//!
//! impl ServiceHandler for Echo {
//!     fn invoke(
//!         &self,
//!         _component: &str,
//!         _service: &str,
//!         params: Option<Value>,
//!     ) -> Result<Invocation, MuxError> {
//!         Ok(Invocation::Sync(match params {
//!             Some(v) => ServiceResult::ok(v),
//!             None => ServiceResult::ok_empty(),
//!         }))
//!     }
//! }
//!
//! # async fn run() -> Result<(), MuxError> {
//! let mux = ServiceMux::builder(MemTransport::new(), Echo)
//!     .service("arm", "grab")
//!     .build()?;
//! let (_stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
//! mux.run_until(async { let _ = stop_rx.await; }).await;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::control;
use crate::error::Result;
use crate::handler::{Invocation, PendingId, ServiceHandler};
use crate::protocol::{valid_id, Request, Response, ServiceResult};
use crate::registry::{ChannelNames, ChannelRegistry};
use crate::transport::{ReplyPort, RequestPort, Transport};

/// Default dispatch tick period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default service root for channel names.
pub const DEFAULT_SERVICE_ROOT: &str = "/services";

/// Placeholder id for replies to requests whose own id was unusable.
pub const PLACEHOLDER_ID: &str = "?";

/// Runtime configuration for the mux.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Period of the dispatch tick in [`ServiceMux::run_until`].
    pub poll_interval: Duration,
    /// Root path under which channel names are constructed.
    pub service_root: String,
    /// Whether to announce registered channels on stdout after build.
    pub announce: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            service_root: DEFAULT_SERVICE_ROOT.to_string(),
            announce: false,
        }
    }
}

/// Where a deferred request's eventual result must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEntry {
    /// Key of the channel the request arrived on.
    channel: String,
    /// The client's request id, echoed in the reply.
    client_id: String,
}

/// Pending table plus per-channel output queues.
///
/// Pending entries have no deadline: a request whose completion never
/// arrives occupies its entry until shutdown.
#[derive(Default)]
struct DispatchState {
    pending: HashMap<PendingId, PendingEntry>,
    queues: HashMap<String, VecDeque<(String, ServiceResult)>>,
}

impl DispatchState {
    fn enqueue(&mut self, channel: &str, client_id: String, result: ServiceResult) {
        self.queues
            .entry(channel.to_string())
            .or_default()
            .push_back((client_id, result));
    }
}

fn lock(state: &Mutex<DispatchState>) -> MutexGuard<'_, DispatchState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Routes asynchronous completions back into the mux.
///
/// Cheaply cloneable; safe to call from any thread or task. Exactly
/// one completion is expected per deferred request.
#[derive(Clone)]
pub struct CompletionNotifier {
    state: Arc<Mutex<DispatchState>>,
}

impl CompletionNotifier {
    /// Deliver the result of the deferred request `id`.
    ///
    /// An unknown id (never deferred, or already completed) is a
    /// non-fatal protocol error: it is logged and dropped, since there
    /// is no addressee to answer.
    pub fn complete(&self, id: PendingId, result: ServiceResult) {
        let mut state = lock(&self.state);
        let entry = match state.pending.remove(&id) {
            Some(entry) => entry,
            None => {
                tracing::warn!(
                    request_id = id,
                    "completion for unknown request id, dropping"
                );
                return;
            }
        };
        tracing::debug!(
            request_id = id,
            channel = %entry.channel,
            client_id = %entry.client_id,
            "service completed"
        );
        state.enqueue(&entry.channel, entry.client_id, result);
    }
}

/// The request/reply multiplexer.
///
/// Built once via [`ServiceMux::builder`]; lifecycle is
/// `build -> run_until -> close` (close also happens on drop).
pub struct ServiceMux<T: Transport, H: ServiceHandler> {
    registry: ChannelRegistry<T>,
    handler: H,
    state: Arc<Mutex<DispatchState>>,
    config: MuxConfig,
}

impl<T: Transport, H: ServiceHandler> ServiceMux<T, H> {
    /// Start configuring a mux over `transport` dispatching to
    /// `handler`.
    pub fn builder(transport: T, handler: H) -> ServiceMuxBuilder<T, H> {
        ServiceMuxBuilder {
            transport,
            handler,
            services: Vec::new(),
            config: MuxConfig::default(),
        }
    }

    /// A notifier for delivering asynchronous completions.
    pub fn completion_notifier(&self) -> CompletionNotifier {
        CompletionNotifier {
            state: Arc::clone(&self.state),
        }
    }

    /// The transport the mux was built over.
    pub fn transport(&self) -> &T {
        self.registry.transport()
    }

    /// Channel names for a registered or prospective service.
    pub fn channel_names(&self, component: &str, service: &str) -> ChannelNames {
        ChannelNames::new(&self.config.service_root, component, service)
    }

    /// Run one dispatch cycle: poll every channel once, then flush.
    pub fn cycle(&mut self) {
        self.poll_channels();
        self.flush();
    }

    /// Poll phase: at most one inbound message per channel.
    fn poll_channels(&mut self) {
        for pair in self.registry.pairs_mut() {
            let line = match pair.rx.try_recv() {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(channel = %pair.key, "read failed: {}", e);
                    continue;
                }
            };
            tracing::debug!(channel = %pair.key, "received command");

            let request = match Request::parse(&line) {
                Ok(request) => request,
                Err(e) => {
                    let id = best_effort_id(&line);
                    tracing::warn!(
                        channel = %pair.key,
                        client_id = %id,
                        "rejecting request: {}",
                        e
                    );
                    lock(&self.state).enqueue(
                        &pair.key,
                        id,
                        ServiceResult::failed(e.to_string()),
                    );
                    continue;
                }
            };
            tracing::debug!(
                channel = %pair.key,
                client_id = %request.id,
                "got '{} | {} | {:?}'",
                request.component,
                request.service,
                request.params
            );

            match self
                .handler
                .invoke(&request.component, &request.service, request.params)
            {
                Ok(Invocation::Sync(result)) => {
                    lock(&self.state).enqueue(&pair.key, request.id, result);
                }
                Ok(Invocation::Deferred(pending_id)) => {
                    let mut state = lock(&self.state);
                    let displaced = state.pending.insert(
                        pending_id,
                        PendingEntry {
                            channel: pair.key.clone(),
                            client_id: request.id,
                        },
                    );
                    if let Some(old) = displaced {
                        tracing::warn!(
                            request_id = pending_id,
                            client_id = %old.client_id,
                            "pending id reused while live, earlier request \
                             can no longer be answered"
                        );
                    }
                }
                Err(e) => {
                    lock(&self.state).enqueue(
                        &pair.key,
                        request.id,
                        ServiceResult::failed(e.to_string()),
                    );
                }
            }
        }
    }

    /// Flush phase: drain each channel's queue to its own reply port.
    ///
    /// The reply port is looked up from the channel being flushed, so
    /// a result can never be written to a port left over from the read
    /// phase.
    fn flush(&mut self) {
        for pair in self.registry.pairs_mut() {
            let drained: Vec<(String, ServiceResult)> = {
                let mut state = lock(&self.state);
                match state.queues.get_mut(&pair.key) {
                    Some(queue) => queue.drain(..).collect(),
                    None => continue,
                }
            };
            for (client_id, result) in drained {
                let line = Response::from_result(&client_id, &result).encode();
                match pair.tx.send(&line) {
                    Ok(()) => {
                        tracing::debug!(
                            channel = %pair.key,
                            "sent back '{}'",
                            line
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            channel = %pair.key,
                            "failed to send reply '{}': {}",
                            line,
                            e
                        );
                    }
                }
            }
        }
    }

    /// Drive cycles on the configured tick until `shutdown` resolves,
    /// then close every channel.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.cycle(),
            }
        }
        self.close();
    }

    /// Close every channel. Idempotent; outstanding pending entries
    /// are neither drained nor notified.
    pub fn close(&mut self) {
        self.registry.close_all();
    }
}

impl<T: Transport, H: ServiceHandler> Drop for ServiceMux<T, H> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Best-effort reply address for a request that failed to parse.
///
/// The first token is used when it is itself a valid id; otherwise the
/// reply is addressed to [`PLACEHOLDER_ID`] so the caller at least
/// sees the failure.
fn best_effort_id(line: &str) -> String {
    match line.split_whitespace().next() {
        Some(token) if valid_id(token) => token.to_string(),
        _ => PLACEHOLDER_ID.to_string(),
    }
}

/// Fluent construction for [`ServiceMux`].
///
/// Channels are bound when [`build`](ServiceMuxBuilder::build) runs; a
/// bind failure aborts construction.
pub struct ServiceMuxBuilder<T: Transport, H: ServiceHandler> {
    transport: T,
    handler: H,
    services: Vec<(String, String)>,
    config: MuxConfig,
}

impl<T: Transport, H: ServiceHandler> ServiceMuxBuilder<T, H> {
    /// Register a `(component, service)` channel pair.
    pub fn service(mut self, component: &str, service: &str) -> Self {
        self.services
            .push((component.to_string(), service.to_string()));
        self
    }

    /// Set the dispatch tick period. Default: 10ms.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the root path for channel names. Default: `/services`.
    pub fn service_root(mut self, root: &str) -> Self {
        self.config.service_root = root.to_string();
        self
    }

    /// Announce registered channels as one JSON line on stdout after
    /// build. Default: off.
    pub fn announce(mut self, announce: bool) -> Self {
        self.config.announce = announce;
        self
    }

    /// Bind every registered service and construct the mux.
    ///
    /// # Errors
    ///
    /// [`crate::MuxError::Bind`] if any channel name cannot be bound;
    /// the process should treat this as a startup failure.
    pub fn build(self) -> Result<ServiceMux<T, H>> {
        let mut registry =
            ChannelRegistry::new(self.transport, self.config.service_root.clone());
        for (component, service) in &self.services {
            registry.register(component, service)?;
        }
        if self.config.announce {
            let message = control::build_announce_message(
                &self.config.service_root,
                &registry.entries(),
            );
            control::write_stdout_line(&message)?;
        }
        Ok(ServiceMux {
            registry,
            handler: self.handler,
            state: Arc::new(Mutex::new(DispatchState::default())),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_id() {
        assert_eq!(best_effort_id("7 arm"), "7");
        assert_eq!(best_effort_id("abc123 x y z"), "abc123");
        assert_eq!(best_effort_id("bad-id arm grab"), PLACEHOLDER_ID);
        assert_eq!(best_effort_id("   "), PLACEHOLDER_ID);
        assert_eq!(best_effort_id(""), PLACEHOLDER_ID);
        let long = "x".repeat(200);
        assert_eq!(best_effort_id(&long), PLACEHOLDER_ID);
    }

    #[test]
    fn test_config_defaults() {
        let config = MuxConfig::default();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.service_root, DEFAULT_SERVICE_ROOT);
        assert!(!config.announce);
    }

    #[test]
    fn test_state_enqueue_is_fifo_per_channel() {
        let mut state = DispatchState::default();
        state.enqueue("a/b", "1".into(), ServiceResult::ok_empty());
        state.enqueue("a/b", "2".into(), ServiceResult::ok_empty());
        state.enqueue("c/d", "3".into(), ServiceResult::ok_empty());

        let queue = state.queues.get_mut("a/b").unwrap();
        assert_eq!(queue.pop_front().unwrap().0, "1");
        assert_eq!(queue.pop_front().unwrap().0, "2");
        assert_eq!(state.queues.get("c/d").unwrap().len(), 1);
    }
}
