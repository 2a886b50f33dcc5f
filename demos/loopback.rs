//! Loopback demo - one mux, one scripted handler, one in-process
//! client.
//!
//! Demonstrates:
//! - Building a mux with the fluent builder
//! - A handler answering synchronously and deferring work
//! - Delivering a deferred result through the completion notifier
//!
//! Run with `cargo run --example loopback`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portmux::transport::MemTransport;
use portmux::{
    CompletionNotifier, Invocation, MuxError, ServiceHandler, ServiceMux,
    ServiceResult, Value,
};

/// Shared slot for the notifier, filled in once the mux exists.
type NotifierSlot = Arc<Mutex<Option<CompletionNotifier>>>;

/// Answers `arm/grab` on the spot and defers `motion/goto`.
struct Robot {
    next_pending: AtomicU64,
    notifier: NotifierSlot,
}

impl ServiceHandler for Robot {
    fn invoke(
        &self,
        component: &str,
        service: &str,
        params: Option<Value>,
    ) -> Result<Invocation, MuxError> {
        match (component, service) {
            ("arm", "grab") => Ok(Invocation::Sync(ServiceResult::ok(true))),
            ("motion", "goto") => {
                let id = self.next_pending.fetch_add(1, Ordering::Relaxed);
                let notifier = self
                    .notifier
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("notifier installed before requests arrive");
                // pretend the motion takes a while
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    let destination = params
                        .map(|p| p.render())
                        .unwrap_or_else(|| "origin".to_string());
                    notifier.complete(
                        id,
                        ServiceResult::ok(format!("arrived at {}", destination)),
                    );
                });
                Ok(Invocation::Deferred(id))
            }
            _ => Err(MuxError::Service(format!(
                "unknown service {}/{}",
                component, service
            ))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport = MemTransport::new();
    let notifier_slot: NotifierSlot = Arc::new(Mutex::new(None));
    let robot = Robot {
        next_pending: AtomicU64::new(1),
        notifier: Arc::clone(&notifier_slot),
    };

    let mux = ServiceMux::builder(transport.clone(), robot)
        .service("arm", "grab")
        .service("motion", "goto")
        .announce(true)
        .build()?;
    *notifier_slot.lock().unwrap() = Some(mux.completion_notifier());

    let mut arm = transport.connect(&mux.channel_names("arm", "grab"));
    let mut motion = transport.connect(&mux.channel_names("motion", "goto"));

    arm.send("1 arm grab")?;
    motion.send("2 motion goto (4.0, 2.0)")?;
    arm.send("3 arm grab oops extra")?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mux_task = tokio::spawn(async move {
        mux.run_until(async {
            let _ = stop_rx.await;
        })
        .await;
    });

    for _ in 0..3 {
        tokio::select! {
            Some(line) = arm.recv() => eprintln!("arm/grab     <- {}", line),
            Some(line) = motion.recv() => eprintln!("motion/goto  <- {}", line),
        }
    }

    let _ = stop_tx.send(());
    mux_task.await?;
    Ok(())
}
