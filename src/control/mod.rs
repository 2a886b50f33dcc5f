//! Service announcement on stdout.
//!
//! A supervisor that spawns the mux has no way to know which channel
//! names were bound unless told. With announcement enabled, the mux
//! writes exactly one JSON line to stdout after registration listing
//! every service and its request/reply channel names.
//!
//! stdout carries only this line; all logging goes through `tracing`
//! (stderr by convention), so the parent can parse stdout safely.
//!
//! # Example
//!
//! ```
//! use portmux::control::{build_announce_message, ServiceEntry};
//!
//! let entries = vec![ServiceEntry {
//!     component: "arm".into(),
//!     service: "grab".into(),
//!     request: "/services/arm/grab/request".into(),
//!     reply: "/services/arm/grab/reply".into(),
//! }];
//! let line = build_announce_message("/services", &entries);
//! assert!(line.contains("$services"));
//! ```

use std::io::Write;

use serde::Serialize;
use serde_json::json;

/// Protocol version carried in the announcement.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// One registered service and its channel names.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceEntry {
    /// Component the service belongs to.
    pub component: String,
    /// Service name.
    pub service: String,
    /// Request channel name.
    pub request: String,
    /// Reply channel name.
    pub reply: String,
}

/// Build the `$services` announcement line.
pub fn build_announce_message(root: &str, services: &[ServiceEntry]) -> String {
    let message = json!({
        "method": "$services",
        "params": {
            "root": root,
            "services": services,
            "version": PROTOCOL_VERSION,
        }
    });
    message.to_string()
}

/// Write a line to stdout and flush.
///
/// Uses an explicit `\n`, not `println!`, so the line ending is stable
/// across platforms, and flushes because the parent waits for a
/// complete line.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}
