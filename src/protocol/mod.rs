//! Wire protocol: request and response lines.
//!
//! One message per exchange, text, newline-delimited by the transport:
//!
//! ```text
//! request:  <id> <component> <service> [<params>]
//! response: <id> OK|FAILED [<payload>]
//! ```
//!
//! `id` is a client-chosen token in `[a-zA-Z0-9]{1,79}` echoed
//! verbatim in the response; `params` is a literal in the syntax of
//! [`crate::params`]; the payload is omitted entirely when the result
//! carries nothing to say.

mod request;
mod response;

pub use request::{Request, MAX_ID_LEN};
pub(crate) use request::valid_id;
pub use response::{Response, ServiceResult, Status};
