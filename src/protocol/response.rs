//! Outbound response lines.

use std::fmt;
use std::str::FromStr;

use crate::error::{MuxError, Result};
use crate::params::Value;

/// Outcome of a service invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The service ran to completion.
    Ok,
    /// The service failed; the payload carries the error message.
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Failed => f.write_str("FAILED"),
        }
    }
}

impl FromStr for Status {
    type Err = MuxError;

    fn from_str(s: &str) -> Result<Status> {
        match s {
            "OK" => Ok(Status::Ok),
            "FAILED" => Ok(Status::Failed),
            other => Err(MuxError::Malformed(format!(
                "unknown response status '{}'",
                other
            ))),
        }
    }
}

/// The result a handler (or a later completion) reports for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResult {
    /// Outcome status.
    pub status: Status,
    /// Result value, absent when the service has nothing to return.
    pub value: Option<Value>,
}

impl ServiceResult {
    /// A successful result carrying `value`.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self {
            status: Status::Ok,
            value: Some(value.into()),
        }
    }

    /// A successful result with no payload.
    pub fn ok_empty() -> Self {
        Self {
            status: Status::Ok,
            value: None,
        }
    }

    /// A failed result carrying an error message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            value: Some(Value::Str(message.into())),
        }
    }
}

/// One wire-encoded response line.
///
/// Produced from a queued result at flush time; has no lifecycle of
/// its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The client request id being answered.
    pub id: String,
    /// Outcome status.
    pub status: Status,
    /// Rendered payload, `None` when omitted.
    pub payload: Option<String>,
}

impl Response {
    /// Build the response line for `result`, addressed to `id`.
    ///
    /// The payload is omitted when the result value is absent or
    /// renders to an empty string.
    pub fn from_result(id: &str, result: &ServiceResult) -> Self {
        let payload = result
            .value
            .as_ref()
            .map(Value::render)
            .filter(|s| !s.is_empty());
        Self {
            id: id.to_string(),
            status: result.status,
            payload,
        }
    }

    /// Encode as the wire line `<id> <OK|FAILED>[ <payload>]`.
    pub fn encode(&self) -> String {
        match &self.payload {
            Some(p) => format!("{} {} {}", self.id, self.status, p),
            None => format!("{} {}", self.id, self.status),
        }
    }

    /// Parse a wire line back into its parts.
    ///
    /// The client-side inverse of [`Response::encode`]; the mux itself
    /// only encodes.
    pub fn parse(line: &str) -> Result<Response> {
        let mut fields = line.trim().splitn(3, ' ');
        let id = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MuxError::Malformed("empty response line".into()))?;
        let status = fields
            .next()
            .ok_or_else(|| {
                MuxError::Malformed("response line is missing a status".into())
            })?
            .parse::<Status>()?;
        let payload = fields.next().map(str::to_string);
        Ok(Response {
            id: id.to_string(),
            status,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_with_payload() {
        let line =
            Response::from_result("42", &ServiceResult::ok(Value::Int(7))).encode();
        assert_eq!(line, "42 OK 7");
    }

    #[test]
    fn test_encode_empty_payload_is_omitted() {
        let result = ServiceResult {
            status: Status::Failed,
            value: Some(Value::Str(String::new())),
        };
        assert_eq!(Response::from_result("42", &result).encode(), "42 FAILED");
    }

    #[test]
    fn test_encode_absent_payload_is_omitted() {
        let line = Response::from_result("9", &ServiceResult::ok_empty()).encode();
        assert_eq!(line, "9 OK");
    }

    #[test]
    fn test_false_and_zero_are_still_emitted() {
        let line = Response::from_result("1", &ServiceResult::ok(false)).encode();
        assert_eq!(line, "1 OK false");
        let line = Response::from_result("2", &ServiceResult::ok(0i64)).encode();
        assert_eq!(line, "2 OK 0");
    }

    #[test]
    fn test_roundtrip() {
        let resp =
            Response::from_result("42", &ServiceResult::ok(Value::Int(7)));
        let parsed = Response::parse(&resp.encode()).unwrap();
        assert_eq!(parsed, resp);
        assert_eq!(parsed.payload.as_deref(), Some("7"));
    }

    #[test]
    fn test_roundtrip_no_payload() {
        let parsed = Response::parse("42 FAILED").unwrap();
        assert_eq!(parsed.id, "42");
        assert_eq!(parsed.status, Status::Failed);
        assert_eq!(parsed.payload, None);
    }

    #[test]
    fn test_payload_keeps_internal_spaces() {
        let parsed = Response::parse("7 FAILED malformed request: nope").unwrap();
        assert_eq!(parsed.payload.as_deref(), Some("malformed request: nope"));
    }

    #[test]
    fn test_parse_rejects_bad_status() {
        assert!(Response::parse("42 MAYBE x").is_err());
        assert!(Response::parse("42").is_err());
        assert!(Response::parse("").is_err());
    }

    #[test]
    fn test_failed_helper_carries_message() {
        let r = ServiceResult::failed("no such service");
        let line = Response::from_result("a1", &r).encode();
        assert_eq!(line, "a1 FAILED no such service");
    }
}
