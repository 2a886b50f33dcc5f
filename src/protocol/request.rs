//! Inbound request parsing.

use crate::error::{MuxError, Result};
use crate::params::{parse_literal, starts_like_literal, Value};

/// Maximum length of a client request id.
pub const MAX_ID_LEN: usize = 79;

/// A parsed inbound request.
///
/// Transient: exists only while one dispatch cycle processes one
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Client-chosen identifier, echoed verbatim in the response.
    pub id: String,
    /// Target component name.
    pub component: String,
    /// Target service name.
    pub service: String,
    /// Decoded parameters, absent for 3-field requests.
    pub params: Option<Value>,
}

impl Request {
    /// Parse one raw request line.
    ///
    /// # Errors
    ///
    /// [`MuxError::Malformed`] when fewer than 3 or more than 4 fields
    /// are present, or the id is not 1-79 alphanumeric characters;
    /// [`MuxError::InvalidParams`] when the parameter field is present
    /// but the decoder rejects it (the decoder's message is kept
    /// verbatim for the FAILED reply).
    pub fn parse(line: &str) -> Result<Request> {
        let (id, rest) = split_field(line).ok_or_else(too_few)?;
        let (component, rest) = split_field(rest).ok_or_else(too_few)?;
        let (service, rest) = split_field(rest).ok_or_else(too_few)?;

        if !valid_id(id) {
            return Err(MuxError::Malformed(format!(
                "request id '{}' must be 1-{} alphanumeric characters",
                id, MAX_ID_LEN
            )));
        }

        let rest = rest.trim();
        let params = if rest.is_empty() {
            None
        } else if starts_like_literal(rest) {
            Some(parse_literal(rest)?)
        } else {
            // bare words after the service field are extra fields
            return Err(MuxError::Malformed(
                "at least 3 and at most 4 fields are expected \
                 (id, component, service, [params])"
                    .to_string(),
            ));
        };

        Ok(Request {
            id: id.to_string(),
            component: component.to_string(),
            service: service.to_string(),
            params,
        })
    }
}

/// Whether `id` matches `[a-zA-Z0-9]{1,79}`.
pub(crate) fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Split the next whitespace-delimited field off the front of `s`.
pub(crate) fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

fn too_few() -> MuxError {
    MuxError::Malformed(
        "at least 3 and at most 4 fields are expected \
         (id, component, service, [params])"
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_fields_no_params() {
        let req = Request::parse("7 arm grab").unwrap();
        assert_eq!(req.id, "7");
        assert_eq!(req.component, "arm");
        assert_eq!(req.service, "grab");
        assert_eq!(req.params, None);
    }

    #[test]
    fn test_four_fields_with_params() {
        let req = Request::parse("7 arm grab (1,2,3)").unwrap();
        assert_eq!(
            req.params,
            Some(Value::Seq(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3)
            ]))
        );
    }

    #[test]
    fn test_params_may_contain_spaces() {
        let req = Request::parse("req1 motion goto ( 1.0 , 2.0 )").unwrap();
        assert_eq!(
            req.params,
            Some(Value::Seq(vec![Value::Float(1.0), Value::Float(2.0)]))
        );
    }

    #[test]
    fn test_leading_and_extra_whitespace() {
        let req = Request::parse("  a1   arm   grab  ").unwrap();
        assert_eq!(req.id, "a1");
        assert_eq!(req.params, None);
    }

    #[test]
    fn test_too_few_fields() {
        for line in ["", "7", "7 arm"] {
            let err = Request::parse(line).unwrap_err();
            assert!(matches!(err, MuxError::Malformed(_)), "line: {:?}", line);
        }
    }

    #[test]
    fn test_too_many_bare_fields() {
        let err = Request::parse("7 arm grab extra junk").unwrap_err();
        assert!(matches!(err, MuxError::Malformed(_)));
    }

    #[test]
    fn test_trailing_garbage_after_literal_is_a_decode_error() {
        let err = Request::parse("7 arm grab (1,2) tail").unwrap_err();
        assert!(matches!(err, MuxError::InvalidParams(_)));
    }

    #[test]
    fn test_bad_literal_reports_decoder_message() {
        let err = Request::parse("7 arm grab (1,").unwrap_err();
        match err {
            MuxError::InvalidParams(msg) => assert!(msg.contains("offset")),
            other => panic!("expected InvalidParams, got {:?}", other),
        }
    }

    #[test]
    fn test_id_pattern_enforced() {
        assert!(Request::parse("re-q arm grab").is_err());
        assert!(Request::parse("r.q arm grab").is_err());
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(Request::parse(&format!("{} arm grab", long)).is_err());
        let max = "x".repeat(MAX_ID_LEN);
        assert!(Request::parse(&format!("{} arm grab", max)).is_ok());
    }

    #[test]
    fn test_valid_id() {
        assert!(valid_id("7"));
        assert!(valid_id("aB3"));
        assert!(!valid_id(""));
        assert!(!valid_id("a b"));
        assert!(!valid_id("a_b"));
    }
}
