//! Canonical JSON payload returned for every program request.

use serde::{Deserialize, Serialize};

use super::parser::ParsedProgram;

/// Wire shape of a program response. Field names are part of the HTTP
/// contract and all four are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub preamble: String,
    pub program_node: String,
    pub valid: bool,
    pub status: String,
}

impl ResultPayload {
    pub fn new(parsed: ParsedProgram, valid: bool, status: impl Into<String>) -> Self {
        Self {
            preamble: parsed.preamble,
            program_node: parsed.body,
            valid,
            status: status.into(),
        }
    }

    /// Serialize to the compact JSON string that is cached and served.
    pub fn to_json(&self) -> String {
        // Only strings and a bool: serialization has no failure path.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Encode a parse result plus validity and status into the serialized payload.
///
/// Deterministic: identical inputs always yield byte-identical output.
pub fn encode(parsed: ParsedProgram, valid: bool, status: &str) -> String {
    ResultPayload::new(parsed, valid, status).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> ParsedProgram {
        ParsedProgram {
            preamble: "# HEADER_BEGIN\nx=1\n# HEADER_END".into(),
            body: "def prog(): pass\n".into(),
        }
    }

    #[test]
    fn test_encode_has_exactly_four_keys() {
        let out = encode(sample(), true, "ok");
        let value: Value = serde_json::from_str(&out).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["preamble"], "# HEADER_BEGIN\nx=1\n# HEADER_END");
        assert_eq!(obj["program_node"], "def prog(): pass\n");
        assert_eq!(obj["valid"], true);
        assert_eq!(obj["status"], "ok");
    }

    #[test]
    fn test_encode_keeps_empty_fields() {
        let out = encode(ParsedProgram::default(), false, "connection refused");
        let payload: ResultPayload = serde_json::from_str(&out).unwrap();
        assert_eq!(payload.preamble, "");
        assert_eq!(payload.program_node, "");
        assert!(!payload.valid);
        assert_eq!(payload.status, "connection refused");
        assert!(out.contains("\"preamble\":\"\""));
        assert!(out.contains("\"program_node\":\"\""));
    }

    #[test]
    fn test_to_json_exact_bytes() {
        let payload = ResultPayload::new(
            ParsedProgram {
                preamble: String::new(),
                body: "p\n".into(),
            },
            true,
            "ok",
        );
        assert_eq!(
            payload.to_json(),
            r#"{"preamble":"","program_node":"p\n","valid":true,"status":"ok"}"#
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(sample(), true, "ok");
        let b = encode(sample(), true, "ok");
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_field_order() {
        let out = encode(sample(), true, "ok");
        let p = out.find("\"preamble\"").unwrap();
        let n = out.find("\"program_node\"").unwrap();
        let v = out.find("\"valid\"").unwrap();
        let s = out.find("\"status\"").unwrap();
        assert!(p < n && n < v && v < s);
    }
}
