//! Wire protocol: request encoding and two-phase response decoding.
//!
//! Every response line is first read as a permissive [`Envelope`]. Only when
//! the envelope is valid and its `resultType` is registered is the full line
//! decoded strictly into the registered schema.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::registry::ResultRegistry;

pub const VALID_KEY: &str = "valid";
pub const RESULT_TYPE_KEY: &str = "resultType";
pub const ERROR_MESSAGE_KEY: &str = "errorMessage";

/// Used when the worker reports failure without saying why.
const MISSING_ERROR_MESSAGE: &str = "worker reported an invalid result without an error message";

/// Generic outer shape shared by every response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(line)
            .map_err(|e| BridgeError::Protocol(format!("malformed response envelope: {e}")))
    }
}

/// Serialize a request to exactly one line (without terminator).
pub fn encode_request<Q>(request: &Q) -> Result<String, BridgeError>
where
    Q: Serialize + ?Sized,
{
    let line = serde_json::to_string(request).map_err(|e| BridgeError::Encode(e.to_string()))?;
    if line.contains(['\n', '\r']) {
        return Err(BridgeError::Encode(
            "serialized request contains a line terminator".to_string(),
        ));
    }
    Ok(line)
}

/// Decode one response line into the registered result type.
pub fn decode_response<R>(line: &str, registry: &ResultRegistry<R>) -> Result<R, BridgeError> {
    let envelope = Envelope::parse(line)?;

    if !envelope.valid {
        let message = envelope
            .error_message
            .unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_string());
        return Err(BridgeError::Upstream(message));
    }

    let result_type = envelope.result_type.ok_or_else(|| {
        BridgeError::Protocol(format!("valid response is missing '{RESULT_TYPE_KEY}'"))
    })?;

    let decode = registry
        .get(&result_type)
        .ok_or_else(|| BridgeError::UnknownResultType(result_type.clone()))?;

    let mut fields: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)
        .map_err(|e| BridgeError::Protocol(format!("malformed response: {e}")))?;
    for key in [VALID_KEY, RESULT_TYPE_KEY, ERROR_MESSAGE_KEY] {
        fields.remove(key);
    }

    decode(serde_json::Value::Object(fields)).map_err(|e| {
        BridgeError::Protocol(format!("malformed '{result_type}' result: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResultSchema;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct AutoCompleteResult {
        completions: Vec<String>,
    }

    impl ResultSchema for AutoCompleteResult {
        const RESULT_TYPE: &'static str = "AUTOCOMPLETE";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields, rename_all = "camelCase")]
    struct SyntaxHighlightResult {
        token_kinds: Vec<String>,
        final_lex_state: u32,
    }

    impl ResultSchema for SyntaxHighlightResult {
        const RESULT_TYPE: &'static str = "SYNTAX_HIGHLIGHT";
    }

    #[derive(Debug, PartialEq)]
    enum LanguageResult {
        AutoComplete(AutoCompleteResult),
        SyntaxHighlight(SyntaxHighlightResult),
    }

    #[derive(Serialize)]
    struct CompleteRequest {
        feature: &'static str,
        line: u32,
        col: u32,
    }

    fn registry() -> ResultRegistry<LanguageResult> {
        ResultRegistry::builder()
            .register::<AutoCompleteResult>(LanguageResult::AutoComplete)
            .unwrap()
            .register::<SyntaxHighlightResult>(LanguageResult::SyntaxHighlight)
            .unwrap()
            .build()
    }

    #[test]
    fn encodes_request_on_one_line() {
        let line = encode_request(&CompleteRequest {
            feature: "complete",
            line: 10,
            col: 4,
        })
        .unwrap();
        assert_eq!(line, r#"{"feature":"complete","line":10,"col":4}"#);
    }

    #[test]
    fn newlines_in_strings_are_escaped() {
        let line = encode_request(&json!({"text": "a\nb\r\nc"})).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(line, r#"{"text":"a\nb\r\nc"}"#);
    }

    #[test]
    fn envelope_serializes() {
        let envelope = Envelope {
            valid: false,
            result_type: None,
            error_message: Some("parse error".to_string()),
        };
        insta::assert_json_snapshot!(envelope, @r#"
        {
          "valid": false,
          "errorMessage": "parse error"
        }
        "#);
    }

    #[test]
    fn envelope_ignores_unknown_fields() {
        let envelope =
            Envelope::parse(r#"{"valid":true,"resultType":"AUTOCOMPLETE","completions":[]}"#)
                .unwrap();
        assert!(envelope.valid);
        assert_eq!(envelope.result_type.as_deref(), Some("AUTOCOMPLETE"));
        assert!(envelope.error_message.is_none());
    }

    #[test]
    fn decodes_registered_result() {
        let line = r#"{"valid":true,"resultType":"AUTOCOMPLETE","completions":["foo","bar"]}"#;
        let result = decode_response(line, &registry()).unwrap();
        assert_eq!(
            result,
            LanguageResult::AutoComplete(AutoCompleteResult {
                completions: vec!["foo".to_string(), "bar".to_string()],
            })
        );
    }

    #[test]
    fn invalid_envelope_is_upstream_error() {
        let line = r#"{"valid":false,"errorMessage":"parse error"}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        assert_eq!(err.upstream_message(), Some("parse error"));
    }

    #[test]
    fn invalid_envelope_skips_tag_lookup() {
        // Registered tag with a payload that would fail strict decoding.
        let line = r#"{"valid":false,"resultType":"AUTOCOMPLETE","errorMessage":"boom","bogus":1}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        assert_eq!(err.upstream_message(), Some("boom"));

        // Unregistered tag.
        let line = r#"{"valid":false,"resultType":"NOPE","errorMessage":"boom"}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        assert_eq!(err.upstream_message(), Some("boom"));
    }

    #[test]
    fn invalid_envelope_without_message() {
        let err = decode_response(r#"{"valid":false}"#, &registry()).unwrap_err();
        assert_eq!(err.upstream_message(), Some(MISSING_ERROR_MESSAGE));
    }

    #[test]
    fn unregistered_tag_is_unknown_result_type() {
        let line = r#"{"valid":true,"resultType":"CHECK_FILE","errors":[]}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownResultType(ref tag) if tag == "CHECK_FILE"));
    }

    #[test]
    fn valid_without_tag_is_protocol_error() {
        let err = decode_response(r#"{"valid":true}"#, &registry()).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn malformed_lines_are_protocol_errors() {
        let lines = [
            "",
            "not json",
            "[1,2]",
            r#"{"resultType":"AUTOCOMPLETE"}"#,
            r#"{"valid":"yes"}"#,
        ];
        for line in lines {
            let err = decode_response(line, &registry()).unwrap_err();
            assert!(matches!(err, BridgeError::Protocol(_)), "line {line:?}: {err}");
        }
    }

    #[test]
    fn strict_decode_rejects_unknown_payload_fields() {
        let line = r#"{"valid":true,"resultType":"AUTOCOMPLETE","completions":[],"score":3}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        match err {
            BridgeError::Protocol(msg) => assert!(msg.contains("AUTOCOMPLETE"), "{msg}"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn strict_decode_rejects_missing_payload_fields() {
        let line = r#"{"valid":true,"resultType":"SYNTAX_HIGHLIGHT","tokenKinds":[]}"#;
        let err = decode_response(line, &registry()).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn decoded_fields_match_payload() {
        let payload = json!({"tokenKinds": ["keyword", "identifier"], "finalLexState": 2});
        let mut line = payload.clone();
        line["valid"] = json!(true);
        line["resultType"] = json!("SYNTAX_HIGHLIGHT");

        let result = decode_response(&line.to_string(), &registry()).unwrap();
        let LanguageResult::SyntaxHighlight(highlight) = result else {
            panic!("wrong variant");
        };
        assert_eq!(serde_json::to_value(&highlight).unwrap(), payload);
    }
}
