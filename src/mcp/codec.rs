//! Line-delimited JSON-RPC codec
//!
//! One message is one JSON object followed by a single `\n`. The codec is a
//! pure transform: reading up to the terminator is the caller's job.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::mcp::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, Message, Params, RequestId, ResponsePayload,
    JSONRPC_VERSION,
};

/// Record terminator
pub const TERMINATOR: u8 = b'\n';

#[derive(Serialize)]
struct WireRequest<'a> {
    jsonrpc: &'static str,
    id: RequestId,
    method: &'a str,
    params: &'a Params,
}

#[derive(Serialize)]
struct WireResponse<'a> {
    jsonrpc: &'static str,
    id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a JsonRpcError>,
}

/// Serialize a message into one terminated record
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let mut bytes = match message {
        Message::Request(request) => serde_json::to_vec(&WireRequest {
            jsonrpc: JSONRPC_VERSION,
            id: request.id,
            method: &request.method,
            params: &request.params,
        }),
        Message::Response(response) => {
            let (result, error) = match &response.payload {
                ResponsePayload::Result(value) => (Some(value), None),
                ResponsePayload::Error(error) => (None, Some(error)),
            };
            serde_json::to_vec(&WireResponse {
                jsonrpc: JSONRPC_VERSION,
                id: response.id,
                result,
                error,
            })
        }
    }
    .map_err(|e| CodecError::malformed(format!("cannot serialize message: {}", e)))?;

    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Parse one terminator-stripped record
pub fn decode(line: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| CodecError::malformed(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut object) = value else {
        return Err(CodecError::malformed("record is not a JSON object"));
    };

    match object.get("jsonrpc") {
        None => {}
        Some(Value::String(version)) if version == JSONRPC_VERSION => {}
        Some(other) => {
            return Err(CodecError::malformed(format!(
                "unsupported jsonrpc version: {}",
                other
            )))
        }
    }

    let id = decode_id(&object)?;

    if let Some(method) = object.remove("method") {
        let Value::String(method) = method else {
            return Err(CodecError::malformed("method must be a string"));
        };
        let params = match object.remove("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(params)) => params,
            Some(_) => return Err(CodecError::malformed("params must be an object")),
        };
        return Ok(Message::Request(JsonRpcRequest { id, method, params }));
    }

    let payload = match (object.remove("result"), object.remove("error")) {
        (Some(result), None) => ResponsePayload::Result(result),
        (None, Some(error)) => ResponsePayload::Error(
            serde_json::from_value(error)
                .map_err(|e| CodecError::malformed(format!("invalid error object: {}", e)))?,
        ),
        (Some(_), Some(_)) => {
            return Err(CodecError::malformed(
                "response carries both result and error",
            ))
        }
        (None, None) => {
            return Err(CodecError::malformed(
                "record has neither method nor result/error",
            ))
        }
    };

    Ok(Message::Response(JsonRpcResponse { id, payload }))
}

fn decode_id(object: &Map<String, Value>) -> Result<RequestId, CodecError> {
    match object.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(RequestId)
            .ok_or_else(|| CodecError::malformed(format!("id must be an integer, got {}", n))),
        Some(other) => Err(CodecError::malformed(format!(
            "id must be an integer, got {}",
            other
        ))),
        None => Err(CodecError::malformed("missing id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::JsonRpcError;
    use serde_json::json;

    fn strip(bytes: &[u8]) -> &str {
        std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap()
    }

    #[test]
    fn test_encode_request_wire_shape() {
        let mut params = Params::new();
        params.insert("uri".to_string(), json!("todos://all"));
        let request = JsonRpcRequest::new(RequestId(7), "resources/read").with_params(params);

        let bytes = encode(&request.into()).unwrap();
        assert_eq!(bytes.last(), Some(&TERMINATOR));
        assert_eq!(bytes.iter().filter(|b| **b == TERMINATOR).count(), 1);
        assert_eq!(
            strip(&bytes),
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"todos://all"}}"#
        );
    }

    #[test]
    fn test_encode_error_response_omits_result() {
        let response =
            JsonRpcResponse::error(RequestId(1), JsonRpcError::method_not_found("bogus"));
        let bytes = encode(&response.into()).unwrap();
        assert_eq!(
            strip(&bytes),
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found: bogus"}}"#
        );
    }

    #[test]
    fn test_round_trip() {
        let mut params = Params::new();
        params.insert("name".to_string(), json!("add_todo"));
        params.insert("arguments".to_string(), json!({"title": "Buy groceries"}));

        let messages: Vec<Message> = vec![
            JsonRpcRequest::new(RequestId(1), "initialize").into(),
            JsonRpcRequest::new(RequestId(2), "tools/call")
                .with_params(params)
                .into(),
            JsonRpcResponse::success(RequestId(2), json!({"content": [{"type": "text", "text": "ok"}]}))
                .into(),
            JsonRpcResponse::success(RequestId(3), Value::Null).into(),
            JsonRpcResponse::error(
                RequestId(4),
                JsonRpcError::invalid_params("Unknown tool: nope").with_data(json!({"name": "nope"})),
            )
            .into(),
        ];

        for message in messages {
            let bytes = encode(&message).unwrap();
            assert_eq!(decode(strip(&bytes)).unwrap(), message);
        }
    }

    #[test]
    fn test_foreign_error_object_survives_decode_and_encode() {
        let line = r#"{"jsonrpc":"2.0","id":1,"error":{"message":"busy","retryAfter":5}}"#;
        let message = decode(line).unwrap();

        match &message {
            Message::Response(response) => {
                let error = response.clone().into_result().unwrap_err();
                assert_eq!(error.code, None);
                assert_eq!(error.extra.get("retryAfter"), Some(&json!(5)));
            }
            other => panic!("expected response, got {:?}", other),
        }
        assert_eq!(strip(&encode(&message).unwrap()), line);
    }

    #[test]
    fn test_missing_params_defaults_to_empty() {
        let message = decode(r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#).unwrap();
        match message {
            Message::Request(request) => {
                assert_eq!(request.id, RequestId(5));
                assert!(request.params.is_empty());
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_records() {
        let cases = [
            "not json",
            "[1,2,3]",
            r#"{"jsonrpc":"2.0","method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#,
            r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":42}"#,
            r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":[1]}"#,
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"message":"x"}}"#,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":1}}"#,
        ];

        for case in cases {
            let err = decode(case).unwrap_err();
            assert!(
                matches!(err, CodecError::MalformedMessage { .. }),
                "expected malformed for {}",
                case
            );
        }
    }
}
