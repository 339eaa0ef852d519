//! Translation between Lambda invocation payloads and the handler.
//!
//! The function is reachable both through an API Gateway proxy integration
//! and through a direct `Invoke`, so the incoming event may be the request
//! itself or a proxy envelope whose `body` is a JSON string, optionally
//! base64-encoded.

use crate::{
    error::{GenError, Result},
    models::ErrorBody,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{json, Value};

/// Extracts the request payload from any supported event shape.
pub fn parse_event(event: Value) -> Result<Value> {
    let mut envelope = match event {
        Value::Object(map) => map,
        _ => return Err(GenError::InvalidRequest("Unsupported event format".into())),
    };

    let body = match envelope.remove("body") {
        Some(body) => body,
        // Direct invoke: the event is the request.
        None => return Ok(Value::Object(envelope)),
    };

    let is_base64 = envelope
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match body {
        Value::String(text) => {
            let text = if is_base64 {
                decode_base64_body(&text)?
            } else {
                text
            };
            serde_json::from_str(&text)
                .map_err(|_| GenError::InvalidRequest("Invalid JSON in request body".into()))
        }
        Value::Object(_) => Ok(body),
        _ => Err(GenError::InvalidRequest("Unsupported body format".into())),
    }
}

fn decode_base64_body(text: &str) -> Result<String> {
    STANDARD
        .decode(text.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| GenError::InvalidRequest("Invalid base64-encoded body".into()))
}

/// Status plus JSON body, independent of the hosting platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::from_error(&GenError::from(e)),
        }
    }

    pub fn from_error(err: &GenError) -> Self {
        let mut body = ErrorBody::new(err.public_message());
        if let GenError::ContentFiltered { reasons } = err {
            body.finish_reasons = Some(reasons.clone());
        }
        Self {
            status: err.status_code(),
            body: serde_json::to_value(body)
                .unwrap_or_else(|_| json!({ "error": "Internal server error" })),
        }
    }

    /// API Gateway proxy integration response.
    pub fn into_proxy_response(self) -> Value {
        json!({
            "statusCode": self.status,
            "headers": {
                "Content-Type": "application/json",
                "Access-Control-Allow-Origin": "*"
            },
            "body": self.body.to_string()
        })
    }
}
