//! Middleware for logging requests and responses.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, CONTENT_LENGTH, COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// The number of bytes of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request or response body, in bytes, the middleware will buffer.
pub const BODY_SIZE_LIMIT: usize = 2 * 1024 * 1024;

const REDACTED: &str = "********";
const SENSITIVE_FIELDS: [&str; 1] = ["password"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Credentials in headers and JSON bodies are replaced before logging.
///
/// Requests with a body over [BODY_SIZE_LIMIT] bytes are rejected with
/// `413 Payload Too Large` before reaching a handler.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    if declared_length(&parts.headers).is_some_and(|length| length > BODY_SIZE_LIMIT) {
        tracing::warn!("Rejected {} {}: declared body too large", parts.method, parts.uri);
        return Error::PayloadTooLarge.into_response();
    }

    // The body may not declare its length, so the limit also applies while reading.
    let body_bytes = match to_bytes(body, BODY_SIZE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!("Could not read request body within {BODY_SIZE_LIMIT} bytes: {error}");
            return Error::PayloadTooLarge.into_response();
        }
    };

    log_body(
        &format!(
            "Received request: {} {}\nheaders: {:#?}",
            parts.method,
            parts.uri,
            redact_headers(&parts.headers)
        ),
        &redact_body(&String::from_utf8_lossy(&body_bytes)),
    );

    let response = next
        .run(Request::from_parts(parts, Body::from(body_bytes)))
        .await;

    let (parts, body) = response.into_parts();
    let body_bytes = match to_bytes(body, BODY_SIZE_LIMIT).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log_body(
        &format!(
            "Sending response: {}\nheaders: {:#?}",
            parts.status,
            redact_headers(&parts.headers)
        ),
        &redact_body(&String::from_utf8_lossy(&body_bytes)),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    for name in [AUTHORIZATION, COOKIE, SET_COOKIE] {
        if headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(REDACTED));
        }
    }

    headers
}

/// Replace the values of credential fields in a JSON body.
///
/// Bodies that are not JSON are returned unchanged.
fn redact_body(body: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(body) else {
        return body.to_owned();
    };

    if redact_fields(&mut json) {
        json.to_string()
    } else {
        body.to_owned()
    }
}

fn redact_fields(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut redacted = false;

            for (key, value) in map.iter_mut() {
                if SENSITIVE_FIELDS.contains(&key.as_str()) {
                    *value = Value::String(REDACTED.to_owned());
                    redacted = true;
                } else {
                    redacted |= redact_fields(value);
                }
            }

            redacted
        }
        Value::Array(values) => values
            .iter_mut()
            .fold(false, |redacted, value| redact_fields(value) || redacted),
        _ => false,
    }
}

/// The longest prefix of `text` that fits in `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let end = (0..=limit)
        .rev()
        .find(|&index| text.is_char_boundary(index))
        .unwrap_or(0);

    &text[..end]
}

fn log_body(head: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!("{head}\nbody: {}...", truncate(body, LOG_BODY_LENGTH_LIMIT));
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{head}\nbody: {body:?}");
    }
}


#[cfg(test)]
mod logging_middleware_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{endpoints, logging::BODY_SIZE_LIMIT, test_utils::TestApp};

    #[tokio::test]
    async fn oversized_request_body_is_rejected() {
        let app = TestApp::new();
        app.insert_user("ada@example.com");

        let response = app
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({
                "email": "ada@example.com",
                "password": "a".repeat(BODY_SIZE_LIMIT),
            }))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.text(), r#"{"error":"request body too large"}"#);
    }
}
